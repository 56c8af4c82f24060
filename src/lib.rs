//! RDB Memory Analyzer
//!
//! Offline memory estimation and hot-spot aggregation for Redis RDB
//! snapshots.
//!
//! An RDB parser reports every key through the `SnapshotHandler` callbacks.
//! The decoder costs each key the way the server would have allocated it,
//! and a streaming aggregator ranks the results by key, prefix, kind,
//! element count and cluster slot under a fixed memory ceiling.
//!
//! ## Getting Started
//!
//! ```ignore
//! use rdb_mem_analyzer::parser::replay_file;
//! use rdb_mem_analyzer::pipeline::{run_pipeline, PipelineOptions};
//!
//! let output = run_pipeline(PipelineOptions::default(), |builder| {
//!     replay_file("dump.events", builder).map(|_| ())
//! })?;
//! for record in output.aggregates.largest_entries(10, 0) {
//!     println!("{} {}", record.bytes, record.key);
//! }
//! ```

pub mod aggregator;
pub mod commands;
pub mod decoder;
pub mod output;
pub mod parser;
pub mod pipeline;
pub mod utils;
