//! Memory-accounting decoder.
//!
//! This module handles:
//! - Costing Redis data structures the way the server allocates them
//! - Turning parser callbacks into one record per top-level key
//! - Handing finished records to the aggregator over a bounded stream

pub mod builder;
pub mod events;
pub mod record;
pub mod size_model;
pub mod stream;

// Re-export main types
pub use builder::{RecordBuilder, SnapshotMeta};
pub use events::{Consumer, ConsumerGroup, NodeContainer, SnapshotHandler, TypeInfo};
pub use record::{ElementSample, Kind, Record};
pub use size_model::Encoding;
pub use stream::{record_stream, RecordReceiver, RecordSender, RecordSink};
