//! Front-ends that feed parser callbacks into the decoder.
//!
//! This module handles:
//! - Replaying JSON-lines recordings of `SnapshotHandler` calls
//! - Reporting malformed or rejected events with their line numbers

pub mod events_file;

// Re-export main types
pub use events_file::{replay, replay_file, SnapshotEvent};
