//! Utility modules for configuration, error handling, and size formatting.

pub mod config;
pub mod error;
pub mod format;

// Re-export commonly used error types for convenience
pub use error::{DecodeError, OutputError, ParseError, PipelineError, SnapshotError};
