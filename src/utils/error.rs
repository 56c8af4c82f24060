//! Error types for the entire application.
//!
//! We use `thiserror` for library-style errors with custom types,
//! and `anyhow` for application-level error propagation in main.rs and commands.

use thiserror::Error;

/// Errors raised while turning parser callbacks into records
#[derive(Error, Debug)]
pub enum DecodeError {
    /// The encoding tag cannot be costed for this kind. Fatal for the decode.
    #[error("unsupported encoding '{encoding}' for {kind} key '{key}'")]
    UnknownEncoding {
        key: String,
        kind: String,
        encoding: String,
    },

    #[error("'{event}' received with no open record")]
    NoOpenRecord { event: &'static str },

    #[error("record for key '{open_key}' is still open when key '{new_key}' started")]
    RecordAlreadyOpen { open_key: String, new_key: String },

    #[error("'{event}' does not match the open {kind} record for key '{key}'")]
    KindMismatch {
        event: &'static str,
        kind: String,
        key: String,
    },

    #[error("snapshot ended while the record for key '{key}' was still open")]
    UnterminatedRecord { key: String },

    #[error("record stream closed")]
    StreamClosed,
}

/// Errors that can occur while reading a recorded event stream
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid event on line {line}: {source}")]
    InvalidEvent {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("event on line {line} rejected: {source}")]
    Rejected {
        line: usize,
        #[source]
        source: DecodeError,
    },
}

/// Errors that can occur when restoring aggregates from a snapshot
#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("invalid composite key '{0}', expected 'kind|key'")]
    InvalidCompositeKey(String),

    #[error("unknown value kind '{0}'")]
    UnknownKind(String),

    #[error("invalid length bucket '{0}'")]
    InvalidBucket(String),

    #[error("invalid aggregator configuration: {0}")]
    InvalidConfig(String),
}

/// Errors that can occur during file output
#[derive(Error, Debug)]
pub enum OutputError {
    #[error("Failed to write file: {0}")]
    WriteFailed(#[from] std::io::Error),

    #[error("Failed to serialize JSON: {0}")]
    SerializationFailed(#[from] serde_json::Error),

    #[error("Invalid output path: {0}")]
    InvalidPath(String),
}

/// Errors surfaced by the decode/aggregate pipeline
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Config(#[from] SnapshotError),

    #[error("failed to spawn aggregator thread: {0}")]
    Spawn(std::io::Error),

    #[error("aggregator thread panicked")]
    AggregatorPanicked,
}
