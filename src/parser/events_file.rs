//! JSON-lines replay of parser callbacks.
//!
//! Each line is one `SnapshotHandler` call, tagged by its `event` field:
//!
//! ```text
//! {"event":"start_format","version":11}
//! {"event":"start_hash","key":"user:1","length":1,"info":{"encoding":"hashtable"}}
//! {"event":"hset","key":"user:1","field":"name","value":"alice"}
//! {"event":"end_hash","key":"user:1"}
//! {"event":"end_format"}
//! ```
//!
//! Keys and payloads are JSON strings, so only UTF-8 data can be replayed.
//! Blank lines are skipped.

use crate::decoder::events::{ConsumerGroup, NodeContainer, SnapshotHandler, TypeInfo};
use crate::utils::error::{DecodeError, ParseError};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// One recorded parser callback
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SnapshotEvent {
    StartFormat {
        version: u32,
    },
    StartDatabase {
        index: u32,
    },
    Aux {
        key: String,
        value: String,
    },
    Set {
        key: String,
        value: String,
        #[serde(default)]
        expiry: i64,
        #[serde(default)]
        info: TypeInfo,
    },
    StartHash {
        key: String,
        length: i64,
        #[serde(default)]
        expiry: i64,
        #[serde(default)]
        info: TypeInfo,
    },
    Hset {
        key: String,
        field: String,
        value: String,
    },
    EndHash {
        key: String,
    },
    StartSet {
        key: String,
        cardinality: i64,
        #[serde(default)]
        expiry: i64,
        #[serde(default)]
        info: TypeInfo,
    },
    Sadd {
        key: String,
        member: String,
    },
    EndSet {
        key: String,
    },
    StartZset {
        key: String,
        cardinality: i64,
        #[serde(default)]
        expiry: i64,
        #[serde(default)]
        info: TypeInfo,
    },
    Zadd {
        key: String,
        score: f64,
        member: String,
    },
    EndZset {
        key: String,
    },
    StartList {
        key: String,
        #[serde(default = "unknown_length")]
        length: i64,
        #[serde(default)]
        expiry: i64,
        #[serde(default)]
        info: TypeInfo,
    },
    Rpush {
        key: String,
        value: String,
        #[serde(default)]
        container: NodeContainer,
    },
    EndList {
        key: String,
    },
    StartStream {
        key: String,
        cardinality: i64,
        #[serde(default)]
        expiry: i64,
        #[serde(default)]
        info: TypeInfo,
    },
    Xadd {
        key: String,
        id: String,
        payload: String,
    },
    EndStream {
        key: String,
        #[serde(default)]
        items: u64,
        #[serde(default)]
        last_entry_id: String,
        #[serde(default)]
        groups: Vec<ConsumerGroup>,
    },
    EndFormat,
}

fn unknown_length() -> i64 {
    -1
}

impl SnapshotEvent {
    /// Deliver this event to a handler
    pub fn dispatch<H: SnapshotHandler + ?Sized>(&self, handler: &mut H) -> Result<(), DecodeError> {
        match self {
            Self::StartFormat { version } => handler.start_format(*version),
            Self::StartDatabase { index } => handler.start_database(*index),
            Self::Aux { key, value } => handler.aux(key.as_bytes(), value.as_bytes()),
            Self::Set {
                key,
                value,
                expiry,
                info,
            } => handler.set(key.as_bytes(), value.as_bytes(), *expiry, info),
            Self::StartHash {
                key,
                length,
                expiry,
                info,
            } => handler.start_hash(key.as_bytes(), *length, *expiry, info),
            Self::Hset { key, field, value } => {
                handler.hset(key.as_bytes(), field.as_bytes(), value.as_bytes())
            }
            Self::EndHash { key } => handler.end_hash(key.as_bytes()),
            Self::StartSet {
                key,
                cardinality,
                expiry,
                info,
            } => handler.start_set(key.as_bytes(), *cardinality, *expiry, info),
            Self::Sadd { key, member } => handler.sadd(key.as_bytes(), member.as_bytes()),
            Self::EndSet { key } => handler.end_set(key.as_bytes()),
            Self::StartZset {
                key,
                cardinality,
                expiry,
                info,
            } => handler.start_zset(key.as_bytes(), *cardinality, *expiry, info),
            Self::Zadd { key, score, member } => {
                handler.zadd(key.as_bytes(), *score, member.as_bytes())
            }
            Self::EndZset { key } => handler.end_zset(key.as_bytes()),
            Self::StartList {
                key,
                length,
                expiry,
                info,
            } => handler.start_list(key.as_bytes(), *length, *expiry, info),
            Self::Rpush {
                key,
                value,
                container,
            } => handler.rpush(key.as_bytes(), value.as_bytes(), *container),
            Self::EndList { key } => handler.end_list(key.as_bytes()),
            Self::StartStream {
                key,
                cardinality,
                expiry,
                info,
            } => handler.start_stream(key.as_bytes(), *cardinality, *expiry, info),
            Self::Xadd { key, id, payload } => {
                handler.xadd(key.as_bytes(), id.as_bytes(), payload.as_bytes())
            }
            Self::EndStream {
                key,
                items,
                last_entry_id,
                groups,
            } => handler.end_stream(key.as_bytes(), *items, last_entry_id, groups),
            Self::EndFormat => handler.end_format(),
        }
    }
}

/// Replay a JSON-lines event stream into a handler
///
/// **Public** - front-end used by the analyze command
///
/// # Arguments
/// * `reader` - Source of newline-delimited events
/// * `handler` - Receiver of the decoded callbacks
///
/// # Returns
/// Number of events delivered
///
/// # Errors
/// * `ParseError::Io` - the reader failed
/// * `ParseError::InvalidEvent` - a line is not a valid event (1-based line number)
/// * `ParseError::Rejected` - the handler refused an event
pub fn replay<R, H>(reader: R, handler: &mut H) -> Result<u64, ParseError>
where
    R: BufRead,
    H: SnapshotHandler + ?Sized,
{
    let mut delivered = 0u64;

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let event: SnapshotEvent = serde_json::from_str(trimmed)
            .map_err(|source| ParseError::InvalidEvent { line: idx + 1, source })?;

        event
            .dispatch(handler)
            .map_err(|source| ParseError::Rejected { line: idx + 1, source })?;
        delivered += 1;
    }

    debug!("Replayed {} events", delivered);
    Ok(delivered)
}

/// Replay the events stored in a file
pub fn replay_file<H>(path: impl AsRef<Path>, handler: &mut H) -> Result<u64, ParseError>
where
    H: SnapshotHandler + ?Sized,
{
    let path = path.as_ref();
    info!("Replaying snapshot events from: {}", path.display());
    let file = File::open(path)?;
    replay(BufReader::new(file), handler)
}
