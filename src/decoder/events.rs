//! Structural callbacks delivered by an RDB parser.
//!
//! A parser walks the snapshot file and reports every key through
//! `SnapshotHandler`. Containers arrive as a start call, one call per
//! element, and a matching end call; strings arrive as a single `set`.

use crate::utils::error::DecodeError;
use serde::{Deserialize, Serialize};

/// Per-key metadata reported alongside every start call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeInfo {
    /// Encoding tag ("hashtable", "listpack", "quicklist2", ...)
    #[serde(default)]
    pub encoding: String,

    /// LRU idle time in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idle: Option<u64>,

    /// LFU access frequency
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_frequency: Option<u32>,

    /// Serialized size of a packed encoding, when the parser knows it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub whole_structure_size: Option<u64>,

    /// Number of packed nodes backing a quicklist
    #[serde(default)]
    pub node_count: u64,
}

impl TypeInfo {
    pub fn new(encoding: impl Into<String>) -> Self {
        Self {
            encoding: encoding.into(),
            ..Self::default()
        }
    }

    pub fn with_whole_structure_size(mut self, size: u64) -> Self {
        self.whole_structure_size = Some(size);
        self
    }

    pub fn with_node_count(mut self, node_count: u64) -> Self {
        self.node_count = node_count;
        self
    }
}

/// Container of the quicklist node an element was read from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeContainer {
    /// Large element stored on its own, outside any listpack
    Plain,
    /// Element stored inside a listpack node
    #[default]
    Packed,
}

/// A stream consumer and the number of entries it has pending
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Consumer {
    pub name: String,
    #[serde(default)]
    pub pending: u64,
}

/// A stream consumer group as reported at the end of a stream
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumerGroup {
    pub name: String,
    #[serde(default)]
    pub pending: u64,
    #[serde(default)]
    pub consumers: Vec<Consumer>,
}

/// Receiver of parser callbacks
///
/// Element calls always refer to the most recently started container.
/// Lengths are signed because parsers report -1 for lists of unknown length.
pub trait SnapshotHandler {
    fn start_format(&mut self, version: u32) -> Result<(), DecodeError>;
    fn start_database(&mut self, index: u32) -> Result<(), DecodeError>;
    fn aux(&mut self, key: &[u8], value: &[u8]) -> Result<(), DecodeError>;

    fn set(&mut self, key: &[u8], value: &[u8], expiry: i64, info: &TypeInfo)
        -> Result<(), DecodeError>;

    fn start_hash(&mut self, key: &[u8], length: i64, expiry: i64, info: &TypeInfo)
        -> Result<(), DecodeError>;
    fn hset(&mut self, key: &[u8], field: &[u8], value: &[u8]) -> Result<(), DecodeError>;
    fn end_hash(&mut self, key: &[u8]) -> Result<(), DecodeError>;

    fn start_set(&mut self, key: &[u8], cardinality: i64, expiry: i64, info: &TypeInfo)
        -> Result<(), DecodeError>;
    fn sadd(&mut self, key: &[u8], member: &[u8]) -> Result<(), DecodeError>;
    fn end_set(&mut self, key: &[u8]) -> Result<(), DecodeError>;

    fn start_zset(&mut self, key: &[u8], cardinality: i64, expiry: i64, info: &TypeInfo)
        -> Result<(), DecodeError>;
    fn zadd(&mut self, key: &[u8], score: f64, member: &[u8]) -> Result<(), DecodeError>;
    fn end_zset(&mut self, key: &[u8]) -> Result<(), DecodeError>;

    fn start_list(&mut self, key: &[u8], length: i64, expiry: i64, info: &TypeInfo)
        -> Result<(), DecodeError>;
    fn rpush(&mut self, key: &[u8], value: &[u8], container: NodeContainer)
        -> Result<(), DecodeError>;
    fn end_list(&mut self, key: &[u8]) -> Result<(), DecodeError>;

    fn start_stream(&mut self, key: &[u8], cardinality: i64, expiry: i64, info: &TypeInfo)
        -> Result<(), DecodeError>;
    fn xadd(&mut self, key: &[u8], id: &[u8], payload: &[u8]) -> Result<(), DecodeError>;
    fn end_stream(
        &mut self,
        key: &[u8],
        items: u64,
        last_entry_id: &str,
        groups: &[ConsumerGroup],
    ) -> Result<(), DecodeError>;

    /// No more keys follow
    fn end_format(&mut self) -> Result<(), DecodeError>;
}
