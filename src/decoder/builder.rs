//! Per-key state machine turning parser callbacks into records.
//!
//! A start call opens a record and charges everything known up front
//! (key overhead, bucket arrays, packed blob sizes). Element calls charge
//! per-element costs for pointer-based encodings only, since packed
//! encodings were already sized as one blob. End calls add overheads that
//! depend on the final element count, then close and emit the record.

use super::events::{ConsumerGroup, NodeContainer, SnapshotHandler, TypeInfo};
use super::record::{Kind, Record};
use super::size_model::{self as size, Encoding};
use super::stream::RecordSink;
use crate::utils::config::{AUX_CREATED_AT, AUX_USED_MEMORY, WRAPPER_OBJECT_VERSION};
use crate::utils::error::DecodeError;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

/// Snapshot-level metadata captured from lifecycle callbacks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotMeta {
    /// RDB format version from the file header
    pub format_version: u32,

    /// Creation time (`ctime` aux field), seconds since epoch
    pub created_at: i64,

    /// Memory in use when the snapshot was taken (`used-mem` aux field)
    pub used_memory: i64,
}

/// How element calls contribute to an open record's size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Costing {
    /// The whole structure was sized when the record opened
    Blob,
    /// Packed encoding whose size the parser did not report
    PackedEstimate,
    /// Pointer-based encoding, costed element by element
    PerElement,
}

#[derive(Debug)]
struct OpenRecord {
    record: Record,
    encoding: Encoding,
    costing: Costing,
    node_count: u64,
}

impl OpenRecord {
    /// Charge a packed encoding, falling back to an element-wise estimate
    /// so a missing blob size never under-reports
    fn size_packed(&mut self, info: &TypeInfo) {
        match info.whole_structure_size {
            Some(blob) if blob > 0 => {
                self.record.bytes += blob;
                self.costing = Costing::Blob;
            }
            _ => {
                self.record.bytes += packed_header_estimate(self.encoding);
                self.costing = Costing::PackedEstimate;
            }
        }
    }
}

#[derive(Debug)]
enum State {
    Idle,
    Open(OpenRecord),
}

/// Builds one `Record` per top-level key and hands it to a sink
///
/// **Public** - drive it through the `SnapshotHandler` trait
pub struct RecordBuilder<S: RecordSink> {
    sink: S,
    closed: bool,
    state: State,
    meta: SnapshotMeta,
    database: u32,
    emitted: u64,
}

impl<S: RecordSink> RecordBuilder<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            closed: false,
            state: State::Idle,
            meta: SnapshotMeta::default(),
            database: 0,
            emitted: 0,
        }
    }

    pub fn meta(&self) -> SnapshotMeta {
        self.meta
    }

    /// Number of records emitted so far
    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Robj wrappers charged per element (legacy formats only)
    fn wrapper_units(&self) -> u64 {
        if self.meta.format_version < WRAPPER_OBJECT_VERSION {
            1
        } else {
            0
        }
    }

    /// Open a record with its top-level overhead
    fn begin(
        &self,
        kind: Kind,
        key: &[u8],
        expiry: i64,
        info: &TypeInfo,
    ) -> Result<OpenRecord, DecodeError> {
        if let State::Open(open) = &self.state {
            return Err(DecodeError::RecordAlreadyOpen {
                open_key: open.record.key_text().into_owned(),
                new_key: String::from_utf8_lossy(key).into_owned(),
            });
        }

        let encoding = Encoding::resolve(kind, &info.encoding).ok_or_else(|| {
            DecodeError::UnknownEncoding {
                key: String::from_utf8_lossy(key).into_owned(),
                kind: kind.to_string(),
                encoding: info.encoding.clone(),
            }
        })?;

        let mut record = Record::new(key, kind, size::top_level_overhead(key, expiry));
        record.encoding = info.encoding.clone();
        record.database = self.database;
        record.expire_at_millis = expiry.max(0);
        record.idle_seconds = info.idle;
        record.access_frequency = info.access_frequency;

        Ok(OpenRecord {
            record,
            encoding,
            costing: Costing::PerElement,
            node_count: info.node_count,
        })
    }

    fn current(&mut self, event: &'static str, kind: Kind) -> Result<&mut OpenRecord, DecodeError> {
        let State::Open(open) = &mut self.state else {
            return Err(DecodeError::NoOpenRecord { event });
        };
        if open.record.kind != kind {
            return Err(DecodeError::KindMismatch {
                event,
                kind: open.record.kind.to_string(),
                key: open.record.key_text().into_owned(),
            });
        }
        Ok(open)
    }

    /// Close the open record, leaving the builder idle
    fn finish(&mut self, event: &'static str, kind: Kind) -> Result<OpenRecord, DecodeError> {
        match std::mem::replace(&mut self.state, State::Idle) {
            State::Open(open) if open.record.kind == kind => Ok(open),
            State::Open(open) => {
                let err = DecodeError::KindMismatch {
                    event,
                    kind: open.record.kind.to_string(),
                    key: open.record.key_text().into_owned(),
                };
                self.state = State::Open(open);
                Err(err)
            }
            State::Idle => Err(DecodeError::NoOpenRecord { event }),
        }
    }

    fn emit(&mut self, record: Record) -> Result<(), DecodeError> {
        if self.closed {
            return Err(DecodeError::StreamClosed);
        }
        self.sink.emit(record)?;
        self.emitted += 1;
        Ok(())
    }
}

impl<S: RecordSink> SnapshotHandler for RecordBuilder<S> {
    fn start_format(&mut self, version: u32) -> Result<(), DecodeError> {
        debug!("Snapshot format version {}", version);
        self.meta.format_version = version;
        Ok(())
    }

    fn start_database(&mut self, index: u32) -> Result<(), DecodeError> {
        debug!("Entering database {}", index);
        self.database = index;
        Ok(())
    }

    fn aux(&mut self, key: &[u8], value: &[u8]) -> Result<(), DecodeError> {
        match key {
            k if k == AUX_CREATED_AT.as_bytes() => {
                self.meta.created_at = parse_aux_integer(AUX_CREATED_AT, value);
            }
            k if k == AUX_USED_MEMORY.as_bytes() => {
                self.meta.used_memory = parse_aux_integer(AUX_USED_MEMORY, value);
            }
            _ => {}
        }
        Ok(())
    }

    fn set(&mut self, key: &[u8], value: &[u8], expiry: i64, info: &TypeInfo) -> Result<(), DecodeError> {
        let mut open = self.begin(Kind::String, key, expiry, info)?;
        open.record.bytes += size::string_cost(value);
        open.record.element_count = size::element_len(value);
        self.emit(open.record)
    }

    fn start_hash(&mut self, key: &[u8], length: i64, expiry: i64, info: &TypeInfo) -> Result<(), DecodeError> {
        let mut open = self.begin(Kind::Hash, key, expiry, info)?;
        if open.encoding == Encoding::HashTable {
            open.record.bytes += size::hash_table_overhead(clamp_len(length));
        } else {
            open.size_packed(info);
        }
        self.state = State::Open(open);
        Ok(())
    }

    fn hset(&mut self, _key: &[u8], field: &[u8], value: &[u8]) -> Result<(), DecodeError> {
        let wrappers = self.wrapper_units();
        let open = self.current("hset", Kind::Hash)?;
        open.record.element_count += 1;
        open.record
            .observe_element(size::element_len(field) + size::element_len(value), field);

        match open.costing {
            Costing::PerElement => {
                open.record.bytes += size::string_cost(field)
                    + size::string_cost(value)
                    + size::dict_entry_overhead()
                    + 2 * wrappers * size::robj_overhead();
            }
            Costing::PackedEstimate => {
                open.record.bytes +=
                    size::packed_entry_overhead(field) + size::packed_entry_overhead(value);
            }
            Costing::Blob => {}
        }
        Ok(())
    }

    fn end_hash(&mut self, _key: &[u8]) -> Result<(), DecodeError> {
        let open = self.finish("end_hash", Kind::Hash)?;
        self.emit(open.record)
    }

    fn start_set(&mut self, key: &[u8], cardinality: i64, expiry: i64, info: &TypeInfo) -> Result<(), DecodeError> {
        let mut open = self.begin(Kind::Set, key, expiry, info)?;
        if open.encoding == Encoding::HashTable {
            open.record.bytes += size::hash_table_overhead(clamp_len(cardinality));
        } else {
            open.size_packed(info);
        }
        self.state = State::Open(open);
        Ok(())
    }

    fn sadd(&mut self, _key: &[u8], member: &[u8]) -> Result<(), DecodeError> {
        let wrappers = self.wrapper_units();
        let open = self.current("sadd", Kind::Set)?;
        open.record.element_count += 1;
        open.record.observe_element(size::element_len(member), member);

        match open.costing {
            Costing::PerElement => {
                open.record.bytes += size::string_cost(member)
                    + size::dict_entry_overhead()
                    + wrappers * size::robj_overhead();
            }
            Costing::PackedEstimate => {
                open.record.bytes += packed_element_estimate(open.encoding, member);
            }
            Costing::Blob => {}
        }
        Ok(())
    }

    fn end_set(&mut self, _key: &[u8]) -> Result<(), DecodeError> {
        let open = self.finish("end_set", Kind::Set)?;
        self.emit(open.record)
    }

    fn start_zset(&mut self, key: &[u8], cardinality: i64, expiry: i64, info: &TypeInfo) -> Result<(), DecodeError> {
        let mut open = self.begin(Kind::SortedSet, key, expiry, info)?;
        if open.encoding == Encoding::SkipList {
            open.record.bytes += size::skip_list_overhead(clamp_len(cardinality));
        } else {
            open.size_packed(info);
        }
        self.state = State::Open(open);
        Ok(())
    }

    fn zadd(&mut self, _key: &[u8], score: f64, member: &[u8]) -> Result<(), DecodeError> {
        let wrappers = self.wrapper_units();
        let open = self.current("zadd", Kind::SortedSet)?;
        open.record.element_count += 1;
        open.record.observe_element(size::element_len(member), member);

        match open.costing {
            Costing::PerElement => {
                // the score is a double stored in the node
                open.record.bytes += 8
                    + size::string_cost(member)
                    + size::skip_list_entry_overhead()
                    + wrappers * size::robj_overhead();
            }
            Costing::PackedEstimate => {
                let score_repr = score.to_string();
                open.record.bytes += size::packed_entry_overhead(member)
                    + size::packed_entry_overhead(score_repr.as_bytes());
            }
            Costing::Blob => {}
        }
        Ok(())
    }

    fn end_zset(&mut self, _key: &[u8]) -> Result<(), DecodeError> {
        let open = self.finish("end_zset", Kind::SortedSet)?;
        self.emit(open.record)
    }

    fn start_list(&mut self, key: &[u8], _length: i64, expiry: i64, info: &TypeInfo) -> Result<(), DecodeError> {
        // the declared length is unreliable for quicklists (-1 or a node count),
        // so elements are counted as they arrive
        let mut open = self.begin(Kind::List, key, expiry, info)?;
        match open.encoding {
            Encoding::QuickList2 => match info.whole_structure_size {
                Some(blob) if blob > 0 => {
                    open.record.bytes += blob;
                    open.costing = Costing::Blob;
                }
                _ => open.costing = Costing::PackedEstimate,
            },
            Encoding::ListPack => open.size_packed(info),
            _ => open.costing = Costing::PerElement,
        }
        self.state = State::Open(open);
        Ok(())
    }

    fn rpush(&mut self, _key: &[u8], value: &[u8], container: NodeContainer) -> Result<(), DecodeError> {
        let wrappers = self.wrapper_units();
        let open = self.current("rpush", Kind::List)?;
        open.record.element_count += 1;
        open.record.observe_element(size::element_len(value), value);

        let cost = match (open.encoding, open.costing) {
            (Encoding::QuickList | Encoding::ZipList, _) => size::packed_entry_overhead(value),
            (Encoding::LinkedList, _) => {
                size::linked_list_entry_overhead()
                    + size::string_cost(value)
                    + wrappers * size::robj_overhead()
            }
            (Encoding::QuickList2, _) if container == NodeContainer::Plain => size::string_cost(value),
            (_, Costing::PackedEstimate) => packed_element_estimate(open.encoding, value),
            _ => 0,
        };
        open.record.bytes += cost;
        Ok(())
    }

    fn end_list(&mut self, _key: &[u8]) -> Result<(), DecodeError> {
        let mut open = self.finish("end_list", Kind::List)?;
        // a non-empty quicklist has at least one node even if the parser did not say
        let nodes = open.node_count.max(u64::from(open.record.element_count > 0));

        open.record.bytes += match open.encoding {
            Encoding::QuickList => {
                size::quicklist_overhead(nodes) + size::packed_header_overhead() * nodes
            }
            Encoding::ZipList => size::packed_header_overhead(),
            Encoding::LinkedList => size::linked_list_overhead(),
            Encoding::QuickList2 if open.costing == Costing::PackedEstimate => {
                size::quicklist_overhead(nodes) + size::packed_header_overhead() * nodes
            }
            Encoding::QuickList2 => size::quicklist_overhead(nodes),
            _ => 0,
        };
        self.emit(open.record)
    }

    fn start_stream(&mut self, key: &[u8], cardinality: i64, expiry: i64, info: &TypeInfo) -> Result<(), DecodeError> {
        let mut open = self.begin(Kind::Stream, key, expiry, info)?;
        open.record.bytes += size::stream_overhead() + size::stream_radix_tree(clamp_len(cardinality));
        if open.encoding == Encoding::StreamV2 {
            open.record.bytes += size::stream_v2_overhead();
        }
        if let Some(blob) = info.whole_structure_size {
            open.record.bytes += blob;
        }
        self.state = State::Open(open);
        Ok(())
    }

    fn xadd(&mut self, _key: &[u8], id: &[u8], payload: &[u8]) -> Result<(), DecodeError> {
        let open = self.current("xadd", Kind::Stream)?;
        open.record.element_count += 1;
        open.record
            .observe_element(id.len() as u64 + payload.len() as u64, id);
        open.record.bytes += size::malloc_size(payload.len() as u64);
        Ok(())
    }

    fn end_stream(
        &mut self,
        _key: &[u8],
        items: u64,
        last_entry_id: &str,
        groups: &[ConsumerGroup],
    ) -> Result<(), DecodeError> {
        let mut open = self.finish("end_stream", Kind::Stream)?;
        debug!(
            "Stream '{}': {} items, last id {}, {} groups",
            open.record.key_text(),
            items,
            last_entry_id,
            groups.len()
        );

        for group in groups {
            open.record.bytes += size::stream_consumer_group()
                + size::stream_radix_tree(group.pending)
                + size::stream_nack(group.pending);
            if open.encoding == Encoding::StreamV2 {
                open.record.bytes += size::stream_v2_group_overhead();
            }
            for consumer in &group.consumers {
                open.record.bytes += size::stream_consumer(consumer.name.as_bytes())
                    + size::stream_radix_tree(consumer.pending);
            }
        }
        self.emit(open.record)
    }

    fn end_format(&mut self) -> Result<(), DecodeError> {
        if let State::Open(open) = &self.state {
            return Err(DecodeError::UnterminatedRecord {
                key: open.record.key_text().into_owned(),
            });
        }
        if !self.closed {
            self.sink.close();
            self.closed = true;
            info!("Snapshot decoded: {} records emitted", self.emitted);
        }
        Ok(())
    }
}

fn clamp_len(length: i64) -> u64 {
    length.max(0) as u64
}

fn packed_header_estimate(encoding: Encoding) -> u64 {
    match encoding {
        // encoding width + length
        Encoding::IntSet => 8,
        _ => size::packed_header_overhead(),
    }
}

fn packed_element_estimate(encoding: Encoding, value: &[u8]) -> u64 {
    match encoding {
        Encoding::IntSet => 8,
        _ => size::packed_entry_overhead(value),
    }
}

/// Parse an integer aux field; malformed values are reported and read as 0
fn parse_aux_integer(field: &str, value: &[u8]) -> i64 {
    match std::str::from_utf8(value).ok().and_then(|s| s.trim().parse().ok()) {
        Some(n) => n,
        None => {
            warn!(
                "Ignoring malformed aux field '{}': {:?}",
                field,
                String::from_utf8_lossy(value)
            );
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder(version: u32) -> RecordBuilder<Vec<Record>> {
        let mut b = RecordBuilder::new(Vec::new());
        b.start_format(version).unwrap();
        b
    }

    #[test]
    fn test_string_record() {
        let mut b = builder(11);
        let value = vec![b'v'; 50];
        b.set(b"k1", &value, 0, &TypeInfo::new("raw")).unwrap();
        b.end_format().unwrap();

        let records = b.into_sink();
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.kind, Kind::String);
        assert_eq!(r.element_count, 50);
        assert_eq!(r.bytes, size::top_level_overhead(b"k1", 0) + size::string_cost(&value));
        assert!(r.bytes >= 50 + size::top_level_overhead(b"k1", 0));
    }

    #[test]
    fn test_aux_fields() {
        let mut b = builder(9);
        b.aux(b"ctime", b"1700000000").unwrap();
        b.aux(b"used-mem", b"not-a-number").unwrap();
        b.aux(b"redis-ver", b"7.2.0").unwrap();
        let meta = b.meta();
        assert_eq!(meta.format_version, 9);
        assert_eq!(meta.created_at, 1_700_000_000);
        assert_eq!(meta.used_memory, 0);
    }

    #[test]
    fn test_database_and_expiry_are_recorded() {
        let mut b = builder(11);
        b.start_database(3).unwrap();
        let info = TypeInfo {
            encoding: "embstr".to_string(),
            idle: Some(12),
            access_frequency: Some(5),
            ..TypeInfo::default()
        };
        b.set(b"session", b"abc", 1_800_000_000_000, &info).unwrap();
        let r = &b.sink()[0];
        assert_eq!(r.database, 3);
        assert_eq!(r.expire_at_millis, 1_800_000_000_000);
        assert_eq!(r.idle_seconds, Some(12));
        assert_eq!(r.access_frequency, Some(5));
    }

    #[test]
    fn test_packed_hash_uses_blob_size_only() {
        let mut b = builder(11);
        let info = TypeInfo::new("listpack").with_whole_structure_size(120);
        b.start_hash(b"h", 2, 0, &info).unwrap();
        b.hset(b"h", b"name", b"alice").unwrap();
        b.hset(b"h", b"city", b"paris").unwrap();
        b.end_hash(b"h").unwrap();

        let r = &b.sink()[0];
        assert_eq!(r.bytes, size::top_level_overhead(b"h", 0) + 120);
        assert_eq!(r.element_count, 2);
        assert_eq!(r.largest_element_len, 9);
        assert_eq!(r.largest_element_sample.as_ref().unwrap().text, "name");
    }

    #[test]
    fn test_packed_hash_without_blob_size_is_estimated() {
        let mut b = builder(11);
        b.start_hash(b"h", 1, 0, &TypeInfo::new("ziplist")).unwrap();
        b.hset(b"h", b"f", b"v").unwrap();
        b.end_hash(b"h").unwrap();

        let expected = size::top_level_overhead(b"h", 0)
            + size::packed_header_overhead()
            + size::packed_entry_overhead(b"f")
            + size::packed_entry_overhead(b"v");
        assert_eq!(b.sink()[0].bytes, expected);
    }

    #[test]
    fn test_unknown_encoding_is_fatal_and_named() {
        let mut b = builder(11);
        let err = b
            .start_set(b"members", 3, 0, &TypeInfo::new("skiplist"))
            .unwrap_err();
        match err {
            DecodeError::UnknownEncoding { key, kind, encoding } => {
                assert_eq!(key, "members");
                assert_eq!(kind, "set");
                assert_eq!(encoding, "skiplist");
            }
            other => panic!("unexpected error: {}", other),
        }
        assert!(b.sink().is_empty());
    }

    #[test]
    fn test_protocol_violations() {
        let mut b = builder(11);
        assert!(matches!(
            b.sadd(b"s", b"m"),
            Err(DecodeError::NoOpenRecord { event: "sadd" })
        ));

        b.start_set(b"s", 1, 0, &TypeInfo::new("hashtable")).unwrap();
        assert!(matches!(
            b.start_hash(b"h", 1, 0, &TypeInfo::new("hashtable")),
            Err(DecodeError::RecordAlreadyOpen { .. })
        ));
        assert!(matches!(
            b.hset(b"s", b"f", b"v"),
            Err(DecodeError::KindMismatch { .. })
        ));
        assert!(matches!(
            b.end_format(),
            Err(DecodeError::UnterminatedRecord { .. })
        ));

        // the open set survives the rejected calls
        b.sadd(b"s", b"m").unwrap();
        b.end_set(b"s").unwrap();
        b.end_format().unwrap();
        assert_eq!(b.emitted(), 1);
    }

    #[test]
    fn test_linked_list_costs_every_node() {
        let mut b = builder(11);
        b.start_list(b"l", 2, 0, &TypeInfo::new("linkedlist")).unwrap();
        b.rpush(b"l", b"first", NodeContainer::Packed).unwrap();
        b.rpush(b"l", b"12", NodeContainer::Packed).unwrap();
        b.end_list(b"l").unwrap();

        let expected = size::top_level_overhead(b"l", 0)
            + 2 * size::linked_list_entry_overhead()
            + size::string_cost(b"first")
            + size::string_cost(b"12")
            + size::linked_list_overhead();
        let r = &b.sink()[0];
        assert_eq!(r.bytes, expected);
        assert_eq!(r.element_count, 2);
    }

    #[test]
    fn test_quicklist2_charges_plain_nodes_and_blob() {
        let mut b = builder(11);
        let info = TypeInfo::new("quicklist2")
            .with_whole_structure_size(64)
            .with_node_count(2);
        let big = vec![b'z'; 500];
        b.start_list(b"q", -1, 0, &info).unwrap();
        b.rpush(b"q", b"small", NodeContainer::Packed).unwrap();
        b.rpush(b"q", &big, NodeContainer::Plain).unwrap();
        b.end_list(b"q").unwrap();

        let expected = size::top_level_overhead(b"q", 0)
            + 64
            + size::string_cost(&big)
            + size::quicklist_overhead(2);
        let r = &b.sink()[0];
        assert_eq!(r.bytes, expected);
        assert_eq!(r.largest_element_len, 500);
        assert!(r.largest_element_sample.as_ref().unwrap().truncated);
    }

    #[test]
    fn test_stream_groups_and_consumers() {
        let mut b = builder(11);
        b.start_stream(b"events", 2, 0, &TypeInfo::new("stream_v2")).unwrap();
        b.xadd(b"events", b"1-0", &[0u8; 40]).unwrap();
        b.xadd(b"events", b"2-0", &[0u8; 10]).unwrap();
        let groups = vec![ConsumerGroup {
            name: "workers".to_string(),
            pending: 3,
            consumers: vec![crate::decoder::events::Consumer {
                name: "w1".to_string(),
                pending: 3,
            }],
        }];
        b.end_stream(b"events", 2, "2-0", &groups).unwrap();

        let expected = size::top_level_overhead(b"events", 0)
            + size::stream_overhead()
            + size::stream_radix_tree(2)
            + size::stream_v2_overhead()
            + size::malloc_size(40)
            + size::malloc_size(10)
            + size::stream_consumer_group()
            + size::stream_radix_tree(3)
            + size::stream_nack(3)
            + size::stream_v2_group_overhead()
            + size::stream_consumer(b"w1")
            + size::stream_radix_tree(3);
        let r = &b.sink()[0];
        assert_eq!(r.bytes, expected);
        assert_eq!(r.element_count, 2);
        assert_eq!(r.largest_element_len, 43);
    }
}
