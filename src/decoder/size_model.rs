//! Allocator-faithful byte costs for Redis data structures.
//!
//! Every function here is pure: it takes structural parameters and returns
//! the number of bytes the server would have reserved, rounded to jemalloc
//! size classes where the server allocates separately. Layouts follow a
//! 64-bit build (8-byte pointers and longs).

use super::record::Kind;
use serde::{Deserialize, Serialize};
use std::fmt;

const POINTER_SIZE: u64 = 8;
const LONG_SIZE: u64 = 8;

/// Integers in this range share preallocated objects
const SHARED_INTEGERS: i64 = 10_000;

/// Smallest bucket array a hash table allocates
const HASH_TABLE_MIN_BUCKETS: u64 = 4;

/// Internal representation of a value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Encoding {
    /// Any string representation (int, embstr, raw)
    Str,
    HashTable,
    ZipMap,
    ZipList,
    ListPack,
    IntSet,
    SkipList,
    LinkedList,
    QuickList,
    QuickList2,
    Stream,
    /// Streams written by 7.x servers (extra per-group bookkeeping)
    StreamV2,
}

impl Encoding {
    /// Map a parser-reported encoding tag to a supported encoding for `kind`
    ///
    /// **Public** - callers must treat `None` as a fatal structural error
    ///
    /// Strings accept any tag since their cost depends only on the payload.
    pub fn resolve(kind: Kind, tag: &str) -> Option<Self> {
        let encoding = match (kind, tag) {
            (Kind::String, _) => Self::Str,
            (Kind::Hash, "hashtable") => Self::HashTable,
            (Kind::Hash, "zipmap") => Self::ZipMap,
            (Kind::Hash, "ziplist") => Self::ZipList,
            (Kind::Hash, "listpack") => Self::ListPack,
            (Kind::Set, "hashtable") => Self::HashTable,
            (Kind::Set, "intset") => Self::IntSet,
            (Kind::Set, "listpack") => Self::ListPack,
            (Kind::SortedSet, "skiplist") => Self::SkipList,
            (Kind::SortedSet, "ziplist") => Self::ZipList,
            (Kind::SortedSet, "listpack") => Self::ListPack,
            (Kind::List, "quicklist") => Self::QuickList,
            (Kind::List, "quicklist2") => Self::QuickList2,
            (Kind::List, "ziplist") => Self::ZipList,
            (Kind::List, "linkedlist") => Self::LinkedList,
            (Kind::List, "listpack") => Self::ListPack,
            (Kind::Stream, "stream") => Self::Stream,
            (Kind::Stream, "stream_v2" | "stream_v3") => Self::StreamV2,
            _ => return None,
        };
        Some(encoding)
    }

    /// Encodings serialized as one contiguous blob
    pub fn is_packed(&self) -> bool {
        matches!(
            self,
            Self::ZipMap | Self::ZipList | Self::ListPack | Self::IntSet
        )
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Str => "string",
            Self::HashTable => "hashtable",
            Self::ZipMap => "zipmap",
            Self::ZipList => "ziplist",
            Self::ListPack => "listpack",
            Self::IntSet => "intset",
            Self::SkipList => "skiplist",
            Self::LinkedList => "linkedlist",
            Self::QuickList => "quicklist",
            Self::QuickList2 => "quicklist2",
            Self::Stream => "stream",
            Self::StreamV2 => "stream_v2",
        };
        f.pad(name)
    }
}

/// Round a request up to the jemalloc size class that serves it
///
/// Classes: 8, then multiples of 16 up to 128, then four classes per
/// power-of-two doubling (160, 192, 224, 256, 320, ...).
pub fn malloc_size(size: u64) -> u64 {
    match size {
        0 => 0,
        1..=8 => 8,
        9..=128 => round_up(size, 16),
        _ => {
            let lg = 63 - (size - 1).leading_zeros();
            let step = (1u64 << lg) / 4;
            round_up(size, step)
        }
    }
}

fn round_up(size: u64, step: u64) -> u64 {
    size.div_ceil(step).saturating_mul(step)
}

/// Parse a value the way the server decides whether to store it as an integer
///
/// Only canonical decimal forms qualify: no sign prefix other than '-',
/// no leading zeros, no "-0", and the value must fit in an i64.
pub fn parse_integer(bytes: &[u8]) -> Option<i64> {
    if bytes.is_empty() || bytes.len() > 20 {
        return None;
    }
    let digits = bytes.strip_prefix(b"-").unwrap_or(bytes);
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    if digits[0] == b'0' && (digits.len() > 1 || digits.len() != bytes.len()) {
        return None;
    }
    std::str::from_utf8(bytes).ok()?.parse().ok()
}

/// Length used when ranking elements: 8 for integers, byte length otherwise
pub fn element_len(bytes: &[u8]) -> u64 {
    if parse_integer(bytes).is_some() {
        8
    } else {
        bytes.len() as u64
    }
}

/// Header of a redisObject
pub fn robj_overhead() -> u64 {
    POINTER_SIZE + 8
}

/// One dictEntry: key and value pointers plus the next pointer
pub fn dict_entry_overhead() -> u64 {
    2 * POINTER_SIZE + 8
}

/// Extra entry in the expires dictionary, if the key has a TTL
pub fn key_expiry_overhead(expiry: i64) -> u64 {
    if expiry <= 0 {
        0
    } else {
        dict_entry_overhead() + 8
    }
}

/// Cost of a key in the main dictionary, independent of its value
///
/// **Public** - the lower bound of every record's size
pub fn top_level_overhead(key: &[u8], expiry: i64) -> u64 {
    dict_entry_overhead() + string_cost(key) + robj_overhead() + key_expiry_overhead(expiry)
}

/// Allocation for a string payload
///
/// Integer-encodable values live inside the object pointer (or in the
/// shared integer pool); everything else is an sds string whose header
/// width grows with the length.
pub fn string_cost(bytes: &[u8]) -> u64 {
    if let Some(value) = parse_integer(bytes) {
        return if (0..SHARED_INTEGERS).contains(&value) {
            0
        } else {
            8
        };
    }
    let len = bytes.len() as u64;
    malloc_size(len + sds_header_len(len) + 1)
}

fn sds_header_len(len: u64) -> u64 {
    match len {
        l if l < 1 << 5 => 1,
        l if l < 1 << 8 => 3,
        l if l < 1 << 16 => 5,
        l if l < 1 << 32 => 9,
        _ => 17,
    }
}

/// dict struct plus its bucket array
///
/// The array is sized to the next power of two covering the cardinality
/// at the rehash load factor (1.5).
pub fn hash_table_overhead(cardinality: u64) -> u64 {
    let wanted = cardinality
        .saturating_add(cardinality / 2)
        .max(HASH_TABLE_MIN_BUCKETS);
    let buckets = wanted.checked_next_power_of_two().unwrap_or(u64::MAX);
    4 * POINTER_SIZE + 7 * LONG_SIZE + POINTER_SIZE.saturating_mul(buckets)
}

/// Bytes one element occupies inside a ziplist or listpack
pub fn packed_entry_overhead(value: &[u8]) -> u64 {
    let (header, payload) = match parse_integer(value) {
        Some(v) => (1, packed_integer_len(v)),
        None => {
            let len = value.len() as u64;
            let header = match len {
                0..=63 => 1,
                64..=16383 => 2,
                _ => 5,
            };
            (header, len)
        }
    };
    let entry = header + payload;
    let prev_len = if entry < 254 { 1 } else { 5 };
    prev_len + entry
}

fn packed_integer_len(value: i64) -> u64 {
    match value {
        0..=12 => 0,
        v if i8::try_from(v).is_ok() => 1,
        v if i16::try_from(v).is_ok() => 2,
        v if (-(1 << 23)..(1 << 23)).contains(&v) => 3,
        v if i32::try_from(v).is_ok() => 4,
        _ => 8,
    }
}

/// zlbytes + zltail + zllen + end marker
pub fn packed_header_overhead() -> u64 {
    4 + 4 + 2 + 1
}

pub fn linked_list_overhead() -> u64 {
    5 * POINTER_SIZE + 8
}

pub fn linked_list_entry_overhead() -> u64 {
    3 * POINTER_SIZE
}

/// quicklist struct plus one quicklistNode per packed node
pub fn quicklist_overhead(node_count: u64) -> u64 {
    let quicklist = 2 * POINTER_SIZE + LONG_SIZE + 2 * 4;
    let node = 4 * POINTER_SIZE + LONG_SIZE + 2 * 4;
    quicklist + node_count.saturating_mul(node)
}

/// zset struct: dict for member lookup plus the skip list header
pub fn skip_list_overhead(cardinality: u64) -> u64 {
    2 * POINTER_SIZE + hash_table_overhead(cardinality) + (2 * POINTER_SIZE + 16)
}

/// One skip list node plus its dict entry
///
/// Node levels follow a p=1/4 geometric distribution; the mean (4/3
/// levels) stands in for the random draw.
pub fn skip_list_entry_overhead() -> u64 {
    dict_entry_overhead() + 2 * POINTER_SIZE + 8 + (POINTER_SIZE + 8) * 4 / 3
}

/// stream struct and its rax header
pub fn stream_overhead() -> u64 {
    2 * POINTER_SIZE + 8 + 16 + POINTER_SIZE + 8 * 2
}

/// Extra fields carried by v2+ stream headers
pub fn stream_v2_overhead() -> u64 {
    16 * 2 + 8
}

/// Extra per-group fields carried by v2+ streams
pub fn stream_v2_group_overhead() -> u64 {
    8
}

/// Approximate rax size for `elements` keys
pub fn stream_radix_tree(elements: u64) -> u64 {
    let nodes = elements.saturating_mul(5) / 2;
    16u64
        .saturating_mul(elements)
        .saturating_add(nodes.saturating_mul(4))
        .saturating_add(nodes.saturating_mul(30 * LONG_SIZE))
}

pub fn stream_consumer(name: &[u8]) -> u64 {
    2 * POINTER_SIZE + 8 + string_cost(name)
}

pub fn stream_consumer_group() -> u64 {
    2 * POINTER_SIZE + 16
}

/// Pending-entry list nodes for a consumer group
pub fn stream_nack(pending: u64) -> u64 {
    pending.saturating_mul(POINTER_SIZE + 8 + 8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malloc_size_classes() {
        assert_eq!(malloc_size(0), 0);
        assert_eq!(malloc_size(1), 8);
        assert_eq!(malloc_size(9), 16);
        assert_eq!(malloc_size(17), 32);
        assert_eq!(malloc_size(128), 128);
        assert_eq!(malloc_size(129), 160);
        assert_eq!(malloc_size(257), 320);
        assert_eq!(malloc_size(1025), 1280);
        assert_eq!(malloc_size(4097), 5120);
    }

    #[test]
    fn test_malloc_size_monotonic_and_idempotent() {
        let mut previous = 0;
        for size in 0..20_000u64 {
            let class = malloc_size(size);
            assert!(class >= size);
            assert!(class >= previous, "not monotonic at {}", size);
            assert_eq!(malloc_size(class), class, "not idempotent at {}", size);
            previous = class;
        }
    }

    #[test]
    fn test_parse_integer_canonical_only() {
        assert_eq!(parse_integer(b"0"), Some(0));
        assert_eq!(parse_integer(b"-42"), Some(-42));
        assert_eq!(parse_integer(b"9223372036854775807"), Some(i64::MAX));
        assert_eq!(parse_integer(b"007"), None);
        assert_eq!(parse_integer(b"+7"), None);
        assert_eq!(parse_integer(b"-0"), None);
        assert_eq!(parse_integer(b"12a"), None);
        assert_eq!(parse_integer(b""), None);
        assert_eq!(parse_integer(b"99999999999999999999"), None);
    }

    #[test]
    fn test_string_cost() {
        // shared integers are free, other integers live in the pointer slot
        assert_eq!(string_cost(b"42"), 0);
        assert_eq!(string_cost(b"123456"), 8);
        // 5 bytes + sdshdr5 + terminator = 7 -> 8
        assert_eq!(string_cost(b"hello"), 8);
        // 50 bytes + sdshdr8 (3) + terminator = 54 -> 64
        assert_eq!(string_cost(&[b'a'; 50]), 64);
    }

    #[test]
    fn test_top_level_overhead_with_expiry() {
        let without = top_level_overhead(b"key", 0);
        let with = top_level_overhead(b"key", 1_700_000_000_000);
        assert_eq!(with - without, dict_entry_overhead() + 8);
    }

    #[test]
    fn test_hash_table_overhead_grows_by_powers_of_two() {
        assert_eq!(hash_table_overhead(0), 88 + 8 * 4);
        assert_eq!(hash_table_overhead(3), 88 + 8 * 4);
        assert_eq!(hash_table_overhead(6), 88 + 8 * 16);
        assert_eq!(hash_table_overhead(100), 88 + 8 * 256);
    }

    #[test]
    fn test_packed_entry_overhead() {
        // immediate integer: prev + header only
        assert_eq!(packed_entry_overhead(b"7"), 2);
        assert_eq!(packed_entry_overhead(b"1000"), 1 + 1 + 2);
        assert_eq!(packed_entry_overhead(b"abc"), 1 + 1 + 3);
        let long = vec![b'x'; 300];
        assert_eq!(packed_entry_overhead(&long), 5 + 2 + 300);
    }

    #[test]
    fn test_resolve_encoding() {
        assert_eq!(Encoding::resolve(Kind::Hash, "hashtable"), Some(Encoding::HashTable));
        assert_eq!(Encoding::resolve(Kind::String, "whatever"), Some(Encoding::Str));
        assert_eq!(Encoding::resolve(Kind::Set, "skiplist"), None);
        assert_eq!(Encoding::resolve(Kind::List, "quicklist3"), None);
        assert!(Encoding::resolve(Kind::Set, "intset").unwrap().is_packed());
    }

    #[test]
    fn test_stream_radix_tree() {
        assert_eq!(stream_radix_tree(0), 0);
        assert_eq!(stream_radix_tree(2), 32 + 5 * 4 + 5 * 240);
    }
}
