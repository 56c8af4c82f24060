//! Streaming aggregation of records under a fixed memory ceiling.
//!
//! Every record updates five structures: the largest-key top-K, the prefix
//! tallies, the element-count buckets, the per-kind totals and the per-slot
//! totals. Only the prefix map grows with the input (one entry per distinct
//! normalized prefix); `finish` reduces it to its own top-K.

use super::prefix::{key_prefixes, normalize_key};
use super::slot::key_slot;
use super::top_k::BoundedTopK;
use crate::decoder::record::{Kind, Record};
use crate::utils::config::{
    DEFAULT_LENGTH_LADDER, DEFAULT_SEPARATORS, DEFAULT_TOP_ENTRIES, DEFAULT_TOP_PREFIXES,
    DIGIT_PLACEHOLDER, PROGRESS_INTERVAL,
};
use crate::utils::error::SnapshotError;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

/// Tunables of one aggregation run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatorConfig {
    /// Largest keys retained
    pub top_entries: usize,

    /// Largest prefixes retained after `finish`
    pub top_prefixes: usize,

    /// Element-count bucket boundaries, strictly ascending
    pub length_ladder: Vec<u64>,

    /// Characters splitting key names into segments
    pub separators: String,

    /// Replacement for digit runs in key names
    pub placeholder: char,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            top_entries: DEFAULT_TOP_ENTRIES,
            top_prefixes: DEFAULT_TOP_PREFIXES,
            length_ladder: DEFAULT_LENGTH_LADDER.to_vec(),
            separators: DEFAULT_SEPARATORS.to_string(),
            placeholder: DIGIT_PLACEHOLDER,
        }
    }
}

impl AggregatorConfig {
    /// Check the configuration before any record is counted
    ///
    /// # Errors
    /// * `SnapshotError::InvalidConfig` - zero capacity, empty separator set,
    ///   or a ladder that is empty or not strictly ascending
    pub fn validate(&self) -> Result<(), SnapshotError> {
        if self.top_entries == 0 || self.top_prefixes == 0 {
            return Err(SnapshotError::InvalidConfig(
                "top-K capacities must be positive".to_string(),
            ));
        }
        if self.separators.is_empty() {
            return Err(SnapshotError::InvalidConfig(
                "separator set is empty".to_string(),
            ));
        }
        if self.length_ladder.is_empty() {
            return Err(SnapshotError::InvalidConfig(
                "length ladder is empty".to_string(),
            ));
        }
        if self.length_ladder.windows(2).any(|w| w[0] >= w[1]) {
            return Err(SnapshotError::InvalidConfig(format!(
                "length ladder {:?} is not strictly ascending",
                self.length_ladder
            )));
        }
        Ok(())
    }

    /// Highest ladder boundary strictly exceeded by `element_count`
    pub fn bucket_for(&self, element_count: u64) -> Option<u64> {
        self.length_ladder
            .iter()
            .rev()
            .copied()
            .find(|&bound| element_count > bound)
    }
}

/// Accumulated bytes and record count
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    pub bytes: u64,
    pub count: u64,
}

impl Tally {
    pub fn add(&mut self, bytes: u64) {
        self.bytes += bytes;
        self.count += 1;
    }
}

/// A kind paired with a string, e.g. a prefix or a bucket boundary
///
/// Ordered by kind, then key. The textual form is `kind|key`; since kind
/// names never contain `|`, parsing splits on the first one.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TypedKey {
    pub kind: Kind,
    pub key: String,
}

impl TypedKey {
    pub fn new(kind: Kind, key: impl Into<String>) -> Self {
        Self {
            kind,
            key: key.into(),
        }
    }
}

impl fmt::Display for TypedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.kind, self.key)
    }
}

impl FromStr for TypedKey {
    type Err = SnapshotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, key) = s
            .split_once('|')
            .ok_or_else(|| SnapshotError::InvalidCompositeKey(s.to_string()))?;
        Ok(Self::new(kind.parse()?, key))
    }
}

/// Aggregated size of one normalized prefix within one kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrefixEntry {
    pub kind: Kind,
    pub prefix: String,
    pub bytes: u64,
    pub count: u64,
}

impl Ord for PrefixEntry {
    /// More bytes ranks higher, then more keys, then the lexicographically
    /// smaller prefix, then kind
    fn cmp(&self, other: &Self) -> Ordering {
        self.bytes
            .cmp(&other.bytes)
            .then(self.count.cmp(&other.count))
            .then_with(|| other.prefix.cmp(&self.prefix))
            .then_with(|| other.kind.cmp(&self.kind))
    }
}

impl PartialOrd for PrefixEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Element-count bucket of one kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LengthBucket {
    pub kind: Kind,
    /// Ladder boundary the element counts strictly exceed
    pub lower_bound: u64,
    pub bytes: u64,
    pub count: u64,
}

/// Record ranked by size for the largest-key top-K
#[derive(Debug)]
struct BySize(Record);

impl BySize {
    fn rank(&self) -> (u64, &[u8], u32, Kind) {
        (self.0.bytes, self.0.key.as_slice(), self.0.database, self.0.kind)
    }
}

impl PartialEq for BySize {
    fn eq(&self, other: &Self) -> bool {
        self.rank() == other.rank()
    }
}

impl Eq for BySize {}

impl PartialOrd for BySize {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for BySize {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank())
    }
}

/// Single-threaded streaming aggregator
///
/// **Public** - feed it with `count` or `consume`, then call `finish`
#[derive(Debug)]
pub struct Aggregator {
    config: AggregatorConfig,
    largest_entries: BoundedTopK<BySize>,
    prefixes: HashMap<TypedKey, Tally>,
    length_buckets: BTreeMap<(Kind, u64), Tally>,
    type_totals: BTreeMap<Kind, Tally>,
    slot_totals: BTreeMap<u16, Tally>,
    total: Tally,
}

impl Aggregator {
    /// Create an aggregator
    ///
    /// # Errors
    /// Returns `SnapshotError::InvalidConfig` if the configuration is rejected
    pub fn new(config: AggregatorConfig) -> Result<Self, SnapshotError> {
        config.validate()?;
        Ok(Self {
            largest_entries: BoundedTopK::new(config.top_entries),
            config,
            prefixes: HashMap::new(),
            length_buckets: BTreeMap::new(),
            type_totals: BTreeMap::new(),
            slot_totals: BTreeMap::new(),
            total: Tally::default(),
        })
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    /// Records counted so far
    pub fn counted(&self) -> u64 {
        self.total.count
    }

    /// Fold one record into every aggregate
    pub fn count(&mut self, record: Record) {
        let kind = record.kind;
        let bytes = record.bytes;

        self.total.add(bytes);
        self.type_totals.entry(kind).or_default().add(bytes);

        if let Some(bound) = self.config.bucket_for(record.element_count) {
            self.length_buckets.entry((kind, bound)).or_default().add(bytes);
        }

        if !record.key.is_empty() {
            let normalized = normalize_key(&record.key_text(), self.config.placeholder);
            for prefix in key_prefixes(&normalized, &self.config.separators) {
                self.prefixes
                    .entry(TypedKey::new(kind, prefix))
                    .or_default()
                    .add(bytes);
            }

            let slot = key_slot(&record.key);
            self.slot_totals.entry(slot).or_default().add(bytes);
        }

        self.largest_entries.offer(BySize(record));
    }

    /// Drain a record source to exhaustion, then finalize
    ///
    /// **Public** - runs on the consumer side of the pipeline
    pub fn consume<I>(mut self, records: I) -> Aggregates
    where
        I: IntoIterator<Item = Record>,
    {
        for record in records {
            self.count(record);
            if self.total.count % PROGRESS_INTERVAL == 0 {
                info!("Aggregated {} records", self.total.count);
            }
        }
        self.finish()
    }

    /// Reduce the prefix map to its top-K and freeze the results
    pub fn finish(self) -> Aggregates {
        debug!(
            "Finalizing {} records, {} distinct prefixes",
            self.total.count,
            self.prefixes.len()
        );

        let mut top_prefixes = BoundedTopK::new(self.config.top_prefixes);
        for (typed, tally) in self.prefixes {
            top_prefixes.offer(PrefixEntry {
                kind: typed.kind,
                prefix: typed.key,
                bytes: tally.bytes,
                count: tally.count,
            });
        }

        let largest_entries = self
            .largest_entries
            .into_sorted_desc()
            .into_iter()
            .map(|BySize(record)| record)
            .collect();

        info!(
            "Aggregation complete: {} records, {} bytes",
            self.total.count, self.total.bytes
        );

        Aggregates {
            config: self.config,
            largest_entries,
            largest_prefixes: top_prefixes.into_sorted_desc(),
            length_buckets: self.length_buckets,
            type_totals: self.type_totals,
            slot_totals: self.slot_totals,
            total: self.total,
        }
    }
}

/// Finalized, read-only aggregation results
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregates {
    pub(crate) config: AggregatorConfig,
    /// Largest first
    pub(crate) largest_entries: Vec<Record>,
    /// Largest first
    pub(crate) largest_prefixes: Vec<PrefixEntry>,
    pub(crate) length_buckets: BTreeMap<(Kind, u64), Tally>,
    pub(crate) type_totals: BTreeMap<Kind, Tally>,
    pub(crate) slot_totals: BTreeMap<u16, Tally>,
    pub(crate) total: Tally,
}

impl Aggregates {
    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    /// Largest keys, biggest first
    ///
    /// **Public** - main query for reports
    ///
    /// # Arguments
    /// * `num` - Maximum number of records returned (capped at the retained top-K)
    /// * `min_bytes` - When positive, only records strictly larger are returned
    pub fn largest_entries(&self, num: usize, min_bytes: u64) -> Vec<&Record> {
        self.largest_entries
            .iter()
            .filter(|r| min_bytes == 0 || r.bytes > min_bytes)
            .take(num.min(self.config.top_entries))
            .collect()
    }

    /// Largest prefixes across all kinds, biggest first
    pub fn largest_prefixes(&self) -> &[PrefixEntry] {
        &self.largest_prefixes
    }

    /// Largest prefixes grouped by kind, each group biggest first
    pub fn largest_prefixes_by_kind(&self) -> BTreeMap<Kind, Vec<&PrefixEntry>> {
        let mut grouped: BTreeMap<Kind, Vec<&PrefixEntry>> = BTreeMap::new();
        for entry in &self.largest_prefixes {
            grouped.entry(entry.kind).or_default().push(entry);
        }
        grouped
    }

    /// Non-empty buckets ordered by kind, then boundary
    pub fn length_buckets(&self) -> Vec<LengthBucket> {
        self.length_buckets
            .iter()
            .map(|(&(kind, lower_bound), tally)| LengthBucket {
                kind,
                lower_bound,
                bytes: tally.bytes,
                count: tally.count,
            })
            .collect()
    }

    pub fn type_totals(&self) -> &BTreeMap<Kind, Tally> {
        &self.type_totals
    }

    /// Totals of every slot owning at least one key
    pub fn slot_totals(&self) -> &BTreeMap<u16, Tally> {
        &self.slot_totals
    }

    /// The `n` heaviest slots by bytes, ties broken by lower slot number
    pub fn top_slots(&self, n: usize) -> Vec<(u16, Tally)> {
        let mut slots: Vec<(u16, Tally)> =
            self.slot_totals.iter().map(|(&s, &t)| (s, t)).collect();
        slots.sort_by(|a, b| b.1.bytes.cmp(&a.1.bytes).then(a.0.cmp(&b.0)));
        slots.truncate(n);
        slots
    }

    pub fn total_count(&self) -> u64 {
        self.total.count
    }

    pub fn total_bytes(&self) -> u64 {
        self.total.bytes
    }
}
