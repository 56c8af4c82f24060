//! Serializable form of finalized aggregates.
//!
//! JSON map keys must be strings, so every composite key is flattened to
//! its `kind|key` text form. Converting back rebuilds identical accessor
//! results.

use super::counter::{Aggregates, AggregatorConfig, PrefixEntry, Tally, TypedKey};
use crate::decoder::record::{Kind, Record};
use crate::utils::error::SnapshotError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Flat, serde-friendly copy of `Aggregates`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregatesSnapshot {
    pub top_entries: usize,
    pub top_prefixes: usize,
    pub length_ladder: Vec<u64>,
    #[serde(default)]
    pub separators: String,
    #[serde(default = "default_placeholder")]
    pub placeholder: char,

    pub total_count: u64,
    pub total_bytes: u64,

    /// Largest first
    pub largest_entries: Vec<Record>,

    // `kind|prefix` -> value
    pub prefix_bytes: BTreeMap<String, u64>,
    pub prefix_counts: BTreeMap<String, u64>,

    // `kind|lower_bound` -> value
    pub length_bytes: BTreeMap<String, u64>,
    pub length_counts: BTreeMap<String, u64>,

    pub type_bytes: BTreeMap<String, u64>,
    pub type_counts: BTreeMap<String, u64>,

    pub slot_bytes: BTreeMap<u16, u64>,
    pub slot_counts: BTreeMap<u16, u64>,
}

fn default_placeholder() -> char {
    crate::utils::config::DIGIT_PLACEHOLDER
}

impl Aggregates {
    /// Flatten into the serializable form
    pub fn to_snapshot(&self) -> AggregatesSnapshot {
        let mut snapshot = AggregatesSnapshot {
            top_entries: self.config.top_entries,
            top_prefixes: self.config.top_prefixes,
            length_ladder: self.config.length_ladder.clone(),
            separators: self.config.separators.clone(),
            placeholder: self.config.placeholder,
            total_count: self.total.count,
            total_bytes: self.total.bytes,
            largest_entries: self.largest_entries.clone(),
            ..AggregatesSnapshot::default()
        };

        for entry in &self.largest_prefixes {
            let key = TypedKey::new(entry.kind, entry.prefix.clone()).to_string();
            snapshot.prefix_bytes.insert(key.clone(), entry.bytes);
            snapshot.prefix_counts.insert(key, entry.count);
        }

        for (&(kind, bound), tally) in &self.length_buckets {
            let key = TypedKey::new(kind, bound.to_string()).to_string();
            snapshot.length_bytes.insert(key.clone(), tally.bytes);
            snapshot.length_counts.insert(key, tally.count);
        }

        for (kind, tally) in &self.type_totals {
            snapshot.type_bytes.insert(kind.to_string(), tally.bytes);
            snapshot.type_counts.insert(kind.to_string(), tally.count);
        }

        for (&slot, tally) in &self.slot_totals {
            snapshot.slot_bytes.insert(slot, tally.bytes);
            snapshot.slot_counts.insert(slot, tally.count);
        }

        snapshot
    }

    /// Rebuild aggregates from their serializable form
    ///
    /// # Errors
    /// * `SnapshotError::InvalidCompositeKey` / `UnknownKind` - malformed map key
    /// * `SnapshotError::InvalidBucket` - bucket boundary is not a ladder value
    /// * `SnapshotError::InvalidConfig` - stored configuration is invalid
    pub fn from_snapshot(snapshot: AggregatesSnapshot) -> Result<Self, SnapshotError> {
        let config = AggregatorConfig {
            top_entries: snapshot.top_entries,
            top_prefixes: snapshot.top_prefixes,
            length_ladder: snapshot.length_ladder,
            separators: snapshot.separators,
            placeholder: snapshot.placeholder,
        };
        config.validate()?;

        let mut largest_prefixes = Vec::with_capacity(snapshot.prefix_bytes.len());
        for (text, bytes) in &snapshot.prefix_bytes {
            let typed: TypedKey = text.parse()?;
            largest_prefixes.push(PrefixEntry {
                kind: typed.kind,
                prefix: typed.key,
                bytes: *bytes,
                count: snapshot.prefix_counts.get(text).copied().unwrap_or(0),
            });
        }
        largest_prefixes.sort_by(|a, b| b.cmp(a));

        let mut length_buckets = BTreeMap::new();
        for (text, bytes) in &snapshot.length_bytes {
            let typed: TypedKey = text.parse()?;
            let bound: u64 = typed
                .key
                .parse()
                .map_err(|_| SnapshotError::InvalidBucket(text.clone()))?;
            if !config.length_ladder.contains(&bound) {
                return Err(SnapshotError::InvalidBucket(text.clone()));
            }
            let count = snapshot.length_counts.get(text).copied().unwrap_or(0);
            length_buckets.insert((typed.kind, bound), Tally { bytes: *bytes, count });
        }

        let mut type_totals = BTreeMap::new();
        for (text, bytes) in &snapshot.type_bytes {
            let kind: Kind = text.parse()?;
            let count = snapshot.type_counts.get(text).copied().unwrap_or(0);
            type_totals.insert(kind, Tally { bytes: *bytes, count });
        }

        let slot_totals = snapshot
            .slot_bytes
            .iter()
            .map(|(&slot, &bytes)| {
                let count = snapshot.slot_counts.get(&slot).copied().unwrap_or(0);
                (slot, Tally { bytes, count })
            })
            .collect();

        Ok(Self {
            config,
            largest_entries: snapshot.largest_entries,
            largest_prefixes,
            length_buckets,
            type_totals,
            slot_totals,
            total: Tally {
                bytes: snapshot.total_bytes,
                count: snapshot.total_count,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::counter::Aggregator;
    use pretty_assertions::assert_eq;

    fn sample_aggregates() -> Aggregates {
        let mut agg = Aggregator::new(AggregatorConfig::default()).unwrap();
        agg.count(Record::new("session:9f:data", Kind::Hash, 4096).with_element_count(150));
        agg.count(Record::new("a|b:1", Kind::Set, 512).with_element_count(20));
        agg.count(Record::new("feed:42", Kind::List, 70_000).with_element_count(12_000));
        agg.finish()
    }

    #[test]
    fn test_snapshot_round_trip() {
        let original = sample_aggregates();
        let json = serde_json::to_string(&original.to_snapshot()).unwrap();
        let restored =
            Aggregates::from_snapshot(serde_json::from_str(&json).unwrap()).unwrap();

        assert_eq!(restored.largest_entries(500, 0), original.largest_entries(500, 0));
        assert_eq!(restored.largest_prefixes(), original.largest_prefixes());
        assert_eq!(restored.length_buckets(), original.length_buckets());
        assert_eq!(restored.type_totals(), original.type_totals());
        assert_eq!(restored.slot_totals(), original.slot_totals());
        assert_eq!(restored.total_bytes(), original.total_bytes());
        assert_eq!(restored, original);
    }

    #[test]
    fn test_composite_keys_split_on_first_bar() {
        let snapshot = sample_aggregates().to_snapshot();
        assert!(snapshot.prefix_bytes.contains_key("set|a|b:"));
        assert!(snapshot.length_bytes.contains_key("list|10000"));
    }

    #[test]
    fn test_rejects_bad_bucket() {
        let mut snapshot = sample_aggregates().to_snapshot();
        snapshot.length_bytes.insert("hash|150".to_string(), 1);
        assert!(matches!(
            Aggregates::from_snapshot(snapshot),
            Err(SnapshotError::InvalidBucket(_))
        ));
    }

    #[test]
    fn test_rejects_unknown_kind() {
        let mut snapshot = sample_aggregates().to_snapshot();
        snapshot.type_bytes.insert("module".to_string(), 1);
        assert!(matches!(
            Aggregates::from_snapshot(snapshot),
            Err(SnapshotError::UnknownKind(_))
        ));
    }
}
