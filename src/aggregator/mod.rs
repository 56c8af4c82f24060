//! Streaming aggregation of per-key memory records.
//!
//! This module turns the record stream into:
//! - Largest keys and largest key-name prefixes (bounded top-K)
//! - Element-count buckets and per-kind totals
//! - Cluster hash-slot histogram

pub mod counter;
pub mod prefix;
pub mod slot;
pub mod snapshot;
pub mod top_k;

// Re-export main types and functions
pub use counter::{Aggregates, Aggregator, AggregatorConfig, LengthBucket, PrefixEntry, Tally, TypedKey};
pub use prefix::{key_prefixes, normalize_key};
pub use slot::key_slot;
pub use snapshot::AggregatesSnapshot;
pub use top_k::BoundedTopK;
