//! Report file schema.
//!
//! This module defines the structure of the JSON report written by
//! `analyze` and read back by `show`. Schema is versioned to allow
//! future evolution.

use crate::aggregator::{Aggregates, AggregatesSnapshot};
use crate::decoder::SnapshotMeta;
use crate::utils::config::SCHEMA_VERSION;
use crate::utils::error::SnapshotError;
use serde::{Deserialize, Serialize};

/// Top-level report structure written to JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    /// Schema version for compatibility checking
    pub version: String,

    /// Where the analyzed events came from (usually a file path)
    pub source: String,

    /// Timestamp when the report was generated (RFC 3339)
    pub generated_at: String,

    /// Metadata captured from the snapshot header
    pub meta: SnapshotMeta,

    /// Finalized aggregates
    pub aggregates: AggregatesSnapshot,
}

impl AnalysisReport {
    /// Build a report stamped with the current time
    pub fn new(source: impl Into<String>, meta: SnapshotMeta, aggregates: &Aggregates) -> Self {
        Self {
            version: SCHEMA_VERSION.to_string(),
            source: source.into(),
            generated_at: chrono::Utc::now().to_rfc3339(),
            meta,
            aggregates: aggregates.to_snapshot(),
        }
    }

    /// Restore queryable aggregates from the report
    pub fn aggregates(&self) -> Result<Aggregates, SnapshotError> {
        Aggregates::from_snapshot(self.aggregates.clone())
    }

    /// Creation time of the snapshot, if the snapshot recorded one
    pub fn snapshot_created_at(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        if self.meta.created_at <= 0 {
            return None;
        }
        chrono::DateTime::from_timestamp(self.meta.created_at, 0)
    }
}
