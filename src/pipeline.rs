//! Producer/consumer wiring of one analysis.
//!
//! The calling thread drives the record builder (directly or through a
//! parser front-end) while a dedicated thread runs the aggregator on the
//! other end of a bounded record stream. Nothing is shared between two
//! analyses.

use crate::aggregator::{Aggregates, Aggregator, AggregatorConfig};
use crate::decoder::{record_stream, RecordBuilder, RecordSender, SnapshotMeta};
use crate::utils::config::DEFAULT_CHANNEL_CAPACITY;
use crate::utils::error::PipelineError;
use log::{debug, info, warn};
use std::thread;

/// Settings of one analysis run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOptions {
    pub aggregator: AggregatorConfig,

    /// Records buffered between the builder and the aggregator
    pub channel_capacity: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            aggregator: AggregatorConfig::default(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

/// Results of a completed analysis
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub aggregates: Aggregates,
    pub meta: SnapshotMeta,
    /// Records emitted by the builder
    pub records: u64,
}

/// Run one analysis
///
/// **Public** - main entry point of the library
///
/// # Arguments
/// * `options` - Aggregator configuration and stream capacity
/// * `drive` - Feeds every parser callback into the builder; it should end
///   with `end_format`, though dropping the builder closes the stream too
///
/// # Returns
/// Finalized aggregates and snapshot metadata
///
/// # Errors
/// * `PipelineError::Config` - invalid aggregator configuration
/// * `PipelineError::Spawn` - aggregator thread could not start
/// * Any error returned by `drive`. The aggregator still drains and
///   finalizes what was emitted before the failure, but the partial
///   result is discarded.
pub fn run_pipeline<F, E>(options: PipelineOptions, drive: F) -> Result<PipelineOutput, PipelineError>
where
    F: FnOnce(&mut RecordBuilder<RecordSender>) -> Result<(), E>,
    E: Into<PipelineError>,
{
    let aggregator = Aggregator::new(options.aggregator)?;
    let (sender, receiver) = record_stream(options.channel_capacity);

    debug!(
        "Starting aggregator thread (stream capacity {})",
        options.channel_capacity
    );
    let consumer = thread::Builder::new()
        .name("rdb-aggregator".to_string())
        .spawn(move || aggregator.consume(receiver))
        .map_err(PipelineError::Spawn)?;

    let mut builder = RecordBuilder::new(sender);
    let outcome = drive(&mut builder);
    let meta = builder.meta();
    let records = builder.emitted();

    // closes the stream if `end_format` was never reached
    drop(builder);

    let aggregates = consumer
        .join()
        .map_err(|_| PipelineError::AggregatorPanicked)?;

    match outcome {
        Ok(()) => {
            info!(
                "Analysis finished: {} records, {} bytes estimated",
                aggregates.total_count(),
                aggregates.total_bytes()
            );
            Ok(PipelineOutput {
                aggregates,
                meta,
                records,
            })
        }
        Err(err) => {
            let err = err.into();
            warn!(
                "Decoding aborted after {} records ({} aggregated): {}",
                records,
                aggregates.total_count(),
                err
            );
            Err(err)
        }
    }
}
