//! Analyze command implementation.
//!
//! The analyze command:
//! 1. Validates the aggregation settings
//! 2. Replays recorded parser events through the decoder and aggregator
//! 3. Builds the report
//! 4. Writes the report file

use super::models::AnalyzeArgs;
use super::show::render_report;
use crate::aggregator::AggregatorConfig;
use crate::output::{write_report, AnalysisReport};
use crate::parser::replay_file;
use crate::pipeline::{run_pipeline, PipelineOptions};
use crate::utils::format::format_size;
use anyhow::{Context, Result};
use log::{debug, info};
use std::time::Instant;

/// Execute the analyze command
///
/// **Public** - main entry point called from main.rs
///
/// # Arguments
/// * `args` - Analyze command arguments
///
/// # Returns
/// The report that was written
///
/// # Errors
/// * Invalid aggregation settings
/// * Unreadable or malformed event file, unsupported encodings
/// * Report write errors
pub fn execute_analyze(args: AnalyzeArgs) -> Result<AnalysisReport> {
    let start_time = Instant::now();

    info!("Starting analysis of: {}", args.input.display());

    // Step 1: Validate configuration
    info!("Step 1/4: Validating configuration...");
    let options = PipelineOptions {
        aggregator: AggregatorConfig {
            top_entries: args.top_entries,
            top_prefixes: args.top_prefixes,
            separators: args.separators.clone(),
            ..AggregatorConfig::default()
        },
        channel_capacity: args.channel_capacity,
    };
    options
        .aggregator
        .validate()
        .context("Invalid aggregation settings")?;

    // Step 2: Decode and aggregate
    info!("Step 2/4: Replaying snapshot events...");
    let input = args.input.clone();
    let output = run_pipeline(options, |builder| replay_file(&input, builder).map(|_| ()))
        .with_context(|| format!("Failed to analyze {}", args.input.display()))?;

    debug!(
        "Decoded {} records from format v{}",
        output.records, output.meta.format_version
    );

    // Step 3: Build report
    info!("Step 3/4: Building report...");
    let report = AnalysisReport::new(
        args.input.display().to_string(),
        output.meta,
        &output.aggregates,
    );

    // Step 4: Write report
    info!("Step 4/4: Writing report...");
    write_report(&report, &args.output).context("Failed to write report JSON")?;

    info!("✓ Report written to: {}", args.output.display());
    info!(
        "{} keys, {} estimated",
        output.aggregates.total_count(),
        format_size(output.aggregates.total_bytes())
    );

    if args.print_summary {
        println!(
            "\n{}",
            render_report(&report, &output.aggregates, 10, 0, 10)
        );
    }

    let elapsed = start_time.elapsed();
    info!("Analysis completed in {:.2}s", elapsed.as_secs_f64());

    Ok(report)
}

/// Validate analyze arguments
///
/// **Public** - can be called before execute_analyze for early validation
pub fn validate_args(args: &AnalyzeArgs) -> Result<()> {
    if args.input.as_os_str().is_empty() {
        anyhow::bail!("Input event file cannot be empty");
    }

    if !args.input.is_file() {
        anyhow::bail!("Input event file not found: {}", args.input.display());
    }

    if args.channel_capacity == 0 {
        anyhow::bail!("Channel capacity must be at least 1");
    }

    if args.separators.is_empty() {
        anyhow::bail!("Separator set cannot be empty");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_validate_args_missing_input() {
        let args = AnalyzeArgs {
            input: "does/not/exist.events".into(),
            ..AnalyzeArgs::default()
        };
        assert!(validate_args(&args).is_err());
    }

    #[test]
    fn test_validate_args_zero_capacity() {
        let input = NamedTempFile::new().unwrap();
        let args = AnalyzeArgs {
            input: input.path().to_path_buf(),
            channel_capacity: 0,
            ..AnalyzeArgs::default()
        };
        assert!(validate_args(&args).is_err());
    }

    #[test]
    fn test_execute_analyze_writes_report() {
        let mut input = NamedTempFile::new().unwrap();
        writeln!(input, r#"{{"event":"start_format","version":11}}"#).unwrap();
        writeln!(input, r#"{{"event":"set","key":"a:1","value":"x"}}"#).unwrap();
        writeln!(input, r#"{{"event":"end_format"}}"#).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let args = AnalyzeArgs {
            input: input.path().to_path_buf(),
            output: dir.path().join("report.json"),
            ..AnalyzeArgs::default()
        };

        let report = execute_analyze(args.clone()).unwrap();
        assert!(args.output.exists());
        assert_eq!(report.aggregates.total_count, 1);
        assert_eq!(report.meta.format_version, 11);
    }

    #[test]
    fn test_execute_analyze_fails_on_unknown_encoding() {
        let mut input = NamedTempFile::new().unwrap();
        writeln!(input, r#"{{"event":"start_format","version":11}}"#).unwrap();
        writeln!(
            input,
            r#"{{"event":"start_set","key":"s","cardinality":1,"info":{{"encoding":"bitmap"}}}}"#
        )
        .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let args = AnalyzeArgs {
            input: input.path().to_path_buf(),
            output: dir.path().join("report.json"),
            ..AnalyzeArgs::default()
        };

        let err = execute_analyze(args.clone()).unwrap_err();
        assert!(format!("{:#}", err).contains("bitmap"));
        assert!(!args.output.exists());
    }
}
