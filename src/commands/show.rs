//! Show command implementation.
//!
//! Renders a saved report as plain-text tables: snapshot header, largest
//! keys, prefixes grouped by kind, per-kind totals, element-count buckets
//! and the heaviest slots.

use super::models::ShowArgs;
use crate::aggregator::{Aggregates, PrefixEntry};
use crate::decoder::Kind;
use crate::output::{read_report, AnalysisReport};
use crate::utils::config::{PREFIX_DISPLAY_FORCE_BYTES, PREFIX_DISPLAY_LIMIT};
use crate::utils::format::format_size;
use anyhow::{Context, Result};
use std::collections::BTreeMap;

/// Execute the show command
///
/// **Public** - main entry point called from main.rs
pub fn execute_show(args: ShowArgs) -> Result<()> {
    let report = read_report(&args.report)
        .with_context(|| format!("Failed to read report {}", args.report.display()))?;
    let aggregates = report
        .aggregates()
        .context("Report contains invalid aggregates")?;

    println!(
        "{}",
        render_report(&report, &aggregates, args.top, args.min_size, args.slots)
    );
    Ok(())
}

/// Render a report as text
///
/// **Public** - shared by `show` and the `analyze --summary` output
///
/// # Arguments
/// * `top` - Number of largest keys listed
/// * `min_size` - When positive, only keys strictly larger are listed
/// * `slots` - Number of heaviest slots listed
pub fn render_report(
    report: &AnalysisReport,
    aggregates: &Aggregates,
    top: usize,
    min_size: u64,
    slots: usize,
) -> String {
    let rule = "=".repeat(80);

    let mut out = format!("{}\nMEMORY REPORT\n{}\n", rule, rule);
    out.push_str(&format!("Source:        {}\n", report.source));
    out.push_str(&format!("Generated:     {}\n", report.generated_at));
    out.push_str(&format!("RDB version:   {}\n", report.meta.format_version));
    if let Some(created) = report.snapshot_created_at() {
        out.push_str(&format!("Snapshot time: {}\n", created.to_rfc3339()));
    }
    if report.meta.used_memory > 0 {
        out.push_str(&format!(
            "Used memory:   {}\n",
            format_size(report.meta.used_memory as u64)
        ));
    }
    out.push_str(&format!(
        "Keys:          {} ({} estimated)\n",
        aggregates.total_count(),
        format_size(aggregates.total_bytes())
    ));

    out.push_str(&render_largest_keys(aggregates, top, min_size));
    out.push_str(&render_prefixes(aggregates));
    out.push_str(&render_type_totals(aggregates));
    out.push_str(&render_length_buckets(aggregates));
    out.push_str(&render_slots(aggregates, slots));

    out.push_str(&rule);
    out
}

/// Prefixes kept for display, grouped by kind
///
/// Each kind lists at most `PREFIX_DISPLAY_LIMIT` prefixes, except that
/// prefixes of at least `PREFIX_DISPLAY_FORCE_BYTES` are always listed.
pub fn display_prefixes(aggregates: &Aggregates) -> BTreeMap<Kind, Vec<&PrefixEntry>> {
    let mut grouped: BTreeMap<Kind, Vec<&PrefixEntry>> = BTreeMap::new();
    for entry in aggregates.largest_prefixes() {
        let group = grouped.entry(entry.kind).or_default();
        if group.len() >= PREFIX_DISPLAY_LIMIT && entry.bytes < PREFIX_DISPLAY_FORCE_BYTES {
            continue;
        }
        group.push(entry);
    }
    grouped
}

fn render_largest_keys(aggregates: &Aggregates, top: usize, min_size: u64) -> String {
    let entries = aggregates.largest_entries(top, min_size);
    let mut out = format!("\nLargest keys ({})\n", entries.len());
    out.push_str(&format!(
        "{:>10}  {:<9}  {:<10}  {:>9}  {:>9}  {:>3}  {}\n",
        "SIZE", "KIND", "ENCODING", "ELEMENTS", "MAX ELEM", "DB", "KEY"
    ));
    for record in entries {
        out.push_str(&format!(
            "{:>10}  {:<9}  {:<10}  {:>9}  {:>9}  {:>3}  {}",
            format_size(record.bytes),
            record.kind,
            record.encoding,
            record.element_count,
            record.largest_element_len,
            record.database,
            record.key_text()
        ));
        if let Some(sample) = &record.largest_element_sample {
            out.push_str(&format!("  [{}]", sample));
        }
        if record.has_expiry() {
            out.push_str(&format!("  (expires {})", format_expiry(record.expire_at_millis)));
        }
        out.push('\n');
    }
    out
}

fn render_prefixes(aggregates: &Aggregates) -> String {
    let mut out = String::from("\nLargest prefixes\n");
    for (kind, entries) in display_prefixes(aggregates) {
        out.push_str(&format!("  {}:\n", kind));
        for entry in entries {
            out.push_str(&format!(
                "    {:>10}  {:>9} keys  {}\n",
                format_size(entry.bytes),
                entry.count,
                entry.prefix
            ));
        }
    }
    out
}

fn render_type_totals(aggregates: &Aggregates) -> String {
    let mut out = String::from("\nBy kind\n");
    for (kind, tally) in aggregates.type_totals() {
        out.push_str(&format!(
            "  {:<9}  {:>10}  {:>5.1}%  {:>9} keys\n",
            kind,
            format_size(tally.bytes),
            percentage(tally.bytes, aggregates.total_bytes()),
            tally.count
        ));
    }
    out
}

fn render_length_buckets(aggregates: &Aggregates) -> String {
    let mut out = String::from("\nElement-count buckets\n");
    for bucket in aggregates.length_buckets() {
        out.push_str(&format!(
            "  {:<9}  > {:<9}  {:>10}  {:>9} keys\n",
            bucket.kind,
            bucket.lower_bound,
            format_size(bucket.bytes),
            bucket.count
        ));
    }
    out
}

fn render_slots(aggregates: &Aggregates, slots: usize) -> String {
    if slots == 0 {
        return String::new();
    }
    let mut out = String::from("\nHeaviest slots\n");
    for (slot, tally) in aggregates.top_slots(slots) {
        out.push_str(&format!(
            "  {:>5}  {:>10}  {:>9} keys\n",
            slot,
            format_size(tally.bytes),
            tally.count
        ));
    }
    out
}

fn format_expiry(millis: i64) -> String {
    chrono::DateTime::from_timestamp_millis(millis)
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| millis.to_string())
}

fn percentage(part: u64, total: u64) -> f64 {
    if total > 0 {
        (part as f64 / total as f64) * 100.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::{Aggregator, AggregatorConfig};
    use crate::decoder::{Record, SnapshotMeta};

    fn aggregates_with_prefixes(kinds: &[(Kind, usize, u64)]) -> Aggregates {
        let mut agg = Aggregator::new(AggregatorConfig::default()).unwrap();
        for &(kind, n, bytes) in kinds {
            for i in 0..n {
                // distinct letters keep every key in its own prefix
                let key = format!("p{}x", to_letters(i));
                agg.count(Record::new(key, kind, bytes + i as u64));
            }
        }
        agg.finish()
    }

    fn to_letters(mut n: usize) -> String {
        let mut s = String::new();
        loop {
            s.push((b'a' + (n % 26) as u8) as char);
            n /= 26;
            if n == 0 {
                break s;
            }
        }
    }

    #[test]
    fn test_display_prefixes_caps_each_kind() {
        let aggregates = aggregates_with_prefixes(&[(Kind::Hash, 80, 100), (Kind::Set, 3, 100)]);
        let shown = display_prefixes(&aggregates);
        assert_eq!(shown[&Kind::Hash].len(), PREFIX_DISPLAY_LIMIT);
        assert_eq!(shown[&Kind::Set].len(), 3);
    }

    #[test]
    fn test_display_prefixes_keeps_large_prefixes() {
        let aggregates = aggregates_with_prefixes(&[
            (Kind::List, 60, 2_000_000),
        ]);
        let shown = display_prefixes(&aggregates);
        assert_eq!(shown[&Kind::List].len(), 60);
    }

    #[test]
    fn test_render_report_sections() {
        let mut agg = Aggregator::new(AggregatorConfig::default()).unwrap();
        let mut record = Record::new("user:1:tags", Kind::Set, 4096).with_element_count(150);
        record.observe_element(5, b"admin");
        agg.count(record);
        agg.count(Record::new("small", Kind::String, 10));
        let aggregates = agg.finish();
        let report = AnalysisReport::new("test.events", SnapshotMeta::default(), &aggregates);

        let text = render_report(&report, &aggregates, 10, 100, 5);
        assert!(text.contains("Largest keys (1)"));
        assert!(text.contains("user:1:tags"));
        assert!(text.contains("[admin]"));
        assert!(text.contains("user:*:"));
        assert!(text.contains("> 100"));
        assert!(text.contains("Heaviest slots"));
        assert!(!text.contains("Snapshot time"));
    }

    #[test]
    fn test_render_report_layout() {
        let mut agg = Aggregator::new(AggregatorConfig::default()).unwrap();
        agg.count(Record::new(b"\xffjob".to_vec(), Kind::List, 2048));
        let aggregates = agg.finish();
        let report = AnalysisReport::new("bin.events", SnapshotMeta::default(), &aggregates);

        let text = render_report(&report, &aggregates, 10, 0, 0);
        let headers = ["MEMORY REPORT", "Largest keys (1)", "Largest prefixes", "By kind", "Element-count buckets"];
        let positions: Vec<usize> = headers.iter().map(|h| text.find(h).unwrap()).collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        assert!(text.contains("\u{fffd}job"));
        assert!(!text.contains("Heaviest slots"));
        assert!(text.ends_with(&"=".repeat(80)));
        assert_eq!(text.lines().filter(|l| l.contains("job")).count(), 2);
    }
}
