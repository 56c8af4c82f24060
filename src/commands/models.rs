use crate::utils::config::{
    DEFAULT_CHANNEL_CAPACITY, DEFAULT_SEPARATORS, DEFAULT_SHOW_ENTRIES, DEFAULT_SHOW_SLOTS,
    DEFAULT_TOP_ENTRIES, DEFAULT_TOP_PREFIXES,
};
use std::path::PathBuf;

/// Arguments for the analyze command
///
/// **Public** - used by main.rs to construct from CLI args
#[derive(Debug, Clone)]
pub struct AnalyzeArgs {
    /// JSON-lines file of recorded parser events
    pub input: PathBuf,

    /// Output path for the JSON report
    pub output: PathBuf,

    /// Characters splitting key names into prefix segments
    pub separators: String,

    /// Records buffered between decoder and aggregator
    pub channel_capacity: usize,

    /// Largest keys retained
    pub top_entries: usize,

    /// Largest prefixes retained
    pub top_prefixes: usize,

    /// Print text summary to stdout
    pub print_summary: bool,
}

impl Default for AnalyzeArgs {
    fn default() -> Self {
        Self {
            input: PathBuf::new(),
            output: PathBuf::from("report.json"),
            separators: DEFAULT_SEPARATORS.to_string(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            top_entries: DEFAULT_TOP_ENTRIES,
            top_prefixes: DEFAULT_TOP_PREFIXES,
            print_summary: false,
        }
    }
}

/// Arguments for the show command
#[derive(Debug, Clone)]
pub struct ShowArgs {
    /// Path to a report written by analyze
    pub report: PathBuf,

    /// Number of largest keys listed
    pub top: usize,

    /// Only list keys strictly larger than this many bytes (0 = no filter)
    pub min_size: u64,

    /// Number of heaviest slots listed
    pub slots: usize,
}

impl Default for ShowArgs {
    fn default() -> Self {
        Self {
            report: PathBuf::from("report.json"),
            top: DEFAULT_SHOW_ENTRIES,
            min_size: 0,
            slots: DEFAULT_SHOW_SLOTS,
        }
    }
}
