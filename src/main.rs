//! RDB Memory Analyzer CLI
//!
//! Estimates the runtime memory footprint of every key in a Redis snapshot
//! and reports the largest keys, prefixes, kinds and slots.

use anyhow::Result;
use clap::{Parser, Subcommand};
use env_logger::Env;
use std::path::PathBuf;

use rdb_mem_analyzer::commands::{
    display_schema, display_version, execute_analyze, execute_show, validate_args, AnalyzeArgs,
    ShowArgs,
};
use rdb_mem_analyzer::utils::config::{
    DEFAULT_CHANNEL_CAPACITY, DEFAULT_SEPARATORS, DEFAULT_SHOW_ENTRIES, DEFAULT_SHOW_SLOTS,
    DEFAULT_TOP_ENTRIES, DEFAULT_TOP_PREFIXES,
};
use rdb_mem_analyzer::utils::format::parse_size;

/// RDB Memory Analyzer - offline memory estimation for Redis snapshots
#[derive(Parser, Debug)]
#[command(name = "rdb-mem")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
enum Commands {
    /// Analyze a recorded snapshot event stream
    Analyze {
        /// JSON-lines file of parser events
        #[arg(short, long)]
        input: PathBuf,

        /// Output path for the JSON report
        #[arg(short, long, default_value = "report.json")]
        output: PathBuf,

        /// Characters splitting key names into prefix segments
        #[arg(long, env = "RDB_MEM_SEPARATORS", default_value = DEFAULT_SEPARATORS)]
        separators: String,

        /// Records buffered between decoder and aggregator
        #[arg(long, env = "RDB_MEM_CHANNEL_CAPACITY", default_value_t = DEFAULT_CHANNEL_CAPACITY)]
        channel_capacity: usize,

        /// Number of largest keys retained
        #[arg(long, default_value_t = DEFAULT_TOP_ENTRIES)]
        top_entries: usize,

        /// Number of largest prefixes retained
        #[arg(long, default_value_t = DEFAULT_TOP_PREFIXES)]
        top_prefixes: usize,

        /// Print text summary to stdout
        #[arg(long)]
        summary: bool,
    },

    /// Display a saved report
    Show {
        /// Path to report JSON file
        #[arg(short, long)]
        file: PathBuf,

        /// Number of largest keys to list
        #[arg(long, default_value_t = DEFAULT_SHOW_ENTRIES)]
        top: usize,

        /// Only list keys larger than this size (e.g. 10Kb, 5Mb)
        #[arg(long, env = "RDB_MEM_MIN_SIZE", value_parser = parse_size)]
        min_size: Option<u64>,

        /// Number of heaviest slots to list
        #[arg(long, default_value_t = DEFAULT_SHOW_SLOTS)]
        slots: usize,
    },

    /// Display schema information
    Schema {
        /// Show full schema details
        #[arg(long)]
        show: bool,
    },

    /// Display version information
    Version,
}

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    match cli.command {
        Commands::Analyze {
            input,
            output,
            separators,
            channel_capacity,
            top_entries,
            top_prefixes,
            summary,
        } => {
            let args = AnalyzeArgs {
                input,
                output,
                separators,
                channel_capacity,
                top_entries,
                top_prefixes,
                print_summary: summary,
            };

            validate_args(&args)?;
            execute_analyze(args)?;
        }

        Commands::Show {
            file,
            top,
            min_size,
            slots,
        } => {
            execute_show(ShowArgs {
                report: file,
                top,
                min_size: min_size.unwrap_or(0),
                slots,
            })?;
        }

        Commands::Schema { show } => {
            display_schema(show);
        }

        Commands::Version => {
            display_version();
        }
    }

    Ok(())
}
