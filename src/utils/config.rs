//! Configuration defaults and constants shared by the decoder, the
//! aggregator and the CLI.

/// Current report schema version
pub const SCHEMA_VERSION: &str = "1.0.0";

/// Number of largest keys retained by the aggregator
pub const DEFAULT_TOP_ENTRIES: usize = 500;

/// Number of largest key prefixes retained after finalization
pub const DEFAULT_TOP_PREFIXES: usize = 1000;

/// Element-count bucket boundaries, strictly ascending
pub const DEFAULT_LENGTH_LADDER: &[u64] = &[100, 1_000, 10_000, 100_000, 1_000_000];

/// Characters that split a key name into prefix segments
pub const DEFAULT_SEPARATORS: &str = ":;,_- ";

/// Replacement for each run of ASCII digits in a key name
pub const DIGIT_PLACEHOLDER: char = '*';

/// Records buffered between the decoder and the aggregator
pub const DEFAULT_CHANNEL_CAPACITY: usize = 100_000;

/// Longest element sample kept on a record, in bytes
pub const SAMPLE_LIMIT: usize = 100;

/// Marker appended to a truncated element sample
pub const TRUNCATION_MARKER: &str = "...";

/// RDB versions below this wrap every element in an extra object
pub const WRAPPER_OBJECT_VERSION: u32 = 10;

/// Number of records between two progress log lines
pub const PROGRESS_INTERVAL: u64 = 50_000;

/// Number of cluster hash slots
pub const SLOT_COUNT: u16 = 16384;

// Prefix listing in `show`: per-kind cap, lifted for prefixes at least this large
pub const PREFIX_DISPLAY_LIMIT: usize = 50;
pub const PREFIX_DISPLAY_FORCE_BYTES: u64 = 1000 * 1000;

/// Aux field carrying the snapshot creation time
pub const AUX_CREATED_AT: &str = "ctime";

/// Aux field carrying the server's used memory at save time
pub const AUX_USED_MEMORY: &str = "used-mem";

/// Largest keys listed by `show` unless overridden
pub const DEFAULT_SHOW_ENTRIES: usize = 100;

/// Heaviest slots listed by `show` unless overridden
pub const DEFAULT_SHOW_SLOTS: usize = 10;
