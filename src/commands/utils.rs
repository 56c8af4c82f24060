use crate::utils::config::SCHEMA_VERSION;

/// Display schema information
pub fn display_schema(show_details: bool) {
    println!("RDB Memory Analyzer Report Schema");
    println!("Current Version: {}", SCHEMA_VERSION);
    println!();

    if show_details {
        println!("Schema Structure:");
        println!("  version: string            - Schema version (e.g., '1.0.0')");
        println!("  source: string             - Analyzed event file");
        println!("  generated_at: string       - RFC 3339 timestamp");
        println!("  meta: object               - Snapshot header fields");
        println!("    format_version: number   - RDB format version");
        println!("    created_at: number       - Snapshot creation time (epoch seconds)");
        println!("    used_memory: number      - Server memory at save time");
        println!("  aggregates: object         - Finalized aggregates");
        println!("    largest_entries: array   - Largest keys, biggest first");
        println!("    prefix_bytes: object     - 'kind|prefix' -> bytes");
        println!("    prefix_counts: object    - 'kind|prefix' -> keys");
        println!("    length_bytes: object     - 'kind|bucket' -> bytes");
        println!("    length_counts: object    - 'kind|bucket' -> keys");
        println!("    type_bytes: object       - kind -> bytes");
        println!("    type_counts: object      - kind -> keys");
        println!("    slot_bytes: object       - slot -> bytes");
        println!("    slot_counts: object      - slot -> keys");
    } else {
        println!("Use --show for detailed schema information");
    }
}

/// Display version information
pub fn display_version() {
    println!("RDB Memory Analyzer v{}", env!("CARGO_PKG_VERSION"));
    println!("Report Schema: v{}", SCHEMA_VERSION);
    println!();
    println!("Offline memory estimation for Redis RDB snapshots.");
}
