//! Human-readable byte sizes.

/// Parse a size such as "10Gb", "500Mb", "64Kb" or "12b" into bytes
///
/// **Public** - used for CLI size thresholds
///
/// Units are binary (1Kb = 1024 bytes) and case-insensitive. Fractional
/// values are accepted ("1.5Gb").
pub fn parse_size(input: &str) -> Result<u64, String> {
    let s = input.trim();
    if s.is_empty() {
        return Err("empty size string".to_string());
    }

    let lower = s.to_ascii_lowercase();
    let (number, multiplier) = if let Some(n) = lower.strip_suffix("gb") {
        (n, 1024u64 * 1024 * 1024)
    } else if let Some(n) = lower.strip_suffix("mb") {
        (n, 1024 * 1024)
    } else if let Some(n) = lower.strip_suffix("kb") {
        (n, 1024)
    } else if let Some(n) = lower.strip_suffix('b') {
        (n, 1)
    } else {
        return Err(format!("no unit in '{}' (use Gb, Mb, Kb or b)", s));
    };

    let value: f64 = number
        .trim()
        .parse()
        .map_err(|e| format!("invalid number in '{}': {}", s, e))?;
    if !value.is_finite() || value < 0.0 {
        return Err(format!("size must be a non-negative number: '{}'", s));
    }

    Ok((value * multiplier as f64) as u64)
}

/// Format a byte count for display ("512 B", "1.5 KB", "3.2 GB")
pub fn format_size(bytes: u64) -> String {
    const UNIT: u64 = 1024;
    if bytes < UNIT {
        return format!("{} B", bytes);
    }
    let mut div = UNIT;
    let mut exp = 0;
    let mut n = bytes / UNIT;
    while n >= UNIT && exp < 4 {
        div *= UNIT;
        exp += 1;
        n /= UNIT;
    }
    let unit = ['K', 'M', 'G', 'T', 'P'][exp];
    format!("{:.1} {}B", bytes as f64 / div as f64, unit)
}
