//! Key-name prefix extraction.
//!
//! Keys are first normalized so that ids do not fragment the prefix space
//! (`order:1842:items` and `order:77:items` both become `order:*:items`),
//! then split at separator runs into cumulative prefixes.

/// Collapse every maximal run of ASCII digits into a single `placeholder`
///
/// **Public** - idempotent: normalizing a normalized key is a no-op
pub fn normalize_key(key: &str, placeholder: char) -> String {
    let mut normalized = String::with_capacity(key.len());
    let mut in_digits = false;

    for ch in key.chars() {
        if ch.is_ascii_digit() {
            if !in_digits {
                normalized.push(placeholder);
                in_digits = true;
            }
        } else {
            normalized.push(ch);
            in_digits = false;
        }
    }

    normalized
}

/// Cumulative prefixes of a normalized key
///
/// **Public** - used by the aggregator for every record
///
/// # Arguments
/// * `normalized` - Key after `normalize_key`
/// * `separators` - Characters that end a segment
///
/// # Returns
/// One prefix per separator run, ending at the first separator of the run,
/// followed by the whole key unless it ends with a separator. Prefixes
/// strictly grow in length so the result has no duplicates. Empty keys
/// yield nothing.
pub fn key_prefixes(normalized: &str, separators: &str) -> Vec<String> {
    let mut prefixes = Vec::new();
    let mut after_separator = false;

    for (idx, ch) in normalized.char_indices() {
        let is_separator = separators.contains(ch);
        if is_separator && !after_separator {
            prefixes.push(normalized[..idx + ch.len_utf8()].to_string());
        }
        after_separator = is_separator;
    }

    if !normalized.is_empty() && !after_separator {
        prefixes.push(normalized.to_string());
    }

    prefixes
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEPARATORS: &str = ":;,_- ";

    fn prefixes_of(key: &str) -> Vec<String> {
        key_prefixes(&normalize_key(key, '*'), SEPARATORS)
    }

    #[test]
    fn test_normalize_collapses_digit_runs() {
        assert_eq!(normalize_key("user:123:profile", '*'), "user:*:profile");
        assert_eq!(normalize_key("a1b22c333", '*'), "a*b*c*");
        assert_eq!(normalize_key("no-digits", '*'), "no-digits");
        assert_eq!(normalize_key("", '*'), "");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        for key in ["user:123:profile", "42", "x*9*y", "日本:12"] {
            let once = normalize_key(key, '*');
            assert_eq!(normalize_key(&once, '*'), once);
        }
    }

    #[test]
    fn test_prefixes_of_typical_key() {
        assert_eq!(
            prefixes_of("user:123:profile"),
            vec!["user:", "user:*:", "user:*:profile"]
        );
    }

    #[test]
    fn test_key_without_separator() {
        assert_eq!(prefixes_of("counter"), vec!["counter"]);
        assert_eq!(prefixes_of("12345"), vec!["*"]);
    }

    #[test]
    fn test_separator_runs_yield_one_prefix() {
        assert_eq!(prefixes_of("a::b"), vec!["a:", "a::b"]);
        assert_eq!(prefixes_of("cache_-x"), vec!["cache_", "cache_-x"]);
    }

    #[test]
    fn test_trailing_separator_is_not_repeated() {
        assert_eq!(prefixes_of("queue:"), vec!["queue:"]);
        assert_eq!(prefixes_of("queue::"), vec!["queue:"]);
    }

    #[test]
    fn test_empty_key_has_no_prefixes() {
        assert!(prefixes_of("").is_empty());
    }

    #[test]
    fn test_multibyte_separator_neighbours() {
        assert_eq!(prefixes_of("é:1"), vec!["é:", "é:*"]);
    }
}
