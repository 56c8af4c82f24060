//! Per-key memory records emitted by the record builder.

use crate::utils::config::{SAMPLE_LIMIT, TRUNCATION_MARKER};
use crate::utils::error::SnapshotError;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

/// High-level category of a stored value
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    String,
    Hash,
    Set,
    #[serde(rename = "sortedset")]
    SortedSet,
    List,
    Stream,
}

impl Kind {
    pub const ALL: [Kind; 6] = [
        Kind::String,
        Kind::Hash,
        Kind::Set,
        Kind::SortedSet,
        Kind::List,
        Kind::Stream,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::String => "string",
            Kind::Hash => "hash",
            Kind::Set => "set",
            Kind::SortedSet => "sortedset",
            Kind::List => "list",
            Kind::Stream => "stream",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Kind {
    type Err = SnapshotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Kind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| SnapshotError::UnknownKind(s.to_string()))
    }
}

/// Bounded copy of the largest element seen in a container
///
/// Holds at most `SAMPLE_LIMIT` bytes; `truncated` records whether the
/// element was longer than that.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementSample {
    pub text: String,
    pub truncated: bool,
}

impl ElementSample {
    /// Capture an element, keeping at most `SAMPLE_LIMIT` bytes of text
    ///
    /// Replacement characters can make the text longer than the raw bytes,
    /// so the cut is applied to the decoded text at a char boundary.
    pub fn capture(raw: &[u8]) -> Self {
        let mut text = String::from_utf8_lossy(raw).into_owned();
        let mut truncated = raw.len() > SAMPLE_LIMIT;
        if text.len() > SAMPLE_LIMIT {
            let mut cut = SAMPLE_LIMIT;
            while !text.is_char_boundary(cut) {
                cut -= 1;
            }
            text.truncate(cut);
            truncated = true;
        }
        Self { text, truncated }
    }
}

impl fmt::Display for ElementSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)?;
        if self.truncated {
            f.write_str(TRUNCATION_MARKER)?;
        }
        Ok(())
    }
}

/// Finished memory estimate for one top-level key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Raw key bytes, exactly as stored in the snapshot
    #[serde(with = "key_bytes")]
    pub key: Vec<u8>,

    /// Estimated memory footprint
    pub bytes: u64,

    pub kind: Kind,

    /// Encoding tag reported by the parser, possibly empty
    #[serde(default)]
    pub encoding: String,

    /// Contained elements (element length for strings)
    pub element_count: u64,

    pub largest_element_len: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub largest_element_sample: Option<ElementSample>,

    /// Logical database index
    pub database: u32,

    /// Absolute expiry in epoch milliseconds, 0 when the key never expires
    #[serde(default)]
    pub expire_at_millis: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idle_seconds: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_frequency: Option<u32>,
}

impl Record {
    /// Create an empty record for `kind`
    ///
    /// **Public** - used by the builder and by tests that need synthetic records
    pub fn new(key: impl Into<Vec<u8>>, kind: Kind, bytes: u64) -> Self {
        Self {
            key: key.into(),
            bytes,
            kind,
            encoding: String::new(),
            element_count: 0,
            largest_element_len: 0,
            largest_element_sample: None,
            database: 0,
            expire_at_millis: 0,
            idle_seconds: None,
            access_frequency: None,
        }
    }

    pub fn with_element_count(mut self, element_count: u64) -> Self {
        self.element_count = element_count;
        self
    }

    /// Offer an element for the largest-element slot
    ///
    /// The first element of a given length wins; later ties are ignored.
    pub fn observe_element(&mut self, len: u64, raw: &[u8]) {
        if len > self.largest_element_len {
            self.largest_element_len = len;
            self.largest_element_sample = Some(ElementSample::capture(raw));
        }
    }

    pub fn has_expiry(&self) -> bool {
        self.expire_at_millis > 0
    }

    /// Key as text for display and prefix grouping
    ///
    /// Invalid UTF-8 sequences are replaced, so distinct binary keys may
    /// render the same. Identity, ranking and slots use `key`.
    pub fn key_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.key)
    }
}

/// Lossless text form of key bytes
///
/// UTF-8 keys are written as-is. Anything else, and any key that would
/// itself read as encoded, is written as `hex:` followed by the hex bytes.
pub mod key_bytes {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub const HEX_PREFIX: &str = "hex:";

    pub fn encode(key: &[u8]) -> String {
        match std::str::from_utf8(key) {
            Ok(text) if !text.starts_with(HEX_PREFIX) => text.to_string(),
            _ => format!("{}{}", HEX_PREFIX, hex::encode(key)),
        }
    }

    pub fn decode(text: &str) -> Result<Vec<u8>, hex::FromHexError> {
        match text.strip_prefix(HEX_PREFIX) {
            Some(digits) => hex::decode(digits),
            None => Ok(text.as_bytes().to_vec()),
        }
    }

    pub fn serialize<S: Serializer>(key: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&encode(key))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        decode(&text).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trip() {
        for kind in Kind::ALL {
            assert_eq!(kind.as_str().parse::<Kind>().unwrap(), kind);
        }
        assert!("zset".parse::<Kind>().is_err());
    }

    #[test]
    fn test_kind_serde_names() {
        let json = serde_json::to_string(&Kind::SortedSet).unwrap();
        assert_eq!(json, "\"sortedset\"");
    }

    #[test]
    fn test_sample_truncation() {
        let long = vec![b'x'; 250];
        let sample = ElementSample::capture(&long);
        assert!(sample.truncated);
        assert_eq!(sample.text.len(), SAMPLE_LIMIT);
        assert!(sample.to_string().ends_with("..."));

        let short = ElementSample::capture(b"field");
        assert!(!short.truncated);
        assert_eq!(short.to_string(), "field");
    }

    #[test]
    fn test_sample_cut_inside_multibyte_char() {
        let mut raw = vec![b'a'; 99];
        raw.extend_from_slice("é".as_bytes());
        raw.extend_from_slice(&[b'b'; 20]);

        let sample = ElementSample::capture(&raw);
        assert!(sample.truncated);
        assert_eq!(sample.text, "a".repeat(99));
    }

    #[test]
    fn test_sample_of_invalid_utf8_stays_bounded() {
        // each 0xff becomes a 3-byte replacement character
        let raw = vec![0xffu8; 60];
        let sample = ElementSample::capture(&raw);
        assert!(sample.text.len() <= SAMPLE_LIMIT);
        assert_eq!(sample.text.chars().count(), 33);
        assert!(sample.truncated);
    }

    #[test]
    fn test_binary_key_serializes_losslessly() {
        let record = Record::new(b"\xff\xfeorder".to_vec(), Kind::String, 64);
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"key\":\"hex:fffe6f72646572\""));

        let back: Record = serde_json::from_str(&json).unwrap();
        assert_eq!(back.key, b"\xff\xfeorder");
        assert_eq!(back, record);
    }

    #[test]
    fn test_text_key_serializes_as_is() {
        assert_eq!(key_bytes::encode(b"user:1"), "user:1");
        assert_eq!(key_bytes::decode("user:1").unwrap(), b"user:1");
        // text that looks encoded is encoded again
        let tricky = key_bytes::encode(b"hex:00");
        assert_eq!(tricky, "hex:6865783a3030");
        assert_eq!(key_bytes::decode(&tricky).unwrap(), b"hex:00");
        assert!(key_bytes::decode("hex:zz").is_err());
    }

    #[test]
    fn test_observe_element_keeps_first_winner() {
        let mut record = Record::new("h", Kind::Hash, 0);
        record.observe_element(5, b"alpha");
        record.observe_element(5, b"bravo");
        record.observe_element(3, b"abc");
        assert_eq!(record.largest_element_len, 5);
        assert_eq!(record.largest_element_sample.unwrap().text, "alpha");
    }
}
