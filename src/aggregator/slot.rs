//! Cluster hash-slot assignment.

use crate::utils::config::SLOT_COUNT;
use crc::{Crc, CRC_16_XMODEM};

const SLOT_CRC: Crc<u16> = Crc::<u16>::new(&CRC_16_XMODEM);

/// Portion of the key that is hashed
///
/// When the key contains `{...}` with a non-empty body, only the body between
/// the first `{` and the next `}` is hashed, so related keys share a slot.
pub fn hash_tag(key: &[u8]) -> &[u8] {
    if let Some(open) = key.iter().position(|&b| b == b'{') {
        let rest = &key[open + 1..];
        if let Some(close) = rest.iter().position(|&b| b == b'}') {
            if close > 0 {
                return &rest[..close];
            }
        }
    }
    key
}

/// Slot in `0..SLOT_COUNT` owning `key`
pub fn key_slot(key: &[u8]) -> u16 {
    SLOT_CRC.checksum(hash_tag(key)) & (SLOT_COUNT - 1)
}
