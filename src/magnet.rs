//! Magnet validation and on-disk sharding.
//!
//! A magnet is a 64-character lowercase hex string encoding the keccak-256
//! digest of a bundle's byte stream.

use crate::error::MagnetError;

/// `true` iff `s` is 64 characters, all lowercase hex.
pub fn is_magnet(s: &str) -> bool {
    s.len() == 64 && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// Split a magnet into its four 16-char shard segments.
///
/// # Errors
/// `MagnetError::InvalidMagnet` if `magnet` does not validate.
pub fn shard_path(magnet: &str) -> Result<[&str; 4], MagnetError> {
    if !is_magnet(magnet) {
        return Err(MagnetError::InvalidMagnet(magnet.to_string()));
    }
    Ok([
        &magnet[0..16],
        &magnet[16..32],
        &magnet[32..48],
        &magnet[48..64],
    ])
}
