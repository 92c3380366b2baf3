//! Payload masking transform (RFC 6455 Section 5.3).

/// Apply the cyclic XOR masking transform in place.
///
/// Masking is its own inverse: applying the same key twice restores the
/// original payload.
#[inline]
pub fn apply_mask(data: &mut [u8], mask: [u8; 4]) {
    for (i, byte) in data.iter_mut().enumerate() {
        *byte ^= mask[i % 4];
    }
}

/// Generate a fresh random masking key.
///
/// Falls back to system time if the OS entropy source fails.
#[must_use]
pub(crate) fn random_mask() -> [u8; 4] {
    let mut key = [0u8; 4];
    if getrandom::getrandom(&mut key).is_err() {
        use std::time::{SystemTime, UNIX_EPOCH};
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u32)
            .unwrap_or(0x12345678);
        key = nanos.to_le_bytes();
    }
    key
}
