//! Single-byte modular checksum over an API frame payload.
//!
//! An integrity check against line noise, not an authenticity check.

/// Checksum of `payload`: `0xFF - (sum(payload) mod 256)`.
pub fn compute(payload: &[u8]) -> u8 {
    0xFF - sum(payload)
}

/// True when `claimed` is the checksum of `payload`.
///
/// Equivalent to the receive-side rule that payload bytes plus checksum
/// sum to `0xFF` modulo 256.
pub fn verify(payload: &[u8], claimed: u8) -> bool {
    sum(payload).wrapping_add(claimed) == 0xFF
}

fn sum(payload: &[u8]) -> u8 {
    payload.iter().fold(0u8, |acc, &b| acc.wrapping_add(b))
}
