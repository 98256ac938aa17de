//! Synchsafe integer decoding.
//!
//! ID3v2 size fields store 7 bits per byte, most significant byte first, so
//! that no size field can contain an MPEG sync pattern (`0xFF 0xE0`).
//!
//! The high bit of each byte is expected to be zero but is not masked off:
//! a malformed byte inflates the result instead of being silently repaired.
//! Use [`is_synchsafe`] to detect such input.

/// Decode a synchsafe integer of up to 9 bytes.
///
/// Computes `Σ bytes[i] · 128^(N-1-i)`.
pub fn decode(bytes: &[u8]) -> u64 {
    debug_assert!(bytes.len() <= 9, "synchsafe integer wider than 63 bits");
    bytes
        .iter()
        .fold(0u64, |acc, &byte| (acc << 7) + u64::from(byte))
}

/// Decode a 4-byte synchsafe size field.
pub fn decode_u32(bytes: [u8; 4]) -> u32 {
    // 4 * 7 bits plus at most one carry bit per byte fits in 32 bits
    decode(&bytes) as u32
}

/// Returns true if no byte has its high bit set.
pub fn is_synchsafe(bytes: &[u8]) -> bool {
    bytes.iter().all(|&byte| byte & 0x80 == 0)
}
