//! 24-bit address encoding

use crate::geometry::ADDRESS_BYTES;

/// Encode a physical address big-endian (most significant byte first)
///
/// Only the low 24 bits are kept; callers pass addresses that went through
/// [`crate::geometry::Address`] and therefore always fit.
pub const fn encode_address(address: u32) -> [u8; ADDRESS_BYTES] {
    [(address >> 16) as u8, (address >> 8) as u8, address as u8]
}

/// Decode a big-endian 24-bit address
pub const fn decode_address(bytes: [u8; ADDRESS_BYTES]) -> u32 {
    ((bytes[0] as u32) << 16) | ((bytes[1] as u32) << 8) | bytes[2] as u32
}
