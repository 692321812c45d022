//! CRC-32C (Castagnoli) checksum utilities.

/// Compute the CRC-32C checksum of the given data.
pub fn checksum(data: &[u8]) -> u32 {
    crc32c::crc32c(data)
}
