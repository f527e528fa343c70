//! # Protocol Constants
//!
//! Central registry of ASOA wire constants. These values are fixed by the
//! modules on the bus and must not drift between decode and encode paths.

/// Frame magic, the ASCII bytes "ASOA"
pub const ASOA_MAGIC: [u8; 4] = *b"ASOA";

/// Frame magic read as a little-endian u32 (used for diagnostics)
pub const ASOA_MAGIC_U32: u32 = u32::from_le_bytes(ASOA_MAGIC);

/// Protocol version written into freshly built headers
pub const PROTOCOL_VERSION: u8 = 1;

/// Fixed header size in bytes
pub const HEADER_SIZE: usize = 32;

/// Byte offset of the checksum field inside the header
pub const CHECKSUM_OFFSET: usize = 18;

/// Width of the checksum field
pub const CHECKSUM_SIZE: usize = 4;

/// UDP port the ASOA runtime communicates on
pub const ASOA_UDP_PORT: u16 = 7400;

/// Topic tag of the temperature reading block
pub const TEMPERATURE_TOPIC_ID: u32 = 15;

/// Largest frame that fits into a single UDP datagram
pub const MAX_FRAME_SIZE: usize = 65_507;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_magic_representations_agree() {
        assert_eq!(&ASOA_MAGIC_U32.to_le_bytes(), b"ASOA");
        assert_eq!(ASOA_MAGIC_U32, 0x414F_5341);
    }

    #[test]
    fn test_checksum_field_inside_header() {
        assert!(CHECKSUM_OFFSET + CHECKSUM_SIZE <= HEADER_SIZE);
    }
}
