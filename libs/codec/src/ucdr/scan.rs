//! Raw tag scan for payloads whose schema is unknown
//!
//! Best effort only. The scan looks for a little-endian u32 equal to the tag
//! and reads the following 4 bytes as an f32. Any field whose value happens
//! to equal the tag is a false positive, so results come back as
//! [`TaggedReading`] and are never mixed with schema-verified decodes.

use byteorder::{ByteOrder, LittleEndian};

/// A reading located by the raw scan
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TaggedReading {
    /// Offset of the f32 (not of the tag) within the payload
    pub offset: usize,
    pub value: f32,
}

/// Find the first `tag` followed by a complete f32
///
/// Every byte offset is tried, including the last position where a tag and
/// its value still fit.
pub fn find_tagged_value(bytes: &[u8], tag: u32) -> Option<TaggedReading> {
    if bytes.len() < 8 {
        return None;
    }

    (0..=bytes.len() - 8).find_map(|i| {
        if LittleEndian::read_u32(&bytes[i..i + 4]) != tag {
            return None;
        }
        Some(TaggedReading {
            offset: i + 4,
            value: LittleEndian::read_f32(&bytes[i + 4..i + 8]),
        })
    })
}

/// Overwrite the first tagged reading in place
///
/// Returns the reading that was replaced, or `None` when no tag was found
/// and the buffer is unchanged.
pub fn replace_tagged_value(bytes: &mut [u8], tag: u32, value: f32) -> Option<TaggedReading> {
    let found = find_tagged_value(bytes, tag)?;
    LittleEndian::write_f32(&mut bytes[found.offset..found.offset + 4], value);
    Some(found)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tagged(prefix: &[u8], tag: u32, value: f32) -> Vec<u8> {
        let mut bytes = prefix.to_vec();
        bytes.extend_from_slice(&tag.to_le_bytes());
        bytes.extend_from_slice(&value.to_le_bytes());
        bytes
    }

    #[test]
    fn test_finds_unaligned_tag() {
        let bytes = tagged(&[0xAA, 0xBB, 0xCC], 15, 42.0);
        let found = find_tagged_value(&bytes, 15).unwrap();
        assert_eq!(found.offset, 7);
        assert_eq!(found.value, 42.0);
    }

    #[test]
    fn test_tag_at_last_possible_offset() {
        // The tag+value pair ends exactly at the buffer end
        let bytes = tagged(&[1, 2, 3, 4, 5], 15, -3.5);
        assert_eq!(find_tagged_value(&bytes, 15).map(|r| r.value), Some(-3.5));
    }

    #[test]
    fn test_tag_without_value_not_found() {
        let mut bytes = vec![0u8; 4];
        bytes.extend_from_slice(&15u32.to_le_bytes());
        bytes.extend_from_slice(&[0, 0]);
        assert_eq!(find_tagged_value(&bytes, 15), None);
        assert_eq!(find_tagged_value(&[15, 0, 0], 15), None);
    }

    #[test]
    fn test_first_match_wins() {
        let mut bytes = tagged(&[], 15, 1.0);
        bytes.extend_from_slice(&tagged(&[], 15, 2.0));
        assert_eq!(find_tagged_value(&bytes, 15).unwrap().value, 1.0);
    }

    #[test]
    fn test_replace_in_place() {
        let mut bytes = tagged(&[9, 9], 15, 25.5);
        let before = bytes.clone();
        let replaced = replace_tagged_value(&mut bytes, 15, 99.0).unwrap();

        assert_eq!(replaced.value, 25.5);
        assert_eq!(&bytes[..replaced.offset], &before[..replaced.offset]);
        assert_eq!(find_tagged_value(&bytes, 15).unwrap().value, 99.0);
    }

    #[test]
    fn test_replace_without_tag_leaves_buffer() {
        let mut bytes = vec![1u8; 16];
        let before = bytes.clone();
        assert!(replace_tagged_value(&mut bytes, 15, 1.0).is_none());
        assert_eq!(bytes, before);
    }
}
