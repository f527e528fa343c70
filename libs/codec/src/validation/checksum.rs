//! XOR-Fold Frame Checksum
//!
//! The ASOA checksum XORs the frame together as little-endian 4-byte words,
//! zero-padding the final partial word. It is computed over the header with
//! the checksum field zeroed, followed by the payload.
//!
//! This is tamper evidence against casual corruption only: two identical bit
//! flips in different 4-byte lanes cancel out, and anyone can recompute it.

use crate::header::PacketHeader;
use crate::protocol_constants::{CHECKSUM_OFFSET, CHECKSUM_SIZE, HEADER_SIZE};

/// XOR-fold an arbitrary byte slice into a u32
pub fn xor_fold(data: &[u8]) -> u32 {
    let mut hasher = StreamingChecksum::new();
    hasher.update(data);
    hasher.finalize()
}

/// Compute the checksum a frame with this header and payload must carry
///
/// The header's own `checksum` value is ignored.
pub fn compute_checksum(header: &PacketHeader, payload: &[u8]) -> u32 {
    let mut header_bytes = header.to_bytes();
    header_bytes[CHECKSUM_OFFSET..CHECKSUM_OFFSET + CHECKSUM_SIZE].fill(0);

    let mut hasher = StreamingChecksum::new();
    hasher.update(&header_bytes);
    hasher.update(payload);
    hasher.finalize()
}

/// Compute the checksum of a raw frame buffer without mutating it
///
/// Everything past the header is treated as payload. Returns `None` for
/// buffers shorter than a header.
pub fn frame_checksum(frame: &[u8]) -> Option<u32> {
    if frame.len() < HEADER_SIZE {
        return None;
    }

    let mut header_bytes = [0u8; HEADER_SIZE];
    header_bytes.copy_from_slice(&frame[..HEADER_SIZE]);
    header_bytes[CHECKSUM_OFFSET..CHECKSUM_OFFSET + CHECKSUM_SIZE].fill(0);

    let mut hasher = StreamingChecksum::new();
    hasher.update(&header_bytes);
    hasher.update(&frame[HEADER_SIZE..]);
    Some(hasher.finalize())
}

/// Decode the header, recompute the checksum and compare
///
/// Only the declared `payload_length` bytes take part; trailing bytes are
/// ignored. Any decode failure or truncated payload yields `false`.
pub fn verify_checksum(frame: &[u8]) -> bool {
    let header = match PacketHeader::decode(frame) {
        Ok(header) => header,
        Err(_) => return false,
    };

    let end = HEADER_SIZE + header.payload_length as usize;
    if frame.len() < end {
        return false;
    }

    compute_checksum(&header, &frame[HEADER_SIZE..end]) == header.checksum
}

/// Calculate and embed the checksum into a mutable frame buffer
///
/// Buffers shorter than a header are left untouched.
pub fn embed_checksum(frame: &mut [u8]) {
    if let Some(checksum) = frame_checksum(frame) {
        frame[CHECKSUM_OFFSET..CHECKSUM_OFFSET + CHECKSUM_SIZE]
            .copy_from_slice(&checksum.to_le_bytes());
    }
}

/// Incremental XOR-fold for frames assembled from several slices
///
/// Word boundaries are tracked across `update` calls, so feeding a buffer in
/// pieces gives the same result as feeding it whole.
#[derive(Debug, Clone, Default)]
pub struct StreamingChecksum {
    acc: u32,
    pending: [u8; 4],
    pending_len: usize,
}

impl StreamingChecksum {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, mut data: &[u8]) {
        // Complete a word left over from the previous call
        if self.pending_len > 0 {
            let take = (4 - self.pending_len).min(data.len());
            self.pending[self.pending_len..self.pending_len + take].copy_from_slice(&data[..take]);
            self.pending_len += take;
            data = &data[take..];

            if self.pending_len < 4 {
                return;
            }
            self.acc ^= u32::from_le_bytes(self.pending);
            self.pending_len = 0;
        }

        let mut words = data.chunks_exact(4);
        for word in &mut words {
            self.acc ^= u32::from_le_bytes([word[0], word[1], word[2], word[3]]);
        }

        let rest = words.remainder();
        self.pending[..rest.len()].copy_from_slice(rest);
        self.pending_len = rest.len();
    }

    pub fn finalize(self) -> u32 {
        if self.pending_len == 0 {
            return self.acc;
        }
        let mut last = [0u8; 4];
        last[..self.pending_len].copy_from_slice(&self.pending[..self.pending_len]);
        self.acc ^ u32::from_le_bytes(last)
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::encode_frame;
    use crate::protocol::MessageType;

    #[test]
    fn test_xor_fold_words() {
        assert_eq!(xor_fold(&[]), 0);
        assert_eq!(xor_fold(&[1, 0, 0, 0]), 1);
        assert_eq!(xor_fold(&[1, 0, 0, 0, 1, 0, 0, 0]), 0);
        assert_eq!(
            xor_fold(&[0x78, 0x56, 0x34, 0x12, 0xFF, 0xFF, 0xFF, 0xFF]),
            0x1234_5678 ^ 0xFFFF_FFFF
        );
    }

    #[test]
    fn test_partial_word_zero_padded() {
        // 0x11 0x22 → 0x00002211
        assert_eq!(xor_fold(&[0x11, 0x22]), 0x0000_2211);
        assert_eq!(xor_fold(&[0, 0, 0, 0, 0x11, 0x22]), 0x0000_2211);
    }

    #[test]
    fn test_streaming_matches_one_shot() {
        let data: Vec<u8> = (0u8..=41).collect();
        let one_shot = xor_fold(&data);

        for split in [0usize, 1, 3, 4, 5, 17, 41, 42] {
            let mut hasher = StreamingChecksum::new();
            hasher.update(&data[..split]);
            hasher.update(&data[split..]);
            assert_eq!(hasher.finalize(), one_shot, "split at {split}");
        }

        let mut bytewise = StreamingChecksum::new();
        for byte in &data {
            bytewise.update(std::slice::from_ref(byte));
        }
        assert_eq!(bytewise.finalize(), one_shot);
    }

    #[test]
    fn test_streaming_reset() {
        let mut hasher = StreamingChecksum::new();
        hasher.update(b"other data");
        hasher.reset();
        hasher.update(b"test data");
        assert_eq!(hasher.finalize(), xor_fold(b"test data"));
    }

    #[test]
    fn test_checksum_field_excluded() {
        let header = PacketHeader::new(MessageType::Heartbeat, 3, 4, 9);
        let mut frame = encode_frame(&header, b"abc");
        let expected = frame_checksum(&frame).unwrap();

        frame[CHECKSUM_OFFSET..CHECKSUM_OFFSET + CHECKSUM_SIZE].fill(0xAB);
        assert_eq!(frame_checksum(&frame), Some(expected));
    }

    #[test]
    fn test_verify_detects_edits() {
        let header = PacketHeader::new(MessageType::GuaranteeData, 1, 2, 100);
        let mut frame = encode_frame(&header, &[1, 2, 3, 4, 5, 6, 7]);
        assert!(verify_checksum(&frame));

        frame[8] ^= 0x01; // target service id
        assert!(!verify_checksum(&frame));

        embed_checksum(&mut frame);
        assert!(verify_checksum(&frame));

        let last = frame.len() - 1;
        frame[last] ^= 0x80;
        assert!(!verify_checksum(&frame));
    }

    #[test]
    fn test_verify_rejects_truncated_and_short() {
        let header = PacketHeader::new(MessageType::GuaranteeData, 1, 2, 100);
        let frame = encode_frame(&header, &[9; 12]);
        assert!(!verify_checksum(&frame[..frame.len() - 1]));
        assert!(!verify_checksum(&frame[..20]));
    }

    #[test]
    fn test_same_lane_double_flip_cancels() {
        // Known weakness of the XOR fold: flipping the same bit in two
        // words leaves the checksum unchanged.
        let header = PacketHeader::new(MessageType::GuaranteeData, 1, 2, 100);
        let mut frame = encode_frame(&header, &[0u8; 8]);
        frame[32] ^= 0x01;
        frame[36] ^= 0x01;
        assert!(verify_checksum(&frame));
    }
}
