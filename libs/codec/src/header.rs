//! ASOA Frame Header Implementation
//!
//! The header is identical for all frames and carries routing, ordering and
//! integrity information for the ucdr payload that follows it.

use crate::error::{ProtocolError, ProtocolResult};
use crate::protocol::MessageType;
use crate::protocol_constants::{ASOA_MAGIC, ASOA_MAGIC_U32, HEADER_SIZE, PROTOCOL_VERSION};
use crate::validation::checksum::compute_checksum;
use serde::Serialize;
use zerocopy::byteorder::{LittleEndian, U16, U32, U64};
use zerocopy::{AsBytes, FromBytes, FromZeroes, Unaligned};

/// Raw on-the-wire header layout (32 bytes, little-endian, unaligned)
///
/// ```text
/// ┌───────┬───┬───┬──────┬──────┬──────────┬─────────┬──────────┬───────────┬─────┐
/// │ magic │ver│typ│ src  │ tgt  │ sequence │ length  │ checksum │ timestamp │ rsv │
/// │ 0..4  │ 4 │ 5 │ 6..8 │ 8..10│ 10..14   │ 14..18  │ 18..22   │ 22..30    │30.. │
/// └───────┴───┴───┴──────┴──────┴──────────┴─────────┴──────────┴───────────┴─────┘
/// ```
///
/// **CRITICAL**: byte-oriented integer wrappers keep the struct free of
/// padding. DO NOT replace them with native integers.
#[repr(C)]
#[derive(Debug, Clone, Copy, AsBytes, FromBytes, FromZeroes, Unaligned)]
struct WireHeader {
    magic: [u8; 4],
    version: u8,
    message_type: u8,
    source_service_id: U16<LittleEndian>,
    target_service_id: U16<LittleEndian>,
    sequence_number: U32<LittleEndian>,
    payload_length: U32<LittleEndian>,
    checksum: U32<LittleEndian>,
    timestamp_micros: U64<LittleEndian>,
    reserved: [u8; 2],
}
// Total: EXACTLY 32 bytes

/// Decoded ASOA frame header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PacketHeader {
    pub magic: [u8; 4],
    pub version: u8,
    pub message_type: MessageType,
    pub source_service_id: u16,
    pub target_service_id: u16,
    pub sequence_number: u32,
    pub payload_length: u32,
    pub checksum: u32,
    pub timestamp_micros: u64,
    /// Trailing bytes 30..32, preserved verbatim so re-encoding is lossless
    pub reserved: [u8; 2],
}

impl PacketHeader {
    /// Header size in bytes
    pub const SIZE: usize = HEADER_SIZE;

    /// Create a header for a new frame with the current timestamp
    ///
    /// Payload length and checksum stay zero until [`PacketHeader::with_payload`].
    pub fn new(
        message_type: MessageType,
        source_service_id: u16,
        target_service_id: u16,
        sequence_number: u32,
    ) -> Self {
        Self {
            magic: ASOA_MAGIC,
            version: PROTOCOL_VERSION,
            message_type,
            source_service_id,
            target_service_id,
            sequence_number,
            payload_length: 0,
            checksum: 0,
            timestamp_micros: current_timestamp_micros(),
            reserved: [0; 2],
        }
    }

    /// Decode the first 32 bytes of `bytes`
    ///
    /// Fails closed: short input, any magic mismatch and unknown message
    /// types are all errors. The checksum is NOT verified here.
    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        let wire = WireHeader::read_from_prefix(bytes).ok_or_else(|| {
            ProtocolError::message_too_small(HEADER_SIZE, bytes.len(), "PacketHeader decode")
        })?;

        if wire.magic != ASOA_MAGIC {
            return Err(ProtocolError::invalid_magic(
                ASOA_MAGIC_U32,
                u32::from_le_bytes(wire.magic),
            ));
        }

        let message_type = MessageType::try_from(wire.message_type).map_err(|_| {
            ProtocolError::UnknownMessageType {
                value: wire.message_type,
            }
        })?;

        Ok(Self {
            magic: wire.magic,
            version: wire.version,
            message_type,
            source_service_id: wire.source_service_id.get(),
            target_service_id: wire.target_service_id.get(),
            sequence_number: wire.sequence_number.get(),
            payload_length: wire.payload_length.get(),
            checksum: wire.checksum.get(),
            timestamp_micros: wire.timestamp_micros.get(),
            reserved: wire.reserved,
        })
    }

    /// Serialize the header alone
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let wire = WireHeader {
            magic: self.magic,
            version: self.version,
            message_type: self.message_type as u8,
            source_service_id: U16::new(self.source_service_id),
            target_service_id: U16::new(self.target_service_id),
            sequence_number: U32::new(self.sequence_number),
            payload_length: U32::new(self.payload_length),
            checksum: U32::new(self.checksum),
            timestamp_micros: U64::new(self.timestamp_micros),
            reserved: self.reserved,
        };

        let mut out = [0u8; HEADER_SIZE];
        out.copy_from_slice(wire.as_bytes());
        out
    }

    /// Serialize the header followed by the raw payload, exactly as given
    ///
    /// Exact inverse of [`PacketHeader::decode`]; no field is recomputed.
    pub fn encode(&self, payload: &[u8]) -> Vec<u8> {
        let mut frame = Vec::with_capacity(HEADER_SIZE + payload.len());
        frame.extend_from_slice(&self.to_bytes());
        frame.extend_from_slice(payload);
        frame
    }

    /// Set payload length and checksum to match `payload`
    pub fn with_payload(mut self, payload: &[u8]) -> Self {
        self.payload_length = payload.len() as u32;
        self.checksum = compute_checksum(&self, payload);
        self
    }

    /// Total frame length implied by this header
    pub fn frame_len(&self) -> usize {
        HEADER_SIZE + self.payload_length as usize
    }

    /// Age of the frame relative to the local clock, in microseconds
    pub fn age_micros(&self) -> u64 {
        current_timestamp_micros().saturating_sub(self.timestamp_micros)
    }
}

/// Build a complete frame with payload length and checksum filled in
pub fn encode_frame(header: &PacketHeader, payload: &[u8]) -> Vec<u8> {
    header.with_payload(payload).encode(payload)
}

/// Current wall-clock time in microseconds since the Unix epoch
pub fn current_timestamp_micros() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or_default()
}
