//! # Frame Parser
//!
//! Splits a captured datagram into header and payload.
//!
//! ## Strictness
//!
//! - [`parse_frame`] fails closed on any header problem and on a payload
//!   shorter than the declared length. Bytes past the declared payload are
//!   ignored.
//! - [`parse_frame_verified`] additionally requires a matching checksum.
//! - [`parse_probe_header`] never fails. It exists only for discovery probing,
//!   where a best-guess header is more useful than an error. Nothing that
//!   classifies or forwards traffic may use it.

use crate::error::{ProtocolError, ProtocolResult};
use crate::header::PacketHeader;
use crate::protocol::MessageType;
use crate::protocol_constants::HEADER_SIZE;
use crate::validation::checksum::compute_checksum;
use tracing::debug;

/// A parsed frame borrowing its payload from the capture buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame<'a> {
    pub header: PacketHeader,
    /// Exactly `header.payload_length` bytes
    pub payload: &'a [u8],
}

impl<'a> Frame<'a> {
    /// Recompute the checksum and compare against the header
    pub fn checksum_valid(&self) -> bool {
        compute_checksum(&self.header, self.payload) == self.header.checksum
    }

    /// Re-serialize exactly as parsed (trailing bytes dropped)
    pub fn to_vec(&self) -> Vec<u8> {
        self.header.encode(self.payload)
    }
}

/// Parse header and payload without checking the checksum
pub fn parse_frame(bytes: &[u8]) -> ProtocolResult<Frame<'_>> {
    let header = PacketHeader::decode(bytes)?;

    let declared = header.payload_length as usize;
    let available = bytes.len() - HEADER_SIZE;
    if declared > available {
        return Err(ProtocolError::PayloadLengthMismatch {
            declared,
            available,
        });
    }

    Ok(Frame {
        header,
        payload: &bytes[HEADER_SIZE..HEADER_SIZE + declared],
    })
}

/// Parse and require a matching checksum
pub fn parse_frame_verified(bytes: &[u8]) -> ProtocolResult<Frame<'_>> {
    let frame = parse_frame(bytes)?;
    let calculated = compute_checksum(&frame.header, frame.payload);
    if calculated != frame.header.checksum {
        return Err(ProtocolError::checksum_mismatch(
            frame.header.checksum,
            calculated,
            HEADER_SIZE + frame.payload.len(),
        ));
    }
    Ok(frame)
}

/// Lenient header parse for discovery probes
///
/// Returns the decoded header when possible and a zeroed header (zero magic,
/// version, ids and counters, `Discovery` type) otherwise.
pub fn parse_probe_header(bytes: &[u8]) -> PacketHeader {
    match PacketHeader::decode(bytes) {
        Ok(header) => header,
        Err(e) => {
            debug!(error = %e, len = bytes.len(), "probe header unreadable, using zeroed header");
            zeroed_header()
        }
    }
}

fn zeroed_header() -> PacketHeader {
    PacketHeader {
        magic: [0; 4],
        version: 0,
        message_type: MessageType::Discovery,
        source_service_id: 0,
        target_service_id: 0,
        sequence_number: 0,
        payload_length: 0,
        checksum: 0,
        timestamp_micros: 0,
        reserved: [0; 2],
    }
}
