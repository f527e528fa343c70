//! # Frame Analysis
//!
//! Classifies captured frames and locates the tagged sensor reading.
//!
//! Reading lookup is two-tier and the result says which tier answered:
//! 1. Structured decode against the known temperature schemas, accepted only
//!    when every field decodes and `topic_id` equals the tag. A labelled
//!    block cut short after its label never falls back to the minimal
//!    schema.
//! 2. Raw tag scan ([`codec::find_tagged_value`]), a best-effort fallback
//!    that can return false positives.

use crate::directory::ServiceDirectory;
use codec::ucdr::{FIELD_TEMPERATURE, FIELD_TOPIC_ID};
use codec::{
    decode_fields, find_tagged_value, parse_frame, serialized_size, MessageType, PacketHeader,
    ProtocolResult, Schema, UcdrField, UcdrValue,
};
use serde::Serialize;
use std::collections::BTreeMap;

/// How a reading was located
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadingSource {
    /// Verified by a full schema decode
    Decoded,
    /// Found by the heuristic tag scan only
    RawScan,
}

/// A tagged reading and where it sits in the payload
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LocatedReading {
    pub value: f32,
    /// Offset of the f32 within the payload
    pub offset: usize,
    pub source: ReadingSource,
}

impl LocatedReading {
    pub fn is_verified(&self) -> bool {
        self.source == ReadingSource::Decoded
    }
}

/// A payload block that decoded cleanly under one of the known schemas
#[derive(Debug, Clone)]
pub(crate) struct DecodedBlock {
    pub schema: Schema,
    /// End of the last decoded field; bytes after it are carried verbatim
    pub end: usize,
    pub reading: LocatedReading,
}

/// Structured decode of a tagged temperature block
///
/// The labelled schema is tried first. The minimal schema is only tried
/// when the labelled decode stopped right after `topic_id` or the payload
/// is exactly one minimal block. A longer block that got as far as
/// `topic_name` carries a length prefix where the minimal schema expects
/// the reading.
pub(crate) fn decode_tagged_block(payload: &[u8], tag: u32) -> Option<DecodedBlock> {
    let full = Schema::temperature();
    let fields = decode_fields(payload, &full);
    if fields.len() == full.len() {
        return tagged_block(fields, full, tag);
    }
    let minimal = Schema::temperature_minimal();
    if fields.len() > 1 && payload.len() != serialized_size(&minimal) {
        return None;
    }

    let fields = decode_fields(payload, &minimal);
    if fields.len() != minimal.len() {
        return None;
    }
    tagged_block(fields, minimal, tag)
}

fn tagged_block(fields: Vec<UcdrField>, schema: Schema, tag: u32) -> Option<DecodedBlock> {
    if field_value(&fields, FIELD_TOPIC_ID).and_then(UcdrValue::as_u32) != Some(tag) {
        return None;
    }

    let temperature = fields.iter().find(|f| f.name == FIELD_TEMPERATURE)?;
    let reading = LocatedReading {
        value: temperature.value.as_f32()?,
        offset: temperature.offset,
        source: ReadingSource::Decoded,
    };
    let end = fields.iter().map(UcdrField::end).max().unwrap_or(0);

    Some(DecodedBlock {
        schema,
        end,
        reading,
    })
}

fn field_value<'a>(fields: &'a [UcdrField], name: &str) -> Option<&'a UcdrValue> {
    fields.iter().find(|f| f.name == name).map(|f| &f.value)
}

/// Locate the tagged reading, structured decode first
pub fn locate_reading(payload: &[u8], tag: u32) -> Option<LocatedReading> {
    if let Some(block) = decode_tagged_block(payload, tag) {
        return Some(block.reading);
    }
    find_tagged_value(payload, tag).map(|found| LocatedReading {
        value: found.value,
        offset: found.offset,
        source: ReadingSource::RawScan,
    })
}

/// Summary of one captured frame
#[derive(Debug, Clone, Serialize)]
pub struct FrameAnalysis {
    pub header: PacketHeader,
    pub payload_len: usize,
    pub source_label: String,
    pub target_label: String,
    pub reading: Option<LocatedReading>,
    pub checksum_valid: bool,
}

impl FrameAnalysis {
    /// `Source->Target` using directory labels
    pub fn flow_key(&self) -> String {
        format!("{}->{}", self.source_label, self.target_label)
    }

    pub fn message_type(&self) -> MessageType {
        self.header.message_type
    }

    pub fn has_reading(&self) -> bool {
        self.reading.is_some()
    }
}

/// Decode and label a frame
///
/// Header problems are errors; a bad checksum is reported in the result.
/// Both service ids are recorded as observed in `directory`.
pub fn analyze(
    frame: &[u8],
    directory: &ServiceDirectory,
    tag: u32,
) -> ProtocolResult<FrameAnalysis> {
    let parsed = parse_frame(frame)?;
    let header = parsed.header;
    directory.observe(header.source_service_id, header.target_service_id);

    Ok(FrameAnalysis {
        header,
        payload_len: parsed.payload.len(),
        source_label: directory.label(header.source_service_id),
        target_label: directory.label(header.target_service_id),
        reading: locate_reading(parsed.payload, tag),
        checksum_valid: parsed.checksum_valid(),
    })
}

/// Group analyses by `Source->Target` flow
pub fn group_flows(frames: &[FrameAnalysis]) -> BTreeMap<String, Vec<&FrameAnalysis>> {
    let mut flows: BTreeMap<String, Vec<&FrameAnalysis>> = BTreeMap::new();
    for frame in frames {
        flows.entry(frame.flow_key()).or_default().push(frame);
    }
    flows
}

/// Analyses that carry a tagged reading
pub fn temperature_flows(frames: &[FrameAnalysis]) -> Vec<&FrameAnalysis> {
    frames.iter().filter(|f| f.has_reading()).collect()
}
