//! # ASOA Protocol Codec
//!
//! ## Purpose
//!
//! This crate contains the "Rules" layer of the interceptor:
//! - Fixed 32-byte frame header decoding/encoding
//! - XOR-fold integrity checksum computation and verification
//! - ucdr (micro CDR) schema-driven payload decoding/encoding
//! - Heuristic tag scan for payloads whose schema is unknown
//!
//! ## Architecture Role
//!
//! ```text
//! capture → [codec] → interceptor (mutation, pipeline) → injection
//!              ↓
//!     PacketHeader / UcdrMap
//! ```
//!
//! ## Wire Format
//!
//! ```text
//! ┌──────────────────────┬─────────────────────────────────────┐
//! │ PacketHeader         │ ucdr payload                        │
//! │ (32 bytes, LE)       │ (payload_length bytes)              │
//! └──────────────────────┴─────────────────────────────────────┘
//! ```
//!
//! ## What This Crate Does NOT Contain
//! - Mutation logic or directives (belongs in interceptor/)
//! - Capture, injection or link-layer transport
//! - Service name registries

pub mod error;
pub mod header;
pub mod parser;
pub mod protocol;
pub mod protocol_constants;
pub mod ucdr;
pub mod validation;

// Re-export key types for convenience
pub use error::{ProtocolError, ProtocolResult};
pub use header::{current_timestamp_micros, encode_frame, PacketHeader};
pub use parser::{parse_frame, parse_frame_verified, parse_probe_header, Frame};
pub use protocol::MessageType;
pub use protocol_constants::*;
pub use ucdr::{
    create_temperature_payload, decode, decode_fields, decode_required, encode,
    find_tagged_value, replace_tagged_value, serialized_size, validate, Schema, TaggedReading,
    UcdrField, UcdrMap, UcdrType, UcdrValue,
};
pub use validation::{
    compute_checksum, embed_checksum, frame_checksum, verify_checksum, xor_fold, PlausibleRange,
    StreamingChecksum,
};
