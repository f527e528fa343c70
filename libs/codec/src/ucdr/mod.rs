//! ucdr (micro CDR) payload codec
//!
//! ## Layout Rules
//! - Fields appear in schema order, each aligned to its own width
//!   (strings align their 4-byte length prefix)
//! - Numerics are fixed-width little-endian
//! - Strings are a u32 length followed by raw bytes, no terminator and no
//!   trailing padding
//!
//! The [`scan`] module is a separate, unverified path for payloads that do
//! not match any known schema.

pub mod decoder;
pub mod encoder;
pub mod scan;
pub mod schema;
pub mod types;

pub use decoder::{decode, decode_fields, decode_required};
pub use encoder::encode;
pub use scan::{find_tagged_value, replace_tagged_value, TaggedReading};
pub use schema::{
    serialized_size, Schema, UcdrField, UcdrMap, FIELD_ACCURACY, FIELD_TEMPERATURE,
    FIELD_TOPIC_ID, FIELD_TOPIC_NAME,
};
pub use types::{UcdrType, UcdrValue};

use crate::error::ProtocolResult;
use crate::protocol_constants::TEMPERATURE_TOPIC_ID;
use crate::validation::PlausibleRange;
use tracing::debug;

/// Label carried by temperature payloads built here
pub const TEMPERATURE_TOPIC_NAME: &str = "Temperature";

/// Sanity gate for a decoded payload
///
/// Every schema field must decode, and every float field must lie within
/// `range`.
pub fn validate(bytes: &[u8], schema: &Schema, range: &PlausibleRange) -> bool {
    let map = match decode_required(bytes, schema) {
        Ok(map) => map,
        Err(e) => {
            debug!(error = %e, "ucdr validation failed");
            return false;
        }
    };

    let plausible = map
        .iter()
        .filter(|(_, value)| value.ucdr_type().is_float())
        .all(|(name, value)| {
            let in_range = value.as_f64().is_some_and(|v| range.contains(v));
            if !in_range {
                debug!(field = name, ?value, "ucdr value outside plausible range");
            }
            in_range
        });
    plausible
}

/// Encode a standard temperature block for the temperature topic
pub fn create_temperature_payload(value: f32, accuracy: f32) -> ProtocolResult<Vec<u8>> {
    let map = UcdrMap::new()
        .with(FIELD_TOPIC_ID, UcdrValue::U32(TEMPERATURE_TOPIC_ID))
        .with(
            FIELD_TOPIC_NAME,
            UcdrValue::String(TEMPERATURE_TOPIC_NAME.to_string()),
        )
        .with(FIELD_TEMPERATURE, UcdrValue::F32(value))
        .with(FIELD_ACCURACY, UcdrValue::F32(accuracy));
    encode(&map, &Schema::temperature())
}
