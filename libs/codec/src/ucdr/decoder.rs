//! Schema-driven ucdr decoding
//!
//! Fields are walked in schema order with the cursor aligned before each
//! one. Decoding never fails: when the remaining bytes cannot hold a field,
//! that field and every field after it are left out of the result. Callers
//! that need a field must check for it (see [`decode_required`]).

use super::schema::{Schema, UcdrField, UcdrMap};
use super::types::{UcdrType, UcdrValue};
use crate::error::{ProtocolError, ProtocolResult};
use crate::validation::bounds::align_offset;
use byteorder::{ByteOrder, LittleEndian};
use tracing::trace;

/// Decode every field that fits, with offsets and sizes
pub fn decode_fields(bytes: &[u8], schema: &Schema) -> Vec<UcdrField> {
    let mut fields = Vec::with_capacity(schema.len());
    let mut cursor = 0usize;

    for (name, ty) in schema.iter() {
        let offset = align_offset(cursor, ty.alignment());
        match read_value(bytes, offset, ty) {
            Some((value, size)) => {
                fields.push(UcdrField {
                    name: name.to_string(),
                    ty,
                    offset,
                    size,
                    alignment: ty.alignment(),
                    value,
                });
                cursor = offset + size;
            }
            None => {
                // Later fields sit at offsets we can no longer derive
                trace!(
                    field = name,
                    offset,
                    available = bytes.len(),
                    "ucdr field truncated, stopping decode"
                );
                break;
            }
        }
    }

    fields
}

/// Decode into a name → value map
pub fn decode(bytes: &[u8], schema: &Schema) -> UcdrMap {
    decode_fields(bytes, schema)
        .into_iter()
        .map(|field| (field.name, field.value))
        .collect()
}

/// Decode and insist that every schema field is present
pub fn decode_required(bytes: &[u8], schema: &Schema) -> ProtocolResult<UcdrMap> {
    let map = decode(bytes, schema);
    if let Some((missing, _)) = schema.iter().find(|(name, _)| !map.contains(name)) {
        return Err(ProtocolError::MissingField {
            field: missing.to_string(),
        });
    }
    Ok(map)
}

/// Read one value at an already-aligned offset, returning it and its size
fn read_value(bytes: &[u8], offset: usize, ty: UcdrType) -> Option<(UcdrValue, usize)> {
    if ty == UcdrType::String {
        let prefix = bytes.get(offset..offset.checked_add(4)?)?;
        let len = LittleEndian::read_u32(prefix) as usize;
        let start = offset + 4;
        let raw = bytes.get(start..start.checked_add(len)?)?;
        let text = String::from_utf8_lossy(raw).into_owned();
        return Some((UcdrValue::String(text), 4 + len));
    }

    let size = ty.fixed_size()?;
    let raw = bytes.get(offset..offset.checked_add(size)?)?;
    let value = match ty {
        UcdrType::I8 => UcdrValue::I8(raw[0] as i8),
        UcdrType::U8 => UcdrValue::U8(raw[0]),
        UcdrType::I16 => UcdrValue::I16(LittleEndian::read_i16(raw)),
        UcdrType::U16 => UcdrValue::U16(LittleEndian::read_u16(raw)),
        UcdrType::I32 => UcdrValue::I32(LittleEndian::read_i32(raw)),
        UcdrType::U32 => UcdrValue::U32(LittleEndian::read_u32(raw)),
        UcdrType::I64 => UcdrValue::I64(LittleEndian::read_i64(raw)),
        UcdrType::U64 => UcdrValue::U64(LittleEndian::read_u64(raw)),
        UcdrType::F32 => UcdrValue::F32(LittleEndian::read_f32(raw)),
        UcdrType::F64 => UcdrValue::F64(LittleEndian::read_f64(raw)),
        UcdrType::String => return None,
    };
    Some((value, size))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ucdr::schema::{FIELD_ACCURACY, FIELD_TEMPERATURE, FIELD_TOPIC_ID, FIELD_TOPIC_NAME};

    fn temperature_bytes() -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&15u32.to_le_bytes());
        bytes.extend_from_slice(&4u32.to_le_bytes());
        bytes.extend_from_slice(b"Temp");
        bytes.extend_from_slice(&25.5f32.to_le_bytes());
        bytes.extend_from_slice(&0.1f32.to_le_bytes());
        bytes
    }

    #[test]
    fn test_decode_temperature_block() {
        let map = decode(&temperature_bytes(), &Schema::temperature());
        assert_eq!(map.get(FIELD_TOPIC_ID), Some(&UcdrValue::U32(15)));
        assert_eq!(map.get(FIELD_TOPIC_NAME), Some(&UcdrValue::String("Temp".into())));
        assert_eq!(map.get(FIELD_TEMPERATURE), Some(&UcdrValue::F32(25.5)));
        assert_eq!(map.get(FIELD_ACCURACY), Some(&UcdrValue::F32(0.1)));
    }

    #[test]
    fn test_field_offsets() {
        let fields = decode_fields(&temperature_bytes(), &Schema::temperature());
        let layout: Vec<_> = fields.iter().map(|f| (f.offset, f.size)).collect();
        assert_eq!(layout, vec![(0, 4), (4, 8), (12, 4), (16, 4)]);
    }

    #[test]
    fn test_alignment_padding_skipped() {
        let schema = Schema::new()
            .field("flag", UcdrType::U8)
            .field("count", UcdrType::U32);
        let bytes = [1u8, 0xEE, 0xEE, 0xEE, 7, 0, 0, 0];
        let fields = decode_fields(&bytes, &schema);
        assert_eq!(fields[1].offset, 4);
        assert_eq!(fields[1].value, UcdrValue::U32(7));
    }

    #[test]
    fn test_truncated_field_omitted() {
        let bytes = temperature_bytes();
        let map = decode(&bytes[..18], &Schema::temperature());
        assert_eq!(map.len(), 3);
        assert!(!map.contains(FIELD_ACCURACY));

        let err = decode_required(&bytes[..18], &Schema::temperature()).unwrap_err();
        assert_eq!(
            err,
            ProtocolError::MissingField {
                field: FIELD_ACCURACY.into()
            }
        );
    }

    #[test]
    fn test_oversized_string_prefix_stops_decode() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&15u32.to_le_bytes());
        bytes.extend_from_slice(&u32::MAX.to_le_bytes());
        bytes.extend_from_slice(&[0u8; 8]);
        let map = decode(&bytes, &Schema::temperature());
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_invalid_utf8_is_lossy() {
        let schema = Schema::new().field("s", UcdrType::String);
        let bytes = [2u8, 0, 0, 0, 0xFF, b'a'];
        let map = decode(&bytes, &schema);
        assert_eq!(map.get("s"), Some(&UcdrValue::String("\u{FFFD}a".into())));
    }

    #[test]
    fn test_empty_input() {
        assert!(decode(&[], &Schema::temperature()).is_empty());
    }
}
