//! Schema-driven ucdr encoding
//!
//! Writes fields in schema order with zero padding up to each field's
//! alignment. The output decodes back to the same map under the same schema.

use super::schema::{Schema, UcdrMap};
use super::types::UcdrValue;
use crate::error::{ProtocolError, ProtocolResult};
use crate::validation::bounds::align_offset;
use byteorder::{ByteOrder, LittleEndian};

/// Encode `map` under `schema`
///
/// Every schema field must be present with a value of the declared type.
/// Keys not named by the schema are ignored.
pub fn encode(map: &UcdrMap, schema: &Schema) -> ProtocolResult<Vec<u8>> {
    let mut buf = Vec::with_capacity(super::schema::serialized_size(schema));

    for (name, ty) in schema.iter() {
        let value = map.get(name).ok_or_else(|| ProtocolError::MissingField {
            field: name.to_string(),
        })?;
        if value.ucdr_type() != ty {
            return Err(ProtocolError::ValueTypeMismatch {
                field: name.to_string(),
                expected: ty.to_string(),
            });
        }

        let offset = align_offset(buf.len(), ty.alignment());
        buf.resize(offset, 0);
        write_value(&mut buf, name, value)?;
    }

    Ok(buf)
}

fn write_value(buf: &mut Vec<u8>, name: &str, value: &UcdrValue) -> ProtocolResult<()> {
    let start = buf.len();
    match value {
        UcdrValue::I8(v) => buf.push(*v as u8),
        UcdrValue::U8(v) => buf.push(*v),
        UcdrValue::I16(v) => {
            buf.resize(start + 2, 0);
            LittleEndian::write_i16(&mut buf[start..], *v);
        }
        UcdrValue::U16(v) => {
            buf.resize(start + 2, 0);
            LittleEndian::write_u16(&mut buf[start..], *v);
        }
        UcdrValue::I32(v) => {
            buf.resize(start + 4, 0);
            LittleEndian::write_i32(&mut buf[start..], *v);
        }
        UcdrValue::U32(v) => {
            buf.resize(start + 4, 0);
            LittleEndian::write_u32(&mut buf[start..], *v);
        }
        UcdrValue::I64(v) => {
            buf.resize(start + 8, 0);
            LittleEndian::write_i64(&mut buf[start..], *v);
        }
        UcdrValue::U64(v) => {
            buf.resize(start + 8, 0);
            LittleEndian::write_u64(&mut buf[start..], *v);
        }
        UcdrValue::F32(v) => {
            buf.resize(start + 4, 0);
            LittleEndian::write_f32(&mut buf[start..], *v);
        }
        UcdrValue::F64(v) => {
            buf.resize(start + 8, 0);
            LittleEndian::write_f64(&mut buf[start..], *v);
        }
        UcdrValue::String(s) => {
            let len = u32::try_from(s.len()).map_err(|_| ProtocolError::StringTooLong {
                field: name.to_string(),
                len: s.len(),
            })?;
            buf.resize(start + 4, 0);
            LittleEndian::write_u32(&mut buf[start..], len);
            buf.extend_from_slice(s.as_bytes());
        }
    }
    Ok(())
}
