//! ucdr logical types and decoded values

use serde::{Deserialize, Serialize};
use std::fmt;

/// Logical type of a ucdr field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UcdrType {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
    /// 4-byte length prefix followed by raw bytes, no terminator
    String,
}

impl UcdrType {
    /// Encoded width of fixed-size types; `None` for strings
    pub fn fixed_size(&self) -> Option<usize> {
        match self {
            Self::I8 | Self::U8 => Some(1),
            Self::I16 | Self::U16 => Some(2),
            Self::I32 | Self::U32 | Self::F32 => Some(4),
            Self::I64 | Self::U64 | Self::F64 => Some(8),
            Self::String => None,
        }
    }

    /// Alignment applied before the field starts
    pub fn alignment(&self) -> usize {
        // Strings align their length prefix
        self.fixed_size().unwrap_or(4)
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Self::F32 | Self::F64)
    }
}

impl fmt::Display for UcdrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::I8 => "int8",
            Self::U8 => "uint8",
            Self::I16 => "int16",
            Self::U16 => "uint16",
            Self::I32 => "int32",
            Self::U32 => "uint32",
            Self::I64 => "int64",
            Self::U64 => "uint64",
            Self::F32 => "float32",
            Self::F64 => "float64",
            Self::String => "string",
        };
        f.write_str(name)
    }
}

/// Decoded ucdr value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum UcdrValue {
    I8(i8),
    U8(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
    String(String),
}

impl UcdrValue {
    pub fn ucdr_type(&self) -> UcdrType {
        match self {
            Self::I8(_) => UcdrType::I8,
            Self::U8(_) => UcdrType::U8,
            Self::I16(_) => UcdrType::I16,
            Self::U16(_) => UcdrType::U16,
            Self::I32(_) => UcdrType::I32,
            Self::U32(_) => UcdrType::U32,
            Self::I64(_) => UcdrType::I64,
            Self::U64(_) => UcdrType::U64,
            Self::F32(_) => UcdrType::F32,
            Self::F64(_) => UcdrType::F64,
            Self::String(_) => UcdrType::String,
        }
    }

    /// Numeric view of the value; `None` for strings
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Self::I8(v) => Some(v as f64),
            Self::U8(v) => Some(v as f64),
            Self::I16(v) => Some(v as f64),
            Self::U16(v) => Some(v as f64),
            Self::I32(v) => Some(v as f64),
            Self::U32(v) => Some(v as f64),
            Self::I64(v) => Some(v as f64),
            Self::U64(v) => Some(v as f64),
            Self::F32(v) => Some(v as f64),
            Self::F64(v) => Some(v),
            Self::String(_) => None,
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        match *self {
            Self::U32(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match *self {
            Self::F32(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}
