//! Ordered ucdr schemas
//!
//! Field order is the wire order. The same `Schema` value drives decode and
//! encode, which is what makes the round trip exact.

use super::types::{UcdrType, UcdrValue};
use crate::validation::bounds::align_offset;
use std::collections::BTreeMap;

/// Field name of the topic tag in the temperature block
pub const FIELD_TOPIC_ID: &str = "topic_id";
/// Field name of the topic label in the temperature block
pub const FIELD_TOPIC_NAME: &str = "topic_name";
/// Field name of the reading in the temperature block
pub const FIELD_TEMPERATURE: &str = "temperature_value";
/// Field name of the sensor accuracy in the temperature block
pub const FIELD_ACCURACY: &str = "accuracy";

/// Ordered mapping of field name to logical type
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Schema {
    fields: Vec<(String, UcdrType)>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a field; a repeated name replaces the earlier declaration's type
    pub fn field(mut self, name: impl Into<String>, ty: UcdrType) -> Self {
        let name = name.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some(existing) => existing.1 = ty,
            None => self.fields.push((name, ty)),
        }
        self
    }

    /// The temperature topic block published by the sensor module
    pub fn temperature() -> Self {
        Self::new()
            .field(FIELD_TOPIC_ID, UcdrType::U32)
            .field(FIELD_TOPIC_NAME, UcdrType::String)
            .field(FIELD_TEMPERATURE, UcdrType::F32)
            .field(FIELD_ACCURACY, UcdrType::F32)
    }

    /// Tag and reading only, for senders that omit the label
    pub fn temperature_minimal() -> Self {
        Self::new()
            .field(FIELD_TOPIC_ID, UcdrType::U32)
            .field(FIELD_TEMPERATURE, UcdrType::F32)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, UcdrType)> {
        self.fields.iter().map(|(name, ty)| (name.as_str(), *ty))
    }

    pub fn get(&self, name: &str) -> Option<UcdrType> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, ty)| *ty)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Size of the fixed part of a schema; strings count as their length prefix
pub fn serialized_size(schema: &Schema) -> usize {
    schema.iter().fold(0, |offset, (_, ty)| {
        align_offset(offset, ty.alignment()) + ty.fixed_size().unwrap_or(4)
    })
}

/// One decoded field with its position in the payload
#[derive(Debug, Clone, PartialEq)]
pub struct UcdrField {
    pub name: String,
    pub ty: UcdrType,
    /// Start of the field (of the length prefix, for strings)
    pub offset: usize,
    /// Encoded size including any string length prefix
    pub size: usize,
    pub alignment: usize,
    pub value: UcdrValue,
}

impl UcdrField {
    pub fn end(&self) -> usize {
        self.offset + self.size
    }
}

/// Decoded field values keyed by name
///
/// Equality ignores insertion order; wire order always comes from the schema.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UcdrMap {
    values: BTreeMap<String, UcdrValue>,
}

impl UcdrMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: UcdrValue) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: UcdrValue) -> Option<UcdrValue> {
        self.values.insert(name.into(), value)
    }

    pub fn get(&self, name: &str) -> Option<&UcdrValue> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &UcdrValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl FromIterator<(String, UcdrValue)> for UcdrMap {
    fn from_iter<I: IntoIterator<Item = (String, UcdrValue)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_preserves_declaration_order() {
        let schema = Schema::temperature();
        let names: Vec<_> = schema.iter().map(|(n, _)| n).collect();
        assert_eq!(
            names,
            vec!["topic_id", "topic_name", "temperature_value", "accuracy"]
        );
        assert_eq!(schema.get(FIELD_TEMPERATURE), Some(UcdrType::F32));
    }

    #[test]
    fn test_redeclaring_field_keeps_position() {
        let schema = Schema::new()
            .field("a", UcdrType::U8)
            .field("b", UcdrType::U16)
            .field("a", UcdrType::U64);
        let fields: Vec<_> = schema.iter().collect();
        assert_eq!(fields, vec![("a", UcdrType::U64), ("b", UcdrType::U16)]);
    }

    #[test]
    fn test_serialized_size_counts_padding() {
        // u8 @0, u32 @4, u8 @8, f64 @16
        let schema = Schema::new()
            .field("a", UcdrType::U8)
            .field("b", UcdrType::U32)
            .field("c", UcdrType::U8)
            .field("d", UcdrType::F64);
        assert_eq!(serialized_size(&schema), 24);
        assert_eq!(serialized_size(&Schema::temperature()), 16);
    }

    #[test]
    fn test_map_equality_ignores_insertion_order() {
        let a = UcdrMap::new()
            .with("x", UcdrValue::U8(1))
            .with("y", UcdrValue::U8(2));
        let b = UcdrMap::new()
            .with("y", UcdrValue::U8(2))
            .with("x", UcdrValue::U8(1));
        assert_eq!(a, b);
    }
}
