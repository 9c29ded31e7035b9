//! Message builder.
//!
//! A builder accumulates field values and is then finalized into an immutable
//! [`ProtoMessage`]. It moves through `Empty -> Accumulating -> Built`, and
//! building returns it to `Empty` so one builder can serve every event of a
//! connector.

use crate::error::{Error, Result};
use proto_types::{
    FieldShape, ProtoFieldDescriptor, ProtoFieldValue, ProtoMessage, ProtoMessageDescriptor,
    ProtoType,
};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Default)]
enum BuilderState {
    #[default]
    Empty,
    Accumulating(HashMap<String, ProtoFieldValue>),
}

#[derive(Debug)]
pub struct MessageBuilder {
    descriptor: Arc<ProtoMessageDescriptor>,
    state: BuilderState,
}

impl MessageBuilder {
    pub fn new(descriptor: Arc<ProtoMessageDescriptor>) -> Self {
        Self {
            descriptor,
            state: BuilderState::Empty,
        }
    }

    pub fn descriptor(&self) -> &Arc<ProtoMessageDescriptor> {
        &self.descriptor
    }

    /// True when no field has been set since the last build or clear.
    pub fn is_empty(&self) -> bool {
        matches!(self.state, BuilderState::Empty)
    }

    /// Set a field by name, replacing any previous value.
    pub fn set(&mut self, field: &str, value: ProtoFieldValue) -> Result<()> {
        let descriptor = self.descriptor.clone();
        self.set_field(field_of(&descriptor, field)?, value)
    }

    /// Set an already resolved field, replacing any previous value.
    ///
    /// The value must fit the field: a matching scalar or message for
    /// singular fields, a list of matching elements for repeated fields and
    /// a map of matching entries for map fields.
    pub fn set_field(&mut self, field: &ProtoFieldDescriptor, value: ProtoFieldValue) -> Result<()> {
        check_value(field, &value)?;
        self.accumulating().insert(field.name.clone(), value);
        Ok(())
    }

    /// Merge entries into a map field by name; existing keys are overwritten.
    pub fn put_all(
        &mut self,
        field: &str,
        entries: Vec<(ProtoFieldValue, ProtoFieldValue)>,
    ) -> Result<()> {
        let descriptor = self.descriptor.clone();
        self.put_all_field(field_of(&descriptor, field)?, entries)
    }

    /// Merge entries into an already resolved map field.
    pub fn put_all_field(
        &mut self,
        field: &ProtoFieldDescriptor,
        entries: Vec<(ProtoFieldValue, ProtoFieldValue)>,
    ) -> Result<()> {
        let Some(entry_types) = &field.map_entry else {
            return Err(Error::InvalidFieldType {
                field: field.name.clone(),
                expected: field.type_description(),
                actual: "map".to_string(),
            });
        };
        for (key, value) in &entries {
            check_scalar(field, &entry_types.key, key)?;
            check_scalar(field, &entry_types.value, value)?;
        }

        let slot = self
            .accumulating()
            .entry(field.name.clone())
            .or_insert_with(|| ProtoFieldValue::Map(Vec::new()));
        if let ProtoFieldValue::Map(existing) = slot {
            for (key, value) in entries {
                match existing.iter_mut().find(|(k, _)| *k == key) {
                    Some(entry) => entry.1 = value,
                    None => existing.push((key, value)),
                }
            }
        }
        Ok(())
    }

    /// Finalize the accumulated fields into a message and reset to `Empty`.
    pub fn build(&mut self) -> ProtoMessage {
        let fields = match std::mem::take(&mut self.state) {
            BuilderState::Empty => HashMap::new(),
            BuilderState::Accumulating(fields) => fields,
        };
        ProtoMessage {
            message_type: self.descriptor.name.clone(),
            fields,
            descriptor: self.descriptor.clone(),
        }
    }

    /// Discard everything set since the last build.
    pub fn clear(&mut self) {
        self.state = BuilderState::Empty;
    }

    fn accumulating(&mut self) -> &mut HashMap<String, ProtoFieldValue> {
        if let BuilderState::Empty = self.state {
            self.state = BuilderState::Accumulating(HashMap::new());
        }
        match &mut self.state {
            BuilderState::Accumulating(fields) => fields,
            BuilderState::Empty => unreachable!("builder was just moved to Accumulating"),
        }
    }
}

fn field_of<'a>(descriptor: &'a ProtoMessageDescriptor, name: &str) -> Result<&'a ProtoFieldDescriptor> {
    descriptor.get_field(name).ok_or_else(|| Error::FieldNotFound {
        message: descriptor.name.clone(),
        field: name.to_string(),
    })
}

fn mismatch(field: &ProtoFieldDescriptor, expected: String, value: &ProtoFieldValue) -> Error {
    Error::InvalidFieldType {
        field: field.name.clone(),
        expected,
        actual: value.kind_name(),
    }
}

fn check_scalar(field: &ProtoFieldDescriptor, ty: &ProtoType, value: &ProtoFieldValue) -> Result<()> {
    if value.matches(ty) {
        Ok(())
    } else {
        Err(mismatch(field, ty.type_name(), value))
    }
}

fn check_value(field: &ProtoFieldDescriptor, value: &ProtoFieldValue) -> Result<()> {
    match (field.shape(), value) {
        (FieldShape::Scalar | FieldShape::NestedMessage, value) => {
            check_scalar(field, &field.field_type, value)
        }
        (FieldShape::RepeatedList, ProtoFieldValue::Repeated(values)) => values
            .iter()
            .try_for_each(|v| check_scalar(field, &field.field_type, v)),
        (FieldShape::Map, ProtoFieldValue::Map(entries)) => {
            // shape() is Map only when map_entry is set
            let Some(entry_types) = &field.map_entry else {
                return Err(mismatch(field, field.type_description(), value));
            };
            entries.iter().try_for_each(|(k, v)| {
                check_scalar(field, &entry_types.key, k)?;
                check_scalar(field, &entry_types.value, v)
            })
        }
        (_, value) => Err(mismatch(field, field.type_description(), value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_string;

    fn builder() -> MessageBuilder {
        let schema = parse_string(
            r#"
            syntax = "proto3";
            message Request {
                string string_value = 1;
                int32 int_value = 2;
                repeated string tags = 3;
                map<string, int64> counters = 4;
            }
        "#,
        )
        .expect("Failed to parse proto");
        MessageBuilder::new(schema.get_message("Request").unwrap().clone())
    }

    #[test]
    fn test_build_resets_to_empty() {
        let mut builder = builder();
        assert!(builder.is_empty());

        builder
            .set("string_value", ProtoFieldValue::String("first".into()))
            .unwrap();
        assert!(!builder.is_empty());

        let first = builder.build();
        assert!(builder.is_empty());
        assert_eq!(
            first.get("string_value"),
            Some(&ProtoFieldValue::String("first".into()))
        );

        builder.set("int_value", ProtoFieldValue::Int32(2)).unwrap();
        let second = builder.build();
        assert!(second.get("string_value").is_none());
        assert_eq!(second.get("int_value"), Some(&ProtoFieldValue::Int32(2)));
    }

    #[test]
    fn test_set_rejects_wrong_type() {
        let mut builder = builder();
        let err = builder
            .set("int_value", ProtoFieldValue::String("nope".into()))
            .unwrap_err();
        match err {
            Error::InvalidFieldType {
                expected, actual, ..
            } => {
                assert_eq!(expected, "int32");
                assert_eq!(actual, "string");
            }
            other => panic!("Expected InvalidFieldType, got {other:?}"),
        }
        assert!(builder.is_empty());
    }

    #[test]
    fn test_set_repeated_field() {
        let mut builder = builder();
        builder
            .set(
                "tags",
                ProtoFieldValue::Repeated(vec![ProtoFieldValue::String("a".into())]),
            )
            .unwrap();
        assert!(builder
            .set("tags", ProtoFieldValue::String("a".into()))
            .is_err());
    }

    #[test]
    fn test_put_all_merges_entries() {
        let mut builder = builder();
        let key = |k: &str| ProtoFieldValue::String(k.to_string());
        builder
            .put_all(
                "counters",
                vec![(key("a"), ProtoFieldValue::Int64(1)), (key("b"), ProtoFieldValue::Int64(2))],
            )
            .unwrap();
        builder
            .put_all("counters", vec![(key("a"), ProtoFieldValue::Int64(10))])
            .unwrap();

        let message = builder.build();
        assert_eq!(
            message.get("counters"),
            Some(&ProtoFieldValue::Map(vec![
                (key("a"), ProtoFieldValue::Int64(10)),
                (key("b"), ProtoFieldValue::Int64(2)),
            ]))
        );
    }

    #[test]
    fn test_put_all_on_scalar_field_fails() {
        let mut builder = builder();
        let result = builder.put_all("int_value", vec![]);
        assert!(matches!(result, Err(Error::InvalidFieldType { .. })));
    }

    #[test]
    fn test_set_resolved_field() {
        let mut builder = builder();
        let descriptor = builder.descriptor().clone();
        let tags = descriptor.get_field("tags").unwrap();
        let counters = descriptor.get_field("counters").unwrap();

        builder
            .set_field(tags, ProtoFieldValue::Repeated(vec![ProtoFieldValue::String("x".into())]))
            .unwrap();
        builder
            .put_all_field(
                counters,
                vec![(ProtoFieldValue::String("k".into()), ProtoFieldValue::Int64(5))],
            )
            .unwrap();
        assert!(builder
            .set_field(counters, ProtoFieldValue::Int64(1))
            .is_err());

        let message = builder.build();
        assert_eq!(message.fields.len(), 2);
    }

    #[test]
    fn test_unknown_field() {
        let mut builder = builder();
        let result = builder.set("missing", ProtoFieldValue::Bool(true));
        assert!(matches!(result, Err(Error::FieldNotFound { .. })));
    }
}
