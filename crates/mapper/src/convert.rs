//! Value conversion between stream attributes and protobuf fields.
//!
//! | attribute | protobuf field types                               |
//! |-----------|----------------------------------------------------|
//! | string    | string                                             |
//! | int       | int32, uint32, sint32, fixed32, sfixed32, enum      |
//! | long      | int64, uint64, sint64, fixed64, sfixed64            |
//! | float     | float                                              |
//! | double    | double                                             |
//! | bool      | bool                                               |
//!
//! Unsigned fields carry the bit pattern of the signed attribute value, so a
//! `uint32` holding `u32::MAX` reads back as `int` `-1` and is written back
//! unchanged.

use crate::error::RuntimeMappingError;
use proto_types::{
    FieldShape, MapEntryTypes, ProtoFieldDescriptor, ProtoFieldValue, ProtoMessage, ProtoSchema,
    ProtoType,
};
use stream_types::{AttributeType, AttributeValue, ObjectValue};

/// Whether a scalar attribute of `attribute_type` may bind to a field of type `ty`.
pub fn accepts(attribute_type: AttributeType, ty: &ProtoType) -> bool {
    match attribute_type {
        AttributeType::String => matches!(ty, ProtoType::String),
        AttributeType::Int => matches!(
            ty,
            ProtoType::Int32
                | ProtoType::Uint32
                | ProtoType::Sint32
                | ProtoType::Fixed32
                | ProtoType::Sfixed32
                | ProtoType::Enum(_)
        ),
        AttributeType::Long => matches!(
            ty,
            ProtoType::Int64
                | ProtoType::Uint64
                | ProtoType::Sint64
                | ProtoType::Fixed64
                | ProtoType::Sfixed64
        ),
        AttributeType::Float => matches!(ty, ProtoType::Float),
        AttributeType::Double => matches!(ty, ProtoType::Double),
        AttributeType::Bool => matches!(ty, ProtoType::Bool),
        AttributeType::Object => false,
    }
}

/// Convert an attribute value for a field of type `ty`.
///
/// Scalars follow the table above. Top-level bindings never see anything
/// else, since [`accepts`] rejects other pairings at setup. Values nested in
/// map entries or messages are only checked here, and for them `int` widens
/// to a 64-bit field and `float` to `double`. Message typed fields take
/// [`ObjectValue::Message`] and `bytes` fields take [`ObjectValue::Bytes`].
pub fn to_proto_value(
    schema: &ProtoSchema,
    field: &str,
    ty: &ProtoType,
    value: &AttributeValue,
) -> Result<ProtoFieldValue, RuntimeMappingError> {
    let converted = match (ty, value) {
        (ProtoType::String, AttributeValue::String(v)) => ProtoFieldValue::String(v.clone()),
        (ProtoType::Bool, AttributeValue::Bool(v)) => ProtoFieldValue::Bool(*v),
        (ProtoType::Float, AttributeValue::Float(v)) => ProtoFieldValue::Float(*v),
        (ProtoType::Double, AttributeValue::Double(v)) => ProtoFieldValue::Double(*v),
        (ProtoType::Double, AttributeValue::Float(v)) => ProtoFieldValue::Double(f64::from(*v)),
        (
            ProtoType::Int32 | ProtoType::Sint32 | ProtoType::Sfixed32 | ProtoType::Enum(_),
            AttributeValue::Int(v),
        ) => ProtoFieldValue::Int32(*v),
        (ProtoType::Uint32 | ProtoType::Fixed32, AttributeValue::Int(v)) => {
            ProtoFieldValue::Uint32(*v as u32)
        }
        (ProtoType::Int64 | ProtoType::Sint64 | ProtoType::Sfixed64, AttributeValue::Long(v)) => {
            ProtoFieldValue::Int64(*v)
        }
        (ProtoType::Int64 | ProtoType::Sint64 | ProtoType::Sfixed64, AttributeValue::Int(v)) => {
            ProtoFieldValue::Int64(i64::from(*v))
        }
        (ProtoType::Uint64 | ProtoType::Fixed64, AttributeValue::Long(v)) => {
            ProtoFieldValue::Uint64(*v as u64)
        }
        (ProtoType::Uint64 | ProtoType::Fixed64, AttributeValue::Int(v)) => {
            ProtoFieldValue::Uint64(i64::from(*v) as u64)
        }
        (ProtoType::Bytes, AttributeValue::Object(ObjectValue::Bytes(bytes))) => {
            ProtoFieldValue::Bytes(bytes.clone())
        }
        (ProtoType::Message(type_name), AttributeValue::Object(object @ ObjectValue::Message { .. })) => {
            ProtoFieldValue::Message(Box::new(to_proto_message(schema, field, type_name, object)?))
        }
        (ty, value) => return Err(RuntimeMappingError::new(field, ty.type_name(), value.type_name())),
    };
    Ok(converted)
}

/// Convert an `object` attribute holding an [`ObjectValue::Map`] into map entries.
pub fn to_proto_map_entries(
    schema: &ProtoSchema,
    field: &str,
    entry_types: &MapEntryTypes,
    value: &AttributeValue,
) -> Result<Vec<(ProtoFieldValue, ProtoFieldValue)>, RuntimeMappingError> {
    let AttributeValue::Object(ObjectValue::Map(entries)) = value else {
        return Err(RuntimeMappingError::new(
            field,
            format!("map<{}, {}>", entry_types.key, entry_types.value),
            value.type_name(),
        ));
    };
    entries
        .iter()
        .map(|(key, value)| {
            Ok((
                to_proto_value(schema, field, &entry_types.key, key)?,
                to_proto_value(schema, field, &entry_types.value, value)?,
            ))
        })
        .collect()
}

/// Convert a value for any field shape; used for fields of nested messages.
pub fn to_proto_field(
    schema: &ProtoSchema,
    field: &ProtoFieldDescriptor,
    value: &AttributeValue,
) -> Result<ProtoFieldValue, RuntimeMappingError> {
    match field.shape() {
        FieldShape::Scalar | FieldShape::NestedMessage => {
            to_proto_value(schema, &field.name, &field.field_type, value)
        }
        FieldShape::Map => {
            let Some(entry_types) = &field.map_entry else {
                return Err(RuntimeMappingError::new(
                    &field.name,
                    field.type_description(),
                    value.type_name(),
                ));
            };
            Ok(ProtoFieldValue::Map(to_proto_map_entries(
                schema,
                &field.name,
                entry_types,
                value,
            )?))
        }
        FieldShape::RepeatedList => match value {
            AttributeValue::Object(ObjectValue::List(items)) => items
                .iter()
                .map(|item| to_proto_value(schema, &field.name, &field.field_type, item))
                .collect::<Result<Vec<_>, _>>()
                .map(ProtoFieldValue::Repeated),
            other => Err(RuntimeMappingError::new(
                &field.name,
                field.type_description(),
                other.type_name(),
            )),
        },
    }
}

fn to_proto_message(
    schema: &ProtoSchema,
    field: &str,
    type_name: &str,
    object: &ObjectValue,
) -> Result<ProtoMessage, RuntimeMappingError> {
    let ObjectValue::Message {
        type_name: given,
        fields,
    } = object
    else {
        return Err(RuntimeMappingError::new(field, type_name, object.kind_name()));
    };
    let descriptor = schema
        .get_message(type_name)
        .ok_or_else(|| RuntimeMappingError::new(field, type_name, "unknown message type"))?;
    if !given.is_empty() && schema.get_message(given).map(|d| &d.name) != Some(&descriptor.name) {
        return Err(RuntimeMappingError::new(field, type_name, format!("message:{given}")));
    }

    let mut message = ProtoMessage::new(descriptor.clone());
    for (name, value) in fields {
        let nested = descriptor.get_field(name).ok_or_else(|| {
            RuntimeMappingError::new(
                format!("{field}.{name}"),
                format!("a field of {}", descriptor.name),
                "unknown field",
            )
        })?;
        if value.is_null() {
            continue;
        }
        message
            .fields
            .insert(nested.name.clone(), to_proto_field(schema, nested, value)?);
    }
    Ok(message)
}

/// Convert a protobuf value read from a message into an attribute value.
pub fn from_proto(value: &ProtoFieldValue) -> AttributeValue {
    match value {
        ProtoFieldValue::Double(v) => AttributeValue::Double(*v),
        ProtoFieldValue::Float(v) => AttributeValue::Float(*v),
        ProtoFieldValue::Int32(v) => AttributeValue::Int(*v),
        ProtoFieldValue::Int64(v) => AttributeValue::Long(*v),
        ProtoFieldValue::Uint32(v) => AttributeValue::Int(*v as i32),
        ProtoFieldValue::Uint64(v) => AttributeValue::Long(*v as i64),
        ProtoFieldValue::Bool(v) => AttributeValue::Bool(*v),
        ProtoFieldValue::String(v) => AttributeValue::String(v.clone()),
        ProtoFieldValue::Bytes(v) => AttributeValue::Object(ObjectValue::Bytes(v.clone())),
        ProtoFieldValue::Repeated(values) => {
            AttributeValue::Object(ObjectValue::List(values.iter().map(from_proto).collect()))
        }
        ProtoFieldValue::Map(entries) => AttributeValue::Object(ObjectValue::Map(
            entries
                .iter()
                .map(|(k, v)| (from_proto(k), from_proto(v)))
                .collect(),
        )),
        ProtoFieldValue::Message(message) => AttributeValue::Object(message_to_object(message)),
        ProtoFieldValue::Null => AttributeValue::Null,
    }
}

/// A decoded message as an [`ObjectValue::Message`]; set fields only, in
/// definition order.
pub fn message_to_object(message: &ProtoMessage) -> ObjectValue {
    ObjectValue::Message {
        type_name: message.message_type.clone(),
        fields: message
            .descriptor
            .fields_in_order()
            .filter_map(|f| message.get(&f.name).map(|v| (f.name.clone(), from_proto(v))))
            .collect(),
    }
}
