//! Protobuf decoder implementation.
//!
//! Decodes binary protobuf data into [`ProtoMessage`] values using the
//! registry produced by the parser module.

use crate::error::{Error, Result};
use proto_types::{
    MapEntryTypes, ProtoFieldDescriptor, ProtoFieldValue, ProtoMessage, ProtoMessageDescriptor,
    ProtoSchema, ProtoType,
};
use protobuf::CodedInputStream;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::trace;

const WIRE_VARINT: u32 = 0;
const WIRE_FIXED64: u32 = 1;
const WIRE_LENGTH_DELIMITED: u32 = 2;
const WIRE_FIXED32: u32 = 5;

/// Deepest message nesting accepted, matching protobuf's default recursion limit.
pub const RECURSION_LIMIT: u32 = 100;

fn decode_err(e: protobuf::Error) -> Error {
    Error::ProtobufDecode(e.to_string())
}

/// Runtime protobuf decoder.
///
/// Holds the schema behind an `Arc` so one decoder can be shared by any
/// number of concurrent callers.
#[derive(Debug, Clone)]
pub struct ProtoDecoder {
    schema: Arc<ProtoSchema>,
}

impl ProtoDecoder {
    /// Create a new decoder from a schema.
    pub fn new(schema: Arc<ProtoSchema>) -> Self {
        Self { schema }
    }

    /// Get a reference to the schema.
    pub fn schema(&self) -> &ProtoSchema {
        &self.schema
    }

    /// Decode a protobuf message of the named type from bytes.
    pub fn decode(&self, message_type: &str, data: &[u8]) -> Result<ProtoMessage> {
        let descriptor = self
            .schema
            .get_message(message_type)
            .ok_or_else(|| Error::MessageTypeNotFound(message_type.to_string()))?
            .clone();
        self.decode_with(&descriptor, data)
    }

    /// Decode bytes as an already resolved message type.
    pub fn decode_with(
        &self,
        descriptor: &Arc<ProtoMessageDescriptor>,
        data: &[u8],
    ) -> Result<ProtoMessage> {
        let mut stream = CodedInputStream::from_bytes(data);
        self.decode_message(descriptor, &mut stream, 0)
    }

    fn decode_message(
        &self,
        descriptor: &Arc<ProtoMessageDescriptor>,
        stream: &mut CodedInputStream,
        depth: u32,
    ) -> Result<ProtoMessage> {
        let mut fields = HashMap::new();

        while !stream.eof().map_err(decode_err)? {
            let tag = stream.read_raw_varint32().map_err(decode_err)?;
            let field_number = (tag >> 3) as i32;
            let wire_type = tag & 0x7;

            if field_number == 0 {
                return Err(Error::ProtobufDecode(format!(
                    "Invalid field number 0 in message {}",
                    descriptor.name
                )));
            }

            let Some(field_desc) = descriptor.field_by_number(field_number) else {
                trace!(
                    "Skipping unknown field number {} in message {}",
                    field_number,
                    descriptor.name
                );
                skip_field(stream, wire_type)?;
                continue;
            };

            if let Some(entry_types) = &field_desc.map_entry {
                check_wire_type(field_desc, wire_type, WIRE_LENGTH_DELIMITED)?;
                let (key, value) = self.decode_map_entry(field_desc, entry_types, stream, depth)?;
                let existing = fields
                    .entry(field_desc.name.clone())
                    .or_insert_with(|| ProtoFieldValue::Map(Vec::new()));
                if let ProtoFieldValue::Map(entries) = existing {
                    // Last value wins for duplicate keys
                    match entries.iter_mut().find(|(k, _)| *k == key) {
                        Some(slot) => slot.1 = value,
                        None => entries.push((key, value)),
                    }
                }
            } else if field_desc.is_repeated {
                let packed = wire_type == WIRE_LENGTH_DELIMITED && field_desc.field_type.is_packable();
                let existing = fields
                    .entry(field_desc.name.clone())
                    .or_insert_with(|| ProtoFieldValue::Repeated(Vec::new()));
                if let ProtoFieldValue::Repeated(values) = existing {
                    if packed {
                        let len = stream.read_raw_varint32().map_err(decode_err)?;
                        let old_limit = stream.push_limit(len as u64).map_err(decode_err)?;
                        while !stream.eof().map_err(decode_err)? {
                            values.push(self.decode_field_value(&field_desc.field_type, stream, depth)?);
                        }
                        stream.pop_limit(old_limit);
                    } else {
                        check_wire_type(field_desc, wire_type, expected_wire_type(&field_desc.field_type))?;
                        values.push(self.decode_field_value(&field_desc.field_type, stream, depth)?);
                    }
                }
            } else {
                check_wire_type(field_desc, wire_type, expected_wire_type(&field_desc.field_type))?;
                let value = self.decode_field_value(&field_desc.field_type, stream, depth)?;
                // A repeated singular field merges for messages, last value wins otherwise
                match fields.entry(field_desc.name.clone()) {
                    Entry::Occupied(mut slot) => merge_value(slot.get_mut(), value),
                    Entry::Vacant(slot) => {
                        slot.insert(value);
                    }
                }
            }
        }

        Ok(ProtoMessage {
            message_type: descriptor.name.clone(),
            fields,
            descriptor: descriptor.clone(),
        })
    }

    fn decode_map_entry(
        &self,
        field_desc: &ProtoFieldDescriptor,
        entry_types: &MapEntryTypes,
        stream: &mut CodedInputStream,
        depth: u32,
    ) -> Result<(ProtoFieldValue, ProtoFieldValue)> {
        let ProtoType::Message(entry_type) = &field_desc.field_type else {
            return Err(Error::ProtobufDecode(format!(
                "Map field '{}' has no entry message type",
                field_desc.name
            )));
        };

        let mut entry = self.decode_nested(entry_type, stream, depth)?;
        let key = entry
            .fields
            .remove("key")
            .unwrap_or_else(|| entry_types.key.default_value());
        let value = match entry.fields.remove("value") {
            Some(value) => value,
            None => self.default_for(&entry_types.value)?,
        };
        Ok((key, value))
    }

    /// Default for a map value: message values default to an empty message.
    fn default_for(&self, ty: &ProtoType) -> Result<ProtoFieldValue> {
        match ty {
            ProtoType::Message(type_name) => {
                let descriptor = self
                    .schema
                    .get_message(type_name)
                    .ok_or_else(|| Error::MessageTypeNotFound(type_name.clone()))?;
                Ok(ProtoFieldValue::Message(Box::new(ProtoMessage::new(
                    descriptor.clone(),
                ))))
            }
            other => Ok(other.default_value()),
        }
    }

    fn decode_nested(
        &self,
        type_name: &str,
        stream: &mut CodedInputStream,
        depth: u32,
    ) -> Result<ProtoMessage> {
        if depth >= RECURSION_LIMIT {
            return Err(Error::ProtobufDecode(format!(
                "Message {type_name} is nested deeper than {RECURSION_LIMIT} levels"
            )));
        }
        let len = stream.read_raw_varint32().map_err(decode_err)?;
        let old_limit = stream.push_limit(len as u64).map_err(decode_err)?;

        let nested_descriptor = self
            .schema
            .get_message(type_name)
            .ok_or_else(|| Error::MessageTypeNotFound(type_name.to_string()))?
            .clone();
        let nested_message = self.decode_message(&nested_descriptor, stream, depth + 1)?;

        stream.pop_limit(old_limit);
        Ok(nested_message)
    }

    fn decode_field_value(
        &self,
        field_type: &ProtoType,
        stream: &mut CodedInputStream,
        depth: u32,
    ) -> Result<ProtoFieldValue> {
        Ok(match field_type {
            ProtoType::Double => ProtoFieldValue::Double(stream.read_double().map_err(decode_err)?),
            ProtoType::Float => ProtoFieldValue::Float(stream.read_float().map_err(decode_err)?),
            ProtoType::Int32 | ProtoType::Enum(_) => {
                ProtoFieldValue::Int32(stream.read_int32().map_err(decode_err)?)
            }
            ProtoType::Sint32 => ProtoFieldValue::Int32(stream.read_sint32().map_err(decode_err)?),
            ProtoType::Sfixed32 => {
                ProtoFieldValue::Int32(stream.read_sfixed32().map_err(decode_err)?)
            }
            ProtoType::Int64 => ProtoFieldValue::Int64(stream.read_int64().map_err(decode_err)?),
            ProtoType::Sint64 => ProtoFieldValue::Int64(stream.read_sint64().map_err(decode_err)?),
            ProtoType::Sfixed64 => {
                ProtoFieldValue::Int64(stream.read_sfixed64().map_err(decode_err)?)
            }
            ProtoType::Uint32 => ProtoFieldValue::Uint32(stream.read_uint32().map_err(decode_err)?),
            ProtoType::Fixed32 => {
                ProtoFieldValue::Uint32(stream.read_fixed32().map_err(decode_err)?)
            }
            ProtoType::Uint64 => ProtoFieldValue::Uint64(stream.read_uint64().map_err(decode_err)?),
            ProtoType::Fixed64 => {
                ProtoFieldValue::Uint64(stream.read_fixed64().map_err(decode_err)?)
            }
            ProtoType::Bool => ProtoFieldValue::Bool(stream.read_bool().map_err(decode_err)?),
            ProtoType::String => ProtoFieldValue::String(stream.read_string().map_err(decode_err)?),
            ProtoType::Bytes => ProtoFieldValue::Bytes(stream.read_bytes().map_err(decode_err)?),
            ProtoType::Message(type_name) => {
                ProtoFieldValue::Message(Box::new(self.decode_nested(type_name, stream, depth)?))
            }
            ProtoType::Null => {
                return Err(Error::ProtobufDecode(
                    "Cannot decode a field of type null".to_string(),
                ))
            }
        })
    }
}

/// Merge a later occurrence of a field into the value already decoded.
///
/// Messages merge field by field, lists append and maps overwrite per key;
/// anything else is replaced.
fn merge_value(slot: &mut ProtoFieldValue, value: ProtoFieldValue) {
    match (slot, value) {
        (ProtoFieldValue::Message(existing), ProtoFieldValue::Message(incoming)) => {
            for (name, value) in incoming.fields {
                match existing.fields.entry(name) {
                    Entry::Occupied(mut slot) => merge_value(slot.get_mut(), value),
                    Entry::Vacant(slot) => {
                        slot.insert(value);
                    }
                }
            }
        }
        (ProtoFieldValue::Repeated(existing), ProtoFieldValue::Repeated(incoming)) => {
            existing.extend(incoming);
        }
        (ProtoFieldValue::Map(existing), ProtoFieldValue::Map(incoming)) => {
            for (key, value) in incoming {
                match existing.iter_mut().find(|(k, _)| *k == key) {
                    Some(entry) => entry.1 = value,
                    None => existing.push((key, value)),
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

fn expected_wire_type(field_type: &ProtoType) -> u32 {
    match field_type {
        ProtoType::Double | ProtoType::Fixed64 | ProtoType::Sfixed64 => WIRE_FIXED64,
        ProtoType::Float | ProtoType::Fixed32 | ProtoType::Sfixed32 => WIRE_FIXED32,
        ProtoType::String | ProtoType::Bytes | ProtoType::Message(_) => WIRE_LENGTH_DELIMITED,
        _ => WIRE_VARINT,
    }
}

fn check_wire_type(field_desc: &ProtoFieldDescriptor, actual: u32, expected: u32) -> Result<()> {
    if actual == expected {
        Ok(())
    } else {
        Err(Error::ProtobufDecode(format!(
            "Wire type {actual} does not match field '{}' of type {} (expected wire type {expected})",
            field_desc.name,
            field_desc.type_description()
        )))
    }
}

fn skip_field(stream: &mut CodedInputStream, wire_type: u32) -> Result<()> {
    match wire_type {
        WIRE_VARINT => {
            stream.read_raw_varint64().map_err(decode_err)?;
        }
        WIRE_FIXED64 => {
            stream.read_raw_little_endian64().map_err(decode_err)?;
        }
        WIRE_LENGTH_DELIMITED => {
            let len = stream.read_raw_varint32().map_err(decode_err)?;
            stream.skip_raw_bytes(len).map_err(decode_err)?;
        }
        WIRE_FIXED32 => {
            stream.read_raw_little_endian32().map_err(decode_err)?;
        }
        other => {
            return Err(Error::ProtobufDecode(format!(
                "Unsupported wire type {other} (groups are not supported)"
            )))
        }
    }
    Ok(())
}
