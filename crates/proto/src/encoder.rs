//! Protobuf encoding of dynamic messages.
//!
//! The encoding follows proto3 wire format:
//! - Each field is encoded as (tag, value) pairs
//! - Tag = (field_number << 3) | wire_type
//! - Repeated scalars are written unpacked, which every decoder accepts
//! - Map fields are repeated entry messages with key = 1 and value = 2

use crate::error::{Error, Result};
use proto_types::{MapEntryTypes, ProtoFieldDescriptor, ProtoFieldValue, ProtoMessage, ProtoType};
use protobuf::CodedOutputStream;

fn encode_err(e: protobuf::Error) -> Error {
    Error::ProtobufEncode(e.to_string())
}

/// Encode a message to protobuf binary format.
///
/// Fields are written in definition order; unset fields and `Null` values
/// are omitted.
pub fn encode_message(message: &ProtoMessage) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    {
        let mut stream = CodedOutputStream::vec(&mut buffer);

        for field in message.descriptor.fields_in_order() {
            if let Some(value) = message.fields.get(&field.name) {
                encode_field(&mut stream, field, value)?;
            }
        }

        stream.flush().map_err(encode_err)?;
    }

    Ok(buffer)
}

fn encode_field(
    stream: &mut CodedOutputStream,
    field: &ProtoFieldDescriptor,
    value: &ProtoFieldValue,
) -> Result<()> {
    let number = field.number as u32;

    match (&field.map_entry, value) {
        (Some(entry_types), ProtoFieldValue::Map(entries)) => {
            for (key, value) in entries {
                let entry = encode_map_entry(&field.name, entry_types, key, value)?;
                stream.write_bytes(number, &entry).map_err(encode_err)?;
            }
            Ok(())
        }
        (None, ProtoFieldValue::Repeated(values)) if field.is_repeated => {
            for value in values {
                encode_value(stream, &field.name, number, &field.field_type, value)?;
            }
            Ok(())
        }
        (None, value) if !field.is_repeated => {
            encode_value(stream, &field.name, number, &field.field_type, value)
        }
        _ => Err(Error::InvalidFieldType {
            field: field.name.clone(),
            expected: field.type_description(),
            actual: value.kind_name(),
        }),
    }
}

fn encode_map_entry(
    field_name: &str,
    entry_types: &MapEntryTypes,
    key: &ProtoFieldValue,
    value: &ProtoFieldValue,
) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    {
        let mut stream = CodedOutputStream::vec(&mut buffer);
        encode_value(&mut stream, field_name, 1, &entry_types.key, key)?;
        encode_value(&mut stream, field_name, 2, &entry_types.value, value)?;
        stream.flush().map_err(encode_err)?;
    }
    Ok(buffer)
}

/// Encode a single value with its field number.
fn encode_value(
    stream: &mut CodedOutputStream,
    field_name: &str,
    number: u32,
    field_type: &ProtoType,
    value: &ProtoFieldValue,
) -> Result<()> {
    let written = match (field_type, value) {
        // Skip null values (proto3 default behavior)
        (_, ProtoFieldValue::Null) => Ok(()),
        (ProtoType::Double, ProtoFieldValue::Double(v)) => stream.write_double(number, *v),
        (ProtoType::Float, ProtoFieldValue::Float(v)) => stream.write_float(number, *v),
        (ProtoType::Int32, ProtoFieldValue::Int32(v)) => stream.write_int32(number, *v),
        (ProtoType::Sint32, ProtoFieldValue::Int32(v)) => stream.write_sint32(number, *v),
        (ProtoType::Sfixed32, ProtoFieldValue::Int32(v)) => stream.write_sfixed32(number, *v),
        (ProtoType::Enum(_), ProtoFieldValue::Int32(v)) => stream.write_enum(number, *v),
        (ProtoType::Int64, ProtoFieldValue::Int64(v)) => stream.write_int64(number, *v),
        (ProtoType::Sint64, ProtoFieldValue::Int64(v)) => stream.write_sint64(number, *v),
        (ProtoType::Sfixed64, ProtoFieldValue::Int64(v)) => stream.write_sfixed64(number, *v),
        (ProtoType::Uint32, ProtoFieldValue::Uint32(v)) => stream.write_uint32(number, *v),
        (ProtoType::Fixed32, ProtoFieldValue::Uint32(v)) => stream.write_fixed32(number, *v),
        (ProtoType::Uint64, ProtoFieldValue::Uint64(v)) => stream.write_uint64(number, *v),
        (ProtoType::Fixed64, ProtoFieldValue::Uint64(v)) => stream.write_fixed64(number, *v),
        (ProtoType::Bool, ProtoFieldValue::Bool(v)) => stream.write_bool(number, *v),
        (ProtoType::String, ProtoFieldValue::String(v)) => stream.write_string(number, v),
        (ProtoType::Bytes, ProtoFieldValue::Bytes(v)) => stream.write_bytes(number, v),
        (ProtoType::Message(type_name), ProtoFieldValue::Message(nested))
            if nested.message_type == *type_name =>
        {
            let bytes = encode_message(nested)?;
            stream.write_bytes(number, &bytes)
        }
        (expected, actual) => {
            return Err(Error::InvalidFieldType {
                field: field_name.to_string(),
                expected: expected.type_name(),
                actual: actual.kind_name(),
            })
        }
    };
    written.map_err(encode_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::ProtoDecoder;
    use crate::parser::parse_string;
    use std::sync::Arc;

    const PROTO: &str = r#"
        syntax = "proto3";
        package codec.test;

        message Inner {
            string label = 1;
        }

        message Sample {
            string name = 1;
            sint32 delta = 2;
            fixed64 id = 3;
            repeated int32 numbers = 4;
            map<string, Inner> children = 5;
            Inner inner = 6;
            float ratio = 7;
        }
    "#;

    fn schema() -> Arc<proto_types::ProtoSchema> {
        Arc::new(parse_string(PROTO).expect("Failed to parse proto"))
    }

    fn inner(schema: &proto_types::ProtoSchema, label: &str) -> ProtoFieldValue {
        let mut message = ProtoMessage::new(schema.get_message("codec.test.Inner").unwrap().clone());
        message
            .fields
            .insert("label".to_string(), ProtoFieldValue::String(label.to_string()));
        ProtoFieldValue::Message(Box::new(message))
    }

    #[test]
    fn test_encode_then_decode_preserves_mixed_fields() {
        let schema = schema();
        let descriptor = schema.get_message("codec.test.Sample").unwrap().clone();
        let mut message = ProtoMessage::new(descriptor);
        let fields = &mut message.fields;
        fields.insert("name".into(), ProtoFieldValue::String("sample".into()));
        fields.insert("delta".into(), ProtoFieldValue::Int32(-42));
        fields.insert("id".into(), ProtoFieldValue::Uint64(u64::MAX));
        fields.insert(
            "numbers".into(),
            ProtoFieldValue::Repeated(vec![ProtoFieldValue::Int32(1), ProtoFieldValue::Int32(-2)]),
        );
        fields.insert(
            "children".into(),
            ProtoFieldValue::Map(vec![
                (ProtoFieldValue::String("a".into()), inner(&schema, "first")),
                (ProtoFieldValue::String("b".into()), inner(&schema, "second")),
            ]),
        );
        fields.insert("inner".into(), inner(&schema, "nested"));
        fields.insert("ratio".into(), ProtoFieldValue::Float(0.5));

        let bytes = encode_message(&message).expect("encode failed");
        let decoded = ProtoDecoder::new(schema)
            .decode("codec.test.Sample", &bytes)
            .expect("decode failed");

        assert_eq!(decoded, message);
    }

    #[test]
    fn test_encode_rejects_mismatched_value() {
        let schema = schema();
        let mut message = ProtoMessage::new(schema.get_message("Sample").unwrap().clone());
        message
            .fields
            .insert("name".into(), ProtoFieldValue::Int64(7));

        match encode_message(&message) {
            Err(Error::InvalidFieldType {
                field,
                expected,
                actual,
            }) => {
                assert_eq!(field, "name");
                assert_eq!(expected, "string");
                assert_eq!(actual, "int64");
            }
            other => panic!("Expected InvalidFieldType, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_packed_repeated_field() {
        let schema = schema();
        // numbers = 4, wire type 2, packed [1, 2, 300]
        let bytes = [0x22, 0x04, 0x01, 0x02, 0xAC, 0x02];
        let decoded = ProtoDecoder::new(schema)
            .decode("Sample", &bytes)
            .expect("decode failed");

        assert_eq!(
            decoded.get("numbers"),
            Some(&ProtoFieldValue::Repeated(vec![
                ProtoFieldValue::Int32(1),
                ProtoFieldValue::Int32(2),
                ProtoFieldValue::Int32(300),
            ]))
        );
    }

    #[test]
    fn test_decode_skips_unknown_fields() {
        let schema = schema();
        // field 99 (varint) = 1, then name = "x"
        let bytes = [0x98, 0x06, 0x01, 0x0A, 0x01, b'x'];
        let decoded = ProtoDecoder::new(schema)
            .decode("Sample", &bytes)
            .expect("decode failed");

        assert_eq!(decoded.fields.len(), 1);
        assert_eq!(
            decoded.get("name"),
            Some(&ProtoFieldValue::String("x".to_string()))
        );
    }

    #[test]
    fn test_decode_truncated_input_fails() {
        let schema = schema();
        // name claims 5 bytes but only 1 follows
        let bytes = [0x0A, 0x05, b'x'];
        let result = ProtoDecoder::new(schema).decode("Sample", &bytes);
        assert!(matches!(result, Err(Error::ProtobufDecode(_))));
    }

    #[test]
    fn test_decode_wire_type_mismatch_fails() {
        let schema = schema();
        // name (string) sent as varint
        let bytes = [0x08, 0x01];
        let result = ProtoDecoder::new(schema).decode("Sample", &bytes);
        assert!(matches!(result, Err(Error::ProtobufDecode(_))));
    }
}
