use crate::error::{Error, Result};
use proto_types::{
    MapEntryTypes, ProtoFieldDescriptor, ProtoMessageDescriptor, ProtoMethodDescriptor,
    ProtoSchema, ProtoServiceDescriptor, ProtoType,
};
use protobuf::descriptor::field_descriptor_proto::Label;
use protobuf::descriptor::{DescriptorProto, FieldDescriptorProto, ServiceDescriptorProto};
use protobuf_parse::Parser;
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

/// Parse a single .proto file into a schema
pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<ProtoSchema> {
    let no_includes: [&Path; 0] = [];
    parse_files(&[path.as_ref()], &no_includes)
}

/// Parse several .proto files, resolving imports against `includes`
///
/// The parent directory of every input is always an include path.
pub fn parse_files<P: AsRef<Path>, I: AsRef<Path>>(inputs: &[P], includes: &[I]) -> Result<ProtoSchema> {
    let mut parser = Parser::new();
    for input in inputs {
        let p = input.as_ref();
        parser.input(p);
        if let Some(parent) = p.parent() {
            parser.include(parent);
        }
    }
    for include in includes {
        parser.include(include.as_ref());
    }

    let parsed = parser
        .parse_and_typecheck()
        .map_err(|e| Error::ProtobufParse(e.to_string()))?;

    let mut schema = ProtoSchema::default();

    for file_descriptor in parsed.file_descriptors {
        let package = file_descriptor.package.clone().unwrap_or_default();

        for message in &file_descriptor.message_type {
            collect_message(&package, message, &mut schema)?;
        }
        for service in &file_descriptor.service {
            schema.insert_service(service_descriptor(&package, service));
        }
    }

    debug!(
        "Parsed protobuf schema with {} message types and {} services",
        schema.messages.len(),
        schema.services.len()
    );

    Ok(schema)
}

/// Parse .proto file content from a string
pub fn parse_string(content: &str) -> Result<ProtoSchema> {
    use std::io::Write;

    // Write content to a temporary file
    let mut temp_file = tempfile::Builder::new()
        .suffix(".proto")
        .tempfile()
        .map_err(|e| Error::ProtobufParse(format!("Failed to create temp file: {e}")))?;
    temp_file
        .write_all(content.as_bytes())
        .map_err(|e| Error::ProtobufParse(format!("Failed to write temp file: {e}")))?;

    parse_file(temp_file.path())
}

fn qualify(scope: &str, name: &str) -> String {
    if scope.is_empty() {
        name.to_string()
    } else {
        format!("{scope}.{name}")
    }
}

fn is_map_entry(message: &DescriptorProto) -> bool {
    message
        .options
        .as_ref()
        .and_then(|options| options.map_entry)
        .unwrap_or(false)
}

/// Register `message` and everything nested in it under `scope`.
fn collect_message(scope: &str, message: &DescriptorProto, schema: &mut ProtoSchema) -> Result<()> {
    let full_name = qualify(scope, &message.name.clone().unwrap_or_default());

    // Nested types first so map fields can see their entry types
    let mut map_entries = HashMap::new();
    for nested in &message.nested_type {
        collect_message(&full_name, nested, schema)?;
        if is_map_entry(nested) {
            let entry_name = qualify(&full_name, &nested.name.clone().unwrap_or_default());
            map_entries.insert(entry_name, map_entry_types(nested)?);
        }
    }

    let mut descriptor = ProtoMessageDescriptor::new(full_name);
    descriptor.is_map_entry = is_map_entry(message);

    for field in &message.field {
        let field_name = field.name.clone().unwrap_or_default();
        if field_name.is_empty() {
            continue;
        }

        let field_type = parse_field_type(field)?;
        let mut field_descriptor =
            ProtoFieldDescriptor::new(field_name, field.number.unwrap_or(0), field_type);
        field_descriptor.is_repeated = field.label == Some(Label::LABEL_REPEATED.into());
        field_descriptor.is_optional = field.label == Some(Label::LABEL_OPTIONAL.into());
        if let ProtoType::Message(type_name) = &field_descriptor.field_type {
            field_descriptor.map_entry = map_entries.get(type_name).cloned();
        }

        descriptor.add_field(field_descriptor);
    }

    schema.insert_message(descriptor);
    Ok(())
}

fn map_entry_types(entry: &DescriptorProto) -> Result<MapEntryTypes> {
    let entry_name = entry.name.clone().unwrap_or_default();
    let field_type = |number: i32| -> Result<ProtoType> {
        let field = entry
            .field
            .iter()
            .find(|f| f.number == Some(number))
            .ok_or_else(|| {
                Error::ProtobufParse(format!("Map entry {entry_name} has no field {number}"))
            })?;
        parse_field_type(field)
    };
    Ok(MapEntryTypes {
        key: field_type(1)?,
        value: field_type(2)?,
    })
}

fn service_descriptor(package: &str, service: &ServiceDescriptorProto) -> ProtoServiceDescriptor {
    let strip = |name: &Option<String>| {
        let name = name.clone().unwrap_or_default();
        name.strip_prefix('.').map(str::to_string).unwrap_or(name)
    };

    ProtoServiceDescriptor {
        name: qualify(package, &service.name.clone().unwrap_or_default()),
        methods: service
            .method
            .iter()
            .map(|method| ProtoMethodDescriptor {
                name: method.name.clone().unwrap_or_default(),
                input_type: strip(&method.input_type),
                output_type: strip(&method.output_type),
                client_streaming: method.client_streaming.unwrap_or(false),
                server_streaming: method.server_streaming.unwrap_or(false),
            })
            .collect(),
    }
}

fn parse_field_type(field: &FieldDescriptorProto) -> Result<ProtoType> {
    use protobuf::descriptor::field_descriptor_proto::Type;

    let field_type_enum_or_unknown = field
        .type_
        .ok_or_else(|| Error::ProtobufParse("Field missing type".to_string()))?;

    // Convert EnumOrUnknown to the enum value
    let field_type_enum = field_type_enum_or_unknown.enum_value_or_default();

    // Referenced type names come back fully qualified with a leading dot
    let referenced_type = || {
        let type_name = field.type_name.clone().unwrap_or_default();
        type_name
            .strip_prefix('.')
            .map(str::to_string)
            .unwrap_or(type_name)
    };

    Ok(match field_type_enum {
        Type::TYPE_DOUBLE => ProtoType::Double,
        Type::TYPE_FLOAT => ProtoType::Float,
        Type::TYPE_INT64 => ProtoType::Int64,
        Type::TYPE_UINT64 => ProtoType::Uint64,
        Type::TYPE_INT32 => ProtoType::Int32,
        Type::TYPE_FIXED64 => ProtoType::Fixed64,
        Type::TYPE_FIXED32 => ProtoType::Fixed32,
        Type::TYPE_BOOL => ProtoType::Bool,
        Type::TYPE_STRING => ProtoType::String,
        Type::TYPE_MESSAGE => ProtoType::Message(referenced_type()),
        Type::TYPE_BYTES => ProtoType::Bytes,
        Type::TYPE_UINT32 => ProtoType::Uint32,
        Type::TYPE_ENUM => ProtoType::Enum(referenced_type()),
        Type::TYPE_SFIXED32 => ProtoType::Sfixed32,
        Type::TYPE_SFIXED64 => ProtoType::Sfixed64,
        Type::TYPE_SINT32 => ProtoType::Sint32,
        Type::TYPE_SINT64 => ProtoType::Sint64,
        Type::TYPE_GROUP => {
            return Err(Error::ProtobufParse(
                "TYPE_GROUP is Proto2 syntax only and deprecated hence not supported".to_string(),
            ))
        }
    })
}
