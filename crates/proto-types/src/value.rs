//! Runtime representation of protobuf values.

use crate::descriptor::{ProtoFieldDescriptor, ProtoMessageDescriptor};
use std::collections::HashMap;
use std::sync::Arc;

/// Protobuf field type enumeration.
///
/// Represents all protobuf scalar types plus message and enum references.
/// Message and enum names are fully qualified without the leading dot.
#[derive(Debug, Clone, PartialEq)]
pub enum ProtoType {
    Double,
    Float,
    Int32,
    Int64,
    Uint32,
    Uint64,
    Sint32,
    Sint64,
    Fixed32,
    Fixed64,
    Sfixed32,
    Sfixed64,
    Bool,
    String,
    Bytes,
    Message(String),
    Enum(String),
    Null,
}

impl std::fmt::Display for ProtoType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

impl ProtoType {
    /// Get the human-readable type name.
    pub fn type_name(&self) -> String {
        match self {
            ProtoType::Double => "double".to_string(),
            ProtoType::Float => "float".to_string(),
            ProtoType::Int32 => "int32".to_string(),
            ProtoType::Int64 => "int64".to_string(),
            ProtoType::Uint32 => "uint32".to_string(),
            ProtoType::Uint64 => "uint64".to_string(),
            ProtoType::Sint32 => "sint32".to_string(),
            ProtoType::Sint64 => "sint64".to_string(),
            ProtoType::Fixed32 => "fixed32".to_string(),
            ProtoType::Fixed64 => "fixed64".to_string(),
            ProtoType::Sfixed32 => "sfixed32".to_string(),
            ProtoType::Sfixed64 => "sfixed64".to_string(),
            ProtoType::Bool => "bool".to_string(),
            ProtoType::String => "string".to_string(),
            ProtoType::Bytes => "bytes".to_string(),
            ProtoType::Message(name) => format!("message:{name}"),
            ProtoType::Enum(name) => format!("enum:{name}"),
            ProtoType::Null => "null".to_string(),
        }
    }

    /// Whether values of this type may use the packed repeated encoding.
    pub fn is_packable(&self) -> bool {
        !matches!(
            self,
            ProtoType::String | ProtoType::Bytes | ProtoType::Message(_) | ProtoType::Null
        )
    }

    /// The proto3 default for a field of this type.
    ///
    /// Message fields have no scalar default and yield `Null`.
    pub fn default_value(&self) -> ProtoFieldValue {
        match self {
            ProtoType::Double => ProtoFieldValue::Double(0.0),
            ProtoType::Float => ProtoFieldValue::Float(0.0),
            ProtoType::Int32 | ProtoType::Sint32 | ProtoType::Sfixed32 | ProtoType::Enum(_) => {
                ProtoFieldValue::Int32(0)
            }
            ProtoType::Int64 | ProtoType::Sint64 | ProtoType::Sfixed64 => ProtoFieldValue::Int64(0),
            ProtoType::Uint32 | ProtoType::Fixed32 => ProtoFieldValue::Uint32(0),
            ProtoType::Uint64 | ProtoType::Fixed64 => ProtoFieldValue::Uint64(0),
            ProtoType::Bool => ProtoFieldValue::Bool(false),
            ProtoType::String => ProtoFieldValue::String(String::new()),
            ProtoType::Bytes => ProtoFieldValue::Bytes(Vec::new()),
            ProtoType::Message(_) | ProtoType::Null => ProtoFieldValue::Null,
        }
    }
}

/// Represents a field value in a dynamic protobuf message.
///
/// Signed, zigzag and sfixed encodings of the same width share one variant,
/// as do enums and `int32`.
#[derive(Debug, Clone, PartialEq)]
pub enum ProtoFieldValue {
    Double(f64),
    Float(f32),
    Int32(i32),
    Int64(i64),
    Uint32(u32),
    Uint64(u64),
    Bool(bool),
    String(String),
    Bytes(Vec<u8>),
    Message(Box<ProtoMessage>),
    Repeated(Vec<ProtoFieldValue>),
    /// Map entries in insertion order
    Map(Vec<(ProtoFieldValue, ProtoFieldValue)>),
    Null,
}

impl ProtoFieldValue {
    /// Short name of the value's kind, used in mismatch diagnostics.
    pub fn kind_name(&self) -> String {
        match self {
            ProtoFieldValue::Double(_) => "double".to_string(),
            ProtoFieldValue::Float(_) => "float".to_string(),
            ProtoFieldValue::Int32(_) => "int32".to_string(),
            ProtoFieldValue::Int64(_) => "int64".to_string(),
            ProtoFieldValue::Uint32(_) => "uint32".to_string(),
            ProtoFieldValue::Uint64(_) => "uint64".to_string(),
            ProtoFieldValue::Bool(_) => "bool".to_string(),
            ProtoFieldValue::String(_) => "string".to_string(),
            ProtoFieldValue::Bytes(_) => "bytes".to_string(),
            ProtoFieldValue::Message(msg) => format!("message:{}", msg.message_type),
            ProtoFieldValue::Repeated(_) => "list".to_string(),
            ProtoFieldValue::Map(_) => "map".to_string(),
            ProtoFieldValue::Null => "null".to_string(),
        }
    }

    /// Whether this value can be stored in a singular field of type `ty`.
    pub fn matches(&self, ty: &ProtoType) -> bool {
        match (self, ty) {
            (ProtoFieldValue::Double(_), ProtoType::Double)
            | (ProtoFieldValue::Float(_), ProtoType::Float)
            | (ProtoFieldValue::Bool(_), ProtoType::Bool)
            | (ProtoFieldValue::String(_), ProtoType::String)
            | (ProtoFieldValue::Bytes(_), ProtoType::Bytes) => true,
            (
                ProtoFieldValue::Int32(_),
                ProtoType::Int32 | ProtoType::Sint32 | ProtoType::Sfixed32 | ProtoType::Enum(_),
            ) => true,
            (
                ProtoFieldValue::Int64(_),
                ProtoType::Int64 | ProtoType::Sint64 | ProtoType::Sfixed64,
            ) => true,
            (ProtoFieldValue::Uint32(_), ProtoType::Uint32 | ProtoType::Fixed32) => true,
            (ProtoFieldValue::Uint64(_), ProtoType::Uint64 | ProtoType::Fixed64) => true,
            (ProtoFieldValue::Message(msg), ProtoType::Message(name)) => msg.message_type == *name,
            _ => false,
        }
    }
}

/// Represents a dynamic protobuf message.
///
/// Contains the message type name, the fields that were set, and the schema
/// descriptor for field introspection. The descriptor is shared, so messages
/// are cheap to create on the per-event path.
#[derive(Debug, Clone)]
pub struct ProtoMessage {
    /// Fully qualified message type name (e.g., "mypackage.MyMessage")
    pub message_type: String,
    /// Field values by field name; unset fields are absent
    pub fields: HashMap<String, ProtoFieldValue>,
    /// Schema reference for field introspection
    pub descriptor: Arc<ProtoMessageDescriptor>,
}

impl PartialEq for ProtoMessage {
    fn eq(&self, other: &Self) -> bool {
        self.message_type == other.message_type && self.fields == other.fields
    }
}

impl ProtoMessage {
    /// Create an empty message of the given type.
    pub fn new(descriptor: Arc<ProtoMessageDescriptor>) -> Self {
        Self {
            message_type: descriptor.name.clone(),
            fields: HashMap::new(),
            descriptor,
        }
    }

    /// Get a field value if it was set.
    pub fn get(&self, name: &str) -> Option<&ProtoFieldValue> {
        self.fields.get(name)
    }

    /// Get a field value, falling back to the proto3 default when unset.
    ///
    /// Unset repeated fields read as an empty list, unset maps as an empty
    /// map and unset message fields as `Null`.
    pub fn get_or_default(&self, field: &ProtoFieldDescriptor) -> ProtoFieldValue {
        if let Some(value) = self.fields.get(&field.name) {
            return value.clone();
        }
        if field.map_entry.is_some() {
            ProtoFieldValue::Map(Vec::new())
        } else if field.is_repeated {
            ProtoFieldValue::Repeated(Vec::new())
        } else {
            field.field_type.default_value()
        }
    }
}
