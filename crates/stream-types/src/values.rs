//! Attribute values and events.

use crate::schema::AttributeType;

/// Payload of an `object` attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectValue {
    /// Ordered list, exchanged with repeated protobuf fields
    List(Vec<AttributeValue>),
    /// Key/value pairs in insertion order, exchanged with map fields
    Map(Vec<(AttributeValue, AttributeValue)>),
    /// Raw bytes of a protobuf `bytes` value
    Bytes(Vec<u8>),
    /// A nested message as named fields
    Message {
        type_name: String,
        fields: Vec<(String, AttributeValue)>,
    },
}

impl ObjectValue {
    pub fn kind_name(&self) -> String {
        match self {
            ObjectValue::List(_) => "list".to_string(),
            ObjectValue::Map(_) => "map".to_string(),
            ObjectValue::Bytes(_) => "bytes".to_string(),
            ObjectValue::Message { type_name, .. } => format!("message:{type_name}"),
        }
    }

    /// Look up a map entry by key.
    pub fn map_get(&self, key: &AttributeValue) -> Option<&AttributeValue> {
        match self {
            ObjectValue::Map(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Look up a nested message field by name.
    pub fn field(&self, name: &str) -> Option<&AttributeValue> {
        match self {
            ObjectValue::Message { fields, .. } => {
                fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
            }
            _ => None,
        }
    }
}

/// A single attribute value of an event.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum AttributeValue {
    #[default]
    Null,
    String(String),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Bool(bool),
    Object(ObjectValue),
}

impl AttributeValue {
    /// Attribute type carried by this value; `None` for null.
    pub fn attribute_type(&self) -> Option<AttributeType> {
        Some(match self {
            AttributeValue::Null => return None,
            AttributeValue::String(_) => AttributeType::String,
            AttributeValue::Int(_) => AttributeType::Int,
            AttributeValue::Long(_) => AttributeType::Long,
            AttributeValue::Float(_) => AttributeType::Float,
            AttributeValue::Double(_) => AttributeType::Double,
            AttributeValue::Bool(_) => AttributeType::Bool,
            AttributeValue::Object(_) => AttributeType::Object,
        })
    }

    /// Short description used in error messages.
    pub fn type_name(&self) -> String {
        match self {
            AttributeValue::Null => "null".to_string(),
            AttributeValue::String(_) => "string".to_string(),
            AttributeValue::Int(_) => "int".to_string(),
            AttributeValue::Long(_) => "long".to_string(),
            AttributeValue::Float(_) => "float".to_string(),
            AttributeValue::Double(_) => "double".to_string(),
            AttributeValue::Bool(_) => "bool".to_string(),
            AttributeValue::Object(object) => format!("object:{}", object.kind_name()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, AttributeValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::String(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::String(value)
    }
}

impl From<i32> for AttributeValue {
    fn from(value: i32) -> Self {
        AttributeValue::Int(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Long(value)
    }
}

impl From<f32> for AttributeValue {
    fn from(value: f32) -> Self {
        AttributeValue::Float(value)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        AttributeValue::Double(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        AttributeValue::Bool(value)
    }
}

/// One record flowing through a stream.
///
/// `data` is positional: index `i` holds the value of attribute `i` of the
/// stream schema.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Event {
    /// Event time in epoch milliseconds, if known
    pub timestamp: Option<i64>,
    pub data: Vec<AttributeValue>,
}

impl Event {
    pub fn new(data: Vec<AttributeValue>) -> Self {
        Self {
            timestamp: None,
            data,
        }
    }

    /// An event with `len` null attributes.
    pub fn with_len(len: usize) -> Self {
        Self::new(vec![AttributeValue::Null; len])
    }

    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn get(&self, position: usize) -> Option<&AttributeValue> {
        self.data.get(position)
    }
}
