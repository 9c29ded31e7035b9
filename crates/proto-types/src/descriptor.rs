//! Schema descriptors: messages, fields, services and the registry holding them.

use crate::value::ProtoType;
use std::collections::HashMap;
use std::sync::Arc;

/// Shape of a message field, decided once from the schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldShape {
    Scalar,
    RepeatedList,
    Map,
    NestedMessage,
}

impl std::fmt::Display for FieldShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FieldShape::Scalar => "scalar",
            FieldShape::RepeatedList => "list",
            FieldShape::Map => "map",
            FieldShape::NestedMessage => "message",
        };
        f.write_str(name)
    }
}

/// Key and value types of a `map<K, V>` field.
#[derive(Debug, Clone, PartialEq)]
pub struct MapEntryTypes {
    pub key: ProtoType,
    pub value: ProtoType,
}

/// Describes a single field in a message
#[derive(Debug, Clone, PartialEq)]
pub struct ProtoFieldDescriptor {
    /// Field name as declared in the .proto file
    pub name: String,
    /// Upper camel case accessor name (`string_value` -> `StringValue`)
    pub accessor_name: String,
    /// Field number (tag)
    pub number: i32,
    /// Field type; for map fields this is the synthetic entry message
    pub field_type: ProtoType,
    /// Whether the field is repeated (map fields are repeated on the wire)
    pub is_repeated: bool,
    /// Whether the field is optional
    pub is_optional: bool,
    /// Key/value types when the field is a map
    pub map_entry: Option<MapEntryTypes>,
}

impl ProtoFieldDescriptor {
    /// Create a singular field descriptor.
    pub fn new(name: impl Into<String>, number: i32, field_type: ProtoType) -> Self {
        let name = name.into();
        Self {
            accessor_name: to_accessor_name(&name),
            name,
            number,
            field_type,
            is_repeated: false,
            is_optional: false,
            map_entry: None,
        }
    }

    pub fn shape(&self) -> FieldShape {
        if self.map_entry.is_some() {
            FieldShape::Map
        } else if self.is_repeated {
            FieldShape::RepeatedList
        } else if matches!(self.field_type, ProtoType::Message(_)) {
            FieldShape::NestedMessage
        } else {
            FieldShape::Scalar
        }
    }

    /// Declared type including its container, e.g. `map<string, int32>`.
    pub fn type_description(&self) -> String {
        match (&self.map_entry, self.is_repeated) {
            (Some(entry), _) => format!("map<{}, {}>", entry.key, entry.value),
            (None, true) => format!("repeated<{}>", self.field_type),
            (None, false) => self.field_type.type_name(),
        }
    }
}

/// Describes a protobuf message type (schema).
#[derive(Debug, Clone)]
pub struct ProtoMessageDescriptor {
    /// Fully qualified message name (e.g., "mypackage.MyMessage")
    pub name: String,
    /// Map of field names to their descriptors
    pub fields: HashMap<String, ProtoFieldDescriptor>,
    /// Ordered list of field names (preserves proto definition order)
    pub field_order: Vec<String>,
    /// Whether this is a synthetic map entry type
    pub is_map_entry: bool,
}

impl ProtoMessageDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: HashMap::new(),
            field_order: Vec::new(),
            is_map_entry: false,
        }
    }

    /// Append a field, keeping definition order.
    pub fn add_field(&mut self, field: ProtoFieldDescriptor) {
        self.field_order.push(field.name.clone());
        self.fields.insert(field.name.clone(), field);
    }

    /// Get a field descriptor by name.
    pub fn get_field(&self, name: &str) -> Option<&ProtoFieldDescriptor> {
        self.fields.get(name)
    }

    /// Find a field by its upper camel case accessor name.
    pub fn find_by_accessor(&self, accessor_name: &str) -> Option<&ProtoFieldDescriptor> {
        self.fields_in_order()
            .find(|f| f.accessor_name == accessor_name)
    }

    /// Find a field by its number.
    pub fn field_by_number(&self, number: i32) -> Option<&ProtoFieldDescriptor> {
        self.fields.values().find(|f| f.number == number)
    }

    /// List all field names in definition order.
    pub fn list_fields(&self) -> &[String] {
        &self.field_order
    }

    /// Iterate field descriptors in definition order.
    pub fn fields_in_order(&self) -> impl Iterator<Item = &ProtoFieldDescriptor> {
        self.field_order.iter().filter_map(|name| self.fields.get(name))
    }

    /// `name: type` for every field, used to explain mapping failures.
    pub fn fields_with_types(&self) -> Vec<String> {
        self.fields_in_order()
            .map(|f| format!("{}: {}", f.name, f.type_description()))
            .collect()
    }
}

/// Describes one rpc of a service.
#[derive(Debug, Clone, PartialEq)]
pub struct ProtoMethodDescriptor {
    pub name: String,
    /// Fully qualified request message name
    pub input_type: String,
    /// Fully qualified response message name
    pub output_type: String,
    pub client_streaming: bool,
    pub server_streaming: bool,
}

/// Describes a protobuf service.
#[derive(Debug, Clone)]
pub struct ProtoServiceDescriptor {
    /// Fully qualified service name (e.g., "mypackage.MyService")
    pub name: String,
    pub methods: Vec<ProtoMethodDescriptor>,
}

impl ProtoServiceDescriptor {
    /// Find a method whose name, with the first letter capitalized, equals `capitalized`.
    ///
    /// gRPC method names are conventionally upper camel case while URLs
    /// often carry them in lower camel case; both resolve to the same rpc.
    pub fn find_method(&self, capitalized: &str) -> Option<&ProtoMethodDescriptor> {
        self.methods
            .iter()
            .find(|m| capitalize(&m.name) == capitalized)
    }

    pub fn method_names(&self) -> Vec<String> {
        self.methods.iter().map(|m| m.name.clone()).collect()
    }
}

/// Represents a parsed protobuf schema containing multiple message types.
///
/// Messages (nested ones included) and services are keyed by their fully
/// qualified names.
#[derive(Debug, Clone, Default)]
pub struct ProtoSchema {
    /// Map of message type names to their descriptors
    pub messages: HashMap<String, Arc<ProtoMessageDescriptor>>,
    /// Map of service names to their descriptors
    pub services: HashMap<String, ProtoServiceDescriptor>,
}

impl ProtoSchema {
    pub fn insert_message(&mut self, descriptor: ProtoMessageDescriptor) {
        self.messages
            .insert(descriptor.name.clone(), Arc::new(descriptor));
    }

    pub fn insert_service(&mut self, descriptor: ProtoServiceDescriptor) {
        self.services.insert(descriptor.name.clone(), descriptor);
    }

    /// Get a message descriptor by name.
    ///
    /// Accepts a fully qualified name (with or without the leading dot) or
    /// a simple name that is unique across the schema.
    pub fn get_message(&self, name: &str) -> Option<&Arc<ProtoMessageDescriptor>> {
        let name = name.strip_prefix('.').unwrap_or(name);
        self.messages
            .get(name)
            .or_else(|| unique_by_simple_name(&self.messages, name))
    }

    /// Get a service descriptor by fully qualified or unique simple name.
    pub fn get_service(&self, name: &str) -> Option<&ProtoServiceDescriptor> {
        let name = name.strip_prefix('.').unwrap_or(name);
        self.services
            .get(name)
            .or_else(|| unique_by_simple_name(&self.services, name))
    }

    /// List all message type names in the schema, sorted.
    pub fn list_messages(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .messages
            .values()
            .filter(|m| !m.is_map_entry)
            .map(|m| m.name.clone())
            .collect();
        names.sort();
        names
    }

    /// List all service names in the schema, sorted.
    pub fn list_services(&self) -> Vec<String> {
        let mut names: Vec<String> = self.services.keys().cloned().collect();
        names.sort();
        names
    }
}

fn unique_by_simple_name<'a, V>(map: &'a HashMap<String, V>, name: &str) -> Option<&'a V> {
    if name.contains('.') {
        return None;
    }
    let mut matches = map
        .iter()
        .filter(|(full, _)| full.rsplit('.').next() == Some(name));
    match (matches.next(), matches.next()) {
        (Some((_, value)), None) => Some(value),
        _ => None,
    }
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Convert a field name to the upper camel case form protoc uses for accessors.
///
/// Underscores are dropped and the following letter is capitalized, as is
/// any letter following a digit: `int_list` -> `IntList`, `a1b` -> `A1B`.
pub fn to_accessor_name(name: &str) -> String {
    let mut result = String::with_capacity(name.len());
    let mut capitalize_next = true;
    for c in name.chars() {
        if c.is_ascii_lowercase() {
            if capitalize_next {
                result.push(c.to_ascii_uppercase());
            } else {
                result.push(c);
            }
            capitalize_next = false;
        } else if c.is_ascii_uppercase() {
            result.push(c);
            capitalize_next = false;
        } else if c.is_ascii_digit() {
            result.push(c);
            capitalize_next = true;
        } else {
            capitalize_next = true;
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accessor_names() {
        assert_eq!(to_accessor_name("string_value"), "StringValue");
        assert_eq!(to_accessor_name("stringValue"), "StringValue");
        assert_eq!(to_accessor_name("int_list"), "IntList");
        assert_eq!(to_accessor_name("a1b"), "A1B");
        assert_eq!(to_accessor_name("_private"), "Private");
    }

    #[test]
    fn test_field_shapes() {
        let scalar = ProtoFieldDescriptor::new("name", 1, ProtoType::String);
        assert_eq!(scalar.shape(), FieldShape::Scalar);

        let mut list = ProtoFieldDescriptor::new("tags", 2, ProtoType::String);
        list.is_repeated = true;
        assert_eq!(list.shape(), FieldShape::RepeatedList);
        assert_eq!(list.type_description(), "repeated<string>");

        let mut map = ProtoFieldDescriptor::new("m", 3, ProtoType::Message("p.X.MEntry".into()));
        map.is_repeated = true;
        map.map_entry = Some(MapEntryTypes {
            key: ProtoType::String,
            value: ProtoType::Int64,
        });
        assert_eq!(map.shape(), FieldShape::Map);
        assert_eq!(map.type_description(), "map<string, int64>");

        let nested = ProtoFieldDescriptor::new("child", 4, ProtoType::Message("p.Child".into()));
        assert_eq!(nested.shape(), FieldShape::NestedMessage);
    }

    #[test]
    fn test_schema_lookup_by_simple_name() {
        let mut schema = ProtoSchema::default();
        schema.insert_message(ProtoMessageDescriptor::new("a.v1.Request"));
        schema.insert_message(ProtoMessageDescriptor::new("a.v1.Response"));
        schema.insert_message(ProtoMessageDescriptor::new("b.v1.Response"));

        assert!(schema.get_message("a.v1.Request").is_some());
        assert!(schema.get_message(".a.v1.Request").is_some());
        assert!(schema.get_message("Request").is_some());
        // Ambiguous simple name
        assert!(schema.get_message("Response").is_none());
        assert!(schema.get_message("Missing").is_none());
    }

    #[test]
    fn test_find_method_by_capitalized_name() {
        let service = ProtoServiceDescriptor {
            name: "pkg.MyService".to_string(),
            methods: vec![ProtoMethodDescriptor {
                name: "process".to_string(),
                input_type: "pkg.Request".to_string(),
                output_type: "pkg.Response".to_string(),
                client_streaming: false,
                server_streaming: false,
            }],
        };
        assert!(service.find_method("Process").is_some());
        assert!(service.find_method("Send").is_none());
        assert_eq!(service.method_names(), vec!["process".to_string()]);
    }
}
