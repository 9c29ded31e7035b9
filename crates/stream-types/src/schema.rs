//! Stream schema definitions.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// Error type for schema operations.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// Error reading schema file
    #[error("Failed to read schema file: {0}")]
    IoError(#[from] std::io::Error),

    /// Error parsing YAML
    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// Two attributes share a name
    #[error("Duplicate attribute '{attribute}' in stream '{stream}'")]
    DuplicateAttribute { stream: String, attribute: String },

    /// Stream declares no attributes
    #[error("Stream '{0}' has no attributes")]
    Empty(String),
}

/// Attribute types of the stream engine.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AttributeType {
    String,
    Int,
    Long,
    Float,
    Double,
    #[serde(alias = "boolean")]
    Bool,
    /// Anything else: lists, maps and nested messages
    Object,
}

impl std::fmt::Display for AttributeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AttributeType::String => "STRING",
            AttributeType::Int => "INT",
            AttributeType::Long => "LONG",
            AttributeType::Float => "FLOAT",
            AttributeType::Double => "DOUBLE",
            AttributeType::Bool => "BOOL",
            AttributeType::Object => "OBJECT",
        };
        f.write_str(name)
    }
}

/// A named, typed stream attribute.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Attribute {
    /// Attribute name
    pub name: String,

    /// Attribute type
    #[serde(rename = "type")]
    pub attribute_type: AttributeType,
}

impl Attribute {
    pub fn new(name: impl Into<String>, attribute_type: AttributeType) -> Self {
        Self {
            name: name.into(),
            attribute_type,
        }
    }
}

/// Stream definition: an id plus ordered attributes.
///
/// The attribute order is the source of truth for positions in [`crate::Event::data`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StreamSchema {
    /// Stream id
    pub id: String,

    /// Attributes in declaration order
    pub attributes: Vec<Attribute>,
}

impl StreamSchema {
    pub fn new(id: impl Into<String>, attributes: Vec<Attribute>) -> Self {
        Self {
            id: id.into(),
            attributes,
        }
    }

    /// Load schema from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SchemaError> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse schema from YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, SchemaError> {
        let schema: StreamSchema = serde_yaml::from_str(yaml)?;
        schema.validate()?;
        Ok(schema)
    }

    /// Check that the stream has attributes and their names are unique.
    pub fn validate(&self) -> Result<(), SchemaError> {
        if self.attributes.is_empty() {
            return Err(SchemaError::Empty(self.id.clone()));
        }
        let mut seen = HashSet::new();
        for attribute in &self.attributes {
            if !seen.insert(attribute.name.as_str()) {
                return Err(SchemaError::DuplicateAttribute {
                    stream: self.id.clone(),
                    attribute: attribute.name.clone(),
                });
            }
        }
        Ok(())
    }

    /// Number of attributes.
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Position of an attribute by name.
    pub fn position_of(&self, name: &str) -> Option<usize> {
        self.attributes.iter().position(|a| a.name == name)
    }

    /// Get an attribute by name.
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// All attribute names in order.
    pub fn attribute_names(&self) -> Vec<&str> {
        self.attributes.iter().map(|a| a.name.as_str()).collect()
    }
}
