//! Error types for mapper setup and per-event mapping.

use crate::source::SourceInput;
use thiserror::Error;

/// Url format accepted for rpc method references.
pub const EXPECTED_URL_FORMAT: &str = "grpc://0.0.0.0:9763/<serviceName>/<methodName>";

/// Fatal setup errors. Each carries the offending identifier and what
/// would have been valid instead.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("Malformed url '{url}': {reason}. Expected format: grpc://0.0.0.0:9763/<serviceName>/<methodName>")]
    InvalidUrl { url: String, reason: String },

    #[error("Url '{url}' has scheme '{scheme}', expected '{expected}'")]
    UnsupportedScheme {
        url: String,
        scheme: String,
        expected: String,
    },

    #[error("Url '{url}' must have a path of exactly two segments /<serviceName>/<methodName>, got '{path}'")]
    InvalidPath { url: String, path: String },

    #[error("Service '{service}' not found. Known services: [{}]", .available.join(", "))]
    ServiceNotFound {
        service: String,
        available: Vec<String>,
    },

    #[error("Method '{method}' not found in service '{service}'. Valid methods: [{}]", .available.join(", "))]
    MethodNotFound {
        service: String,
        method: String,
        available: Vec<String>,
    },

    #[error("Message type '{name}' not found. Known message types: [{}]", .available.join(", "))]
    MessageTypeNotFound { name: String, available: Vec<String> },

    #[error("Configured class '{class}' does not match '{resolved}' resolved from url '{url}'")]
    ClassMismatch {
        class: String,
        resolved: String,
        url: String,
    },

    #[error("No message type configured for {direction}: set 'url' or 'class'")]
    MissingMessageType { direction: &'static str },

    #[error("Transport '{transport}' requires {requirement}")]
    MissingMapping {
        transport: String,
        requirement: &'static str,
    },

    #[error("Attribute '{attribute}' has no field '{field}' in message {message}. Fields: [{}]", .fields.join(", "))]
    FieldNotFound {
        attribute: String,
        field: String,
        message: String,
        fields: Vec<String>,
    },

    #[error("Attribute '{attribute}' of type {attribute_type} cannot map to field '{field}: {field_type}' of message {message}. Fields: [{}]", .fields.join(", "))]
    IncompatibleField {
        attribute: String,
        attribute_type: String,
        field: String,
        field_type: String,
        message: String,
        fields: Vec<String>,
    },

    #[error("Attribute '{attribute}' is of type object but field '{field}' of message {message} is a {shape} field; object attributes must map to {allowed} fields")]
    ObjectShape {
        attribute: String,
        field: String,
        message: String,
        shape: String,
        allowed: &'static str,
    },

    #[error("Invalid attribute mapping for '{attribute}': {reason}. Stream attributes: [{}]", .attributes.join(", "))]
    InvalidAlias {
        attribute: String,
        reason: String,
        attributes: Vec<String>,
    },

    #[error("Template for field '{field}' references unknown attribute '{attribute}'. Stream attributes: [{}]", .attributes.join(", "))]
    UnknownTemplateAttribute {
        field: String,
        attribute: String,
        attributes: Vec<String>,
    },
}

/// A value could not be written to the field it was bound to.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Cannot map value to field '{field}': expected {expected}, got {actual}")]
pub struct RuntimeMappingError {
    pub field: String,
    pub expected: String,
    pub actual: String,
}

impl RuntimeMappingError {
    pub fn new(field: impl Into<String>, expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}

impl From<protomap_proto::Error> for RuntimeMappingError {
    fn from(err: protomap_proto::Error) -> Self {
        match err {
            protomap_proto::Error::InvalidFieldType {
                field,
                expected,
                actual,
            } => RuntimeMappingError {
                field,
                expected,
                actual,
            },
            protomap_proto::Error::FieldNotFound { message, field } => RuntimeMappingError {
                field,
                expected: format!("a field of {message}"),
                actual: "unknown field".to_string(),
            },
            other => RuntimeMappingError {
                field: String::new(),
                expected: "a mappable value".to_string(),
                actual: other.to_string(),
            },
        }
    }
}

/// An input the source could not turn into an event.
#[derive(Debug, Clone, PartialEq)]
pub struct ErroneousEvent {
    /// The input exactly as it was received
    pub original: SourceInput,
    pub error: String,
    pub description: String,
}

impl std::fmt::Display for ErroneousEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.description, self.error)
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Mapping error: {0}")]
    Mapping(#[from] RuntimeMappingError),

    #[error(transparent)]
    Proto(#[from] protomap_proto::Error),

    #[error("{} of {total} inputs could not be mapped: {}", .events.len(), summarize(.events))]
    ErroneousEvents {
        events: Vec<ErroneousEvent>,
        total: usize,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

fn summarize(events: &[ErroneousEvent]) -> String {
    events
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
