//! Connector options for sink and source mappers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Transport a connector is attached to.
///
/// Names are matched case-insensitively; anything that is not a gRPC
/// transport is kept verbatim in [`TransportKind::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TransportKind {
    Grpc,
    GrpcCall,
    GrpcCallResponse,
    GrpcService,
    GrpcServiceResponse,
    #[default]
    InMemory,
    Other(String),
}

impl TransportKind {
    pub fn is_grpc(&self) -> bool {
        matches!(
            self,
            TransportKind::Grpc
                | TransportKind::GrpcCall
                | TransportKind::GrpcCallResponse
                | TransportKind::GrpcService
                | TransportKind::GrpcServiceResponse
        )
    }

    /// Message role a sink on this transport produces.
    pub fn sink_role(&self) -> MessageRole {
        match self {
            TransportKind::GrpcServiceResponse => MessageRole::Response,
            _ => MessageRole::Request,
        }
    }

    /// Message role a source on this transport consumes.
    pub fn source_role(&self) -> MessageRole {
        match self {
            TransportKind::GrpcCallResponse => MessageRole::Response,
            _ => MessageRole::Request,
        }
    }
}

impl From<&str> for TransportKind {
    fn from(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "grpc" => TransportKind::Grpc,
            "grpc-call" => TransportKind::GrpcCall,
            "grpc-call-response" => TransportKind::GrpcCallResponse,
            "grpc-service" => TransportKind::GrpcService,
            "grpc-service-response" => TransportKind::GrpcServiceResponse,
            "inmemory" => TransportKind::InMemory,
            _ => TransportKind::Other(name.to_string()),
        }
    }
}

impl From<String> for TransportKind {
    fn from(name: String) -> Self {
        TransportKind::from(name.as_str())
    }
}

impl From<TransportKind> for String {
    fn from(kind: TransportKind) -> Self {
        kind.to_string()
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransportKind::Grpc => "grpc",
            TransportKind::GrpcCall => "grpc-call",
            TransportKind::GrpcCallResponse => "grpc-call-response",
            TransportKind::GrpcService => "grpc-service",
            TransportKind::GrpcServiceResponse => "grpc-service-response",
            TransportKind::InMemory => "inMemory",
            TransportKind::Other(name) => name,
        };
        f.write_str(name)
    }
}

/// Which message of an rpc method a connector works with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageRole {
    Request,
    Response,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageRole::Request => f.write_str("request"),
            MessageRole::Response => f.write_str("response"),
        }
    }
}

/// One entry of a sink payload template: the value of `field` is computed
/// from `value` for every event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateEntry {
    /// Target message field
    pub field: String,
    /// An attribute name, a text with `{{attribute}}` placeholders, or a literal
    pub value: String,
}

/// Explicit source mapping of one stream attribute to a message field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeAlias {
    pub attribute: String,
    pub field: String,
}

/// Options of a sink connector.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkOptions {
    pub transport: TransportKind,
    /// `grpc://host:port/<service>/<method>`
    pub url: Option<String>,
    /// Fully qualified message type name
    pub class: Option<String>,
    /// Payload template; replaces attribute name matching when set
    pub payload: Option<Vec<TemplateEntry>>,
}

/// Options of a source connector.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceOptions {
    pub transport: TransportKind,
    /// `grpc://host:port/<service>/<method>`; for `grpc-call-response`
    /// sources this is the url of the paired `grpc-call` sink
    pub url: Option<String>,
    /// Fully qualified message type name
    pub class: Option<String>,
    /// Attribute to field aliases; must cover every stream attribute once
    pub attributes: Option<Vec<AttributeAlias>>,
}
