//! Message type resolution from a type name or an rpc method url.

use crate::error::ConfigurationError;
use crate::naming::capitalize_first;
use crate::options::MessageRole;
use proto_types::{ProtoMessageDescriptor, ProtoSchema};
use std::sync::Arc;
use tracing::debug;
use url::Url;

const GRPC_SCHEME: &str = "grpc";

/// How a message type was referenced in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageTypeRef {
    /// A fully qualified message type name
    Named(String),
    /// The request or response type of an rpc method
    Method {
        service: String,
        method: String,
        role: MessageRole,
    },
}

impl std::fmt::Display for MessageTypeRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageTypeRef::Named(name) => f.write_str(name),
            MessageTypeRef::Method {
                service,
                method,
                role,
            } => write!(f, "{service}/{method} ({role})"),
        }
    }
}

/// A message type looked up in the schema registry.
#[derive(Debug, Clone)]
pub struct ResolvedType {
    pub reference: MessageTypeRef,
    pub descriptor: Arc<ProtoMessageDescriptor>,
}

impl ResolvedType {
    /// Fully qualified name of the resolved message type.
    pub fn name(&self) -> &str {
        &self.descriptor.name
    }
}

/// Split a `grpc://host:port/<service>/<method>` url into service and method.
pub fn parse_grpc_url(url: &str) -> Result<(String, String), ConfigurationError> {
    let parsed = Url::parse(url).map_err(|e| ConfigurationError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    if !parsed.scheme().eq_ignore_ascii_case(GRPC_SCHEME) {
        return Err(ConfigurationError::UnsupportedScheme {
            url: url.to_string(),
            scheme: parsed.scheme().to_string(),
            expected: GRPC_SCHEME.to_string(),
        });
    }

    let invalid_path = || ConfigurationError::InvalidPath {
        url: url.to_string(),
        path: parsed.path().to_string(),
    };
    let segments: Vec<&str> = parsed.path_segments().ok_or_else(invalid_path)?.collect();
    match segments.as_slice() {
        [service, method] if !service.is_empty() && !method.is_empty() => {
            Ok((service.to_string(), method.to_string()))
        }
        _ => Err(invalid_path()),
    }
}

/// Look a message type up by name.
pub fn resolve_named(schema: &ProtoSchema, name: &str) -> Result<ResolvedType, ConfigurationError> {
    let descriptor = schema
        .get_message(name)
        .ok_or_else(|| ConfigurationError::MessageTypeNotFound {
            name: name.to_string(),
            available: schema.list_messages(),
        })?;
    Ok(ResolvedType {
        reference: MessageTypeRef::Named(name.to_string()),
        descriptor: descriptor.clone(),
    })
}

/// Resolve the request or response type of the rpc method named by `url`.
pub fn resolve_url(
    schema: &ProtoSchema,
    url: &str,
    role: MessageRole,
) -> Result<ResolvedType, ConfigurationError> {
    let (service_name, method_name) = parse_grpc_url(url)?;

    let service = schema
        .get_service(&service_name)
        .ok_or_else(|| ConfigurationError::ServiceNotFound {
            service: service_name.clone(),
            available: schema.list_services(),
        })?;

    let method = service
        .find_method(&capitalize_first(&method_name))
        .ok_or_else(|| ConfigurationError::MethodNotFound {
            service: service.name.clone(),
            method: method_name.clone(),
            available: service.method_names(),
        })?;

    let type_name = match role {
        MessageRole::Request => &method.input_type,
        MessageRole::Response => &method.output_type,
    };
    let descriptor = schema
        .get_message(type_name)
        .ok_or_else(|| ConfigurationError::MessageTypeNotFound {
            name: type_name.clone(),
            available: schema.list_messages(),
        })?;
    debug!(
        "Resolved {} of {}/{} to message {}",
        role, service.name, method.name, descriptor.name
    );

    Ok(ResolvedType {
        reference: MessageTypeRef::Method {
            service: service.name.clone(),
            method: method.name.clone(),
            role,
        },
        descriptor: descriptor.clone(),
    })
}

/// Resolve the message type of a connector.
///
/// The url takes precedence; a class given alongside it must name exactly
/// the type the url resolves to. Returns `Ok(None)` when neither is set.
pub fn resolve(
    schema: &ProtoSchema,
    class: Option<&str>,
    url: Option<&str>,
    role: MessageRole,
) -> Result<Option<ResolvedType>, ConfigurationError> {
    match (url, class) {
        (Some(url), class) => {
            let resolved = resolve_url(schema, url, role)?;
            if let Some(class) = class {
                if class != resolved.name() {
                    return Err(ConfigurationError::ClassMismatch {
                        class: class.to_string(),
                        resolved: resolved.name().to_string(),
                        url: url.to_string(),
                    });
                }
            }
            Ok(Some(resolved))
        }
        (None, Some(class)) => resolve_named(schema, class).map(Some),
        (None, None) => Ok(None),
    }
}
