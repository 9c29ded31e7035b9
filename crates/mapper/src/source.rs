//! Source direction: protobuf messages to events.

use crate::convert::{accepts, from_proto};
use crate::error::{ConfigurationError, ErroneousEvent, Error, Result, RuntimeMappingError};
use crate::mapping::{Accessor, FieldBinding, MappingTable, ValueSource};
use crate::naming::source_accessor_key;
use crate::options::{AttributeAlias, SourceOptions, TransportKind};
use crate::resolver::{resolve, ResolvedType};
use proto_types::{FieldShape, ProtoFieldValue, ProtoMessage, ProtoMessageDescriptor, ProtoSchema};
use protomap_proto::ProtoDecoder;
use std::sync::Arc;
use stream_types::{AttributeType, AttributeValue, Event, StreamSchema};
use tracing::{debug, error, info, warn};

/// What a source receives: encoded bytes or an already decoded message.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceInput {
    Bytes(Vec<u8>),
    Message(ProtoMessage),
}

impl From<Vec<u8>> for SourceInput {
    fn from(bytes: Vec<u8>) -> Self {
        SourceInput::Bytes(bytes)
    }
}

impl From<ProtoMessage> for SourceInput {
    fn from(message: ProtoMessage) -> Self {
        SourceInput::Message(message)
    }
}

/// Maps messages of one type to events of one stream.
///
/// Holds no mutable state; one mapper can serve any number of threads.
#[derive(Debug, Clone)]
pub struct SourceMapper {
    decoder: ProtoDecoder,
    stream: StreamSchema,
    resolved: ResolvedType,
    table: MappingTable<Accessor>,
}

impl SourceMapper {
    /// Resolve the message type and bind every stream attribute to a field
    /// accessor, by attribute name or through the configured aliases.
    pub fn new(
        schema: Arc<ProtoSchema>,
        stream: StreamSchema,
        options: &SourceOptions,
    ) -> std::result::Result<Self, ConfigurationError> {
        let transport = &options.transport;
        if transport.is_grpc() && options.url.is_none() {
            return Err(ConfigurationError::MissingMapping {
                transport: transport.to_string(),
                requirement: "a 'url' naming the rpc method",
            });
        }
        if *transport == TransportKind::GrpcService && options.attributes.is_none() {
            return Err(ConfigurationError::MissingMapping {
                transport: transport.to_string(),
                requirement: "an attribute mapping for the request fields",
            });
        }

        let url = if transport.is_grpc() {
            options.url.as_deref()
        } else {
            None
        };
        let resolved = resolve(&schema, options.class.as_deref(), url, transport.source_role())?
            .ok_or(ConfigurationError::MissingMessageType { direction: "source" })?;

        let bindings = match &options.attributes {
            Some(aliases) => alias_bindings(&stream, &resolved.descriptor, aliases)?,
            None => attribute_bindings(&stream, &resolved.descriptor)?,
        };
        let table = MappingTable::new(resolved.descriptor.clone(), bindings);
        info!(
            "Source for stream {} reads {} with {} bindings",
            stream.id,
            resolved.reference,
            table.len()
        );

        Ok(Self {
            decoder: ProtoDecoder::new(schema),
            stream,
            resolved,
            table,
        })
    }

    pub fn stream(&self) -> &StreamSchema {
        &self.stream
    }

    pub fn resolved(&self) -> &ResolvedType {
        &self.resolved
    }

    /// Fully qualified name of the consumed message type.
    pub fn message_type(&self) -> &str {
        self.resolved.name()
    }

    pub fn table(&self) -> &MappingTable<Accessor> {
        &self.table
    }

    /// Map one input to an event.
    ///
    /// Every binding is evaluated even after one fails, so the erroneous
    /// event describes all failing fields at once.
    pub fn to_event(&self, input: &SourceInput) -> std::result::Result<Event, ErroneousEvent> {
        let decoded;
        let message = match input {
            SourceInput::Bytes(bytes) => match self.decoder.decode_with(self.table.message(), bytes) {
                Ok(message) => {
                    decoded = message;
                    &decoded
                }
                Err(e) => {
                    return Err(ErroneousEvent {
                        original: input.clone(),
                        error: e.to_string(),
                        description: format!(
                            "Failed to decode {} for stream {}",
                            self.message_type(),
                            self.stream.id
                        ),
                    })
                }
            },
            SourceInput::Message(message) => {
                if message.message_type != self.message_type() {
                    return Err(ErroneousEvent {
                        original: input.clone(),
                        error: format!(
                            "expected message {}, got {}",
                            self.message_type(),
                            message.message_type
                        ),
                        description: format!("Unexpected message for stream {}", self.stream.id),
                    });
                }
                message
            }
        };

        let mut data = vec![AttributeValue::Null; self.stream.len()];
        let mut failures = Vec::new();
        for binding in &self.table {
            match self.read(message, &binding.handle) {
                Ok(value) => data[binding.position] = value,
                Err(e) => failures.push(e.to_string()),
            }
        }

        if failures.is_empty() {
            Ok(Event::new(data))
        } else {
            Err(ErroneousEvent {
                original: input.clone(),
                error: failures.join("; "),
                description: format!(
                    "Failed to map {} to an event of stream {}",
                    self.message_type(),
                    self.stream.id
                ),
            })
        }
    }

    /// Map a batch of inputs, handing every good event to `emit` exactly once.
    ///
    /// Failed inputs do not stop the batch. When any input failed, the
    /// result is [`Error::ErroneousEvents`] carrying all of them.
    pub fn process_batch<F>(&self, inputs: &[SourceInput], mut emit: F) -> Result<usize>
    where
        F: FnMut(Event),
    {
        let mut emitted = 0;
        let mut erroneous = Vec::new();
        for input in inputs {
            match self.to_event(input) {
                Ok(event) => {
                    emit(event);
                    emitted += 1;
                }
                Err(bad) => {
                    warn!("{bad}");
                    erroneous.push(bad);
                }
            }
        }

        if erroneous.is_empty() {
            Ok(emitted)
        } else {
            error!(
                "{} of {} inputs for stream {} could not be mapped",
                erroneous.len(),
                inputs.len(),
                self.stream.id
            );
            Err(Error::ErroneousEvents {
                events: erroneous,
                total: inputs.len(),
            })
        }
    }

    fn read(
        &self,
        message: &ProtoMessage,
        accessor: &Accessor,
    ) -> std::result::Result<AttributeValue, RuntimeMappingError> {
        let field = accessor.descriptor();
        let value = message.get_or_default(field);

        match (accessor, &value) {
            (Accessor::Scalar { attribute_type, .. }, raw) => {
                let converted = from_proto(raw);
                if converted.attribute_type() == Some(*attribute_type) {
                    Ok(converted)
                } else {
                    Err(RuntimeMappingError::new(
                        &field.name,
                        field.type_description(),
                        raw.kind_name(),
                    ))
                }
            }
            (Accessor::List { .. }, ProtoFieldValue::Repeated(_))
            | (Accessor::Map { .. }, ProtoFieldValue::Map(_))
            | (Accessor::Message { .. }, ProtoFieldValue::Message(_) | ProtoFieldValue::Null) => {
                Ok(from_proto(&value))
            }
            (_, raw) => Err(RuntimeMappingError::new(
                &field.name,
                field.type_description(),
                raw.kind_name(),
            )),
        }
    }
}

fn attribute_bindings(
    stream: &StreamSchema,
    message: &ProtoMessageDescriptor,
) -> std::result::Result<Vec<FieldBinding<Accessor>>, ConfigurationError> {
    stream
        .attributes
        .iter()
        .enumerate()
        .map(|(position, attribute)| {
            let handle = resolve_accessor(message, &attribute.name, &attribute.name, attribute.attribute_type)?;
            Ok(FieldBinding {
                position,
                handle,
                source: ValueSource::Direct,
            })
        })
        .collect()
}

fn alias_bindings(
    stream: &StreamSchema,
    message: &ProtoMessageDescriptor,
    aliases: &[AttributeAlias],
) -> std::result::Result<Vec<FieldBinding<Accessor>>, ConfigurationError> {
    let attribute_names = || -> Vec<String> {
        stream.attribute_names().iter().map(|s| s.to_string()).collect()
    };

    let mut by_position: Vec<Option<&AttributeAlias>> = vec![None; stream.len()];
    for alias in aliases {
        let position =
            stream
                .position_of(&alias.attribute)
                .ok_or_else(|| ConfigurationError::InvalidAlias {
                    attribute: alias.attribute.clone(),
                    reason: "not an attribute of the stream".to_string(),
                    attributes: attribute_names(),
                })?;
        if by_position[position].replace(alias).is_some() {
            return Err(ConfigurationError::InvalidAlias {
                attribute: alias.attribute.clone(),
                reason: "mapped more than once".to_string(),
                attributes: attribute_names(),
            });
        }
    }

    stream
        .attributes
        .iter()
        .zip(by_position)
        .enumerate()
        .map(|(position, (attribute, alias))| {
            let alias = alias.ok_or_else(|| ConfigurationError::InvalidAlias {
                attribute: attribute.name.clone(),
                reason: "no field mapping given".to_string(),
                attributes: attribute_names(),
            })?;
            let handle = resolve_accessor(message, &attribute.name, &alias.field, attribute.attribute_type)?;
            debug!("Attribute {} <- {}", attribute.name, handle.field());
            Ok(FieldBinding {
                position,
                handle,
                source: ValueSource::Direct,
            })
        })
        .collect()
}

/// Find the field `target` reads from and pick the accessor for its shape.
fn resolve_accessor(
    message: &ProtoMessageDescriptor,
    attribute: &str,
    target: &str,
    attribute_type: AttributeType,
) -> std::result::Result<Accessor, ConfigurationError> {
    let key = source_accessor_key(target);
    let field = message
        .find_by_accessor(&key)
        .ok_or_else(|| ConfigurationError::FieldNotFound {
            attribute: attribute.to_string(),
            field: key.clone(),
            message: message.name.clone(),
            fields: message.fields_with_types(),
        })?;
    if attribute_type == AttributeType::Object {
        return match field.shape() {
            FieldShape::RepeatedList => Ok(Accessor::List { field: field.clone() }),
            FieldShape::Map => Ok(Accessor::Map { field: field.clone() }),
            FieldShape::NestedMessage => Ok(Accessor::Message { field: field.clone() }),
            FieldShape::Scalar => Err(ConfigurationError::ObjectShape {
                attribute: attribute.to_string(),
                field: field.name.clone(),
                message: message.name.clone(),
                shape: FieldShape::Scalar.to_string(),
                allowed: "list, map or message",
            }),
        };
    }

    if field.shape() == FieldShape::Scalar && accepts(attribute_type, &field.field_type) {
        Ok(Accessor::Scalar {
            field: field.clone(),
            attribute_type,
        })
    } else {
        Err(ConfigurationError::IncompatibleField {
            attribute: attribute.to_string(),
            attribute_type: attribute_type.to_string(),
            field: field.name.clone(),
            field_type: field.type_description(),
            message: message.name.clone(),
            fields: message.fields_with_types(),
        })
    }
}
