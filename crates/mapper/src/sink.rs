//! Sink direction: events to protobuf messages.

use crate::convert::{accepts, to_proto_map_entries, to_proto_value};
use crate::error::{ConfigurationError, Result, RuntimeMappingError};
use crate::mapping::{FieldBinding, MappingTable, Mutator, ValueSource};
use crate::naming::sink_accessor_key;
use crate::options::{SinkOptions, TemplateEntry, TransportKind};
use crate::resolver::{resolve, ResolvedType};
use crate::template::TemplateExpression;
use proto_types::{ProtoMessage, ProtoMessageDescriptor, ProtoSchema};
use protomap_proto::{encode_message, MessageBuilder};
use std::borrow::Cow;
use std::sync::{Arc, Mutex, PoisonError};
use stream_types::{AttributeType, Event, StreamSchema};
use tracing::{debug, error, info};

/// Maps events of one stream to messages of one type.
///
/// All events go through a single [`MessageBuilder`]; the lock is held for
/// the whole set-then-build sequence of an event, so concurrent callers
/// never see each other's fields.
#[derive(Debug)]
pub struct SinkMapper {
    schema: Arc<ProtoSchema>,
    stream: StreamSchema,
    resolved: ResolvedType,
    table: MappingTable<Mutator>,
    builder: Mutex<MessageBuilder>,
}

impl SinkMapper {
    /// Resolve the message type and bind every attribute, or every payload
    /// template entry, to a field mutator.
    pub fn new(
        schema: Arc<ProtoSchema>,
        stream: StreamSchema,
        options: &SinkOptions,
    ) -> std::result::Result<Self, ConfigurationError> {
        let role = options.transport.sink_role();
        let resolved = resolve(&schema, options.class.as_deref(), options.url.as_deref(), role)?
            .ok_or(ConfigurationError::MissingMessageType { direction: "sink" })?;

        if options.transport == TransportKind::GrpcServiceResponse
            && options.payload.as_ref().map_or(true, Vec::is_empty)
        {
            return Err(ConfigurationError::MissingMapping {
                transport: options.transport.to_string(),
                requirement: "a payload template mapping the response fields",
            });
        }

        let bindings = match &options.payload {
            Some(entries) => template_bindings(&stream, &resolved.descriptor, entries)?,
            None => attribute_bindings(&stream, &resolved.descriptor)?,
        };
        let table = MappingTable::new(resolved.descriptor.clone(), bindings);
        info!(
            "Sink for stream {} maps to {} with {} bindings",
            stream.id,
            resolved.reference,
            table.len()
        );

        Ok(Self {
            builder: Mutex::new(MessageBuilder::new(resolved.descriptor.clone())),
            schema,
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

    /// Fully qualified name of the produced message type.
    pub fn message_type(&self) -> &str {
        self.resolved.name()
    }

    pub fn table(&self) -> &MappingTable<Mutator> {
        &self.table
    }

    /// Map one event to a message.
    ///
    /// On error the builder is cleared, so nothing of this event leaks into
    /// the next one.
    pub fn map_event(&self, event: &Event) -> std::result::Result<ProtoMessage, RuntimeMappingError> {
        let mut builder = self.builder.lock().unwrap_or_else(PoisonError::into_inner);
        match self.apply(&mut builder, event) {
            Ok(()) => Ok(builder.build()),
            Err(e) => {
                builder.clear();
                Err(e)
            }
        }
    }

    /// Map and encode one event.
    pub fn encode_event(&self, event: &Event) -> Result<Vec<u8>> {
        let message = self.map_event(event)?;
        Ok(encode_message(&message)?)
    }

    /// Map every event and hand each built message to `publish`.
    ///
    /// Events that fail to map are logged and dropped; the rest of the batch
    /// is still published. Returns the number of published messages.
    pub fn publish_events<F>(&self, events: &[Event], mut publish: F) -> usize
    where
        F: FnMut(ProtoMessage),
    {
        let mut published = 0;
        for event in events {
            match self.map_event(event) {
                Ok(message) => {
                    publish(message);
                    published += 1;
                }
                Err(e) => error!("Dropping event of stream {}: {e}", self.stream.id),
            }
        }
        published
    }

    fn apply(
        &self,
        builder: &mut MessageBuilder,
        event: &Event,
    ) -> std::result::Result<(), RuntimeMappingError> {
        for binding in &self.table {
            let value = match &binding.source {
                ValueSource::Direct => match event.get(binding.position) {
                    Some(value) => Cow::Borrowed(value),
                    None => {
                        return Err(RuntimeMappingError::new(
                            binding.handle.field(),
                            format!("attribute at position {}", binding.position),
                            "missing value",
                        ))
                    }
                },
                ValueSource::Template(expression) => Cow::Owned(expression.evaluate(event)),
            };
            // proto3 has no null: leave the field unset
            if value.is_null() {
                continue;
            }

            match &binding.handle {
                Mutator::Set { field } => {
                    let converted = to_proto_value(&self.schema, &field.name, &field.field_type, &value)?;
                    builder.set_field(field, converted)?;
                }
                Mutator::PutAll { field, entry_types } => {
                    let entries = to_proto_map_entries(&self.schema, &field.name, entry_types, &value)?;
                    builder.put_all_field(field, entries)?;
                }
            }
        }
        Ok(())
    }
}

fn attribute_bindings(
    stream: &StreamSchema,
    message: &ProtoMessageDescriptor,
) -> std::result::Result<Vec<FieldBinding<Mutator>>, ConfigurationError> {
    stream
        .attributes
        .iter()
        .enumerate()
        .map(|(position, attribute)| {
            let handle = resolve_mutator(message, &attribute.name, &attribute.name, attribute.attribute_type)?;
            debug!("Attribute {} -> {}", attribute.name, handle.field());
            Ok(FieldBinding {
                position,
                handle,
                source: ValueSource::Direct,
            })
        })
        .collect()
}

fn template_bindings(
    stream: &StreamSchema,
    message: &ProtoMessageDescriptor,
    entries: &[TemplateEntry],
) -> std::result::Result<Vec<FieldBinding<Mutator>>, ConfigurationError> {
    entries
        .iter()
        .enumerate()
        .map(|(position, entry)| {
            let expression = TemplateExpression::parse(&entry.field, &entry.value, stream)?;
            let value_type = expression.value_type(stream);
            let handle = resolve_mutator(message, &entry.field, &entry.field, value_type)?;
            debug!("Template {:?} -> {}", entry.value, handle.field());
            Ok(FieldBinding {
                position,
                handle,
                source: ValueSource::Template(expression),
            })
        })
        .collect()
}

/// Find the field `target` writes to and pick the mutator for it.
///
/// `target` is matched against accessor names after capitalizing its first
/// letter; the declared field name is accepted as well.
fn resolve_mutator(
    message: &ProtoMessageDescriptor,
    attribute: &str,
    target: &str,
    attribute_type: AttributeType,
) -> std::result::Result<Mutator, ConfigurationError> {
    let field = message
        .find_by_accessor(&sink_accessor_key(target))
        .or_else(|| message.get_field(target))
        .ok_or_else(|| ConfigurationError::FieldNotFound {
            attribute: attribute.to_string(),
            field: sink_accessor_key(target),
            message: message.name.clone(),
            fields: message.fields_with_types(),
        })?;

    if attribute_type == AttributeType::Object {
        return match &field.map_entry {
            Some(entry_types) => Ok(Mutator::PutAll {
                field: field.clone(),
                entry_types: entry_types.clone(),
            }),
            None => Err(ConfigurationError::ObjectShape {
                attribute: attribute.to_string(),
                field: field.name.clone(),
                message: message.name.clone(),
                shape: field.shape().to_string(),
                allowed: "map",
            }),
        };
    }

    if field.map_entry.is_none() && !field.is_repeated && accepts(attribute_type, &field.field_type) {
        Ok(Mutator::Set {
            field: field.clone(),
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

#[cfg(test)]
mod tests {
    use super::*;
    use proto_types::ProtoFieldValue;
    use stream_types::{Attribute, AttributeValue, ObjectValue};

    const PROTO: &str = r#"
        syntax = "proto3";
        package org.example;

        message Request {
            string string_value = 1;
            int32 int_value = 2;
            map<string, int64> counters = 3;
            repeated string tags = 4;
        }
        message Empty {}

        service MyService {
            rpc send (Request) returns (Empty);
        }
    "#;

    fn schema() -> Arc<ProtoSchema> {
        Arc::new(protomap_proto::parse_string(PROTO).expect("Failed to parse proto"))
    }

    fn stream(attributes: &[(&str, AttributeType)]) -> StreamSchema {
        StreamSchema::new(
            "FooStream",
            attributes
                .iter()
                .map(|(name, ty)| Attribute::new(*name, *ty))
                .collect(),
        )
    }

    fn class(name: &str) -> SinkOptions {
        SinkOptions {
            class: Some(name.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_bindings_follow_attribute_order() {
        let mapper = SinkMapper::new(
            schema(),
            stream(&[
                ("intValue", AttributeType::Int),
                ("stringValue", AttributeType::String),
                ("counters", AttributeType::Object),
            ]),
            &class("org.example.Request"),
        )
        .unwrap();

        let table = mapper.table();
        assert_eq!(table.len(), 3);
        let fields: Vec<&str> = table.iter().map(|b| b.handle.field()).collect();
        assert_eq!(fields, vec!["int_value", "string_value", "counters"]);
        let positions: Vec<usize> = table.iter().map(|b| b.position).collect();
        assert_eq!(positions, vec![0, 1, 2]);
        assert!(matches!(table.bindings()[2].handle, Mutator::PutAll { .. }));

        let request = table.message();
        for binding in table {
            assert_eq!(
                Some(binding.handle.descriptor()),
                request.get_field(binding.handle.field())
            );
        }
    }

    #[test]
    fn test_unknown_attribute_lists_fields() {
        let err = SinkMapper::new(
            schema(),
            stream(&[("price", AttributeType::Double)]),
            &class("org.example.Request"),
        )
        .unwrap_err();
        match err {
            ConfigurationError::FieldNotFound { field, fields, .. } => {
                assert_eq!(field, "Price");
                assert_eq!(
                    fields,
                    vec![
                        "string_value: string",
                        "int_value: int32",
                        "counters: map<string, int64>",
                        "tags: repeated<string>",
                    ]
                );
            }
            other => panic!("Expected FieldNotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_object_attribute_needs_map_field() {
        let err = SinkMapper::new(
            schema(),
            stream(&[("tags", AttributeType::Object)]),
            &class("org.example.Request"),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigurationError::ObjectShape { .. }));

        let err = SinkMapper::new(
            schema(),
            stream(&[("stringValue", AttributeType::Object)]),
            &class("org.example.Request"),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigurationError::ObjectShape { .. }));
    }

    #[test]
    fn test_scalar_type_mismatch_fails_setup() {
        let err = SinkMapper::new(
            schema(),
            stream(&[("intValue", AttributeType::Long)]),
            &class("org.example.Request"),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigurationError::IncompatibleField { .. }));
    }

    #[test]
    fn test_missing_message_type() {
        let err = SinkMapper::new(
            schema(),
            stream(&[("intValue", AttributeType::Int)]),
            &SinkOptions::default(),
        )
        .unwrap_err();
        assert_eq!(err, ConfigurationError::MissingMessageType { direction: "sink" });
    }

    #[test]
    fn test_service_response_requires_payload() {
        let options = SinkOptions {
            transport: TransportKind::GrpcServiceResponse,
            url: Some("grpc://localhost:8888/org.example.MyService/send".to_string()),
            ..Default::default()
        };
        let err = SinkMapper::new(schema(), stream(&[("a", AttributeType::Int)]), &options)
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::MissingMapping { .. }));

        let empty_payload = SinkOptions {
            payload: Some(Vec::new()),
            ..options
        };
        let err = SinkMapper::new(schema(), stream(&[("a", AttributeType::Int)]), &empty_payload)
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::MissingMapping { .. }));
    }

    #[test]
    fn test_payload_template_defines_table() {
        let options = SinkOptions {
            class: Some("org.example.Request".to_string()),
            payload: Some(vec![
                TemplateEntry {
                    field: "stringValue".to_string(),
                    value: "{{symbol}}-{{volume}}".to_string(),
                },
                TemplateEntry {
                    field: "int_value".to_string(),
                    value: "volume".to_string(),
                },
            ]),
            ..Default::default()
        };
        let mapper = SinkMapper::new(
            schema(),
            stream(&[
                ("symbol", AttributeType::String),
                ("price", AttributeType::Double),
                ("volume", AttributeType::Int),
            ]),
            &options,
        )
        .unwrap();
        assert_eq!(mapper.table().len(), 2);

        let message = mapper
            .map_event(&Event::new(vec!["IBM".into(), 10.5f64.into(), 7.into()]))
            .unwrap();
        assert_eq!(
            message.get("string_value"),
            Some(&ProtoFieldValue::String("IBM-7".to_string()))
        );
        assert_eq!(message.get("int_value"), Some(&ProtoFieldValue::Int32(7)));
    }

    #[test]
    fn test_failed_event_leaves_builder_clean() {
        let mapper = SinkMapper::new(
            schema(),
            stream(&[
                ("stringValue", AttributeType::String),
                ("intValue", AttributeType::Int),
            ]),
            &class("org.example.Request"),
        )
        .unwrap();

        let err = mapper
            .map_event(&Event::new(vec!["a".into(), "not an int".into()]))
            .unwrap_err();
        assert_eq!(err, RuntimeMappingError::new("int_value", "int32", "string"));

        let message = mapper
            .map_event(&Event::new(vec![AttributeValue::Null, 3.into()]))
            .unwrap();
        assert_eq!(message.get("string_value"), None);
        assert_eq!(message.get("int_value"), Some(&ProtoFieldValue::Int32(3)));
    }

    #[test]
    fn test_publish_events_drops_bad_events() {
        let mapper = SinkMapper::new(
            schema(),
            stream(&[("counters", AttributeType::Object)]),
            &class("org.example.Request"),
        )
        .unwrap();
        let counters = |n: i64| {
            AttributeValue::Object(ObjectValue::Map(vec![("hits".into(), AttributeValue::Long(n))]))
        };

        let mut published = Vec::new();
        let count = mapper.publish_events(
            &[
                Event::new(vec![counters(1)]),
                Event::new(vec!["oops".into()]),
                Event::new(vec![counters(3)]),
            ],
            |message| published.push(message),
        );
        assert_eq!(count, 2);
        assert_eq!(
            published[1].get("counters"),
            Some(&ProtoFieldValue::Map(vec![(
                ProtoFieldValue::String("hits".to_string()),
                ProtoFieldValue::Int64(3)
            )]))
        );
    }
}
