//! End-to-end behavior of sink and source mappers sharing one schema.

mod common;

use common::{scalar_stream, schema, stream};
use protomap_mapper::{
    AttributeAlias, ConfigurationError, Error, SinkMapper, SinkOptions, SourceInput, SourceMapper,
    SourceOptions, TransportKind,
};
use protomap_proto::encode_message;
use stream_types::{AttributeType, AttributeValue, Event, ObjectValue};

const URL: &str = "grpc://localhost:8888/org.wso2.grpc.test.MyService/process";

fn scalar_event(text: &str, n: i32) -> Event {
    Event::new(vec![
        AttributeValue::String(text.to_string()),
        AttributeValue::Int(n),
        AttributeValue::Long(i64::from(n) * 1_000_000),
        AttributeValue::Bool(n % 2 == 0),
        AttributeValue::Float(n as f32 / 4.0),
        AttributeValue::Double(n as f64 * 1.5),
        AttributeValue::Int(-n),
    ])
}

#[test]
fn test_setup_builds_one_binding_per_attribute_in_order() {
    let stream = scalar_stream();
    let options = SinkOptions {
        transport: TransportKind::GrpcCall,
        url: Some(URL.to_string()),
        ..Default::default()
    };
    let sink = SinkMapper::new(schema(), stream.clone(), &options).unwrap();

    assert_eq!(sink.message_type(), "org.wso2.grpc.test.Request");
    assert_eq!(sink.table().len(), stream.len());
    for (i, binding) in sink.table().iter().enumerate() {
        assert_eq!(binding.position, i);
    }
}

#[test]
fn test_sink_to_bytes_to_source_preserves_values() {
    let stream = scalar_stream();
    let sink = SinkMapper::new(
        schema(),
        stream.clone(),
        &SinkOptions {
            class: Some("org.wso2.grpc.test.Request".to_string()),
            ..Default::default()
        },
    )
    .unwrap();
    let source = SourceMapper::new(
        schema(),
        stream,
        &SourceOptions {
            class: Some("org.wso2.grpc.test.Request".to_string()),
            ..Default::default()
        },
    )
    .unwrap();

    for (text, n) in [("Test 01", 60), ("", -7), ("ünïcode", i32::MAX)] {
        let event = scalar_event(text, n);
        let bytes = sink.encode_event(&event).expect("encode failed");
        let back = source
            .to_event(&SourceInput::Bytes(bytes))
            .expect("decode failed");
        assert_eq!(back.data, event.data);
    }
}

#[test]
fn test_object_round_trip_through_map_field() {
    let attributes = [("mapValue", AttributeType::Object)];
    let sink = SinkMapper::new(
        schema(),
        stream(&attributes),
        &SinkOptions {
            class: Some("org.wso2.grpc.test.Request".to_string()),
            ..Default::default()
        },
    )
    .unwrap();
    let source = SourceMapper::new(
        schema(),
        stream(&attributes),
        &SourceOptions {
            class: Some("org.wso2.grpc.test.Request".to_string()),
            ..Default::default()
        },
    )
    .unwrap();

    let map = AttributeValue::Object(ObjectValue::Map(vec![
        ("Key 1".into(), "Value 1".into()),
        ("Key 2".into(), "Value 2".into()),
    ]));
    let message = sink.map_event(&Event::new(vec![map.clone()])).unwrap();
    let event = source.to_event(&SourceInput::Message(message)).unwrap();
    assert_eq!(event.data, vec![map]);
}

#[test]
fn test_object_attribute_on_scalar_field_fails_setup() {
    let attributes = [("stringValue", AttributeType::Object)];
    let options = SinkOptions {
        class: Some("org.wso2.grpc.test.Request".to_string()),
        ..Default::default()
    };
    assert!(matches!(
        SinkMapper::new(schema(), stream(&attributes), &options),
        Err(ConfigurationError::ObjectShape { .. })
    ));

    let options = SourceOptions {
        class: Some("org.wso2.grpc.test.Request".to_string()),
        ..Default::default()
    };
    assert!(matches!(
        SourceMapper::new(schema(), stream(&attributes), &options),
        Err(ConfigurationError::ObjectShape { .. })
    ));
}

#[test]
fn test_aliases_bind_by_stream_position() {
    let options = SourceOptions {
        transport: TransportKind::GrpcService,
        url: Some(URL.to_string()),
        attributes: Some(vec![
            AttributeAlias {
                attribute: "b".to_string(),
                field: "intValue".to_string(),
            },
            AttributeAlias {
                attribute: "a".to_string(),
                field: "stringValue".to_string(),
            },
        ]),
        ..Default::default()
    };
    let source = SourceMapper::new(
        schema(),
        stream(&[("a", AttributeType::String), ("b", AttributeType::Int)]),
        &options,
    )
    .unwrap();

    let bindings: Vec<(usize, &str)> = source
        .table()
        .iter()
        .map(|b| (b.position, b.handle.field()))
        .collect();
    assert_eq!(bindings, vec![(0, "string_value"), (1, "int_value")]);
}

#[test]
fn test_undecodable_input_is_reported_and_batch_continues() {
    let stream = stream(&[
        ("stringValue", AttributeType::String),
        ("intValue", AttributeType::Int),
    ]);
    let sink = SinkMapper::new(
        schema(),
        stream.clone(),
        &SinkOptions {
            class: Some("org.wso2.grpc.test.Request".to_string()),
            ..Default::default()
        },
    )
    .unwrap();
    let source = SourceMapper::new(
        schema(),
        stream,
        &SourceOptions {
            class: Some("org.wso2.grpc.test.Request".to_string()),
            ..Default::default()
        },
    )
    .unwrap();

    let good = |n: i32| {
        let message = sink
            .map_event(&Event::new(vec!["ok".into(), n.into()]))
            .unwrap();
        SourceInput::Bytes(encode_message(&message).unwrap())
    };
    // string_value claims 10 bytes but the buffer ends after 2
    let garbage = SourceInput::Bytes(vec![0x0A, 0x0A, b'x', b'y']);
    let batch = vec![good(1), garbage.clone(), good(3)];

    let mut emitted = Vec::new();
    let result = source.process_batch(&batch, |event| emitted.push(event));

    assert_eq!(emitted.len(), 2);
    assert_eq!(emitted[0].data[1], AttributeValue::Int(1));
    assert_eq!(emitted[1].data[1], AttributeValue::Int(3));
    match result {
        Err(Error::ErroneousEvents { events, total }) => {
            assert_eq!(total, 3);
            assert_eq!(events.len(), 1);
            assert_eq!(events[0].original, garbage);
        }
        other => panic!("Expected ErroneousEvents, got {other:?}"),
    }
}

#[test]
fn test_class_and_url_must_agree() {
    let stream = stream(&[("stringValue", AttributeType::String)]);

    let conflicting = SinkOptions {
        transport: TransportKind::GrpcCall,
        url: Some(URL.to_string()),
        class: Some("org.wso2.grpc.test.EmptyResponse".to_string()),
        ..Default::default()
    };
    let message = SinkMapper::new(schema(), stream.clone(), &conflicting)
        .unwrap_err()
        .to_string();
    assert!(message.contains("org.wso2.grpc.test.EmptyResponse"));
    assert!(message.contains("org.wso2.grpc.test.Request"));

    let agreeing = SinkOptions {
        class: Some("org.wso2.grpc.test.Request".to_string()),
        ..conflicting
    };
    assert!(SinkMapper::new(schema(), stream, &agreeing).is_ok());
}

#[test]
fn test_call_response_source_reads_response_type() {
    let options = SourceOptions {
        transport: TransportKind::GrpcCallResponse,
        url: Some("grpc://localhost:8888/org.wso2.grpc.test.MyService/send".to_string()),
        ..Default::default()
    };
    // EmptyResponse has no fields, so any attribute is unknown
    let err = SourceMapper::new(schema(), stream(&[("a", AttributeType::String)]), &options)
        .unwrap_err();
    match err {
        ConfigurationError::FieldNotFound { message, fields, .. } => {
            assert_eq!(message, "org.wso2.grpc.test.EmptyResponse");
            assert!(fields.is_empty());
        }
        other => panic!("Expected FieldNotFound, got {other:?}"),
    }
}
