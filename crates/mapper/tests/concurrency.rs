//! Mappers shared between tasks of a multi-threaded runtime.

mod common;

use common::{schema, stream};
use protomap_mapper::{SinkMapper, SinkOptions, SourceInput, SourceMapper, SourceOptions};
use std::sync::Arc;
use stream_types::{AttributeType, AttributeValue, Event};

const CLASS: &str = "org.wso2.grpc.test.Request";

fn attributes() -> [(&'static str, AttributeType); 2] {
    [
        ("stringValue", AttributeType::String),
        ("longValue", AttributeType::Long),
    ]
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_source_cycles_are_independent() {
    let sink = SinkMapper::new(
        schema(),
        stream(&attributes()),
        &SinkOptions {
            class: Some(CLASS.to_string()),
            ..Default::default()
        },
    )
    .unwrap();
    let source = Arc::new(
        SourceMapper::new(
            schema(),
            stream(&attributes()),
            &SourceOptions {
                class: Some(CLASS.to_string()),
                ..Default::default()
            },
        )
        .unwrap(),
    );

    let mut handles = Vec::new();
    for i in 0..64i64 {
        let bytes = sink
            .encode_event(&Event::new(vec![format!("event-{i}").into(), i.into()]))
            .unwrap();
        let source = Arc::clone(&source);
        handles.push(tokio::spawn(async move {
            source.to_event(&SourceInput::Bytes(bytes))
        }));
    }

    for (i, handle) in handles.into_iter().enumerate() {
        let event = handle.await.unwrap().unwrap();
        assert_eq!(
            event.data,
            vec![
                AttributeValue::String(format!("event-{i}")),
                AttributeValue::Long(i as i64),
            ]
        );
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_sink_events_do_not_mix() {
    let sink = Arc::new(
        SinkMapper::new(
            schema(),
            stream(&attributes()),
            &SinkOptions {
                class: Some(CLASS.to_string()),
                ..Default::default()
            },
        )
        .unwrap(),
    );
    let source = Arc::new(
        SourceMapper::new(
            schema(),
            stream(&attributes()),
            &SourceOptions {
                class: Some(CLASS.to_string()),
                ..Default::default()
            },
        )
        .unwrap(),
    );

    let mut handles = Vec::new();
    for i in 0..64i64 {
        let sink = Arc::clone(&sink);
        let source = Arc::clone(&source);
        handles.push(tokio::spawn(async move {
            let message = sink
                .map_event(&Event::new(vec![format!("event-{i}").into(), i.into()]))
                .unwrap();
            source.to_event(&SourceInput::Message(message)).unwrap()
        }));
    }

    for (i, handle) in handles.into_iter().enumerate() {
        let event = handle.await.unwrap();
        assert_eq!(event.data[0], AttributeValue::String(format!("event-{i}")));
        assert_eq!(event.data[1], AttributeValue::Long(i as i64));
    }
}
