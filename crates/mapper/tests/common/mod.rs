//! Shared fixtures for the mapper integration tests.

#![allow(dead_code)]

use proto_types::ProtoSchema;
use std::sync::Arc;
use stream_types::{Attribute, AttributeType, StreamSchema};

pub const PROTO: &str = r#"
    syntax = "proto3";
    package org.wso2.grpc.test;

    message Request {
        string string_value = 1;
        int32 int_value = 2;
        int64 long_value = 3;
        bool boolean_value = 4;
        float float_value = 5;
        double double_value = 6;
        uint32 unsigned_value = 7;
        map<string, string> map_value = 8;
        repeated int32 int_list = 9;
    }

    message EmptyResponse {}

    service MyService {
        rpc send (Request) returns (EmptyResponse);
        rpc process (Request) returns (Request);
    }
"#;

pub fn schema() -> Arc<ProtoSchema> {
    Arc::new(protomap_proto::parse_string(PROTO).expect("Failed to parse test proto"))
}

pub fn stream(attributes: &[(&str, AttributeType)]) -> StreamSchema {
    StreamSchema::new(
        "FooStream",
        attributes
            .iter()
            .map(|(name, ty)| Attribute::new(*name, *ty))
            .collect(),
    )
}

/// Every scalar field of `Request`, named the way sink attributes are.
pub fn scalar_stream() -> StreamSchema {
    stream(&[
        ("stringValue", AttributeType::String),
        ("intValue", AttributeType::Int),
        ("longValue", AttributeType::Long),
        ("booleanValue", AttributeType::Bool),
        ("floatValue", AttributeType::Float),
        ("doubleValue", AttributeType::Double),
        ("unsignedValue", AttributeType::Int),
    ])
}
