//! Mapping between stream events and protobuf messages.
//!
//! A mapper is set up once per connector. Setup resolves the message type
//! (from a type name or a `grpc://host:port/<service>/<method>` url), matches
//! every stream attribute to a message field and freezes the result into a
//! [`MappingTable`]. After that, every event is mapped by replaying the table:
//!
//! - [`SinkMapper`] - events -> messages, through one reusable builder
//! - [`SourceMapper`] - bytes or decoded messages -> events
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use protomap_mapper::{SinkMapper, SinkOptions};
//! use stream_types::{AttributeValue, Event, StreamSchema};
//!
//! let schema = protomap_proto::parse_string(
//!     "syntax = \"proto3\"; package demo; message Quote { string symbol = 1; double price = 2; }",
//! )
//! .unwrap();
//! let stream = StreamSchema::from_yaml(
//!     "id: Quotes\nattributes:\n  - { name: symbol, type: string }\n  - { name: price, type: double }\n",
//! )
//! .unwrap();
//! let options = SinkOptions {
//!     class: Some("demo.Quote".to_string()),
//!     ..Default::default()
//! };
//!
//! let mapper = SinkMapper::new(Arc::new(schema), stream, &options).unwrap();
//! let message = mapper
//!     .map_event(&Event::new(vec!["WSO2".into(), AttributeValue::Double(55.6)]))
//!     .unwrap();
//! assert_eq!(message.message_type, "demo.Quote");
//! ```

pub mod convert;
pub mod error;
pub mod mapping;
pub mod naming;
pub mod options;
pub mod resolver;
pub mod sink;
pub mod source;
pub mod template;

pub use error::{ConfigurationError, ErroneousEvent, Error, Result, RuntimeMappingError};
pub use mapping::{Accessor, FieldBinding, MappingTable, Mutator, ValueSource};
pub use options::{AttributeAlias, MessageRole, SinkOptions, SourceOptions, TemplateEntry, TransportKind};
pub use resolver::{parse_grpc_url, MessageTypeRef, ResolvedType};
pub use sink::SinkMapper;
pub use source::{SourceInput, SourceMapper};
pub use template::TemplateExpression;
