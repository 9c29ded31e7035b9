//! Stream-side types for protomap.
//!
//! This crate models the event records of the stream-processing engine the
//! mappers sit next to:
//!
//! - [`StreamSchema`] - Ordered, typed attributes of a stream, loadable from YAML
//! - [`AttributeValue`] - A single attribute value, including `object` payloads
//! - [`Event`] - One positional record of attribute values
//!
//! # Example
//!
//! ```rust
//! use stream_types::{AttributeType, AttributeValue, Event, StreamSchema};
//!
//! let schema = StreamSchema::from_yaml(
//!     "id: FooStream\nattributes:\n  - { name: symbol, type: string }\n  - { name: price, type: double }\n",
//! )
//! .unwrap();
//! assert_eq!(schema.attributes[1].attribute_type, AttributeType::Double);
//!
//! let event = Event::new(vec![
//!     AttributeValue::String("WSO2".to_string()),
//!     AttributeValue::Double(55.6),
//! ]);
//! assert_eq!(event.data.len(), schema.len());
//! ```

pub mod schema;
pub mod values;

// Re-exports for convenience
pub use schema::{Attribute, AttributeType, SchemaError, StreamSchema};
pub use values::{AttributeValue, Event, ObjectValue};
