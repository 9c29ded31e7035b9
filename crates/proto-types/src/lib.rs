//! Protobuf type definitions shared across protomap.
//!
//! These types are the data structures for runtime protobuf schemas and the
//! dynamic messages decoded against them. There is no generated code anywhere
//! in protomap: a [`ProtoSchema`] is built once from `.proto` sources and acts
//! as the message type provider for both mapping directions.
//!
//! ## Dependency Flow
//!
//! ```text
//! proto-types (this crate):
//!   - Defines: ProtoSchema, ProtoMessageDescriptor, ProtoFieldValue, ProtoMessage, ...
//!   - NO dependency on the parser/codec crate
//!
//! protomap-proto:
//!   - Depends on: proto-types
//!   - Provides: .proto parsing, ProtoDecoder, ProtoEncoder, MessageBuilder
//!
//! protomap-mapper:
//!   - Depends on: proto-types, protomap-proto, stream-types
//!   - Provides: descriptor resolution, field mapping, sink/source appliers
//! ```

pub mod descriptor;
pub mod value;

pub use descriptor::{
    to_accessor_name, FieldShape, MapEntryTypes, ProtoFieldDescriptor, ProtoMessageDescriptor,
    ProtoMethodDescriptor, ProtoSchema, ProtoServiceDescriptor,
};
pub use value::{ProtoFieldValue, ProtoMessage, ProtoType};
