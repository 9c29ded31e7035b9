//! Runtime protobuf support for protomap.
//!
//! Features:
//!
//! - Runtime Protobuf Support: Parse `.proto` files at runtime, no code generation
//! - Service Introspection: Services, rpc methods and their request/response types
//! - Dynamic Codec: Decode bytes into [`ProtoMessage`] and encode them back
//! - Builder: Accumulate field values and finalize them into an immutable message

/// `.proto` parsing into a [`ProtoSchema`] registry
pub mod parser;

/// Bytes -> [`ProtoMessage`] using a parsed schema
pub mod decoder;

/// [`ProtoMessage`] -> bytes
pub mod encoder;

/// Builder state machine for constructing messages field by field
pub mod builder;
pub mod error;

// Re-export main types for easy access
pub use builder::MessageBuilder;
pub use decoder::ProtoDecoder;
pub use encoder::encode_message;
pub use error::{Error, Result};
pub use parser::{parse_file, parse_files, parse_string};
pub use proto_types::{
    FieldShape, MapEntryTypes, ProtoFieldDescriptor, ProtoFieldValue, ProtoMessage,
    ProtoMessageDescriptor, ProtoMethodDescriptor, ProtoSchema, ProtoServiceDescriptor, ProtoType,
};
