//! Protomap Library
//!
//! Maps stream-processing events to protobuf messages and back, driven by a
//! stream schema and `.proto` files parsed at runtime.
//!
//! # Crates
//!
//! - `proto_types` - Schema registry and dynamic message types
//! - `protomap_proto` - `.proto` parsing, codec and message builder
//! - `stream_types` - Stream schemas, attribute values and events
//! - `protomap_mapper` - Sink and source field mapping
//!
//! # CLI Usage
//!
//! ```bash
//! # Show services, methods and message fields
//! protomap describe --proto service.proto
//!
//! # JSON-lines events to base64 encoded messages
//! protomap encode --proto service.proto --config mapping.yaml --input events.jsonl
//!
//! # Base64 encoded messages back to JSON-lines events
//! protomap decode --proto service.proto --config mapping.yaml --input messages.b64
//! ```

use clap::Parser;
use proto_types::ProtoSchema;
use std::path::PathBuf;
use std::sync::Arc;

pub mod commands;
pub mod config;
pub mod jsonl;

pub use config::MapperConfig;

/// Where to find the `.proto` schema.
#[derive(Parser, Clone, Debug)]
pub struct ProtoOpts {
    /// Proto files to load (comma-separated or repeated)
    #[arg(long = "proto", env = "PROTOMAP_PROTO", value_delimiter = ',', required = true)]
    pub proto_files: Vec<PathBuf>,

    /// Additional import paths; the directory of every proto file is always included
    #[arg(long = "include", value_delimiter = ',')]
    pub include_paths: Vec<PathBuf>,
}

impl ProtoOpts {
    /// Parse all configured proto files into one schema registry.
    pub fn load_schema(&self) -> anyhow::Result<Arc<ProtoSchema>> {
        let schema = protomap_proto::parse_files(&self.proto_files, &self.include_paths)
            .map_err(|e| anyhow::anyhow!("Failed to load proto files {:?}: {e}", self.proto_files))?;
        tracing::info!(
            "Loaded {} message types and {} services",
            schema.list_messages().len(),
            schema.services.len()
        );
        Ok(Arc::new(schema))
    }
}
