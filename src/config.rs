//! Mapper configuration file.
//!
//! ```yaml
//! app: StockQuotes
//! stream:
//!   id: FooStream
//!   attributes:
//!     - { name: symbol, type: string }
//!     - { name: price, type: double }
//! sink:
//!   transport: grpc-call
//!   url: grpc://localhost:8888/org.example.QuoteService/publish
//! source:
//!   class: org.example.Quote
//! ```

use anyhow::{Context, Result};
use protomap_mapper::{SinkOptions, SourceOptions};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use stream_types::StreamSchema;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MapperConfig {
    /// Application name, used in log output only
    #[serde(default)]
    pub app: Option<String>,

    pub stream: StreamSchema,

    #[serde(default)]
    pub sink: Option<SinkOptions>,

    #[serde(default)]
    pub source: Option<SourceOptions>,
}

impl MapperConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read mapper config {path:?}"))?;
        Self::from_yaml(&content).with_context(|| format!("Invalid mapper config {path:?}"))
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: MapperConfig = serde_yaml::from_str(yaml)?;
        config.stream.validate()?;
        Ok(config)
    }

    /// Sink options, or an error naming the missing section.
    pub fn sink(&self) -> Result<&SinkOptions> {
        self.sink
            .as_ref()
            .with_context(|| format!("No 'sink' section configured for stream {}", self.stream.id))
    }

    /// Source options, or an error naming the missing section.
    pub fn source(&self) -> Result<&SourceOptions> {
        self.source
            .as_ref()
            .with_context(|| format!("No 'source' section configured for stream {}", self.stream.id))
    }

    pub fn app_name(&self) -> &str {
        self.app.as_deref().unwrap_or(&self.stream.id)
    }
}
