//! Command-line interface for protomap
//!
//! # Usage Examples
//!
//! ## Schema introspection
//! ```bash
//! # Services, rpc methods and all message fields
//! protomap describe --proto protos/quotes.proto
//!
//! # Fields of one message type
//! protomap describe --proto protos/quotes.proto --message org.example.Quote
//! ```
//!
//! ## Mapping
//! ```bash
//! # Events (JSON lines) to base64 encoded messages using the 'sink' section
//! protomap encode --proto protos/quotes.proto --config mapping.yaml \
//!   --input events.jsonl --output messages.b64
//!
//! # Base64 encoded messages to events using the 'source' section
//! protomap decode --proto protos/quotes.proto --config mapping.yaml \
//!   --input messages.b64
//! ```
//!
//! Logging is controlled with `RUST_LOG`, e.g. `RUST_LOG=protomap_mapper=debug`.

use anyhow::Context;
use clap::{Parser, Subcommand};
use protomap::{commands, MapperConfig, ProtoOpts};
use protomap_mapper::{SinkMapper, SourceMapper};
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser)]
#[command(name = "protomap")]
#[command(about = "Map stream events to protobuf messages and back")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List services, methods and message fields of the proto files
    Describe {
        #[command(flatten)]
        proto: ProtoOpts,

        /// Only show the fields of this message type
        #[arg(long)]
        message: Option<String>,
    },

    /// Map JSON-lines events to base64 encoded messages
    Encode {
        #[command(flatten)]
        proto: ProtoOpts,

        /// Mapper configuration (YAML)
        #[arg(long, env = "PROTOMAP_CONFIG")]
        config: PathBuf,

        /// Input file (defaults to stdin)
        #[arg(long)]
        input: Option<PathBuf>,

        /// Output file (defaults to stdout)
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Map base64 encoded messages to JSON-lines events
    Decode {
        #[command(flatten)]
        proto: ProtoOpts,

        /// Mapper configuration (YAML)
        #[arg(long, env = "PROTOMAP_CONFIG")]
        config: PathBuf,

        /// Input file (defaults to stdin)
        #[arg(long)]
        input: Option<PathBuf>,

        /// Output file (defaults to stdout)
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    if let Err(e) = run() {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

fn run() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Describe { proto, message } => {
            let schema = proto.load_schema()?;
            let stdout = io::stdout();
            let mut out = stdout.lock();
            commands::describe(&schema, message.as_deref(), &mut out)?;
        }
        Commands::Encode {
            proto,
            config,
            input,
            output,
        } => {
            let schema = proto.load_schema()?;
            let config = MapperConfig::from_file(&config)?;
            info!("Starting encode for {}", config.app_name());
            let mapper = SinkMapper::new(schema, config.stream.clone(), config.sink()?)
                .context("Failed to set up sink mapping")?;

            let mut out = open_output(output.as_deref())?;
            commands::encode(&mapper, open_input(input.as_deref())?, &mut out)?;
            out.flush()?;
        }
        Commands::Decode {
            proto,
            config,
            input,
            output,
        } => {
            let schema = proto.load_schema()?;
            let config = MapperConfig::from_file(&config)?;
            info!("Starting decode for {}", config.app_name());
            let mapper = SourceMapper::new(schema, config.stream.clone(), config.source()?)
                .context("Failed to set up source mapping")?;

            let mut out = open_output(output.as_deref())?;
            let result = commands::decode(&mapper, open_input(input.as_deref())?, &mut out);
            out.flush()?;
            result?;
        }
    }

    Ok(())
}

fn open_input(path: Option<&Path>) -> anyhow::Result<Box<dyn BufRead>> {
    Ok(match path {
        Some(path) => Box::new(BufReader::new(
            File::open(path).with_context(|| format!("Failed to open input {path:?}"))?,
        )),
        None => Box::new(BufReader::new(io::stdin())),
    })
}

fn open_output(path: Option<&Path>) -> anyhow::Result<Box<dyn Write>> {
    Ok(match path {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("Failed to create output {path:?}"))?,
        )),
        None => Box::new(BufWriter::new(io::stdout())),
    })
}
