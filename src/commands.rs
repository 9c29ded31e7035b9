//! Subcommand implementations, independent of where input and output go.

use crate::jsonl::{event_to_json, parse_event};
use anyhow::{bail, Context, Result};
use base64::Engine;
use proto_types::ProtoSchema;
use protomap_mapper::{Error as MapperError, SinkMapper, SourceInput, SourceMapper};
use std::io::{BufRead, Write};
use tracing::{error, info, warn};

/// Counts of an encode run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EncodeSummary {
    pub encoded: usize,
    pub dropped: usize,
}

/// Print services and messages of a schema, or the fields of one message.
pub fn describe<W: Write>(schema: &ProtoSchema, message: Option<&str>, out: &mut W) -> Result<()> {
    if let Some(name) = message {
        let descriptor = schema.get_message(name).with_context(|| {
            format!(
                "Message type '{name}' not found. Known message types: [{}]",
                schema.list_messages().join(", ")
            )
        })?;
        writeln!(out, "message {}", descriptor.name)?;
        for field in descriptor.fields_in_order() {
            writeln!(out, "  {} = {}: {}", field.name, field.number, field.type_description())?;
        }
        return Ok(());
    }

    for name in schema.list_services() {
        let Some(service) = schema.get_service(&name) else {
            continue;
        };
        writeln!(out, "service {}", service.name)?;
        for method in &service.methods {
            writeln!(
                out,
                "  rpc {} ({}{}) returns ({}{})",
                method.name,
                if method.client_streaming { "stream " } else { "" },
                method.input_type,
                if method.server_streaming { "stream " } else { "" },
                method.output_type
            )?;
        }
    }
    for name in schema.list_messages() {
        let Some(descriptor) = schema.get_message(&name) else {
            continue;
        };
        writeln!(out, "message {}", descriptor.name)?;
        for field in descriptor.fields_with_types() {
            writeln!(out, "  {field}")?;
        }
    }
    Ok(())
}

/// Map JSON-lines events through the sink and write one base64 message per line.
///
/// Lines that do not parse or do not map are logged and skipped.
pub fn encode<R: BufRead, W: Write>(mapper: &SinkMapper, input: R, out: &mut W) -> Result<EncodeSummary> {
    let mut summary = EncodeSummary::default();
    for (index, line) in input.lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read input line {}", index + 1))?;
        if line.trim().is_empty() {
            continue;
        }

        let event = match parse_event(&line, mapper.stream()) {
            Ok(event) => event,
            Err(e) => {
                warn!("Skipping line {}: {e:#}", index + 1);
                summary.dropped += 1;
                continue;
            }
        };
        match mapper.encode_event(&event) {
            Ok(bytes) => {
                writeln!(out, "{}", base64::engine::general_purpose::STANDARD.encode(bytes))?;
                summary.encoded += 1;
            }
            Err(e) => {
                error!("Dropping line {}: {e}", index + 1);
                summary.dropped += 1;
            }
        }
    }

    info!(
        "Encoded {} events as {} ({} dropped)",
        summary.encoded,
        mapper.message_type(),
        summary.dropped
    );
    Ok(summary)
}

/// Decode base64 messages, one per line, and write the mapped events as JSON lines.
///
/// Every good line is written. If any line failed, all failures are logged
/// and an error is returned after the output is complete.
pub fn decode<R: BufRead, W: Write>(mapper: &SourceMapper, input: R, out: &mut W) -> Result<usize> {
    let mut inputs = Vec::new();
    for (index, line) in input.lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read input line {}", index + 1))?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(line)
            .unwrap_or_else(|e| {
                warn!("Line {} is not valid base64 ({e}), decoding it as raw bytes", index + 1);
                line.as_bytes().to_vec()
            });
        inputs.push(SourceInput::Bytes(bytes));
    }

    let mut events = Vec::new();
    let result = mapper.process_batch(&inputs, |event| events.push(event));
    for event in &events {
        writeln!(out, "{}", event_to_json(event, mapper.stream()))?;
    }

    match result {
        Ok(count) => {
            info!("Decoded {count} events of stream {}", mapper.stream().id);
            Ok(count)
        }
        Err(MapperError::ErroneousEvents { events: failed, total }) => {
            for bad in &failed {
                error!("{bad}");
            }
            bail!("{} of {total} messages could not be decoded", failed.len())
        }
        Err(e) => Err(e.into()),
    }
}
