//! Sink payload template expressions.
//!
//! A template value is one of:
//! - the name of a stream attribute, read with the attribute's own type
//! - a text containing `{{attribute}}` placeholders, rendered to a string
//! - anything else, used as a literal string

use crate::error::ConfigurationError;
use stream_types::{AttributeType, AttributeValue, Event, ObjectValue, StreamSchema};

#[derive(Debug, Clone, PartialEq)]
pub enum TextPart {
    Literal(String),
    Attribute(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub enum TemplateExpression {
    /// Value of the attribute at this position
    Attribute(usize),
    /// Text with placeholders
    Text(Vec<TextPart>),
    Literal(String),
}

impl TemplateExpression {
    /// Parse a template value against the stream it will be evaluated on.
    pub fn parse(
        field: &str,
        expression: &str,
        stream: &StreamSchema,
    ) -> Result<Self, ConfigurationError> {
        if let Some(position) = stream.position_of(expression.trim()) {
            return Ok(TemplateExpression::Attribute(position));
        }
        if !expression.contains("{{") {
            return Ok(TemplateExpression::Literal(expression.to_string()));
        }

        let mut parts = Vec::new();
        let mut rest = expression;
        while let Some(start) = rest.find("{{") {
            let Some(len) = rest[start + 2..].find("}}") else {
                break;
            };
            if start > 0 {
                parts.push(TextPart::Literal(rest[..start].to_string()));
            }
            let name = rest[start + 2..start + 2 + len].trim();
            let position =
                stream
                    .position_of(name)
                    .ok_or_else(|| ConfigurationError::UnknownTemplateAttribute {
                        field: field.to_string(),
                        attribute: name.to_string(),
                        attributes: stream.attribute_names().iter().map(|s| s.to_string()).collect(),
                    })?;
            parts.push(TextPart::Attribute(position));
            rest = &rest[start + 2 + len + 2..];
        }
        if !rest.is_empty() {
            parts.push(TextPart::Literal(rest.to_string()));
        }
        Ok(TemplateExpression::Text(parts))
    }

    /// Type of the values this expression yields.
    pub fn value_type(&self, stream: &StreamSchema) -> AttributeType {
        match self {
            TemplateExpression::Attribute(position) => stream
                .attributes
                .get(*position)
                .map(|a| a.attribute_type)
                .unwrap_or(AttributeType::String),
            TemplateExpression::Text(_) | TemplateExpression::Literal(_) => AttributeType::String,
        }
    }

    pub fn evaluate(&self, event: &Event) -> AttributeValue {
        match self {
            TemplateExpression::Attribute(position) => {
                event.get(*position).cloned().unwrap_or_default()
            }
            TemplateExpression::Literal(text) => AttributeValue::String(text.clone()),
            TemplateExpression::Text(parts) => {
                let mut out = String::new();
                for part in parts {
                    match part {
                        TextPart::Literal(text) => out.push_str(text),
                        TextPart::Attribute(position) => {
                            render(event.get(*position).unwrap_or(&AttributeValue::Null), &mut out)
                        }
                    }
                }
                AttributeValue::String(out)
            }
        }
    }
}

fn render(value: &AttributeValue, out: &mut String) {
    use std::fmt::Write;

    let _ = match value {
        AttributeValue::Null => write!(out, "null"),
        AttributeValue::String(s) => write!(out, "{s}"),
        AttributeValue::Int(v) => write!(out, "{v}"),
        AttributeValue::Long(v) => write!(out, "{v}"),
        AttributeValue::Float(v) => write!(out, "{v}"),
        AttributeValue::Double(v) => write!(out, "{v}"),
        AttributeValue::Bool(v) => write!(out, "{v}"),
        AttributeValue::Object(ObjectValue::List(items)) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                render(item, out);
            }
            out.push(']');
            Ok(())
        }
        AttributeValue::Object(ObjectValue::Map(entries)) => {
            out.push('{');
            for (i, (key, value)) in entries.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                render(key, out);
                out.push('=');
                render(value, out);
            }
            out.push('}');
            Ok(())
        }
        AttributeValue::Object(ObjectValue::Bytes(bytes)) => write!(out, "{bytes:?}"),
        AttributeValue::Object(ObjectValue::Message { type_name, fields }) => {
            let _ = write!(out, "{type_name} {{");
            for (i, (name, value)) in fields.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                let _ = write!(out, "{name}: ");
                render(value, out);
            }
            out.push('}');
            Ok(())
        }
    };
}
