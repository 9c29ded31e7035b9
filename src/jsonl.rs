//! JSON-lines representation of events.
//!
//! An event is a JSON object keyed by attribute name (missing attributes
//! are null) or a JSON array in attribute order. Values of scalar
//! attributes are converted to the attribute's type; `object` attributes
//! take arrays (lists) and objects (maps). An object with an `@type` key
//! is a nested message, and `bytes` values are written as base64 strings.

use anyhow::{anyhow, bail, Result};
use base64::Engine;
use serde_json::{Map, Number, Value};
use stream_types::{Attribute, AttributeType, AttributeValue, Event, ObjectValue, StreamSchema};

const TYPE_KEY: &str = "@type";

/// Parse one JSON line into an event of `stream`.
pub fn parse_event(line: &str, stream: &StreamSchema) -> Result<Event> {
    let value: Value = serde_json::from_str(line)?;
    json_to_event(&value, stream)
}

pub fn json_to_event(value: &Value, stream: &StreamSchema) -> Result<Event> {
    let data = match value {
        Value::Object(fields) => {
            if let Some(unknown) = fields.keys().find(|k| stream.position_of(k).is_none()) {
                bail!(
                    "Unknown attribute '{unknown}' for stream {}. Attributes: [{}]",
                    stream.id,
                    stream.attribute_names().join(", ")
                );
            }
            stream
                .attributes
                .iter()
                .map(|attribute| match fields.get(&attribute.name) {
                    Some(v) => json_to_attribute(v, attribute),
                    None => Ok(AttributeValue::Null),
                })
                .collect::<Result<Vec<_>>>()?
        }
        Value::Array(values) => {
            if values.len() != stream.len() {
                bail!(
                    "Expected {} values for stream {}, got {}",
                    stream.len(),
                    stream.id,
                    values.len()
                );
            }
            stream
                .attributes
                .iter()
                .zip(values)
                .map(|(attribute, v)| json_to_attribute(v, attribute))
                .collect::<Result<Vec<_>>>()?
        }
        other => bail!("Expected a JSON object or array, got {other}"),
    };
    Ok(Event::new(data))
}

fn json_to_attribute(value: &Value, attribute: &Attribute) -> Result<AttributeValue> {
    if value.is_null() {
        return Ok(AttributeValue::Null);
    }
    let mismatch = || {
        anyhow!(
            "Attribute '{}' expects {}, got {value}",
            attribute.name,
            attribute.attribute_type
        )
    };

    let converted = match attribute.attribute_type {
        AttributeType::String => AttributeValue::String(value.as_str().ok_or_else(mismatch)?.to_string()),
        AttributeType::Int => {
            let n = value.as_i64().ok_or_else(mismatch)?;
            AttributeValue::Int(i32::try_from(n).map_err(|_| mismatch())?)
        }
        AttributeType::Long => AttributeValue::Long(value.as_i64().ok_or_else(mismatch)?),
        AttributeType::Float => AttributeValue::Float(value.as_f64().ok_or_else(mismatch)? as f32),
        AttributeType::Double => AttributeValue::Double(value.as_f64().ok_or_else(mismatch)?),
        AttributeType::Bool => AttributeValue::Bool(value.as_bool().ok_or_else(mismatch)?),
        AttributeType::Object => match value {
            Value::Array(_) | Value::Object(_) => untyped(value),
            _ => return Err(mismatch()),
        },
    };
    Ok(converted)
}

/// Convert JSON nested in an `object` attribute, where no schema type applies.
fn untyped(value: &Value) -> AttributeValue {
    match value {
        Value::Null => AttributeValue::Null,
        Value::Bool(b) => AttributeValue::Bool(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => match i32::try_from(i) {
                Ok(small) => AttributeValue::Int(small),
                Err(_) => AttributeValue::Long(i),
            },
            None => AttributeValue::Double(n.as_f64().unwrap_or(f64::NAN)),
        },
        Value::String(s) => AttributeValue::String(s.clone()),
        Value::Array(items) => AttributeValue::Object(ObjectValue::List(items.iter().map(untyped).collect())),
        Value::Object(fields) => match fields.get(TYPE_KEY).and_then(Value::as_str) {
            Some(type_name) => AttributeValue::Object(ObjectValue::Message {
                type_name: type_name.to_string(),
                fields: fields
                    .iter()
                    .filter(|(k, _)| k.as_str() != TYPE_KEY)
                    .map(|(k, v)| (k.clone(), untyped(v)))
                    .collect(),
            }),
            None => AttributeValue::Object(ObjectValue::Map(
                fields
                    .iter()
                    .map(|(k, v)| (AttributeValue::String(k.clone()), untyped(v)))
                    .collect(),
            )),
        },
    }
}

/// Render an event as a JSON object keyed by attribute name.
pub fn event_to_json(event: &Event, stream: &StreamSchema) -> Value {
    let mut object = Map::new();
    for (attribute, value) in stream.attributes.iter().zip(&event.data) {
        object.insert(attribute.name.clone(), attribute_to_json(value));
    }
    Value::Object(object)
}

pub fn attribute_to_json(value: &AttributeValue) -> Value {
    match value {
        AttributeValue::Null => Value::Null,
        AttributeValue::String(s) => Value::String(s.clone()),
        AttributeValue::Int(v) => Value::from(*v),
        AttributeValue::Long(v) => Value::from(*v),
        AttributeValue::Float(v) => float(f64::from(*v)),
        AttributeValue::Double(v) => float(*v),
        AttributeValue::Bool(v) => Value::Bool(*v),
        AttributeValue::Object(ObjectValue::List(items)) => {
            Value::Array(items.iter().map(attribute_to_json).collect())
        }
        AttributeValue::Object(ObjectValue::Map(entries)) => {
            if entries.iter().all(|(k, _)| matches!(k, AttributeValue::String(_))) {
                Value::Object(
                    entries
                        .iter()
                        .map(|(k, v)| (k.as_str().unwrap_or_default().to_string(), attribute_to_json(v)))
                        .collect(),
                )
            } else {
                // non-string keys: list of [key, value] pairs
                Value::Array(
                    entries
                        .iter()
                        .map(|(k, v)| Value::Array(vec![attribute_to_json(k), attribute_to_json(v)]))
                        .collect(),
                )
            }
        }
        AttributeValue::Object(ObjectValue::Bytes(bytes)) => {
            Value::String(base64::engine::general_purpose::STANDARD.encode(bytes))
        }
        AttributeValue::Object(ObjectValue::Message { type_name, fields }) => {
            let mut object = Map::new();
            object.insert(TYPE_KEY.to_string(), Value::String(type_name.clone()));
            for (name, value) in fields {
                object.insert(name.clone(), attribute_to_json(value));
            }
            Value::Object(object)
        }
    }
}

fn float(v: f64) -> Value {
    Number::from_f64(v).map(Value::Number).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn stream() -> StreamSchema {
        StreamSchema::new(
            "FooStream",
            vec![
                Attribute::new("symbol", AttributeType::String),
                Attribute::new("volume", AttributeType::Int),
                Attribute::new("price", AttributeType::Float),
                Attribute::new("labels", AttributeType::Object),
            ],
        )
    }

    #[test]
    fn test_object_form() {
        let event = parse_event(r#"{"symbol": "IBM", "volume": 10, "labels": {"a": "b"}}"#, &stream()).unwrap();
        assert_eq!(
            event.data,
            vec![
                AttributeValue::String("IBM".to_string()),
                AttributeValue::Int(10),
                AttributeValue::Null,
                AttributeValue::Object(ObjectValue::Map(vec![("a".into(), "b".into())])),
            ]
        );
    }

    #[test]
    fn test_array_form_and_errors() {
        let stream = stream();
        let event = parse_event(r#"["IBM", 1, 2.5, [1, 5000000000]]"#, &stream).unwrap();
        assert_eq!(event.data[2], AttributeValue::Float(2.5));
        assert_eq!(
            event.data[3],
            AttributeValue::Object(ObjectValue::List(vec![
                AttributeValue::Int(1),
                AttributeValue::Long(5_000_000_000)
            ]))
        );

        assert!(parse_event(r#"["IBM"]"#, &stream).is_err());
        assert!(parse_event(r#"{"volume": 5000000000}"#, &stream).is_err());
        assert!(parse_event(r#"{"ticker": "IBM"}"#, &stream).is_err());
        assert!(parse_event(r#"{"labels": 3}"#, &stream).is_err());
    }

    #[test]
    fn test_event_to_json() {
        let stream = stream();
        let event = Event::new(vec![
            "IBM".into(),
            AttributeValue::Int(3),
            AttributeValue::Float(0.5),
            AttributeValue::Object(ObjectValue::Message {
                type_name: "org.example.Inner".to_string(),
                fields: vec![(
                    "payload".to_string(),
                    AttributeValue::Object(ObjectValue::Bytes(vec![1, 2, 3])),
                )],
            }),
        ]);
        assert_eq!(
            event_to_json(&event, &stream),
            json!({
                "symbol": "IBM",
                "volume": 3,
                "price": 0.5,
                "labels": {"@type": "org.example.Inner", "payload": "AQID"}
            })
        );
    }
}
