//! Argument validation against a tool's published input schema.
//!
//! Covers the JSON Schema subset tools actually publish: an object schema with
//! `properties`, `required`, per-property `type` (a name or a list of names)
//! and `additionalProperties: false`. Unknown keywords are ignored.

use crate::tool::Arguments;
use serde_json::Value;
use thiserror::Error;

/// Why a set of arguments does not match a schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("missing required field '{field}'")]
    MissingField { field: String },

    #[error("field '{field}' must be {expected}, got {found}")]
    WrongType {
        field: String,
        expected: String,
        found: &'static str,
    },

    #[error("unexpected field '{field}'")]
    UnexpectedField { field: String },
}

/// Check `arguments` against `schema`, reporting the first violation.
pub fn validate_arguments(schema: &Value, arguments: &Arguments) -> Result<(), SchemaError> {
    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for field in required.iter().filter_map(Value::as_str) {
            match arguments.get(field) {
                None | Some(Value::Null) => {
                    return Err(SchemaError::MissingField {
                        field: field.to_string(),
                    });
                }
                Some(_) => {}
            }
        }
    }

    let properties = schema.get("properties").and_then(Value::as_object);
    let closed = schema.get("additionalProperties") == Some(&Value::Bool(false));

    for (field, value) in arguments {
        let Some(property) = properties.and_then(|p| p.get(field)) else {
            if closed {
                return Err(SchemaError::UnexpectedField {
                    field: field.clone(),
                });
            }
            continue;
        };

        let allowed: Vec<&str> = match property.get("type") {
            Some(Value::String(t)) => vec![t.as_str()],
            Some(Value::Array(types)) => types.iter().filter_map(Value::as_str).collect(),
            _ => continue,
        };

        if !allowed.iter().any(|t| matches_type(t, value)) {
            return Err(SchemaError::WrongType {
                field: field.clone(),
                expected: allowed.join(" or "),
                found: type_name(value),
            });
        }
    }

    Ok(())
}

fn matches_type(expected: &str, value: &Value) -> bool {
    match expected {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        "null" => value.is_null(),
        // Unknown type names are not ours to reject
        _ => true,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
