use crate::errors::ToolError;
use log::debug;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// Decoded tool arguments: a JSON object keyed by parameter name.
pub type ToolArgs = Map<String, Value>;

/// Upper bound applied to every list-style `max_results`.
pub const MAX_LIST_RESULTS: u32 = 100;

/// Parses the LLM's raw argument text. An empty payload means "no arguments".
pub fn parse_arguments(raw: &str) -> Result<ToolArgs, String> {
    if raw.trim().is_empty() {
        return Ok(Map::new());
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(format!(
            "arguments must be a JSON object, got {}",
            json_type_name(&other)
        )),
        Err(e) => Err(format!("arguments are not valid JSON: {}", e)),
    }
}

/// Decodes arguments into an action's typed parameter struct.
///
/// Missing required fields and (with `deny_unknown_fields`) unexpected extras
/// both surface as `InvalidArguments`. An explicit `null` counts as omitted,
/// so `#[serde(default)]` applies to it.
pub fn decode_args<T: DeserializeOwned>(mut args: ToolArgs) -> Result<T, ToolError> {
    args.retain(|_, value| !value.is_null());
    serde_json::from_value(Value::Object(args)).map_err(|e| ToolError::InvalidArguments(e.to_string()))
}

/// Converts a serde_json::Value (string or number) to u32 with a default value
///
/// # Arguments
///
/// * `value` - Optional JSON value containing either a number or string
/// * `default` - Default value to use if conversion fails or value is None
///
/// # Returns
///
/// A value in `1..=MAX_LIST_RESULTS`, either converted from input or the default
pub fn parse_max_results(value: Option<Value>, default: u32) -> u32 {
    let parsed = match value {
        Some(Value::Number(num)) => match num.as_u64() {
            Some(n) if n <= u32::MAX as u64 => n as u32,
            _ => {
                debug!("Number not convertible to u32, using default {}", default);
                default
            }
        },
        Some(Value::String(s)) => match s.trim().parse::<u32>() {
            Ok(n) => n,
            Err(_) => {
                debug!("Could not parse string '{}' as u32, using default {}", s, default);
                default
            }
        },
        Some(Value::Null) | None => default,
        Some(other) => {
            debug!(
                "Unexpected value type for max_results: {:?}, using default {}",
                other, default
            );
            default
        }
    };
    parsed.clamp(1, MAX_LIST_RESULTS)
}

/// Checks arguments against a tool's declared parameter schema.
///
/// Covers the `required` list, primitive `type`s of declared properties, and
/// `additionalProperties: false`. Integer and number parameters also accept
/// numeric strings, which models frequently emit.
pub fn validate_against_schema(schema: &Value, args: &ToolArgs) -> Result<(), String> {
    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        let missing: Vec<&str> = required
            .iter()
            .filter_map(Value::as_str)
            .filter(|name| args.get(*name).map_or(true, Value::is_null))
            .collect();
        if !missing.is_empty() {
            return Err(format!("missing required parameter(s): {}", missing.join(", ")));
        }
    }

    let properties = schema.get("properties").and_then(Value::as_object);

    if schema.get("additionalProperties") == Some(&Value::Bool(false)) {
        if let Some(unexpected) = args
            .keys()
            .find(|key| properties.map_or(true, |p| !p.contains_key(*key)))
        {
            return Err(format!("unexpected parameter: {}", unexpected));
        }
    }

    if let Some(properties) = properties {
        for (name, value) in args {
            let expected = properties
                .get(name)
                .and_then(|p| p.get("type"))
                .and_then(Value::as_str);
            if let Some(expected) = expected {
                if !value.is_null() && !matches_type(value, expected) {
                    return Err(format!(
                        "parameter '{}' should be {}, got {}",
                        name,
                        expected,
                        json_type_name(value)
                    ));
                }
            }
        }
    }

    Ok(())
}

fn matches_type(value: &Value, expected: &str) -> bool {
    match expected {
        "string" => value.is_string(),
        "integer" => {
            value.is_i64()
                || value.is_u64()
                || value.as_str().map_or(false, |s| s.trim().parse::<i64>().is_ok())
        }
        "number" => {
            value.is_number() || value.as_str().map_or(false, |s| s.trim().parse::<f64>().is_ok())
        }
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        _ => true,
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
