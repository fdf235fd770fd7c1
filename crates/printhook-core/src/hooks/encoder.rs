//! Flattening of resolved bodies for form transport.

use serde_json::{Map, Value};

use crate::error::HookError;
use crate::template::display_value;

/// Serialize nested maps and sequences in a resolved body to JSON text.
///
/// Form transport carries only flat string/number/bool fields, so every
/// top-level field that is still structured is encoded in place.
pub fn flatten_body(body: Value) -> Result<Map<String, Value>, HookError> {
    let Value::Object(fields) = body else {
        return Err(HookError::Encoding(format!(
            "form bodies must be objects, got {}",
            kind(&body)
        )));
    };

    fields
        .into_iter()
        .map(|(key, value)| {
            let value = match value {
                Value::Object(_) | Value::Array(_) => Value::String(
                    serde_json::to_string(&value)
                        .map_err(|error| HookError::Encoding(format!("field {key}: {error}")))?,
                ),
                scalar => scalar,
            };
            Ok((key, value))
        })
        .collect()
}

/// Render a flat body as `application/x-www-form-urlencoded`.
pub fn encode_form(fields: &Map<String, Value>) -> String {
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in fields {
        serializer.append_pair(key, &display_value(value));
    }
    serializer.finish()
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
