//! Conversion between wire values and the typed arguments handed to the native SDK.

mod value;

use std::collections::BTreeMap;

use serde_json::{Map as JsonMap, Value as JsonValue};

use crate::error::{malformed_arguments, BridgeResult};

pub use value::{NativeValue, ValueMap};

/// An untyped value crossing the scripting/native boundary.
pub type WireValue = JsonValue;

/// Hit or property parameters. `None` clears the key on the receiving side.
pub type StringMap = BTreeMap<String, Option<String>>;

/// Parses a raw argument payload, which must be a JSON array.
pub fn decode_args(raw: &str) -> BridgeResult<Vec<WireValue>> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    match serde_json::from_str::<WireValue>(raw)? {
        JsonValue::Array(items) => Ok(items),
        other => Err(malformed_arguments(format!(
            "expected an argument array, got {}",
            wire_type_name(&other)
        ))),
    }
}

/// Flattens an object into string parameters.
///
/// Strings are kept verbatim and other values use their JSON text. A JSON `null` yields an
/// explicit `None` entry so callers can clear a key.
pub fn to_string_mapping(object: Option<&JsonMap<String, WireValue>>) -> StringMap {
    let Some(object) = object else {
        return StringMap::new();
    };
    object
        .iter()
        .map(|(key, value)| (key.clone(), wire_to_string(value)))
        .collect()
}

/// Same iteration as [`to_string_mapping`] but keeps native types for the data layer.
pub fn to_value_mapping(object: Option<&JsonMap<String, WireValue>>) -> ValueMap {
    let Some(object) = object else {
        return ValueMap::new();
    };
    object
        .iter()
        .map(|(key, value)| (key.clone(), NativeValue::from_wire(value)))
        .collect()
}

pub fn encode_native_value(value: &NativeValue) -> WireValue {
    value.to_wire()
}

/// String form of a single wire value, `None` for null.
pub fn wire_to_string(value: &WireValue) -> Option<String> {
    match value {
        JsonValue::Null => None,
        JsonValue::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

pub(crate) fn wire_type_name(value: &WireValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

/// Positional view over one call's arguments with typed accessors.
///
/// Every accessor fails with `MalformedArguments`, naming the action and the position.
#[derive(Clone, Copy, Debug)]
pub struct WireArgs<'a> {
    action: &'a str,
    values: &'a [WireValue],
}

impl<'a> WireArgs<'a> {
    pub fn new(action: &'a str, values: &'a [WireValue]) -> Self {
        Self { action, values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &'a [WireValue] {
        self.values
    }

    /// Missing and null positions both read as absent.
    pub fn get(&self, index: usize) -> Option<&'a WireValue> {
        self.values.get(index).filter(|value| !value.is_null())
    }

    pub fn string(&self, index: usize) -> BridgeResult<String> {
        self.optional_string(index)?
            .ok_or_else(|| self.error(index, "a string"))
    }

    /// Accepts a string or null. Numbers and booleans are coerced to their text.
    pub fn optional_string(&self, index: usize) -> BridgeResult<Option<String>> {
        match self.get(index) {
            None => Ok(None),
            Some(JsonValue::String(text)) => Ok(Some(text.clone())),
            Some(value @ (JsonValue::Number(_) | JsonValue::Bool(_))) => Ok(Some(value.to_string())),
            Some(_) => Err(self.error(index, "a string")),
        }
    }

    pub fn int(&self, index: usize) -> BridgeResult<i64> {
        self.optional_int(index)?.ok_or_else(|| self.error(index, "an integer"))
    }

    /// Whole-valued floats such as `2.0` are accepted.
    pub fn optional_int(&self, index: usize) -> BridgeResult<Option<i64>> {
        match self.get(index) {
            None => Ok(None),
            Some(JsonValue::Number(number)) => {
                if let Some(int) = number.as_i64() {
                    return Ok(Some(int));
                }
                match number.as_f64() {
                    Some(float) if float.fract() == 0.0 && float.abs() < i64::MAX as f64 => Ok(Some(float as i64)),
                    _ => Err(self.error(index, "an integer")),
                }
            }
            Some(_) => Err(self.error(index, "an integer")),
        }
    }

    pub fn optional_bool(&self, index: usize) -> BridgeResult<Option<bool>> {
        match self.get(index) {
            None => Ok(None),
            Some(JsonValue::Bool(flag)) => Ok(Some(*flag)),
            Some(_) => Err(self.error(index, "a boolean")),
        }
    }

    pub fn bool(&self, index: usize) -> BridgeResult<bool> {
        self.optional_bool(index)?.ok_or_else(|| self.error(index, "a boolean"))
    }

    pub fn object(&self, index: usize) -> BridgeResult<&'a JsonMap<String, WireValue>> {
        match self.get(index) {
            Some(JsonValue::Object(map)) => Ok(map),
            _ => Err(self.error(index, "an object")),
        }
    }

    pub fn optional_object(&self, index: usize) -> BridgeResult<Option<&'a JsonMap<String, WireValue>>> {
        match self.get(index) {
            None => Ok(None),
            Some(JsonValue::Object(map)) => Ok(Some(map)),
            Some(_) => Err(self.error(index, "an object")),
        }
    }

    fn error(&self, index: usize, expected: &str) -> crate::error::BridgeError {
        let found = self.values.get(index).map(wire_type_name).unwrap_or("nothing");
        malformed_arguments(format!(
            "{}: argument {} must be {expected}, got {found}",
            self.action, index
        ))
    }
}
