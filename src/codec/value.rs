//! Native value model shared by the data layer and container reads.

use std::collections::BTreeMap;

use serde_json::{Map as JsonMap, Number, Value as JsonValue};

/// Mapping pushed into, or read out of, the data layer.
pub type ValueMap = BTreeMap<String, NativeValue>;

/// A value as the native SDK hands it to the bridge.
///
/// The variant decides the wire encoding, so integral and floating numbers never get confused
/// by their printed form.
#[derive(Clone, Debug, PartialEq)]
pub enum NativeValue {
    Null,
    String(String),
    Bool(bool),
    Int(i64),
    Double(f64),
    Map(ValueMap),
    /// Arrays held by container values and data-layer entries, encoded element by element.
    List(Vec<NativeValue>),
    /// Anything the SDK returned that has no wire counterpart (dates, handles, ...), kept in
    /// its string form.
    Opaque(String),
}

impl NativeValue {
    /// Builds a native value from a wire value, keeping its type.
    pub fn from_wire(value: &JsonValue) -> Self {
        match value {
            JsonValue::Null => NativeValue::Null,
            JsonValue::Bool(flag) => NativeValue::Bool(*flag),
            JsonValue::Number(number) => {
                if let Some(int) = number.as_i64() {
                    NativeValue::Int(int)
                } else {
                    // u64 beyond i64::MAX lands here as well.
                    NativeValue::Double(number.as_f64().unwrap_or(f64::NAN))
                }
            }
            JsonValue::String(text) => NativeValue::String(text.clone()),
            JsonValue::Array(items) => NativeValue::List(items.iter().map(NativeValue::from_wire).collect()),
            JsonValue::Object(map) => NativeValue::Map(
                map.iter()
                    .map(|(key, value)| (key.clone(), NativeValue::from_wire(value)))
                    .collect(),
            ),
        }
    }

    /// Encodes the value for the wire.
    ///
    /// Non-finite doubles have no JSON form and degrade to their string representation, the
    /// same way [`NativeValue::Opaque`] does.
    pub fn to_wire(&self) -> JsonValue {
        match self {
            NativeValue::Null => JsonValue::Null,
            NativeValue::Map(map) => {
                let object: JsonMap<String, JsonValue> =
                    map.iter().map(|(key, value)| (key.clone(), value.to_wire())).collect();
                JsonValue::Object(object)
            }
            NativeValue::Double(number) => match Number::from_f64(*number) {
                Some(number) => JsonValue::Number(number),
                None => JsonValue::String(number.to_string()),
            },
            NativeValue::Int(number) => JsonValue::Number((*number).into()),
            NativeValue::Bool(flag) => JsonValue::Bool(*flag),
            NativeValue::List(items) => JsonValue::Array(items.iter().map(NativeValue::to_wire).collect()),
            NativeValue::String(text) | NativeValue::Opaque(text) => JsonValue::String(text.clone()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, NativeValue::Null)
    }
}

impl From<&str> for NativeValue {
    fn from(value: &str) -> Self {
        NativeValue::String(value.to_string())
    }
}

impl From<String> for NativeValue {
    fn from(value: String) -> Self {
        NativeValue::String(value)
    }
}

impl From<bool> for NativeValue {
    fn from(value: bool) -> Self {
        NativeValue::Bool(value)
    }
}

impl From<i64> for NativeValue {
    fn from(value: i64) -> Self {
        NativeValue::Int(value)
    }
}

impl From<i32> for NativeValue {
    fn from(value: i32) -> Self {
        NativeValue::Int(value.into())
    }
}

impl From<f64> for NativeValue {
    fn from(value: f64) -> Self {
        NativeValue::Double(value)
    }
}

impl From<ValueMap> for NativeValue {
    fn from(value: ValueMap) -> Self {
        NativeValue::Map(value)
    }
}

impl<T: Into<NativeValue>> From<Option<T>> for NativeValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(NativeValue::Null)
    }
}
