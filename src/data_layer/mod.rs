//! Proxy over the SDK's shared data layer.

use std::fmt;
use std::sync::Arc;

use crate::codec::{NativeValue, ValueMap, WireValue};
use crate::error::{malformed_arguments, BridgeResult};

/// Process-wide key/value store owned by the native SDK.
///
/// Implementations may do blocking disk or network work; the dispatcher only calls them from
/// the worker pool.
pub trait DataLayerStore: Send + Sync {
    /// Merges `update` into the store. Keys absent from `update` are untouched.
    fn push(&self, update: ValueMap) -> BridgeResult<()>;
    /// Delivers a named event and its update as one unit.
    fn push_event(&self, event: &str, update: ValueMap) -> BridgeResult<()>;
    fn get(&self, key: &str) -> Option<NativeValue>;
}

/// Key under which the event name travels with its update.
pub const EVENT_KEY: &str = "event";

#[derive(Clone)]
pub struct DataLayerBridge {
    store: Arc<dyn DataLayerStore>,
}

impl fmt::Debug for DataLayerBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataLayerBridge").finish_non_exhaustive()
    }
}

impl DataLayerBridge {
    pub fn new(store: Arc<dyn DataLayerStore>) -> Self {
        Self { store }
    }

    pub fn push_mapping(&self, mapping: ValueMap) -> BridgeResult<()> {
        if mapping.is_empty() {
            return Ok(());
        }
        self.store.push(mapping)
    }

    pub fn push_key_value(&self, key: &str, value: NativeValue) -> BridgeResult<()> {
        if key.is_empty() {
            return Err(malformed_arguments("data layer key must not be empty"));
        }
        self.store.push(ValueMap::from([(key.to_string(), value)]))
    }

    pub fn push_event(&self, name: &str, updates: ValueMap) -> BridgeResult<()> {
        if name.trim().is_empty() {
            return Err(malformed_arguments("data layer event name must not be empty"));
        }
        self.store.push_event(name, updates)
    }

    /// Absent keys read as null.
    pub fn read_value(&self, key: &str) -> WireValue {
        self.store
            .get(key)
            .map(|value| value.to_wire())
            .unwrap_or(WireValue::Null)
    }
}
