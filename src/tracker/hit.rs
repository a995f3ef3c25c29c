//! Builders for the common hit shapes.

use crate::codec::StringMap;
use crate::tracker::fields::{self, HitType};

/// Collects hit parameters, starting from the hit type.
#[derive(Clone, Debug, PartialEq)]
pub struct HitBuilder {
    params: StringMap,
}

impl HitBuilder {
    pub fn new(hit_type: HitType) -> Self {
        let mut params = StringMap::new();
        params.insert(fields::HIT_TYPE.to_string(), Some(hit_type.as_str().to_string()));
        Self { params }
    }

    pub fn set(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), Some(value.into()));
        self
    }

    /// Adds a custom dimension (`cd<index>`).
    pub fn custom_dimension(self, index: u32, value: impl Into<String>) -> Self {
        self.set(fields::custom_dimension(index), value)
    }

    /// Adds a custom metric (`cm<index>`).
    pub fn custom_metric(self, index: u32, value: impl Into<String>) -> Self {
        self.set(fields::custom_metric(index), value)
    }

    pub fn build(self) -> StringMap {
        self.params
    }
}

/// Event hit. A missing label is sent as an empty string and a missing value as `0`.
pub fn event(category: &str, action: &str, label: Option<&str>, value: Option<i64>) -> HitBuilder {
    HitBuilder::new(HitType::Event)
        .set(fields::EVENT_CATEGORY, category)
        .set(fields::EVENT_ACTION, action)
        .set(fields::EVENT_LABEL, label.unwrap_or_default())
        .set(fields::EVENT_VALUE, value.unwrap_or(0).to_string())
}

pub fn app_view(screen_name: &str) -> HitBuilder {
    HitBuilder::new(HitType::AppView).set(fields::SCREEN_NAME, screen_name)
}

/// Exception hit. `fatal` is encoded as `1` or `0`.
pub fn exception(description: &str, fatal: bool) -> HitBuilder {
    HitBuilder::new(HitType::Exception)
        .set(fields::EX_DESCRIPTION, description)
        .set(fields::EX_FATAL, if fatal { "1" } else { "0" })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value<'a>(hit: &'a StringMap, key: &str) -> Option<&'a str> {
        hit.get(key).and_then(|value| value.as_deref())
    }

    #[test]
    fn event_defaults_label_and_value() {
        let hit = event("ui", "click", None, None).build();
        assert_eq!(value(&hit, fields::HIT_TYPE), Some("event"));
        assert_eq!(value(&hit, fields::EVENT_CATEGORY), Some("ui"));
        assert_eq!(value(&hit, fields::EVENT_ACTION), Some("click"));
        assert_eq!(value(&hit, fields::EVENT_LABEL), Some(""));
        assert_eq!(value(&hit, fields::EVENT_VALUE), Some("0"));
    }

    #[test]
    fn app_view_sets_screen_name() {
        let hit = app_view("settings").custom_dimension(2, "beta").build();
        assert_eq!(value(&hit, fields::HIT_TYPE), Some("appview"));
        assert_eq!(value(&hit, fields::SCREEN_NAME), Some("settings"));
        assert_eq!(value(&hit, "cd2"), Some("beta"));
    }

    #[test]
    fn exception_encodes_fatal_flag() {
        let hit = exception("boom", true).build();
        assert_eq!(value(&hit, fields::EX_FATAL), Some("1"));
        let hit = exception("boom", false).custom_metric(1, "3").build();
        assert_eq!(value(&hit, fields::EX_FATAL), Some("0"));
        assert_eq!(value(&hit, "cm1"), Some("3"));
    }
}
