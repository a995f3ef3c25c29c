//! Bridge configuration.
//!
//! Values are applied to the analytics client once, when the [`BridgeContext`](crate::BridgeContext)
//! is created. Scripting-side calls such as `setLogLevel` change them afterwards.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{malformed_arguments, BridgeResult};
use crate::logger::LogLevel;

/// Default interval, in seconds, between automatic dispatches of queued hits.
pub const DEFAULT_DISPATCH_INTERVAL_SECS: u64 = 10;
/// Upper bound accepted for the dispatch interval (one day).
pub const MAX_DISPATCH_INTERVAL_SECS: u64 = 24 * 60 * 60;

pub const LOG_LEVEL_ENV: &str = "ANALYTICS_BRIDGE_LOG_LEVEL";
pub const DISPATCH_INTERVAL_ENV: &str = "ANALYTICS_BRIDGE_DISPATCH_INTERVAL";

/// Host operating system. Only affects how integer log levels are read off the wire.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostPlatform {
    #[default]
    Android,
    Ios,
}

impl HostPlatform {
    pub fn as_str(&self) -> &'static str {
        match self {
            HostPlatform::Android => "android",
            HostPlatform::Ios => "ios",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BridgeSettings {
    platform: HostPlatform,
    dispatch_interval_secs: u64,
    log_level: LogLevel,
    report_uncaught_exceptions: bool,
}

impl BridgeSettings {
    pub fn new(platform: HostPlatform, dispatch_interval_secs: u64, log_level: LogLevel) -> BridgeResult<Self> {
        validate_dispatch_interval(dispatch_interval_secs)?;
        Ok(Self {
            platform,
            dispatch_interval_secs,
            log_level,
            report_uncaught_exceptions: true,
        })
    }

    /// Applies `ANALYTICS_BRIDGE_LOG_LEVEL` (a level name) and
    /// `ANALYTICS_BRIDGE_DISPATCH_INTERVAL` (seconds) when they are set and valid.
    ///
    /// Invalid values are logged and ignored.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(raw) = std::env::var(LOG_LEVEL_ENV) {
            match raw.parse::<LogLevel>() {
                Ok(level) => self.log_level = level,
                Err(err) => log::warn!("ignoring {LOG_LEVEL_ENV}: {err}"),
            }
        }
        if let Ok(raw) = std::env::var(DISPATCH_INTERVAL_ENV) {
            let parsed = raw
                .trim()
                .parse::<u64>()
                .map_err(|err| malformed_arguments(format!("invalid dispatch interval `{raw}`: {err}")))
                .and_then(|secs| self.set_dispatch_interval_secs(secs));
            if let Err(err) = parsed {
                log::warn!("ignoring {DISPATCH_INTERVAL_ENV}: {err}");
            }
        }
        self
    }

    pub fn platform(&self) -> HostPlatform {
        self.platform
    }

    pub fn dispatch_interval_secs(&self) -> u64 {
        self.dispatch_interval_secs
    }

    pub fn dispatch_interval(&self) -> Duration {
        Duration::from_secs(self.dispatch_interval_secs)
    }

    pub fn log_level(&self) -> LogLevel {
        self.log_level
    }

    /// Whether the first tracker created is registered as the uncaught-exception reporter.
    pub fn report_uncaught_exceptions(&self) -> bool {
        self.report_uncaught_exceptions
    }

    pub fn apply(&mut self, update: BridgeSettingsUpdate) -> BridgeResult<()> {
        if update.is_empty() {
            return Ok(());
        }
        if let Some(secs) = update.dispatch_interval_secs {
            validate_dispatch_interval(secs)?;
        }

        if let Some(platform) = update.platform {
            self.platform = platform;
        }
        if let Some(secs) = update.dispatch_interval_secs {
            self.dispatch_interval_secs = secs;
        }
        if let Some(level) = update.log_level {
            self.log_level = level;
        }
        if let Some(report) = update.report_uncaught_exceptions {
            self.report_uncaught_exceptions = report;
        }
        Ok(())
    }

    pub(crate) fn set_dispatch_interval_secs(&mut self, value: u64) -> BridgeResult<()> {
        validate_dispatch_interval(value)?;
        self.dispatch_interval_secs = value;
        Ok(())
    }

    pub(crate) fn set_log_level(&mut self, level: LogLevel) {
        self.log_level = level;
    }
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            platform: HostPlatform::default(),
            dispatch_interval_secs: DEFAULT_DISPATCH_INTERVAL_SECS,
            log_level: LogLevel::Verbose,
            report_uncaught_exceptions: true,
        }
    }
}

/// Partial update to apply on top of existing settings.
///
/// Hosts that keep their configuration as JSON can read it with [`BridgeSettingsUpdate::from_json`];
/// keys are camelCase (`dispatchIntervalSecs`, `logLevel`, ...).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BridgeSettingsUpdate {
    pub platform: Option<HostPlatform>,
    pub dispatch_interval_secs: Option<u64>,
    pub log_level: Option<LogLevel>,
    pub report_uncaught_exceptions: Option<bool>,
}

impl BridgeSettingsUpdate {
    pub fn from_json(raw: &str) -> BridgeResult<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn is_empty(&self) -> bool {
        self.platform.is_none()
            && self.dispatch_interval_secs.is_none()
            && self.log_level.is_none()
            && self.report_uncaught_exceptions.is_none()
    }
}

pub(crate) fn validate_dispatch_interval(value: u64) -> BridgeResult<()> {
    if value > MAX_DISPATCH_INTERVAL_SECS {
        return Err(malformed_arguments(format!(
            "dispatch interval must be at most {MAX_DISPATCH_INTERVAL_SECS} seconds"
        )));
    }
    Ok(())
}
