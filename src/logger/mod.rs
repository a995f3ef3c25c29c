//! Log level of the wrapped analytics SDK.
//!
//! The bridge itself logs through the `log` facade. This module only models the verbosity the
//! native client is asked to use, and how the scripting layer encodes it on each platform.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{malformed_arguments, BridgeError};
use crate::settings::HostPlatform;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum LogLevel {
    Verbose = 0,
    Info = 1,
    Warning = 2,
    Error = 3,
}

impl LogLevel {
    /// Level applied when a wire code has no mapping.
    pub const FALLBACK: LogLevel = LogLevel::Warning;

    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Verbose => "verbose",
            LogLevel::Info => "info",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
        }
    }

    /// Maps the integer sent by the scripting layer to a level.
    ///
    /// Android receives `0..=3` (verbose to error). The iOS script shim inverts the scale before
    /// sending, so iOS receives `4..=1`. Codes outside the platform's range fall back to
    /// [`LogLevel::Warning`] instead of failing.
    pub fn from_wire(code: i64, platform: HostPlatform) -> Self {
        let mapped = match platform {
            HostPlatform::Android => match code {
                0 => Some(LogLevel::Verbose),
                1 => Some(LogLevel::Info),
                2 => Some(LogLevel::Warning),
                3 => Some(LogLevel::Error),
                _ => None,
            },
            HostPlatform::Ios => match code {
                4 => Some(LogLevel::Verbose),
                3 => Some(LogLevel::Info),
                2 => Some(LogLevel::Warning),
                1 => Some(LogLevel::Error),
                _ => None,
            },
        };
        mapped.unwrap_or_else(|| {
            log::warn!(
                "unknown log level {code} for {}; using {}",
                platform.as_str(),
                Self::FALLBACK
            );
            Self::FALLBACK
        })
    }

    /// Inverse of [`LogLevel::from_wire`].
    pub fn to_wire(self, platform: HostPlatform) -> i64 {
        match platform {
            HostPlatform::Android => self as i64,
            HostPlatform::Ios => 4 - self as i64,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            LogLevel::Verbose => "VERBOSE",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
        };
        f.write_str(label)
    }
}

impl FromStr for LogLevel {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "verbose" | "debug" => Ok(LogLevel::Verbose),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warning),
            "error" => Ok(LogLevel::Error),
            other => Err(malformed_arguments(format!("unknown log level `{other}`"))),
        }
    }
}
