//! Severity levels attached to events.

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};
use thiserror::Error;

/// Event severity. Numeric values match the collector's schema.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EventLevel {
    NotSet,
    Trace,
    Debug,
    Info,
    #[default]
    Ok,
    Warning,
    Error,
    Critical,
    Extreme,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown event level {0:?}")]
pub struct ParseLevelError(pub String);

impl EventLevel {
    /// Numeric code sent on the wire.
    pub fn code(self) -> u8 {
        match self {
            Self::NotSet => 0,
            Self::Trace => 5,
            Self::Debug => 10,
            Self::Info => 20,
            Self::Ok => 25,
            Self::Warning => 30,
            Self::Error => 40,
            Self::Critical => 50,
            Self::Extreme => 60,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotSet => "NOTSET",
            Self::Trace => "TRACE",
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Ok => "OK",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
            Self::Critical => "CRITICAL",
            Self::Extreme => "EXTREME",
        }
    }
}

impl fmt::Display for EventLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for EventLevel {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "NOTSET" => Ok(Self::NotSet),
            "TRACE" => Ok(Self::Trace),
            "DEBUG" => Ok(Self::Debug),
            "INFO" => Ok(Self::Info),
            "OK" => Ok(Self::Ok),
            "WARN" | "WARNING" => Ok(Self::Warning),
            "ERROR" => Ok(Self::Error),
            "CRITICAL" => Ok(Self::Critical),
            "EXTREME" => Ok(Self::Extreme),
            _ => Err(ParseLevelError(s.to_owned())),
        }
    }
}

impl From<log::Level> for EventLevel {
    fn from(level: log::Level) -> Self {
        match level {
            log::Level::Trace => Self::Trace,
            log::Level::Debug => Self::Debug,
            log::Level::Info => Self::Info,
            log::Level::Warn => Self::Warning,
            log::Level::Error => Self::Error,
        }
    }
}

impl Serialize for EventLevel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}
