//! Event records and their origin metadata.

use std::{
    collections::BTreeMap,
    fmt,
    panic::Location,
    sync::atomic::{AtomicU64, Ordering},
};

use chrono::Utc;
use once_cell::sync::Lazy;
use serde::Serialize;

use crate::{config::env, level::EventLevel};

/// Schema version stamped on every event.
pub const EVENT_SCHEMA_VERSION: (u8, u8) = (0, 1);

const DEFAULT_DEPLOY: &str = "PROD";

// Seeded from 48 random bits so ids from different processes rarely collide.
static NEXT_EID: Lazy<AtomicU64> = Lazy::new(|| AtomicU64::new(rand::random::<u64>() >> 16));

static ORIGIN: Lazy<Origin> = Lazy::new(|| Origin::from_lookup(|key| std::env::var(key).ok()));

/// Return the next process-unique event id.
pub fn next_eid() -> u64 {
    NEXT_EID.fetch_add(1, Ordering::Relaxed)
}

/// A field value attached to an event.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => f.write_str(s),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_owned())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<u32> for FieldValue {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// Host and deployment the event was produced on.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Origin {
    pub host: String,
    pub pid: u32,
    pub client: String,
    pub datactr: String,
    pub cluster: String,
    pub deploy: String,
}

impl Origin {
    /// Origin of the current process, resolved once from the environment.
    pub fn current() -> &'static Origin {
        &ORIGIN
    }

    pub(crate) fn from_lookup<L>(lookup: L) -> Self
    where
        L: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            host: get("HOSTNAME")
                .or_else(|| get("HOST"))
                .unwrap_or_else(|| "localhost".to_owned()),
            pid: std::process::id(),
            client: get(env::CLIENT).unwrap_or_default(),
            datactr: get(env::DATACTR).unwrap_or_default(),
            cluster: get(env::CLUSTER).unwrap_or_default(),
            deploy: get(env::DEPLOY).unwrap_or_else(|| DEFAULT_DEPLOY.to_owned()),
        }
    }
}

/// Source location that produced an event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CodeLocation {
    #[serde(rename = "codeFile")]
    pub file: String,
    #[serde(rename = "codeLine")]
    pub line: u32,
    #[serde(rename = "codeFunc", skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,
}

impl CodeLocation {
    /// Location of the caller.
    #[track_caller]
    pub fn caller() -> Self {
        let location = Location::caller();
        Self {
            file: location.file().to_owned(),
            line: location.line(),
            function: None,
        }
    }

    /// Compact `func|file@line` rendering used on the console.
    pub fn short(&self) -> String {
        let file = std::path::Path::new(&self.file)
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or(&self.file);
        format!(
            "{}|{file}@{}",
            self.function.as_deref().unwrap_or_default(),
            self.line
        )
    }
}

/// A single structured event.
///
/// `value` carries the numeric payload for counters and gauges, `duration`
/// the elapsed seconds for timings. Events are immutable once built; the
/// `with_*` methods consume and return the event.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Event {
    pub eid: u64,
    pub name: String,
    pub target: String,
    pub value: f64,
    pub duration: f64,
    pub level: EventLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, FieldValue>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
    /// Seconds since the Unix epoch.
    pub tstamp: f64,
    #[serde(flatten)]
    pub origin: Origin,
    #[serde(flatten)]
    pub code: Option<CodeLocation>,
    pub version: (u8, u8),
}

impl Event {
    pub fn new(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::with_origin(name, target, Origin::current().clone())
    }

    pub(crate) fn with_origin(
        name: impl Into<String>,
        target: impl Into<String>,
        origin: Origin,
    ) -> Self {
        Self {
            eid: next_eid(),
            name: name.into(),
            target: target.into(),
            value: 0.0,
            duration: 0.0,
            level: EventLevel::default(),
            message: None,
            fields: BTreeMap::new(),
            labels: Vec::new(),
            tstamp: now_secs(),
            origin,
            code: None,
            version: EVENT_SCHEMA_VERSION,
        }
    }

    pub fn with_value(mut self, value: f64) -> Self {
        self.value = value;
        self
    }

    pub fn with_duration(mut self, seconds: f64) -> Self {
        self.duration = seconds;
        self
    }

    pub fn with_level(mut self, level: EventLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn with_fields<I, K, V>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<FieldValue>,
    {
        self.fields
            .extend(fields.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.labels.push(label.into());
        self
    }

    pub fn with_tstamp(mut self, tstamp: f64) -> Self {
        self.tstamp = tstamp;
        self
    }

    pub fn with_code(mut self, code: CodeLocation) -> Self {
        self.code = Some(code);
        self
    }

    /// Attach the caller's source location.
    #[track_caller]
    pub fn here(self) -> Self {
        self.with_code(CodeLocation::caller())
    }
}

fn now_secs() -> f64 {
    let now = Utc::now();
    now.timestamp() as f64 + f64::from(now.timestamp_subsec_micros()) / 1e6
}
