//! Error types shared across the transport, encoder, and logger.
//!
//! Per-attempt socket failures are represented by [`TransportError::Connect`]
//! and [`TransportError::Send`]. They are consumed by the retry loop in
//! [`NetTransport`](crate::transport::NetTransport) and only ever reach a
//! caller wrapped inside [`TransportError::Exhausted`].

use std::io;

use thiserror::Error;

/// Failures raised while delivering messages to the collector.
#[derive(Debug, Error)]
pub enum TransportError {
    /// A socket could not be created, connected, or upgraded to TLS.
    #[error("failed to connect to {endpoint}: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: io::Error,
    },
    /// A write failed on an established connection.
    #[error("socket write failed: {0}")]
    Send(#[source] io::Error),
    /// The attempt budget was spent before every message was delivered.
    #[error("too many failures sending events ({sent} of {requested} sent after {attempts} attempts): {last}")]
    Exhausted {
        sent: usize,
        requested: usize,
        attempts: u32,
        #[source]
        last: Box<TransportError>,
    },
}

impl TransportError {
    /// Number of messages delivered before the send gave up.
    ///
    /// Per-attempt variants report zero since they never describe a whole
    /// batch.
    pub fn sent(&self) -> usize {
        match self {
            Self::Exhausted { sent, .. } => *sent,
            _ => 0,
        }
    }
}

/// Invalid or missing transport configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required setting was not supplied.
    #[error("missing configuration setting {0}")]
    MissingSetting(&'static str),
    /// A setting was present but unusable.
    #[error("invalid configuration setting {name}: {reason}")]
    InvalidSetting { name: &'static str, reason: String },
    /// TLS material could not be loaded or the connector could not be built.
    #[error("tls configuration error: {0}")]
    Tls(#[from] native_tls::Error),
    /// A configured file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
}

impl ConfigError {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidSetting {
            name,
            reason: reason.into(),
        }
    }
}

/// Failures while turning an event into wire bytes.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("json serialisation failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("msgpack serialisation failed: {0}")]
    MsgPack(#[from] rmp_serde::encode::Error),
    /// The encoded event exceeds the permitted message length.
    #[error("encoded event is {len} bytes; maximum is {max}")]
    TooLarge { len: usize, max: usize },
}

/// Failures surfaced by [`EventLogger`](crate::logger::EventLogger).
///
/// Transport failures are only reported when the console fallback also
/// failed, so callers see an error exactly when an event was lost.
#[derive(Debug, Error)]
pub enum LogError {
    #[error(transparent)]
    Encode(#[from] EncodeError),
    #[error("primary transport failed and console fallback failed: {fallback}")]
    Transport {
        #[source]
        primary: TransportError,
        fallback: io::Error,
    },
    #[error("console write failed: {0}")]
    Console(#[from] io::Error),
}
