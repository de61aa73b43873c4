//! Client-side event logging with resilient delivery to a remote collector.
//!
//! Events are built with [`Event`], encoded per [`WireFormat`], and written by
//! an [`EventLogger`] either to the console or through a [`NetTransport`]. The
//! transport pools connections, retries failed sends on fresh sockets, and
//! watches for collector recovery in the background.

pub mod builder;
pub mod config;
pub mod console;
pub mod error;
pub mod event;
pub mod level;
pub mod log_compat;
pub mod logger;
pub mod rate_limited_warner;
pub mod serialise;
pub mod tracking;
pub mod transport;

#[cfg(test)]
mod test_utils;

pub use builder::TransportBuilder;
pub use config::{TlsConfig, TlsVerify, TransportConfig};
pub use console::{ConsoleSink, format_console};
pub use error::{ConfigError, EncodeError, LogError, TransportError};
pub use event::{CodeLocation, Event, FieldValue, Origin};
pub use level::EventLevel;
pub use log_compat::{EventLogBridge, install_log_bridge};
pub use logger::{EventLogger, Sink, default_logger, init_default_logger};
pub use serialise::WireFormat;
pub use tracking::{TrackedValue, Update};
pub use transport::{
    NetTransport, SocketFactory, TcpSocketFactory, Transport, TransportStats, TransportStatus,
};
