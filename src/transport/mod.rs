//! Resilient delivery of serialised events to a remote collector.
//!
//! [`NetTransport`] is the entry point. It checks connections out of a
//! [`ConnectionPool`], writes each message in order, retries failed attempts on
//! fresh connections, and hands recovery detection to a background
//! [`HealthChecker`] once its attempt budget is spent. [`TransportStats`]
//! exposes counters for external metrics scraping. Connections come from a
//! [`SocketFactory`]; [`TcpSocketFactory`] speaks plain TCP or TLS.

mod connection;
mod factory;
mod health;
mod net;
mod pool;
mod stats;


pub use connection::Connection;
pub use factory::{CollectorStream, SocketFactory, TcpSocketFactory};
pub use health::{HealthCheckSettings, HealthChecker, TransportStatus};
pub use net::NetTransport;
pub use pool::ConnectionPool;
pub use stats::{Counter, TRANSPORT_STATS_PREFIX, TransportStats};

use std::sync::Arc;

use crate::error::TransportError;

/// Object-safe view of a transport used by network sinks.
pub trait Transport: Send + Sync {
    /// Deliver every message in order or fail.
    fn send(&self, messages: &[&[u8]]) -> Result<(), TransportError>;

    /// Whether the collector is currently believed reachable.
    fn check_status(&self) -> bool;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn send(&self, messages: &[&[u8]]) -> Result<(), TransportError> {
        (**self).send(messages)
    }

    fn check_status(&self) -> bool {
        (**self).check_status()
    }
}
