//! Pooled, retrying network transport.

use std::{
    io,
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use log::{debug, warn};

use crate::{
    config::TransportConfig,
    error::{ConfigError, TransportError},
};

use super::{
    ConnectionPool, HealthCheckSettings, HealthChecker, SocketFactory, TcpSocketFactory,
    Transport, TransportStats, TransportStatus,
};

/// Delivers batches of pre-serialised messages to one collector.
///
/// `send` is synchronous: the caller waits for connection acquisition, every
/// write, and any backoff between attempts. The first attempt of a send uses
/// the pool; later attempts open a fresh connection so a retry can land on a
/// different backend behind a load balancer instead of a stale pooled peer.
///
/// When a send exhausts its attempts the pool is drained, the transport is
/// marked down, and a background health checker probes until the collector
/// accepts connections again. Sends made while down still attempt delivery.
pub struct NetTransport<F: SocketFactory = TcpSocketFactory> {
    pool: ConnectionPool<F>,
    health: HealthChecker<F>,
    stats: Arc<TransportStats>,
    max_attempts: u32,
    retry_backoff: Duration,
    description: String,
}

impl NetTransport<TcpSocketFactory> {
    /// Build a TCP/TLS transport from validated configuration.
    pub fn from_config(config: &TransportConfig) -> Result<Self, ConfigError> {
        let factory = TcpSocketFactory::from_config(config)?;
        Self::with_factory(factory, config)
    }

    /// Build a transport from `EVENTLOG_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_config(&TransportConfig::from_env()?)
    }
}

impl<F: SocketFactory> NetTransport<F> {
    /// Build a transport around an arbitrary socket factory.
    ///
    /// Only the tuning fields of `config` are used; the endpoint is whatever
    /// `factory` connects to. Those fields are validated here.
    pub fn with_factory(factory: F, config: &TransportConfig) -> Result<Self, ConfigError> {
        config.validate_tuning()?;
        let factory = Arc::new(factory);
        let stats = Arc::new(TransportStats::default());
        let description = factory.describe();
        let pool = ConnectionPool::new(
            Arc::clone(&factory),
            config.pool_capacity,
            config.socket_timeout,
            Arc::clone(&stats),
        );
        let health = HealthChecker::new(
            factory,
            HealthCheckSettings {
                interval: config.health_check_interval,
                log_every: config.health_check_log_every(),
                probe_timeout: config.socket_timeout,
            },
        );
        Ok(Self {
            pool,
            health,
            stats,
            max_attempts: config.max_attempts,
            retry_backoff: config.retry_backoff,
            description,
        })
    }

    /// Send every message in order, or fail once the attempt budget is spent.
    ///
    /// Messages already delivered are never re-sent on a later attempt. On
    /// failure the returned [`TransportError::Exhausted`] reports how many
    /// messages made it out and the last underlying error.
    pub fn send<M: AsRef<[u8]>>(&self, messages: &[M]) -> Result<(), TransportError> {
        let started = Instant::now();
        let mut sent = 0usize;
        let mut bytes = 0u64;
        let mut attempts = 0u32;
        let mut last_error = None;

        while sent < messages.len() && attempts < self.max_attempts {
            let outcome = self.attempt(&messages[sent..], attempts == 0);
            sent += outcome.delivered;
            bytes += outcome.bytes;
            let Some(err) = outcome.error else {
                continue;
            };
            attempts += 1;
            self.stats.record_socket_error();
            debug!(
                "{} attempt {attempts}/{} failed after {sent} messages: {err}",
                self.description, self.max_attempts
            );
            last_error = Some(err);
            if attempts < self.max_attempts {
                thread::sleep(self.retry_backoff);
            }
        }

        self.stats.record_msgs_sent(sent as u64);
        self.stats.record_bytes_sent(bytes);
        self.stats.record_elapsed(started.elapsed());

        if sent == messages.len() {
            return Ok(());
        }

        // Pooled connections most likely point at the same dead peer.
        self.pool.close_all();
        if self.health.mark_down() {
            warn!(
                "{} marked down after {attempts} failed attempts; starting health checker",
                self.description
            );
        }
        let last = last_error.unwrap_or_else(|| {
            TransportError::Send(io::Error::other("no delivery attempt was made"))
        });
        Err(TransportError::Exhausted {
            sent,
            requested: messages.len(),
            attempts,
            last: Box::new(last),
        })
    }

    /// Send a single message.
    pub fn send_one(&self, message: impl AsRef<[u8]>) -> Result<(), TransportError> {
        self.send(std::slice::from_ref(&message))
    }

    /// Cheap check of whether the collector is believed reachable.
    pub fn check_status(&self) -> bool {
        self.health.is_up()
    }

    pub fn status(&self) -> TransportStatus {
        self.health.status()
    }

    pub fn stats(&self) -> &TransportStats {
        &self.stats
    }

    /// Close idle pooled connections; the next send opens a new one.
    pub fn close_pool_connections(&self) {
        self.pool.close_all();
    }

    /// Stop the health checker and close idle connections.
    pub fn shutdown(&self) {
        self.health.stop();
        self.pool.close_all();
    }

    #[cfg(test)]
    pub(crate) fn pool(&self) -> &ConnectionPool<F> {
        &self.pool
    }

    fn attempt<M: AsRef<[u8]>>(&self, pending: &[M], first: bool) -> AttemptOutcome {
        let acquired = if first {
            self.pool.take()
        } else {
            self.pool.create()
        };
        let mut conn = match acquired {
            Ok(conn) => conn,
            Err(err) => return AttemptOutcome::failed(0, 0, err),
        };

        let mut delivered = 0usize;
        let mut bytes = 0u64;
        for message in pending {
            let buf = message.as_ref();
            if let Err(err) = conn.send_all(buf) {
                conn.reject();
                self.pool.release(conn);
                return AttemptOutcome::failed(delivered, bytes, TransportError::Send(err));
            }
            delivered += 1;
            bytes += buf.len() as u64;
        }
        self.pool.release(conn);
        AttemptOutcome {
            delivered,
            bytes,
            error: None,
        }
    }
}

struct AttemptOutcome {
    delivered: usize,
    bytes: u64,
    error: Option<TransportError>,
}

impl AttemptOutcome {
    fn failed(delivered: usize, bytes: u64, error: TransportError) -> Self {
        Self {
            delivered,
            bytes,
            error: Some(error),
        }
    }
}

impl<F: SocketFactory> Transport for NetTransport<F> {
    fn send(&self, messages: &[&[u8]]) -> Result<(), TransportError> {
        NetTransport::send(self, messages)
    }

    fn check_status(&self) -> bool {
        NetTransport::check_status(self)
    }
}

impl<F: SocketFactory> Drop for NetTransport<F> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl<F: SocketFactory> std::fmt::Debug for NetTransport<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetTransport")
            .field("target", &self.description)
            .field("status", &self.status())
            .field("max_attempts", &self.max_attempts)
            .field("pool", &self.pool)
            .finish()
    }
}
