//! Builder for [`NetTransport`](crate::transport::NetTransport).
//!
//! Exposes endpoint selection, TLS, attempt budget, pool sizing, and health
//! check timings. Unset options fall back to the `DEFAULT_*` constants in
//! [`config`](crate::config).

use std::{path::PathBuf, time::Duration};

use crate::{
    config::{TlsConfig, TlsVerify, TransportConfig, ensure_positive, env},
    error::ConfigError,
    transport::{NetTransport, SocketFactory},
};

macro_rules! option_setter {
    ($(#[$meta:meta])* $fn_name:ident, $field:ident, $ty:ty) => {
        $(#[$meta])*
        pub fn $fn_name(mut self, value: $ty) -> Self {
            self.$field = Some(value);
            self
        }
    };
}

/// Builder for constructing [`NetTransport`] instances.
#[derive(Clone, Debug, Default)]
pub struct TransportBuilder {
    endpoint: Option<(String, u16)>,
    tls: Option<TlsConfig>,
    socket_timeout: Option<Duration>,
    max_attempts: Option<u32>,
    pool_capacity: Option<usize>,
    max_message_len: Option<usize>,
    health_check_interval: Option<Duration>,
    health_check_log_interval: Option<Duration>,
    retry_backoff: Option<Duration>,
}

impl TransportBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connect to `host:port` over TCP.
    pub fn with_tcp(mut self, host: impl Into<String>, port: u16) -> Self {
        self.endpoint = Some((host.into(), port));
        self
    }

    /// Upgrade connections to TLS with the given verification policy.
    pub fn with_tls(mut self, verify: TlsVerify, domain: Option<String>) -> Self {
        let tls = self.tls.get_or_insert_with(TlsConfig::default);
        tls.verify = verify;
        tls.domain = domain;
        self
    }

    /// Trust the PEM bundle at `path`.
    pub fn with_ca_certs(mut self, path: impl Into<PathBuf>) -> Self {
        self.tls.get_or_insert_with(TlsConfig::default).ca_certs = Some(path.into());
        self
    }

    /// Present a client certificate and PKCS#8 key.
    pub fn with_client_identity(
        mut self,
        certfile: impl Into<PathBuf>,
        keyfile: impl Into<PathBuf>,
    ) -> Self {
        let tls = self.tls.get_or_insert_with(TlsConfig::default);
        tls.certfile = Some(certfile.into());
        tls.keyfile = Some(keyfile.into());
        self
    }

    option_setter!(
        #[doc = "Set the connect and write timeout for each socket."]
        with_socket_timeout,
        socket_timeout,
        Duration
    );
    option_setter!(with_max_attempts, max_attempts, u32);
    option_setter!(
        #[doc = "Set how many idle connections are kept. Zero disables pooling."]
        with_pool_capacity,
        pool_capacity,
        usize
    );
    option_setter!(with_max_message_len, max_message_len, usize);
    option_setter!(with_health_check_interval, health_check_interval, Duration);
    option_setter!(
        with_health_check_log_interval,
        health_check_log_interval,
        Duration
    );
    option_setter!(with_retry_backoff, retry_backoff, Duration);

    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(timeout) = self.socket_timeout {
            ensure_positive!(timeout, env::SOCKET_TIMEOUT)?;
        }
        if let Some(attempts) = self.max_attempts {
            ensure_positive!(attempts, env::MAX_SEND_ATTEMPTS)?;
        }
        if let Some(len) = self.max_message_len {
            ensure_positive!(len, env::MAX_MESSAGE_LEN)?;
        }
        if let Some(interval) = self.health_check_interval {
            ensure_positive!(interval, env::HEALTHCHECK_INTERVAL)?;
        }
        Ok(())
    }

    /// Resolve the options into a validated [`TransportConfig`].
    pub fn build_config(&self) -> Result<TransportConfig, ConfigError> {
        self.validate()?;
        let (host, port) = self
            .endpoint
            .clone()
            .ok_or(ConfigError::MissingSetting(env::HOST))?;
        let mut config = TransportConfig::new(host, port);
        self.apply_optional_fields(&mut config);
        config.tls = self.tls.clone();
        config.validate()?;
        Ok(config)
    }

    fn apply_optional_fields(&self, config: &mut TransportConfig) {
        if let Some(timeout) = self.socket_timeout {
            config.socket_timeout = timeout;
        }
        if let Some(attempts) = self.max_attempts {
            config.max_attempts = attempts;
        }
        if let Some(capacity) = self.pool_capacity {
            config.pool_capacity = capacity;
        }
        if let Some(len) = self.max_message_len {
            config.max_message_len = len;
        }
        if let Some(interval) = self.health_check_interval {
            config.health_check_interval = interval;
        }
        if let Some(interval) = self.health_check_log_interval {
            config.health_check_log_interval = interval;
        }
        if let Some(backoff) = self.retry_backoff {
            config.retry_backoff = backoff;
        }
    }

    /// Build a TCP/TLS transport.
    pub fn build(&self) -> Result<NetTransport, ConfigError> {
        NetTransport::from_config(&self.build_config()?)
    }

    /// Build a transport around a custom socket factory, ignoring the
    /// configured endpoint and TLS settings.
    pub fn build_with_factory<F: SocketFactory>(
        &self,
        factory: F,
    ) -> Result<NetTransport<F>, ConfigError> {
        self.validate()?;
        let mut config = TransportConfig::default();
        self.apply_optional_fields(&mut config);
        NetTransport::with_factory(factory, &config)
    }
}
