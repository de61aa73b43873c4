//! Configuration consumed by the network transport.
//!
//! Values are plain data: [`TransportConfig::from_env`] resolves them from
//! `EVENTLOG_*` environment variables, and
//! [`TransportBuilder`](crate::builder::TransportBuilder) offers a fluent
//! alternative for programmatic setup. Both paths end in
//! [`TransportConfig::validate`], so malformed endpoints are rejected when the
//! transport is constructed rather than on the first send.

use std::{path::PathBuf, str::FromStr, time::Duration};

use crate::error::ConfigError;

/// Default timeout applied to connects, TLS handshakes, and writes.
pub const DEFAULT_SOCKET_TIMEOUT: Duration = Duration::from_secs(5);
/// Default number of attempts per `send` before giving up.
pub const DEFAULT_MAX_SEND_ATTEMPTS: u32 = 3;
/// Default number of idle connections kept open.
///
/// Connections are held for well under a millisecond per send, so the pool
/// can be much smaller than the number of calling threads.
pub const DEFAULT_PEAK_CONNECTIONS: usize = 5;
/// Default upper bound on an encoded event.
pub const DEFAULT_MAX_MESSAGE_LEN: usize = 32 * 1024;
/// Default delay between health-check probes while the collector is down.
pub const DEFAULT_HEALTHCHECK_INTERVAL: Duration = Duration::from_secs(3);
/// Default delay between "still down" diagnostics.
pub const DEFAULT_HEALTHCHECK_LOG_INTERVAL: Duration = Duration::from_secs(60);
/// Default pause between failed attempts within one `send`.
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(50);

/// Environment variable names understood by [`TransportConfig::from_env`].
pub mod env {
    pub const HOST: &str = "EVENTLOG_HOST";
    pub const PORT: &str = "EVENTLOG_PORT";
    pub const SOCKET_TIMEOUT: &str = "EVENTLOG_SOCKET_TIMEOUT";
    pub const MAX_SEND_ATTEMPTS: &str = "EVENTLOG_MAX_SEND_ATTEMPTS";
    pub const PEAK_CONNECTIONS: &str = "EVENTLOG_PEAK_CONNECTIONS";
    pub const MAX_MESSAGE_LEN: &str = "EVENTLOG_MAX_MESSAGE_LEN";
    pub const HEALTHCHECK_INTERVAL: &str = "EVENTLOG_HEALTHCHECK_INTERVAL_SEC";
    pub const HEALTHCHECK_LOG_INTERVAL: &str = "EVENTLOG_HEALTHCHECK_PRINT_INTERVAL_SEC";
    pub const RETRY_BACKOFF_MS: &str = "EVENTLOG_RETRY_BACKOFF_MS";
    pub const TLS_ENABLE: &str = "EVENTLOG_TLS_ENABLE";
    pub const TLS_VERIFY: &str = "EVENTLOG_TLS_VERIFY";
    pub const TLS_CA_CERTS: &str = "EVENTLOG_TLS_CA_CERTS";
    pub const TLS_CERTFILE: &str = "EVENTLOG_TLS_CERTFILE";
    pub const TLS_KEYFILE: &str = "EVENTLOG_TLS_KEYFILE";
    pub const TLS_DOMAIN: &str = "EVENTLOG_TLS_DOMAIN";
    pub const FORMAT: &str = "EVENTLOG_FORMAT";
    pub const CLIENT: &str = "EVENTLOG_CLIENT";
    pub const DATACTR: &str = "EVENTLOG_DATACTR";
    pub const CLUSTER: &str = "EVENTLOG_CLUSTER";
    pub const DEPLOY: &str = "EVENTLOG_DEPLOY";
}

/// Validate that a value is greater than zero, returning an error otherwise.
macro_rules! ensure_positive {
    ($value:expr, $field:expr) => {{
        if $crate::config::is_zero(&$value) {
            Err($crate::error::ConfigError::invalid(
                $field,
                "must be greater than zero",
            ))
        } else {
            Ok($value)
        }
    }};
}

pub(crate) use ensure_positive;

pub(crate) fn is_zero<T: Default + PartialEq>(value: &T) -> bool {
    *value == T::default()
}

/// Certificate verification policy for TLS connections.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TlsVerify {
    /// Verify the chain against system roots and check the host name.
    #[default]
    Required,
    /// Trust only the configured CA bundle and skip host name checks.
    OptionalWithCa,
    /// Accept any certificate.
    None,
}

/// TLS settings for the collector connection.
#[derive(Clone, Debug, Default)]
pub struct TlsConfig {
    pub verify: TlsVerify,
    /// PEM bundle of trusted CA certificates.
    pub ca_certs: Option<PathBuf>,
    /// PEM client certificate presented to the collector.
    pub certfile: Option<PathBuf>,
    /// PEM (PKCS#8) private key matching `certfile`.
    pub keyfile: Option<PathBuf>,
    /// Name used for SNI and host name checks; defaults to the host.
    pub domain: Option<String>,
}

/// Configuration object describing how to construct a
/// [`NetTransport`](crate::transport::NetTransport).
#[derive(Clone, Debug)]
pub struct TransportConfig {
    pub host: String,
    pub port: u16,
    pub socket_timeout: Duration,
    pub max_attempts: u32,
    /// Idle connections kept for reuse. Zero disables pooling.
    pub pool_capacity: usize,
    pub max_message_len: usize,
    pub health_check_interval: Duration,
    pub health_check_log_interval: Duration,
    pub retry_backoff: Duration,
    pub tls: Option<TlsConfig>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 9020,
            socket_timeout: DEFAULT_SOCKET_TIMEOUT,
            max_attempts: DEFAULT_MAX_SEND_ATTEMPTS,
            pool_capacity: DEFAULT_PEAK_CONNECTIONS,
            max_message_len: DEFAULT_MAX_MESSAGE_LEN,
            health_check_interval: DEFAULT_HEALTHCHECK_INTERVAL,
            health_check_log_interval: DEFAULT_HEALTHCHECK_LOG_INTERVAL,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
            tls: None,
        }
    }
}

impl TransportConfig {
    /// Target the given endpoint with default tuning.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    /// Resolve configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve configuration through an arbitrary key lookup.
    ///
    /// Empty values are treated as unset. Host and port are required; every
    /// other setting falls back to its `DEFAULT_*` constant.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let host = get(env::HOST).ok_or(ConfigError::MissingSetting(env::HOST))?;
        let port = parse::<u16>(&get, env::PORT)?.ok_or(ConfigError::MissingSetting(env::PORT))?;

        let mut config = Self::new(host.trim(), port);
        if let Some(timeout) = parse_secs(&get, env::SOCKET_TIMEOUT)? {
            config.socket_timeout = timeout;
        }
        if let Some(attempts) = parse(&get, env::MAX_SEND_ATTEMPTS)? {
            config.max_attempts = attempts;
        }
        if let Some(capacity) = parse(&get, env::PEAK_CONNECTIONS)? {
            config.pool_capacity = capacity;
        }
        if let Some(len) = parse(&get, env::MAX_MESSAGE_LEN)? {
            config.max_message_len = len;
        }
        if let Some(interval) = parse_secs(&get, env::HEALTHCHECK_INTERVAL)? {
            config.health_check_interval = interval;
        }
        if let Some(interval) = parse_secs(&get, env::HEALTHCHECK_LOG_INTERVAL)? {
            config.health_check_log_interval = interval;
        }
        if let Some(ms) = parse::<u64>(&get, env::RETRY_BACKOFF_MS)? {
            config.retry_backoff = Duration::from_millis(ms);
        }
        config.tls = tls_from_lookup(&get)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that can never produce a working transport.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::invalid(env::HOST, "host must not be empty"));
        }
        ensure_positive!(self.port, env::PORT)?;
        self.validate_tuning()?;
        if let Some(tls) = &self.tls {
            if tls.certfile.is_some() != tls.keyfile.is_some() {
                return Err(ConfigError::invalid(
                    env::TLS_CERTFILE,
                    "client certificate and key must be configured together",
                ));
            }
            if tls.verify == TlsVerify::OptionalWithCa && tls.ca_certs.is_none() {
                return Err(ConfigError::invalid(
                    env::TLS_CA_CERTS,
                    "optional verification requires a CA bundle",
                ));
            }
        }
        Ok(())
    }

    /// Check the timing and sizing fields, leaving the endpoint and TLS alone.
    pub fn validate_tuning(&self) -> Result<(), ConfigError> {
        ensure_positive!(self.socket_timeout, env::SOCKET_TIMEOUT)?;
        ensure_positive!(self.max_attempts, env::MAX_SEND_ATTEMPTS)?;
        ensure_positive!(self.max_message_len, env::MAX_MESSAGE_LEN)?;
        ensure_positive!(self.health_check_interval, env::HEALTHCHECK_INTERVAL)?;
        ensure_positive!(self.health_check_log_interval, env::HEALTHCHECK_LOG_INTERVAL)?;
        Ok(())
    }

    /// `host:port` string used in diagnostics.
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Number of failed probes between "still down" diagnostics.
    pub fn health_check_log_every(&self) -> u64 {
        let interval = self.health_check_interval.as_millis().max(1);
        let every = self.health_check_log_interval.as_millis() / interval;
        u64::try_from(every).unwrap_or(u64::MAX).max(1)
    }
}

fn parse<T>(get: &impl Fn(&str) -> Option<String>, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|err| ConfigError::invalid(key, format!("{raw:?}: {err}")))
        })
        .transpose()
}

fn parse_secs(
    get: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<Duration>, ConfigError> {
    parse::<f64>(get, key)?
        .map(|secs| {
            Duration::try_from_secs_f64(secs)
                .map_err(|err| ConfigError::invalid(key, format!("{secs}: {err}")))
        })
        .transpose()
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn tls_from_lookup(
    get: &impl Fn(&str) -> Option<String>,
) -> Result<Option<TlsConfig>, ConfigError> {
    let enabled = match get(env::TLS_ENABLE) {
        None => false,
        Some(raw) => parse_flag(&raw)
            .ok_or_else(|| ConfigError::invalid(env::TLS_ENABLE, format!("{raw:?} is not a flag")))?,
    };
    if !enabled {
        return Ok(None);
    }
    let ca_certs = get(env::TLS_CA_CERTS).map(PathBuf::from);
    // A bare "false" picks the loosest mode the CA configuration allows.
    let relaxed = if ca_certs.is_some() {
        TlsVerify::OptionalWithCa
    } else {
        TlsVerify::None
    };
    let verify = match get(env::TLS_VERIFY) {
        None => TlsVerify::Required,
        Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "required" => TlsVerify::Required,
            "optional" => TlsVerify::OptionalWithCa,
            "none" => TlsVerify::None,
            other => match parse_flag(other) {
                Some(true) => TlsVerify::Required,
                Some(false) => relaxed,
                None => {
                    return Err(ConfigError::invalid(
                        env::TLS_VERIFY,
                        format!("{raw:?} is not a verification mode"),
                    ));
                }
            },
        },
    };
    Ok(Some(TlsConfig {
        verify,
        ca_certs,
        certfile: get(env::TLS_CERTFILE).map(PathBuf::from),
        keyfile: get(env::TLS_KEYFILE).map(PathBuf::from),
        domain: get(env::TLS_DOMAIN),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[rstest]
    fn requires_host_and_port() {
        let err = TransportConfig::from_lookup(lookup(&[(env::PORT, "6543")]))
            .expect_err("host is required");
        assert!(matches!(err, ConfigError::MissingSetting(env::HOST)));

        let err = TransportConfig::from_lookup(lookup(&[(env::HOST, "collector")]))
            .expect_err("port is required");
        assert!(matches!(err, ConfigError::MissingSetting(env::PORT)));
    }

    #[rstest]
    fn empty_values_count_as_unset() {
        let err = TransportConfig::from_lookup(lookup(&[(env::HOST, "  "), (env::PORT, "1")]))
            .expect_err("blank host is unset");
        assert!(matches!(err, ConfigError::MissingSetting(env::HOST)));
    }

    #[rstest]
    fn applies_defaults() {
        let config =
            TransportConfig::from_lookup(lookup(&[(env::HOST, "collector"), (env::PORT, "6543")]))
                .expect("valid config");
        assert_eq!(config.endpoint(), "collector:6543");
        assert_eq!(config.socket_timeout, DEFAULT_SOCKET_TIMEOUT);
        assert_eq!(config.max_attempts, DEFAULT_MAX_SEND_ATTEMPTS);
        assert_eq!(config.pool_capacity, DEFAULT_PEAK_CONNECTIONS);
        assert_eq!(config.max_message_len, DEFAULT_MAX_MESSAGE_LEN);
        assert!(config.tls.is_none());
        assert_eq!(config.health_check_log_every(), 20);
    }

    #[rstest]
    fn reads_tuning_overrides() {
        let config = TransportConfig::from_lookup(lookup(&[
            (env::HOST, "collector"),
            (env::PORT, "6543"),
            (env::SOCKET_TIMEOUT, "0.5"),
            (env::MAX_SEND_ATTEMPTS, "1"),
            (env::PEAK_CONNECTIONS, "0"),
            (env::HEALTHCHECK_INTERVAL, "2"),
            (env::HEALTHCHECK_LOG_INTERVAL, "10"),
            (env::RETRY_BACKOFF_MS, "5"),
        ]))
        .expect("valid config");
        assert_eq!(config.socket_timeout, Duration::from_millis(500));
        assert_eq!(config.max_attempts, 1);
        assert_eq!(config.pool_capacity, 0);
        assert_eq!(config.retry_backoff, Duration::from_millis(5));
        assert_eq!(config.health_check_log_every(), 5);
    }

    #[rstest]
    #[case(env::PORT, "0")]
    #[case(env::PORT, "http")]
    #[case(env::MAX_SEND_ATTEMPTS, "0")]
    #[case(env::SOCKET_TIMEOUT, "-1")]
    #[case(env::HEALTHCHECK_INTERVAL, "0")]
    #[case(env::MAX_MESSAGE_LEN, "0")]
    fn rejects_unusable_values(#[case] key: &'static str, #[case] value: &str) {
        let mut pairs = vec![(env::HOST, "collector"), (env::PORT, "6543")];
        pairs.retain(|(k, _)| *k != key);
        pairs.push((key, value));
        let err = TransportConfig::from_lookup(lookup(&pairs)).expect_err("value must be rejected");
        assert!(
            matches!(err, ConfigError::InvalidSetting { name, .. } if name == key),
            "unexpected error {err:?}"
        );
    }

    #[rstest]
    #[case(None, None, TlsVerify::Required)]
    #[case(Some("false"), None, TlsVerify::None)]
    #[case(Some("false"), Some("/etc/ca.pem"), TlsVerify::OptionalWithCa)]
    #[case(Some("none"), Some("/etc/ca.pem"), TlsVerify::None)]
    #[case(Some("TRUE"), Some("/etc/ca.pem"), TlsVerify::Required)]
    fn derives_tls_verification(
        #[case] verify: Option<&str>,
        #[case] ca: Option<&str>,
        #[case] expected: TlsVerify,
    ) {
        let mut pairs = vec![
            (env::HOST, "collector"),
            (env::PORT, "6543"),
            (env::TLS_ENABLE, "1"),
        ];
        if let Some(verify) = verify {
            pairs.push((env::TLS_VERIFY, verify));
        }
        if let Some(ca) = ca {
            pairs.push((env::TLS_CA_CERTS, ca));
        }
        let config = TransportConfig::from_lookup(lookup(&pairs)).expect("valid config");
        let tls = config.tls.expect("tls enabled");
        assert_eq!(tls.verify, expected);
    }

    #[rstest]
    fn rejects_half_configured_identity() {
        let mut config = TransportConfig::new("collector", 6543);
        config.tls = Some(TlsConfig {
            certfile: Some("client.pem".into()),
            ..TlsConfig::default()
        });
        let err = config.validate().expect_err("key is missing");
        assert!(matches!(err, ConfigError::InvalidSetting { name, .. } if name == env::TLS_CERTFILE));
    }

    #[rstest]
    #[case::socket_timeout(env::SOCKET_TIMEOUT)]
    #[case::max_attempts(env::MAX_SEND_ATTEMPTS)]
    #[case::max_message_len(env::MAX_MESSAGE_LEN)]
    #[case::health_interval(env::HEALTHCHECK_INTERVAL)]
    #[case::health_log_interval(env::HEALTHCHECK_LOG_INTERVAL)]
    fn zero_tuning_fields_are_rejected(#[case] field: &'static str) {
        let mut config = TransportConfig::new("collector", 6543);
        match field {
            env::SOCKET_TIMEOUT => config.socket_timeout = Duration::ZERO,
            env::MAX_SEND_ATTEMPTS => config.max_attempts = 0,
            env::MAX_MESSAGE_LEN => config.max_message_len = 0,
            env::HEALTHCHECK_INTERVAL => config.health_check_interval = Duration::ZERO,
            _ => config.health_check_log_interval = Duration::ZERO,
        }
        let err = config.validate_tuning().expect_err("zero is rejected");
        assert!(matches!(err, ConfigError::InvalidSetting { name, .. } if name == field));
        assert!(config.validate().is_err());
    }

    #[rstest]
    fn port_zero_is_rejected() {
        let config = TransportConfig::new("collector", 0);
        let err = config.validate().expect_err("port zero");
        assert!(matches!(err, ConfigError::InvalidSetting { name, .. } if name == env::PORT));
    }

    #[rstest]
    fn log_cadence_never_drops_to_zero() {
        let mut config = TransportConfig::new("collector", 6543);
        config.health_check_interval = Duration::from_secs(10);
        config.health_check_log_interval = Duration::from_secs(1);
        assert_eq!(config.health_check_log_every(), 1);
    }
}
