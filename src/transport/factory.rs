//! Socket creation for the network transport.

use std::{
    fs,
    io::{self, Write},
    net::{SocketAddr, TcpStream, ToSocketAddrs},
    path::Path,
    time::Duration,
};

use native_tls::{Certificate, Identity, TlsConnector, TlsStream};

use crate::{
    config::{TlsConfig, TlsVerify, TransportConfig},
    error::{ConfigError, TransportError},
};

/// Creates ready-to-use outbound streams.
///
/// Implementations make exactly one attempt per call and never retry; the
/// caller owns the retry policy.
pub trait SocketFactory: Send + Sync + 'static {
    /// Stream type handed to [`Connection`](super::Connection).
    type Stream: Write + Send + 'static;

    /// Open a new stream, failing if it is not usable within `timeout`.
    fn create_socket(&self, timeout: Duration) -> Result<Self::Stream, TransportError>;

    /// Human-readable description of the target, used in diagnostics.
    fn describe(&self) -> String;
}

/// Live stream produced by [`TcpSocketFactory`].
pub enum CollectorStream {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl Write for CollectorStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Plain(stream) => stream.write(buf),
            Self::Tls(stream) => stream.write(buf),
        }
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        match self {
            Self::Plain(stream) => stream.write_all(buf),
            Self::Tls(stream) => stream.write_all(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Plain(stream) => stream.flush(),
            Self::Tls(stream) => stream.flush(),
        }
    }
}

impl Drop for CollectorStream {
    fn drop(&mut self) {
        // Best-effort close notification; the socket closes on drop regardless.
        if let Self::Tls(stream) = self {
            let _ = stream.shutdown();
        }
    }
}

/// Opens TCP connections, optionally wrapped in TLS, to one collector.
#[derive(Clone)]
pub struct TcpSocketFactory {
    host: String,
    port: u16,
    tls: Option<TlsSettings>,
}

#[derive(Clone)]
struct TlsSettings {
    domain: String,
    connector: TlsConnector,
}

impl TcpSocketFactory {
    /// Plain TCP factory for `host:port`.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            tls: None,
        }
    }

    /// Build a factory from validated configuration.
    ///
    /// TLS material is loaded here so a bad certificate path fails
    /// construction instead of every send.
    pub fn from_config(config: &TransportConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let mut factory = Self::new(config.host.clone(), config.port);
        if let Some(tls) = &config.tls {
            let domain = tls
                .domain
                .clone()
                .filter(|d| !d.trim().is_empty())
                .unwrap_or_else(|| config.host.clone());
            factory.tls = Some(TlsSettings {
                domain,
                connector: build_connector(tls)?,
            });
        }
        Ok(factory)
    }

    pub fn is_tls(&self) -> bool {
        self.tls.is_some()
    }

    fn socket_addrs(&self) -> io::Result<Vec<SocketAddr>> {
        (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map(|iter| iter.collect())
    }

    fn connect_tcp(&self, timeout: Duration) -> io::Result<TcpStream> {
        let mut last_err = None;
        for addr in self.socket_addrs()? {
            match TcpStream::connect_timeout(&addr, timeout) {
                Ok(stream) => {
                    stream.set_nodelay(true)?;
                    stream.set_write_timeout(Some(timeout))?;
                    return Ok(stream);
                }
                Err(err) => last_err = Some(err),
            }
        }
        Err(last_err.unwrap_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} resolved to no addresses", self.host),
            )
        }))
    }

    fn connect(&self, timeout: Duration) -> io::Result<CollectorStream> {
        let stream = self.connect_tcp(timeout)?;
        let Some(tls) = &self.tls else {
            return Ok(CollectorStream::Plain(stream));
        };
        stream.set_read_timeout(Some(timeout))?;
        let stream = tls
            .connector
            .connect(&tls.domain, stream)
            .map_err(io::Error::other)?;
        stream.get_ref().set_read_timeout(None)?;
        Ok(CollectorStream::Tls(Box::new(stream)))
    }
}

impl SocketFactory for TcpSocketFactory {
    type Stream = CollectorStream;

    fn create_socket(&self, timeout: Duration) -> Result<CollectorStream, TransportError> {
        self.connect(timeout)
            .map_err(|source| TransportError::Connect {
                endpoint: format!("{}:{}", self.host, self.port),
                source,
            })
    }

    fn describe(&self) -> String {
        format!("TcpSocketFactory({}:{})", self.host, self.port)
    }
}

impl std::fmt::Debug for TcpSocketFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpSocketFactory")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("tls", &self.tls.as_ref().map(|t| t.domain.as_str()))
            .finish()
    }
}

fn read_file(path: &Path) -> Result<Vec<u8>, ConfigError> {
    fs::read(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })
}

fn build_connector(tls: &TlsConfig) -> Result<TlsConnector, ConfigError> {
    let mut builder = TlsConnector::builder();
    if let Some(ca) = &tls.ca_certs {
        builder.add_root_certificate(Certificate::from_pem(&read_file(ca)?)?);
    }
    match tls.verify {
        TlsVerify::Required => {}
        TlsVerify::OptionalWithCa => {
            builder.disable_built_in_roots(true);
            builder.danger_accept_invalid_hostnames(true);
        }
        TlsVerify::None => {
            builder.danger_accept_invalid_certs(true);
            builder.danger_accept_invalid_hostnames(true);
        }
    }
    if let (Some(cert), Some(key)) = (&tls.certfile, &tls.keyfile) {
        let identity = Identity::from_pkcs8(&read_file(cert)?, &read_file(key)?)?;
        builder.identity(identity);
    }
    Ok(builder.build()?)
}
