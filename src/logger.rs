//! Event logger: routes events to the collector or the console.

use std::sync::Arc;

use log::{debug, warn};
use once_cell::sync::OnceCell;

use crate::{
    config::{TransportConfig, env},
    console::ConsoleSink,
    error::{ConfigError, LogError},
    event::{Event, FieldValue},
    rate_limited_warner::RateLimitedWarner,
    serialise::WireFormat,
    tracking::TrackedValue,
    transport::{NetTransport, Transport},
};

/// Transformation applied to every event before it is written.
pub type EventFilter = Box<dyn Fn(Event) -> Event + Send + Sync>;

static DEFAULT_LOGGER: OnceCell<Arc<EventLogger>> = OnceCell::new();

/// Primary destination of an [`EventLogger`].
pub enum Sink {
    /// Encode and deliver through a transport.
    Network {
        transport: Box<dyn Transport>,
        format: WireFormat,
        max_message_len: usize,
    },
    /// Write the human-readable rendering.
    Console(ConsoleSink),
}

impl std::fmt::Debug for Sink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Network { format, .. } => {
                f.debug_struct("Network").field("format", format).finish()
            }
            Self::Console(_) => f.write_str("Console"),
        }
    }
}

/// Logs events to a primary sink, an optional replica, and a console fallback.
///
/// Every event passed to [`log_event`](Self::log_event) is written regardless
/// of its level; levels are for downstream filtering. When the network sink
/// cannot deliver, the event is rendered to the fallback console instead and
/// a rate-limited warning is emitted through `log`.
pub struct EventLogger {
    sink: Sink,
    replica: Option<ConsoleSink>,
    fallback: ConsoleSink,
    filters: Vec<EventFilter>,
    warner: RateLimitedWarner,
}

impl EventLogger {
    pub fn new(sink: Sink) -> Self {
        Self {
            sink,
            replica: None,
            fallback: ConsoleSink::stderr(),
            filters: Vec::new(),
            warner: RateLimitedWarner::default(),
        }
    }

    pub fn network(
        transport: impl Transport + 'static,
        format: WireFormat,
        max_message_len: usize,
    ) -> Self {
        Self::new(Sink::Network {
            transport: Box::new(transport),
            format,
            max_message_len,
        })
    }

    pub fn console(console: ConsoleSink) -> Self {
        Self::new(Sink::Console(console))
    }

    /// Build a logger from `EVENTLOG_*` environment variables.
    ///
    /// A network logger is returned when both host and port are set;
    /// otherwise events go to standard output.
    pub fn from_env() -> Result<Self, ConfigError> {
        let is_set = |key: &str| std::env::var(key).is_ok_and(|v| !v.trim().is_empty());
        if !(is_set(env::HOST) && is_set(env::PORT)) {
            return Ok(Self::console(ConsoleSink::stdout()));
        }
        let config = TransportConfig::from_env()?;
        let format = WireFormat::from_env()?;
        let transport = NetTransport::from_config(&config)?;
        Ok(Self::network(transport, format, config.max_message_len))
    }

    /// Send a console copy of every event to `replica`.
    pub fn with_replica(mut self, replica: ConsoleSink) -> Self {
        self.replica = Some(replica);
        self
    }

    /// Replace the stderr fallback used when the network sink fails.
    pub fn with_fallback(mut self, fallback: ConsoleSink) -> Self {
        self.fallback = fallback;
        self
    }

    /// Append a filter; filters run in the order they were added.
    pub fn with_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(Event) -> Event + Send + Sync + 'static,
    {
        self.filters.push(Box::new(filter));
        self
    }

    pub fn with_warner(mut self, warner: RateLimitedWarner) -> Self {
        self.warner = warner;
        self
    }

    pub fn sink(&self) -> &Sink {
        &self.sink
    }

    /// Write one event.
    ///
    /// Returns `Err` only when the event was lost: it could not be encoded,
    /// or both the primary sink and the fallback failed.
    pub fn log_event(&self, event: &Event) -> Result<(), LogError> {
        let filtered = self
            .filters
            .iter()
            .fold(event.clone(), |event, filter| filter(event));

        let result = match &self.sink {
            Sink::Console(console) => console.write_event(&filtered).map_err(LogError::from),
            Sink::Network {
                transport,
                format,
                max_message_len,
            } => self.deliver(transport.as_ref(), *format, *max_message_len, &filtered),
        };

        if let Some(replica) = &self.replica
            && let Err(err) = replica.write_event(event)
        {
            debug!("event replica write failed: {err}");
        }
        result
    }

    /// Create a counter or gauge that logs every change through this logger.
    pub fn tracked_value(
        self: &Arc<Self>,
        name: impl Into<String>,
        target: impl Into<String>,
        initial: f64,
        fields: impl IntoIterator<Item = (String, FieldValue)>,
    ) -> TrackedValue {
        TrackedValue::new(Arc::clone(self), name, target, initial, fields)
    }

    fn deliver(
        &self,
        transport: &dyn Transport,
        format: WireFormat,
        max_message_len: usize,
        event: &Event,
    ) -> Result<(), LogError> {
        let frame = format.encode(event, max_message_len)?;

        if !transport.check_status() {
            self.warner.record();
            self.warner.warn_if_due(|count| {
                warn!("event collector is down; {count} events written to console fallback");
            });
            return self.fallback.write_event(event).map_err(LogError::from);
        }

        let Err(primary) = transport.send(&[frame.as_slice()]) else {
            return Ok(());
        };
        self.warner.record();
        self.warner.warn_if_due(|count| {
            warn!(
                "primary event transport failed, using console fallback ({count} events since last report): {primary}"
            );
        });
        self.fallback
            .write_event(event)
            .map_err(|fallback| LogError::Transport { primary, fallback })
    }
}

impl std::fmt::Debug for EventLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLogger")
            .field("sink", &self.sink)
            .field("replica", &self.replica.is_some())
            .field("filters", &self.filters.len())
            .finish()
    }
}

/// Install `logger` as the process-wide default.
///
/// Fails, handing the logger back, when a default is already in place.
pub fn init_default_logger(logger: EventLogger) -> Result<(), Arc<EventLogger>> {
    DEFAULT_LOGGER.set(Arc::new(logger))
}

/// The process-wide default logger, built from the environment on first use.
pub fn default_logger() -> Arc<EventLogger> {
    let logger = DEFAULT_LOGGER.get_or_init(|| {
        let logger = EventLogger::from_env().unwrap_or_else(|err| {
            warn!("eventlog configuration invalid, logging events to stdout: {err}");
            EventLogger::console(ConsoleSink::stdout())
        });
        Arc::new(logger)
    });
    Arc::clone(logger)
}
