//! Compatibility bridge for the Rust `log` crate.
//!
//! [`EventLogBridge`] implements `log::Log` and turns each record into a
//! `log` event sent through an [`EventLogger`]. Install it globally with
//! [`install_log_bridge`]. Records emitted by this crate itself are dropped so
//! transport diagnostics cannot loop back into the transport.

use std::sync::{Arc, OnceLock};

use log::{Metadata, Record};

use crate::{
    event::{CodeLocation, Event},
    logger::EventLogger,
};

/// Event name used for bridged records.
pub const LOG_EVENT_NAME: &str = "log";

const OWN_TARGET: &str = env!("CARGO_CRATE_NAME");

/// Adapter implementing the Rust `log::Log` trait.
pub struct EventLogBridge {
    logger: Arc<EventLogger>,
}

impl EventLogBridge {
    pub fn new(logger: Arc<EventLogger>) -> Self {
        Self { logger }
    }
}

fn is_own_target(target: &str) -> bool {
    target == OWN_TARGET
        || target
            .strip_prefix(OWN_TARGET)
            .is_some_and(|rest| rest.starts_with("::"))
}

fn is_enabled_by_global_max(level: log::Level) -> bool {
    log::max_level() >= level.to_level_filter()
}

/// Convert a `log` record into an event.
pub fn record_to_event(record: &Record<'_>) -> Event {
    let target = record.target().replace("::", ".");
    let mut event = Event::new(LOG_EVENT_NAME, format!("logger:{target}"))
        .with_level(record.level().into())
        .with_message(record.args().to_string());
    if let (Some(file), Some(line)) = (record.file(), record.line()) {
        event = event.with_code(CodeLocation {
            file: file.to_owned(),
            line,
            function: record.module_path().map(str::to_owned),
        });
    }
    event
}

impl log::Log for EventLogBridge {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        is_enabled_by_global_max(metadata.level()) && !is_own_target(metadata.target())
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        // Nowhere left to report a lost event; the logger already tried its
        // fallback.
        let _ = self.logger.log_event(&record_to_event(record));
    }

    fn flush(&self) {}
}

static BRIDGE: OnceLock<EventLogBridge> = OnceLock::new();
static INSTALL_RESULT: OnceLock<bool> = OnceLock::new();

/// Install the bridge as the global `log` logger.
///
/// Returns `true` on success and `false` when another global logger is
/// already set. Subsequent calls return the cached outcome and ignore their
/// argument.
pub fn install_log_bridge(logger: Arc<EventLogger>) -> bool {
    *INSTALL_RESULT.get_or_init(|| {
        let bridge = BRIDGE.get_or_init(|| EventLogBridge::new(logger));
        if log::set_logger(bridge).is_err() {
            return false;
        }
        log::set_max_level(log::LevelFilter::Trace);
        true
    })
}
