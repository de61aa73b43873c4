//! Counters describing transport activity.
//!
//! All counters are lock-free atomics, so a metrics exporter can call
//! [`TransportStats::snapshot`] at any time without stalling senders.

use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

/// Prefix applied to every exported counter name.
pub const TRANSPORT_STATS_PREFIX: &str = "eventlog_tx_";

/// Monotonically increasing named counter.
#[derive(Debug)]
pub struct Counter {
    name: String,
    help: &'static str,
    value: AtomicU64,
}

impl Counter {
    pub fn new(name: impl Into<String>, help: &'static str) -> Self {
        Self {
            name: name.into(),
            help,
            value: AtomicU64::new(0),
        }
    }

    pub fn inc(&self, n: u64) {
        self.value.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn help(&self) -> &'static str {
        self.help
    }
}

/// Send-path statistics for one transport.
#[derive(Debug)]
pub struct TransportStats {
    bytes_sent: Counter,
    msgs_sent: Counter,
    socket_errors: Counter,
    // Stored in microseconds, exported in seconds.
    time_elapsed: Counter,
    sockets_created: Counter,
}

impl Default for TransportStats {
    fn default() -> Self {
        Self::new(TRANSPORT_STATS_PREFIX)
    }
}

impl TransportStats {
    pub fn new(prefix: &str) -> Self {
        Self {
            bytes_sent: Counter::new(format!("{prefix}sent_bytes_total"), "bytes transmitted"),
            msgs_sent: Counter::new(format!("{prefix}sent_msgs_total"), "events transmitted"),
            socket_errors: Counter::new(
                format!("{prefix}socket_errors_total"),
                "socket disconnects",
            ),
            time_elapsed: Counter::new(
                format!("{prefix}time_elapsed_sec"),
                "time spent sending, in seconds",
            ),
            sockets_created: Counter::new(
                format!("{prefix}sockets_created_total"),
                "total number of transport sockets created",
            ),
        }
    }

    pub fn record_bytes_sent(&self, n: u64) {
        self.bytes_sent.inc(n);
    }

    pub fn record_msgs_sent(&self, n: u64) {
        self.msgs_sent.inc(n);
    }

    pub fn record_socket_error(&self) {
        self.socket_errors.inc(1);
    }

    pub fn record_elapsed(&self, elapsed: Duration) {
        self.time_elapsed
            .inc(u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX));
    }

    pub fn record_socket_created(&self) {
        self.sockets_created.inc(1);
    }

    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent.get()
    }

    pub fn msgs_sent(&self) -> u64 {
        self.msgs_sent.get()
    }

    pub fn socket_errors(&self) -> u64 {
        self.socket_errors.get()
    }

    pub fn sockets_created(&self) -> u64 {
        self.sockets_created.get()
    }

    pub fn time_elapsed(&self) -> Duration {
        Duration::from_micros(self.time_elapsed.get())
    }

    /// Every counter as `(name, value)`, in a stable order.
    pub fn snapshot(&self) -> Vec<(String, f64)> {
        self.counters()
            .into_iter()
            .map(|counter| {
                let value = if std::ptr::eq(counter, &self.time_elapsed) {
                    self.time_elapsed().as_secs_f64()
                } else {
                    counter.get() as f64
                };
                (counter.name().to_owned(), value)
            })
            .collect()
    }

    /// The counters themselves, for exporters that want help text.
    pub fn counters(&self) -> [&Counter; 5] {
        [
            &self.bytes_sent,
            &self.msgs_sent,
            &self.socket_errors,
            &self.time_elapsed,
            &self.sockets_created,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::{sync::Arc, thread};

    #[rstest]
    fn snapshot_uses_prefixed_names() {
        let stats = TransportStats::default();
        stats.record_bytes_sent(10);
        stats.record_msgs_sent(2);
        stats.record_elapsed(Duration::from_millis(1500));
        let snapshot = stats.snapshot();
        let names: Vec<_> = snapshot.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "eventlog_tx_sent_bytes_total",
                "eventlog_tx_sent_msgs_total",
                "eventlog_tx_socket_errors_total",
                "eventlog_tx_time_elapsed_sec",
                "eventlog_tx_sockets_created_total",
            ]
        );
        assert_eq!(snapshot[0].1, 10.0);
        assert_eq!(snapshot[1].1, 2.0);
        assert!((snapshot[3].1 - 1.5).abs() < 1e-9);
    }

    #[rstest]
    fn concurrent_increments_are_not_lost() {
        let stats = Arc::new(TransportStats::default());
        let workers: Vec<_> = (0..8)
            .map(|_| {
                let stats = Arc::clone(&stats);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        stats.record_socket_error();
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().expect("worker panicked");
        }
        assert_eq!(stats.socket_errors(), 8000);
    }
}
