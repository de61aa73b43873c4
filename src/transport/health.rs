//! Background detection of collector recovery.
//!
//! When a send exhausts its attempt budget the transport flips to
//! [`TransportStatus::Down`] and starts a probe thread. The thread opens a
//! throwaway connection at a fixed interval and flips the status back to
//! [`TransportStatus::Up`] on the first success, then exits. Between probes it
//! blocks on a stop channel, so [`HealthChecker::stop`] interrupts the sleep
//! immediately.

use std::{
    sync::Arc,
    thread::{self, JoinHandle},
    time::Duration,
};

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use log::{debug, info, warn};
use parking_lot::Mutex;

use super::SocketFactory;

/// Whether the collector is believed to be reachable.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TransportStatus {
    #[default]
    Up,
    Down,
}

/// Probe cadence for the health checker.
#[derive(Clone, Copy, Debug)]
pub struct HealthCheckSettings {
    /// Delay between probes.
    pub interval: Duration,
    /// Emit a diagnostic after every `log_every` failed probes.
    pub log_every: u64,
    /// Timeout applied to each probe connection.
    pub probe_timeout: Duration,
}

struct CheckerThread {
    stop_tx: Sender<()>,
    handle: JoinHandle<()>,
}

/// Owns the transport status flag and the probe thread that restores it.
pub struct HealthChecker<F: SocketFactory> {
    factory: Arc<F>,
    status: Arc<Mutex<TransportStatus>>,
    settings: HealthCheckSettings,
    worker: Mutex<Option<CheckerThread>>,
}

impl<F: SocketFactory> HealthChecker<F> {
    pub fn new(factory: Arc<F>, settings: HealthCheckSettings) -> Self {
        Self {
            factory,
            status: Arc::new(Mutex::new(TransportStatus::Up)),
            settings,
            worker: Mutex::new(None),
        }
    }

    pub fn status(&self) -> TransportStatus {
        *self.status.lock()
    }

    pub fn is_up(&self) -> bool {
        self.status() == TransportStatus::Up
    }

    /// Transition UP to DOWN and start probing.
    ///
    /// Only the caller that performs the transition starts a probe thread;
    /// concurrent callers observing DOWN return `false`.
    pub fn mark_down(&self) -> bool {
        {
            let mut status = self.status.lock();
            if *status == TransportStatus::Down {
                return false;
            }
            *status = TransportStatus::Down;
        }
        self.spawn_checker();
        true
    }

    /// Stop the probe thread, if any, and wait for it to exit.
    ///
    /// The status is left as it is; a stopped checker never restores UP.
    pub fn stop(&self) {
        let Some(worker) = self.worker.lock().take() else {
            return;
        };
        drop(worker.stop_tx);
        if worker.handle.join().is_err() {
            warn!("eventlog health checker thread panicked");
        }
    }

    fn spawn_checker(&self) {
        // A previous checker only leaves its slot after restoring UP, so it
        // has finished or is about to.
        if let Some(previous) = self.worker.lock().take() {
            let _ = previous.handle.join();
        }

        let (stop_tx, stop_rx) = bounded(1);
        let factory = Arc::clone(&self.factory);
        let status = Arc::clone(&self.status);
        let settings = self.settings;
        let spawned = thread::Builder::new()
            .name("eventlog-health".into())
            .spawn(move || probe_until_up(factory.as_ref(), &status, settings, &stop_rx));
        match spawned {
            Ok(handle) => *self.worker.lock() = Some(CheckerThread { stop_tx, handle }),
            Err(err) => {
                warn!("eventlog health checker failed to start: {err}");
                // Let the next exhausted send try again.
                *self.status.lock() = TransportStatus::Up;
            }
        }
    }
}

impl<F: SocketFactory> Drop for HealthChecker<F> {
    fn drop(&mut self) {
        self.stop();
    }
}

fn probe_until_up<F: SocketFactory>(
    factory: &F,
    status: &Mutex<TransportStatus>,
    settings: HealthCheckSettings,
    stop_rx: &Receiver<()>,
) {
    let log_every = settings.log_every.max(1);
    let mut failures: u64 = 0;
    loop {
        match factory.create_socket(settings.probe_timeout) {
            Ok(stream) => {
                drop(stream);
                *status.lock() = TransportStatus::Up;
                info!(
                    "{} reachable again after {failures} failed probes",
                    factory.describe()
                );
                return;
            }
            Err(err) => {
                failures += 1;
                if failures % log_every == 0 {
                    warn!(
                        "Retry: attempt to connect to {} failed: {err}",
                        factory.describe()
                    );
                }
            }
        }
        match stop_rx.recv_timeout(settings.interval) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                debug!("eventlog health checker stopped while collector down");
                return;
            }
        }
    }
}
