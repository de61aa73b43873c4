//! Bounded cache of idle connections.

use std::{collections::VecDeque, sync::Arc, time::Duration};

use parking_lot::Mutex;

use crate::error::TransportError;

use super::{Connection, SocketFactory, TransportStats};

/// Holds idle connections between sends.
///
/// Only connections that are not checked out live here. Reuse is LIFO so the
/// most recently proven connection goes out first; once the pool is full the
/// oldest idle connection is evicted and closed. The lock covers pushes and
/// pops only, never socket creation or closing.
pub struct ConnectionPool<F: SocketFactory> {
    factory: Arc<F>,
    idle: Mutex<VecDeque<Connection<F::Stream>>>,
    capacity: usize,
    socket_timeout: Duration,
    stats: Arc<TransportStats>,
}

impl<F: SocketFactory> ConnectionPool<F> {
    pub fn new(
        factory: Arc<F>,
        capacity: usize,
        socket_timeout: Duration,
        stats: Arc<TransportStats>,
    ) -> Self {
        Self {
            factory,
            idle: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            socket_timeout,
            stats,
        }
    }

    /// Hand out a connection believed to be good, creating one if needed.
    pub fn take(&self) -> Result<Connection<F::Stream>, TransportError> {
        while let Some(mut conn) = self.pop_idle() {
            if conn.is_good() {
                return Ok(conn);
            }
            conn.close();
        }
        self.create()
    }

    /// Open a fresh connection without consulting the idle set.
    pub fn create(&self) -> Result<Connection<F::Stream>, TransportError> {
        let stream = self.factory.create_socket(self.socket_timeout)?;
        self.stats.record_socket_created();
        Ok(Connection::new(stream))
    }

    /// Return a connection after use; bad connections are closed instead.
    pub fn release(&self, mut conn: Connection<F::Stream>) {
        if !conn.is_good() || self.capacity == 0 {
            conn.close();
            return;
        }
        let evicted = {
            let mut idle = self.idle.lock();
            idle.push_back(conn);
            if idle.len() > self.capacity {
                idle.pop_front()
            } else {
                None
            }
        };
        if let Some(mut oldest) = evicted {
            oldest.close();
        }
    }

    /// Close every idle connection. Checked-out connections are unaffected.
    pub fn close_all(&self) {
        let drained: Vec<_> = self.idle.lock().drain(..).collect();
        for mut conn in drained {
            conn.close();
        }
    }

    pub fn idle_len(&self) -> usize {
        self.idle.lock().len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn pop_idle(&self) -> Option<Connection<F::Stream>> {
        self.idle.lock().pop_back()
    }
}

impl<F: SocketFactory> std::fmt::Debug for ConnectionPool<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("capacity", &self.capacity)
            .field("idle", &self.idle_len())
            .finish()
    }
}
