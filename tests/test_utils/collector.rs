//! Loopback stand-in for the remote event collector.
//!
//! Accepts any number of connections and records the bytes received on each
//! one separately, so tests can assert on per-connection ordering.

use std::{
    io::Read,
    net::{Shutdown, SocketAddr, TcpListener, TcpStream},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use parking_lot::Mutex;

#[derive(Default)]
struct State {
    received: Vec<Vec<u8>>,
    streams: Vec<TcpStream>,
}

pub struct Collector {
    addr: SocketAddr,
    state: Arc<Mutex<State>>,
    stopping: Arc<AtomicBool>,
    acceptor: Option<JoinHandle<()>>,
}

#[allow(dead_code)]
impl Collector {
    /// Listen on an ephemeral loopback port.
    pub fn start() -> Self {
        Self::bind("127.0.0.1:0".parse().expect("valid address")).expect("bind collector")
    }

    /// Listen on `addr`, typically to come back up on a port used earlier.
    pub fn bind(addr: SocketAddr) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr)?;
        let addr = listener.local_addr()?;
        let state = Arc::new(Mutex::new(State::default()));
        let stopping = Arc::new(AtomicBool::new(false));
        let acceptor = {
            let state = Arc::clone(&state);
            let stopping = Arc::clone(&stopping);
            thread::spawn(move || accept_loop(&listener, &state, &stopping))
        };
        Ok(Self {
            addr,
            state,
            stopping,
            acceptor: Some(acceptor),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Connections accepted so far.
    pub fn accepted(&self) -> usize {
        self.state.lock().received.len()
    }

    /// Newline-separated messages received, grouped by connection.
    pub fn lines_per_connection(&self) -> Vec<Vec<String>> {
        self.state
            .lock()
            .received
            .iter()
            .map(|bytes| {
                String::from_utf8_lossy(bytes)
                    .lines()
                    .map(str::to_owned)
                    .collect()
            })
            .collect()
    }

    pub fn all_lines(&self) -> Vec<String> {
        self.lines_per_connection().into_iter().flatten().collect()
    }

    /// Wait until at least `count` complete lines have arrived.
    pub fn wait_for_lines(&self, count: usize, timeout: Duration) -> bool {
        wait_for(timeout, || {
            self.state
                .lock()
                .received
                .iter()
                .map(|bytes| bytes.iter().filter(|b| **b == b'\n').count())
                .sum::<usize>()
                >= count
        })
    }

    /// Stop listening and reset every accepted connection.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        let Some(acceptor) = self.acceptor.take() else {
            return;
        };
        self.stopping.store(true, Ordering::SeqCst);
        // Wake the blocking accept.
        let _ = TcpStream::connect_timeout(&self.addr, Duration::from_secs(1));
        let _ = acceptor.join();
        for stream in self.state.lock().streams.drain(..) {
            let _ = stream.shutdown(Shutdown::Both);
        }
    }
}

impl Drop for Collector {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn accept_loop(listener: &TcpListener, state: &Arc<Mutex<State>>, stopping: &AtomicBool) {
    for stream in listener.incoming() {
        if stopping.load(Ordering::SeqCst) {
            return;
        }
        let Ok(stream) = stream else { continue };
        let Ok(reader) = stream.try_clone() else { continue };
        let index = {
            let mut state = state.lock();
            state.received.push(Vec::new());
            state.streams.push(stream);
            state.received.len() - 1
        };
        let state = Arc::clone(state);
        thread::spawn(move || read_into(reader, &state, index));
    }
}

fn read_into(mut stream: TcpStream, state: &Mutex<State>, index: usize) {
    let mut buf = [0u8; 4096];
    loop {
        match stream.read(&mut buf) {
            Ok(0) | Err(_) => return,
            Ok(n) => state.lock().received[index].extend_from_slice(&buf[..n]),
        }
    }
}

/// Poll `cond` until it holds or `timeout` elapses.
pub fn wait_for(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    cond()
}
