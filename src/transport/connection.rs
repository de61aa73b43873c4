//! A single pooled stream with a health flag.

use std::io::{self, Write};

/// Wraps one live stream and remembers whether it is still usable.
///
/// The flag is cleared before each write and restored only once the write and
/// flush succeed, so a failed send leaves the connection marked bad without a
/// further system call. Closing drops the stream exactly once.
pub struct Connection<S> {
    stream: Option<S>,
    good: bool,
}

impl<S: Write> Connection<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream: Some(stream),
            good: true,
        }
    }

    /// Write the whole buffer and flush it.
    pub fn send_all(&mut self, buf: &[u8]) -> io::Result<()> {
        let Some(stream) = self.stream.as_mut() else {
            return Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "connection already closed",
            ));
        };
        self.good = false;
        stream.write_all(buf)?;
        stream.flush()?;
        self.good = true;
        Ok(())
    }

    pub fn is_good(&self) -> bool {
        self.good && self.stream.is_some()
    }

    /// Mark the connection unusable and close it.
    pub fn reject(&mut self) {
        self.good = false;
        self.close();
    }

    /// Close the stream. Safe to call repeatedly.
    pub fn close(&mut self) {
        self.good = false;
        drop(self.stream.take());
    }
}

impl<S> std::fmt::Debug for Connection<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("good", &self.good)
            .field("open", &self.stream.is_some())
            .finish()
    }
}
