//! Test-only helpers shared across crate unit tests.

pub mod shared_buffer;

pub use shared_buffer::{BrokenWriter, SharedBuf};
