//! Shared helpers for integration tests.

pub mod collector;
pub mod shared_buffer;

#[allow(unused_imports)]
pub use collector::{Collector, wait_for};
#[allow(unused_imports)]
pub use shared_buffer::SharedBuf;
