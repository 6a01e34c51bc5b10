//! Random number interface over extracted bytes.
//!
//! The extractor's output lands in a pool of 32-bit words through a
//! [`PoolFeeder`]; a [`RandomStream`] turns those words into integers,
//! floats and weighted choices.

mod pool;
mod random;

pub use pool::{PoolFeeder, RandomPool};
pub use random::{Preference, RandomStream, StreamError, DEFAULT_POLL_INTERVAL};
