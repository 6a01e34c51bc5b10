//! Pool of random words fed by the extractor.
//!
//! The pool is a stack: the newest word is read first and a new batch
//! replaces whatever is left of the old one. Keeping only the freshest
//! output is intended; leftover words are discarded, not queued.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Words from one extracted block, consumed from the top.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RandomPool {
    words: Vec<u32>,
    /// Number of unread words; the next read is `words[remaining - 1]`.
    remaining: usize,
}

impl RandomPool {
    /// Creates a pool over `words`, with the cursor at the last word.
    pub fn new(words: Vec<u32>) -> Self {
        let remaining = words.len();
        Self { words, remaining }
    }

    /// Interprets bytes as little-endian words. A trailing partial word is
    /// dropped.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let words = bytes
            .chunks_exact(4)
            .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();
        Self::new(words)
    }

    /// Takes the top word, `None` once the pool is exhausted.
    pub fn pop(&mut self) -> Option<u32> {
        self.remaining = self.remaining.checked_sub(1)?;
        Some(self.words[self.remaining])
    }

    /// Index of the next word to read, `None` when empty.
    pub fn cursor(&self) -> Option<usize> {
        self.remaining.checked_sub(1)
    }

    /// Unread words.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.remaining
    }

    /// Total words in the batch.
    #[inline]
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// Returns true if no unread word is left.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.remaining == 0
    }
}

/// Pool shared between the producer and the stream.
#[derive(Debug, Default)]
pub(crate) struct SharedPool {
    pool: Mutex<RandomPool>,
    stopped: AtomicBool,
}

impl SharedPool {
    fn lock(&self) -> MutexGuard<'_, RandomPool> {
        self.pool.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn pop(&self) -> Option<u32> {
        self.lock().pop()
    }

    pub(crate) fn replace(&self, pool: RandomPool) {
        *self.lock() = pool;
    }

    pub(crate) fn remaining(&self) -> usize {
        self.lock().remaining()
    }

    pub(crate) fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
    }

    pub(crate) fn resume(&self) {
        self.stopped.store(false, Ordering::Release);
    }

    pub(crate) fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }
}

/// Producer side of a [`RandomStream`](super::RandomStream).
///
/// Each call to [`replace`](Self::replace) swaps the whole pool in one
/// step, so readers never see a half-written batch.
#[derive(Debug, Clone)]
pub struct PoolFeeder {
    shared: Arc<SharedPool>,
}

impl PoolFeeder {
    pub(crate) fn new(shared: Arc<SharedPool>) -> Self {
        Self { shared }
    }

    /// Replaces the pool with words read from `bytes`.
    pub fn replace(&self, bytes: &[u8]) -> usize {
        self.replace_pool(RandomPool::from_bytes(bytes))
    }

    /// Replaces the pool. Returns the number of words now available.
    pub fn replace_pool(&self, pool: RandomPool) -> usize {
        let words = pool.len();
        let discarded = self.shared.remaining();
        self.shared.replace(pool);
        tracing::trace!(words, discarded, "Random pool replaced");
        words
    }

    /// Stops the stream; pending and future reads fail with `Stopped`.
    pub fn stop(&self) {
        self.shared.stop();
    }

    /// Clears a stop. Only the producer side can restart its consumers.
    pub fn resume(&self) {
        self.shared.resume();
    }

    /// Returns true if the stream has been stopped.
    pub fn is_stopped(&self) -> bool {
        self.shared.is_stopped()
    }
}
