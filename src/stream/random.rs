//! Derived distributions over pooled random words.
//!
//! Every draw goes through [`RandomStream::next_u32`], which waits
//! cooperatively for the producer when the pool is empty. Ranges wider
//! than 32 bits switch to a 53-bit float so every mantissa bit is random.

use super::pool::{PoolFeeder, SharedPool};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Default interval between pool checks while waiting.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

const TWO_POW_32: f64 = 4_294_967_296.0;
const TWO_POW_MINUS_53: f64 = 1.0 / 9_007_199_254_740_992.0;

/// Errors returned by stream draws.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StreamError {
    #[error("random stream stopped")]
    Stopped,
    #[error("invalid weights: {0}")]
    InvalidWeights(&'static str),
    #[error("weighted selection found no index for draw {draw} of total {total}")]
    InvariantViolation { draw: f64, total: f64 },
}

/// Which end of the range a linearly weighted draw favors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preference {
    /// Favor small values.
    Low,
    /// Favor large values.
    High,
}

/// Consumer side of the random pool.
///
/// Intended for a single consumer. Pops are serialized by the pool lock,
/// so clones may draw concurrently, but they share one pool and the order
/// in which they receive words is unspecified.
#[derive(Debug, Clone)]
pub struct RandomStream {
    shared: Arc<SharedPool>,
    poll_interval: Duration,
}

impl RandomStream {
    /// Creates an empty stream and the feeder that fills it.
    pub fn new() -> (Self, PoolFeeder) {
        Self::with_poll_interval(DEFAULT_POLL_INTERVAL)
    }

    /// Creates a stream that checks for data every `poll_interval`.
    pub fn with_poll_interval(poll_interval: Duration) -> (Self, PoolFeeder) {
        let shared = Arc::new(SharedPool::default());
        let feeder = PoolFeeder::new(Arc::clone(&shared));
        (
            Self {
                shared,
                poll_interval,
            },
            feeder,
        )
    }

    /// Next pooled word, waiting until one is available.
    ///
    /// Fails with [`StreamError::Stopped`] once the stream is stopped,
    /// including while waiting.
    pub async fn next_u32(&self) -> Result<u32, StreamError> {
        loop {
            if self.shared.is_stopped() {
                return Err(StreamError::Stopped);
            }
            if let Some(word) = self.shared.pop() {
                return Ok(word);
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Pops a word if one is available right now.
    pub fn try_next_u32(&self) -> Result<Option<u32>, StreamError> {
        if self.shared.is_stopped() {
            return Err(StreamError::Stopped);
        }
        Ok(self.shared.pop())
    }

    /// Uniform float in [0, 1) from one word.
    pub async fn float32(&self) -> Result<f64, StreamError> {
        Ok(self.next_u32().await? as f64 / TWO_POW_32)
    }

    /// Uniform float in [0, 1) with a full 53-bit mantissa, from two words.
    pub async fn float64(&self) -> Result<f64, StreamError> {
        let low = self.next_u32().await? as f64;
        let high = (self.next_u32().await? >> 11) as f64;
        Ok((low + high * TWO_POW_32) * TWO_POW_MINUS_53)
    }

    /// 32-bit float scaled into [min(a, b), max(a, b)).
    pub async fn float32_between(&self, a: f64, b: f64) -> Result<f64, StreamError> {
        Ok(scale(self.float32().await?, a, b))
    }

    /// 53-bit float scaled into [min(a, b), max(a, b)).
    pub async fn float64_between(&self, a: f64, b: f64) -> Result<f64, StreamError> {
        Ok(scale(self.float64().await?, a, b))
    }

    /// Uniform integer in [min(a, b), max(a, b)].
    pub async fn integer(&self, a: i64, b: i64) -> Result<i64, StreamError> {
        let (min, max_offset) = span(a, b);
        let u = self.uniform_for(max_offset).await?;
        Ok(map_to_range(min, max_offset, u))
    }

    /// Uniform integer in [0, max] (or [max, 0] for negative `max`).
    pub async fn integer_up_to(&self, max: i64) -> Result<i64, StreamError> {
        self.integer(0, max).await
    }

    /// Integer in [min(a, b), max(a, b)] with a linear (triangular) bias
    /// towards one end. Uses the smaller or larger of two uniform draws.
    pub async fn linearly_weighted_integer(
        &self,
        prefer: Preference,
        a: i64,
        b: i64,
    ) -> Result<i64, StreamError> {
        let (min, max_offset) = span(a, b);
        let r1 = self.uniform_for(max_offset).await?;
        let r2 = self.uniform_for(max_offset).await?;
        let u = match prefer {
            Preference::Low => r1.min(r2),
            Preference::High => r1.max(r2),
        };
        Ok(map_to_range(min, max_offset, u))
    }

    /// Picks an index with probability proportional to its weight.
    ///
    /// Returns the first index whose cumulative weight reaches the draw.
    pub async fn weighted_integer(&self, weights: &[f64]) -> Result<usize, StreamError> {
        if weights.is_empty() {
            return Err(StreamError::InvalidWeights("no weights"));
        }
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(StreamError::InvalidWeights(
                "weights must be finite and non-negative",
            ));
        }
        let total: f64 = weights.iter().sum();
        if total <= 0.0 || !total.is_finite() {
            return Err(StreamError::InvalidWeights("total weight must be positive"));
        }

        let draw = self.float32_between(0.0, total).await?;
        select_weighted(weights, draw).ok_or_else(|| {
            tracing::error!(draw, total, "Weighted selection invariant violated");
            StreamError::InvariantViolation { draw, total }
        })
    }

    /// Stops the stream; pending and future draws fail with `Stopped`.
    pub fn stop(&self) {
        self.shared.stop();
    }

    /// Returns true if the stream has been stopped.
    pub fn is_stopped(&self) -> bool {
        self.shared.is_stopped()
    }

    /// Words left in the current pool.
    pub fn available(&self) -> usize {
        self.shared.remaining()
    }

    async fn uniform_for(&self, max_offset: u64) -> Result<f64, StreamError> {
        if width(max_offset) <= u32::MAX as f64 {
            self.float32().await
        } else {
            self.float64().await
        }
    }
}

/// Lower bound and largest offset of the inclusive range between `a` and `b`.
fn span(a: i64, b: i64) -> (i64, u64) {
    let (min, max) = if a <= b { (a, b) } else { (b, a) };
    (min, (max as i128 - min as i128) as u64)
}

/// Number of integers in a range with the given largest offset.
fn width(max_offset: u64) -> f64 {
    max_offset as f64 + 1.0
}

/// Maps `u` in [0, 1) onto `min + [0, max_offset]`.
///
/// The offset is added in integer arithmetic so large bounds are not
/// rounded through `f64`.
fn map_to_range(min: i64, max_offset: u64, u: f64) -> i64 {
    let offset = ((u * width(max_offset)).floor() as u64).min(max_offset);
    (min as i128 + offset as i128) as i64
}

fn scale(u: f64, a: f64, b: f64) -> f64 {
    let min = a.min(b);
    min + u * (a.max(b) - min)
}

/// First index whose cumulative weight is at least `draw`.
pub(crate) fn select_weighted(weights: &[f64], draw: f64) -> Option<usize> {
    let mut so_far = 0.0;
    for (i, weight) in weights.iter().enumerate() {
        so_far += weight;
        if draw <= so_far {
            return Some(i);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::RandomPool;
    use proptest::prelude::*;

    fn stream_with(words: &[u32]) -> (RandomStream, PoolFeeder) {
        let (stream, feeder) = RandomStream::with_poll_interval(Duration::from_millis(1));
        // Words are read from the top, so push them reversed.
        feeder.replace_pool(RandomPool::new(words.iter().rev().copied().collect()));
        (stream, feeder)
    }

    #[tokio::test]
    async fn test_words_come_out_in_stack_order() {
        let (stream, feeder) = RandomStream::new();
        feeder.replace_pool(RandomPool::new(vec![1, 2, 3]));
        assert_eq!(stream.next_u32().await, Ok(3));
        assert_eq!(stream.next_u32().await, Ok(2));
        assert_eq!(stream.next_u32().await, Ok(1));
        assert_eq!(stream.try_next_u32(), Ok(None));
    }

    #[tokio::test]
    async fn test_empty_pool_waits_for_swap() {
        let (stream, feeder) = stream_with(&[5]);
        assert_eq!(stream.next_u32().await, Ok(5));

        let pending = tokio::time::timeout(Duration::from_millis(30), stream.next_u32()).await;
        assert!(pending.is_err());

        let waiter = tokio::spawn({
            let stream = stream.clone();
            async move { stream.next_u32().await }
        });
        tokio::time::sleep(Duration::from_millis(5)).await;
        feeder.replace_pool(RandomPool::new(vec![42]));
        assert_eq!(waiter.await.unwrap(), Ok(42));
    }

    #[tokio::test]
    async fn test_stop_releases_waiters() {
        let (stream, feeder) = RandomStream::with_poll_interval(Duration::from_millis(1));
        let waiter = tokio::spawn({
            let stream = stream.clone();
            async move { stream.next_u32().await }
        });
        tokio::time::sleep(Duration::from_millis(5)).await;
        feeder.stop();
        assert_eq!(waiter.await.unwrap(), Err(StreamError::Stopped));

        // Stopped wins over available data until resumed.
        feeder.replace_pool(RandomPool::new(vec![9]));
        assert_eq!(stream.float32().await, Err(StreamError::Stopped));
        feeder.resume();
        assert_eq!(stream.next_u32().await, Ok(9));
    }

    #[tokio::test]
    async fn test_float32_from_word() {
        let (stream, _feeder) = stream_with(&[0, 0x8000_0000, u32::MAX]);
        assert_eq!(stream.float32().await, Ok(0.0));
        assert_eq!(stream.float32().await, Ok(0.5));
        let top = stream.float32().await.unwrap();
        assert!(top < 1.0 && top > 0.999_999_999);
    }

    #[tokio::test]
    async fn test_float64_combines_two_words() {
        let (stream, _feeder) = stream_with(&[u32::MAX, u32::MAX, 0, 1 << 11]);
        let max = stream.float64().await.unwrap();
        assert_eq!(max, 1.0 - f64::EPSILON / 2.0);
        // low = 0, high = 1 -> 2^32 / 2^53
        assert_eq!(stream.float64().await, Ok(2f64.powi(-21)));
    }

    #[tokio::test]
    async fn test_float_ranges() {
        let (stream, _feeder) = stream_with(&[0x8000_0000, 0x8000_0000, 0x4000_0000]);
        assert_eq!(stream.float32_between(10.0, 20.0).await, Ok(15.0));
        assert_eq!(stream.float32_between(20.0, 10.0).await, Ok(15.0));
        assert_eq!(stream.float32_between(0.0, 8.0).await, Ok(2.0));
    }

    #[tokio::test]
    async fn test_integer_mapping() {
        let (stream, _feeder) = stream_with(&[0, u32::MAX, 0x8000_0000, 0x8000_0000]);
        assert_eq!(stream.integer(1, 6).await, Ok(1));
        assert_eq!(stream.integer(6, 1).await, Ok(6));
        assert_eq!(stream.integer_up_to(9).await, Ok(5));
        assert_eq!(stream.integer(-10, 10).await, Ok(0));
    }

    #[tokio::test]
    async fn test_wide_integer_uses_two_words() {
        let (stream, _feeder) = stream_with(&[0, 0, 7]);
        assert_eq!(stream.integer(0, 1 << 40).await, Ok(0));
        assert_eq!(stream.available(), 1);
        // A range of exactly u32::MAX still takes the one-word path.
        assert_eq!(stream.integer(0, u32::MAX as i64 - 1).await, Ok(6));
        assert_eq!(stream.available(), 0);
    }

    #[tokio::test]
    async fn test_integer_near_large_bounds() {
        let base = (1i64 << 60) + 1;
        let (stream, _feeder) = stream_with(&[0, u32::MAX, u32::MAX, u32::MAX]);
        assert_eq!(stream.integer(base, base + 1).await, Ok(base));
        assert_eq!(stream.integer(base, base + 1).await, Ok(base + 1));
        assert_eq!(
            stream.linearly_weighted_integer(Preference::Low, i64::MAX - 1, i64::MAX).await,
            Ok(i64::MAX)
        );
    }

    #[tokio::test]
    async fn test_full_i64_range() {
        let (stream, _feeder) = stream_with(&[0, 0, u32::MAX, u32::MAX]);
        assert_eq!(stream.integer(i64::MIN, i64::MAX).await, Ok(i64::MIN));
        // 53 bits of resolution leave the top 2^11 values out of reach.
        assert_eq!(stream.integer(i64::MIN, i64::MAX).await, Ok(i64::MAX - 2047));
    }

    #[tokio::test]
    async fn test_linear_weighting_picks_extreme_draw() {
        let (stream, _feeder) = stream_with(&[0x4000_0000, 0xC000_0000, 0x4000_0000, 0xC000_0000]);
        // u = 0.25 or 0.75 over [0, 99]
        assert_eq!(
            stream.linearly_weighted_integer(Preference::Low, 0, 99).await,
            Ok(25)
        );
        assert_eq!(
            stream.linearly_weighted_integer(Preference::High, 99, 0).await,
            Ok(75)
        );
    }

    #[tokio::test]
    async fn test_weighted_integer_cumulative() {
        // Draw = 0.5 * 4 = 2 lands on the boundary of index 1.
        let (stream, _feeder) = stream_with(&[0x8000_0000, 0, 0xF000_0000]);
        assert_eq!(stream.weighted_integer(&[1.0, 1.0, 2.0]).await, Ok(1));
        // Draw 0 with a zero first weight still takes the first index.
        assert_eq!(stream.weighted_integer(&[0.0, 1.0]).await, Ok(0));
        // Draw 0.9375 * 3 = 2.8125 skips the zero weight in the middle.
        assert_eq!(stream.weighted_integer(&[1.0, 0.0, 2.0]).await, Ok(2));
    }

    #[tokio::test]
    async fn test_invalid_weights_consume_nothing() {
        let (stream, _feeder) = stream_with(&[1]);
        assert!(matches!(
            stream.weighted_integer(&[]).await,
            Err(StreamError::InvalidWeights(_))
        ));
        assert!(matches!(
            stream.weighted_integer(&[1.0, -1.0]).await,
            Err(StreamError::InvalidWeights(_))
        ));
        assert!(matches!(
            stream.weighted_integer(&[0.0, 0.0]).await,
            Err(StreamError::InvalidWeights(_))
        ));
        assert!(matches!(
            stream.weighted_integer(&[f64::NAN]).await,
            Err(StreamError::InvalidWeights(_))
        ));
        assert_eq!(stream.available(), 1);
    }

    #[test]
    fn test_select_weighted_past_total() {
        assert_eq!(select_weighted(&[1.0, 2.0], 3.5), None);
    }

    proptest! {
        #[test]
        fn prop_weighted_index_brackets_draw(
            weights in prop::collection::vec(0.0f64..100.0, 1..20),
            word in any::<u32>(),
        ) {
            let total: f64 = weights.iter().sum();
            prop_assume!(total > 0.0);
            let draw = scale(word as f64 / TWO_POW_32, 0.0, total);

            let i = select_weighted(&weights, draw).unwrap();
            let before: f64 = weights[..i].iter().sum();
            let through: f64 = weights[..=i].iter().sum();
            prop_assert!(i == 0 || before < draw);
            prop_assert!(draw <= through);
        }

        #[test]
        fn prop_integer_stays_in_range(a in any::<i64>(), b in any::<i64>(), word in any::<u32>()) {
            let (min, max_offset) = span(a, b);
            let value = map_to_range(min, max_offset, word as f64 / TWO_POW_32);
            prop_assert!(value >= a.min(b) && value <= a.max(b));
        }

        #[test]
        fn prop_wide_integer_stays_in_range(
            a in any::<i64>(),
            b in any::<i64>(),
            low in any::<u32>(),
            high in any::<u32>(),
        ) {
            let (min, max_offset) = span(a, b);
            let u = (low as f64 + (high >> 11) as f64 * TWO_POW_32) * TWO_POW_MINUS_53;
            let value = map_to_range(min, max_offset, u);
            prop_assert!(value >= a.min(b) && value <= a.max(b));
        }
    }
}
