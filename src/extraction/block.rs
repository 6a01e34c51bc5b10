//! Fixed-capacity sample block.

/// Samples collected for one extraction pass.
///
/// The buffer is allocated once; after a full block has been processed it
/// is cleared logically and refilled in place.
pub struct SampleBlock {
    samples: Vec<f32>,
    filled: usize,
}

impl SampleBlock {
    /// Creates an empty block holding `capacity` samples.
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: vec![0.0; capacity],
            filled: 0,
        }
    }

    /// Copies as many samples as fit, returning how many were taken.
    pub fn fill(&mut self, input: &[f32]) -> usize {
        let take = input.len().min(self.capacity() - self.filled);
        self.samples[self.filled..self.filled + take].copy_from_slice(&input[..take]);
        self.filled += take;
        take
    }

    /// Mutable access to the samples of a full block, `None` otherwise.
    pub fn full_samples_mut(&mut self) -> Option<&mut [f32]> {
        if self.is_full() {
            Some(&mut self.samples)
        } else {
            None
        }
    }

    /// Marks the block empty without reallocating.
    pub fn clear(&mut self) {
        self.filled = 0;
    }

    /// Returns true once every slot holds a sample.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.filled == self.samples.len()
    }

    /// Samples currently held.
    #[inline]
    pub fn len(&self) -> usize {
        self.filled
    }

    /// Returns true if no samples are held.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.filled == 0
    }

    /// Block capacity.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.samples.len()
    }
}

impl std::fmt::Debug for SampleBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleBlock")
            .field("filled", &self.filled)
            .field("capacity", &self.samples.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_stops_at_capacity() {
        let mut block = SampleBlock::new(4);
        assert_eq!(block.fill(&[0.1, 0.2, 0.3]), 3);
        assert!(!block.is_full());
        assert!(block.full_samples_mut().is_none());

        assert_eq!(block.fill(&[0.4, 0.5, 0.6]), 1);
        assert!(block.is_full());
        assert_eq!(block.full_samples_mut().unwrap(), &[0.1, 0.2, 0.3, 0.4]);
    }

    #[test]
    fn test_full_block_takes_nothing() {
        let mut block = SampleBlock::new(2);
        block.fill(&[1.0, 1.0]);
        assert_eq!(block.fill(&[2.0]), 0);
    }

    #[test]
    fn test_clear_keeps_capacity() {
        let mut block = SampleBlock::new(3);
        block.fill(&[0.5; 3]);
        block.clear();
        assert!(block.is_empty());
        assert_eq!(block.capacity(), 3);
        assert_eq!(block.fill(&[0.1; 5]), 3);
    }
}
