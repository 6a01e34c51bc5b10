//! Output of one extraction pass.

use thiserror::Error;

/// Diagnostic for a block that yielded fewer bytes than requested.
///
/// Usually the input is too quiet (many tied pairs) or the block is too
/// small for the requested output size.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "output size ({requested}) is more than could be gathered ({achieved}) from a block of \
     {block_size} samples; the input is poor or the block size is too small"
)]
pub struct Truncation {
    /// Bytes requested per block.
    pub requested: usize,
    /// Bytes actually produced.
    pub achieved: usize,
    /// Samples per block.
    pub block_size: usize,
}

/// Debiased bytes extracted from one sample block.
///
/// Complete when the block produced the requested size (or as much as it
/// could, if no size was requested); truncated otherwise. Truncated output
/// still carries the bytes that were produced.
#[derive(Clone, PartialEq, Eq)]
pub struct ExtractedOutput {
    data: Vec<u8>,
    block: u64,
    truncation: Option<Truncation>,
}

impl ExtractedOutput {
    /// Creates complete output.
    pub fn complete(data: Vec<u8>, block: u64) -> Self {
        Self {
            data,
            block,
            truncation: None,
        }
    }

    /// Creates truncated output carrying the partial bytes.
    pub fn truncated(data: Vec<u8>, block: u64, truncation: Truncation) -> Self {
        Self {
            data,
            block,
            truncation: Some(truncation),
        }
    }

    /// Returns true if the requested size was reached.
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.truncation.is_none()
    }

    /// The truncation diagnostic, if any.
    #[inline]
    pub fn truncation(&self) -> Option<&Truncation> {
        self.truncation.as_ref()
    }

    /// Returns the bytes.
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Consumes the output, returning the bytes.
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Converts into the bytes, or the diagnostic with the partial bytes.
    pub fn into_result(self) -> Result<Vec<u8>, (Truncation, Vec<u8>)> {
        match self.truncation {
            None => Ok(self.data),
            Some(truncation) => Err((truncation, self.data)),
        }
    }

    /// Returns the number of bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Sequence number of the source block, starting at 1.
    #[inline]
    pub fn block(&self) -> u64 {
        self.block
    }
}

impl std::fmt::Debug for ExtractedOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractedOutput")
            .field("bytes", &self.data.len())
            .field("block", &self.block)
            .field("truncated", &self.truncation.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complete_output() {
        let output = ExtractedOutput::complete(vec![0xAA; 100], 1);
        assert!(output.is_complete());
        assert_eq!(output.truncation(), None);
        assert_eq!(output.len(), 100);
        assert_eq!(output.into_result(), Ok(vec![0xAA; 100]));
    }

    #[test]
    fn test_truncated_keeps_partial_bytes() {
        let truncation = Truncation {
            requested: 8,
            achieved: 3,
            block_size: 100,
        };
        let output = ExtractedOutput::truncated(vec![1, 2, 3], 4, truncation.clone());
        assert!(!output.is_complete());
        assert_eq!(output.truncation(), Some(&truncation));
        assert_eq!(output.block(), 4);

        let (reason, partial) = output.into_result().unwrap_err();
        assert_eq!(partial, vec![1, 2, 3]);
        let message = reason.to_string();
        assert!(message.contains("(8)"));
        assert!(message.contains("(3)"));
        assert!(message.contains("100 samples"));
    }
}
