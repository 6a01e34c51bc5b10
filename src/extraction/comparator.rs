//! Comparator debiasing of sample pairs.
//!
//! Only the two least significant bits of each quantized sample are kept;
//! they carry the noise and little of the signal. Two such values are
//! compared: ties are dropped, otherwise the ordering gives one bit. A
//! static bias in the noise affects both sides of a pair equally, so the
//! ordering stays fair.

/// Scale from normalized samples to signed 16-bit.
const I16_SCALE: f64 = 32767.0;

/// Mask for the noise bits kept per sample.
const NOISE_MASK: u32 = 0b11;

/// Quantizes a sample to 16 bits and keeps its two noisiest bits.
///
/// The product is taken in `f64`; an `f32` product can round up to the
/// next integer and flip the kept bits.
#[inline]
pub fn noise_bits(sample: f32) -> u8 {
    ((f64::from(sample) * I16_SCALE).trunc() as i32).unsigned_abs() as u8 & NOISE_MASK as u8
}

/// Compares two noise values. `None` on a tie, otherwise `a < b`.
#[inline]
pub fn compare(a: u8, b: u8) -> Option<bool> {
    if a == b {
        None
    } else {
        Some(a < b)
    }
}

/// Packs comparator bits into bytes, least significant bit first.
#[derive(Debug, Default)]
pub struct BitPacker {
    bytes: Vec<u8>,
    current: u8,
    bit_index: u8,
}

impl BitPacker {
    /// Creates a packer with room for `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(capacity),
            current: 0,
            bit_index: 0,
        }
    }

    /// Adds a bit. Returns true if it completed a byte.
    pub fn push(&mut self, bit: bool) -> bool {
        if bit {
            self.current |= 1 << self.bit_index;
        }
        self.bit_index += 1;
        if self.bit_index < 8 {
            return false;
        }
        self.bytes.push(self.current);
        self.current = 0;
        self.bit_index = 0;
        true
    }

    /// Committed bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns true if no byte has been committed.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Committed bytes; bits of an unfinished byte are dropped.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Walks `samples` pairwise and packs comparator bits into at most `limit`
/// bytes.
pub fn debias(samples: &[f32], limit: usize) -> Vec<u8> {
    let mut packer = BitPacker::with_capacity(limit);
    if limit == 0 {
        return packer.into_bytes();
    }

    for pair in samples.chunks_exact(2) {
        let Some(bit) = compare(noise_bits(pair[0]), noise_bits(pair[1])) else {
            continue;
        };
        if packer.push(bit) && packer.len() == limit {
            break;
        }
    }

    packer.into_bytes()
}
