//! Acoustic Entropy Library
//!
//! Turns a feed of noisy audio samples into random bytes, serves them as
//! integers, floats and weighted choices, and checks the output's bit-run
//! statistics against the model of an ideal fair source.
//!
//! # Architecture
//!
//! The system follows an explicit data flow:
//!
//! ```text
//! capture → extraction → stream
//!               ↓
//!           analysis (run-count monitoring)
//! ```
//!
//! Samples are collected into fixed-size blocks. Each block is shuffled,
//! paired up and debiased with a von Neumann comparator on the low bits
//! of each sample. The resulting bytes replace the pool behind a
//! [`RandomStream`].
//!
//! # Design Principles
//!
//! - **Fail-closed**: A short block stops the pipeline unless configured otherwise
//! - **Silence is skipped**: Chunks that start with exact zeros carry no noise
//! - **No cryptographic claims**: Run counts are sanity checks, not proofs
//!
//! # Example
//!
//! ```no_run
//! use acoustic_entropy::{
//!     capture::{SampleSource, SyntheticSource},
//!     Trng, TrngConfig,
//! };
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let mut source = SyntheticSource::new(7);
//! source.open()?;
//!
//! let mut trng = Trng::new(TrngConfig::default())?;
//! let stream = trng.stream();
//!
//! let mut chunk = vec![0.0f32; 128];
//! while stream.available() == 0 {
//!     let n = source.read(&mut chunk)?;
//!     trng.accumulate(&chunk[..n])?;
//! }
//!
//! let roll = stream.integer(1, 6).await?;
//! println!("rolled {roll}");
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod analysis;
pub mod capture;
pub mod extraction;
pub mod metrics;
pub mod stream;
pub mod trng;

// Re-export commonly used types at crate root
pub use analysis::{QualityReport, QualityThresholds, RunCountAnalyzer, RunLengthModel};
pub use capture::{FileConfig, SampleSource, SyntheticSource, TrngConfig};
pub use extraction::{ExtractedOutput, Extractor, Truncation};
pub use stream::{PoolFeeder, Preference, RandomPool, RandomStream, StreamError};
pub use trng::{Trng, TrngError, TrngStats};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
