//! Sample source abstraction.
//!
//! Real inputs (microphone, ADC, recorded audio) live outside this crate.
//! They hand normalized samples in [-1, 1] to the extractor through this
//! trait; the synthetic source stands in for them in tests and demos.

use rand_chacha::ChaCha8Rng;
use rand_core::{RngCore, SeedableRng};
use std::f32::consts::TAU;
use thiserror::Error;

/// Errors that can occur while reading samples.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to open sample source: {0}")]
    OpenFailed(String),
    #[error("failed to read samples: {0}")]
    ReadFailed(String),
    #[error("sample source not initialized")]
    NotInitialized,
}

/// Trait for sample feeds.
pub trait SampleSource {
    /// Opens the source.
    fn open(&mut self) -> Result<(), SourceError>;

    /// Fills `buf` with samples, returning how many were written.
    fn read(&mut self, buf: &mut [f32]) -> Result<usize, SourceError>;

    /// Checks if the source is currently open.
    fn is_open(&self) -> bool;

    /// Closes the source and releases resources.
    fn close(&mut self);
}

/// Synthetic microphone: a quiet tone buried in uniform noise.
///
/// Seeded, so runs are reproducible. NOT an entropy source on its own;
/// the noise comes from a PRNG and only exercises the pipeline.
#[derive(Debug)]
pub struct SyntheticSource {
    rng: ChaCha8Rng,
    noise_amplitude: f32,
    tone_amplitude: f32,
    tone_step: f32,
    phase: f32,
    leading_silence: usize,
    silence_left: usize,
    open: bool,
}

impl SyntheticSource {
    /// Sample rate assumed for the tone.
    pub const SAMPLE_RATE: f32 = 44_100.0;

    /// Creates a source with noise around 1% of full scale and a 440 Hz tone.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            noise_amplitude: 0.01,
            tone_amplitude: 0.2,
            tone_step: 440.0 * TAU / Self::SAMPLE_RATE,
            phase: 0.0,
            leading_silence: 0,
            silence_left: 0,
            open: false,
        }
    }

    /// Sets the noise amplitude (fraction of full scale).
    pub fn with_noise(mut self, amplitude: f32) -> Self {
        self.noise_amplitude = amplitude.abs();
        self
    }

    /// Sets the tone frequency and amplitude; amplitude 0 disables it.
    pub fn with_tone(mut self, frequency_hz: f32, amplitude: f32) -> Self {
        self.tone_step = frequency_hz * TAU / Self::SAMPLE_RATE;
        self.tone_amplitude = amplitude;
        self
    }

    /// Emits exact zeros for the first `samples` samples after opening,
    /// like a muted input warming up.
    pub fn with_leading_silence(mut self, samples: usize) -> Self {
        self.leading_silence = samples;
        self
    }

    fn next_sample(&mut self) -> f32 {
        if self.silence_left > 0 {
            self.silence_left -= 1;
            return 0.0;
        }
        let noise = (self.rng.next_u32() as f32 / u32::MAX as f32) * 2.0 - 1.0;
        let tone = self.phase.sin() * self.tone_amplitude;
        self.phase = (self.phase + self.tone_step) % TAU;
        (tone + noise * self.noise_amplitude).clamp(-1.0, 1.0)
    }
}

impl SampleSource for SyntheticSource {
    fn open(&mut self) -> Result<(), SourceError> {
        if self.noise_amplitude > 1.0 {
            return Err(SourceError::OpenFailed(format!(
                "noise amplitude {} exceeds full scale",
                self.noise_amplitude
            )));
        }
        self.silence_left = self.leading_silence;
        self.phase = 0.0;
        self.open = true;
        tracing::info!(
            noise = self.noise_amplitude,
            tone = self.tone_amplitude,
            "SyntheticSource opened"
        );
        Ok(())
    }

    fn read(&mut self, buf: &mut [f32]) -> Result<usize, SourceError> {
        if !self.open {
            return Err(SourceError::NotInitialized);
        }
        for sample in buf.iter_mut() {
            *sample = self.next_sample();
        }
        Ok(buf.len())
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn close(&mut self) {
        self.open = false;
        tracing::info!("SyntheticSource closed");
    }
}
