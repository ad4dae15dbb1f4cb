use crate::{Decibels, Hertz};
use std::time::Duration;

/// Largest bin buffer a session will allocate.
pub const MAX_BINS: usize = 1 << 20;

/// Frequency range and bin width of one scan session.
///
/// `step` is the width of a single output bin, so the session produces
/// `ceil((end - start) / step)` bins whatever the receiver's sample rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanConfig {
    pub start: Hertz,
    pub end: Hertz,
    pub step: Hertz,
}

impl ScanConfig {
    pub fn new(start: impl Into<Hertz>, end: impl Into<Hertz>, step: impl Into<Hertz>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
            step: step.into(),
        }
    }

    /// Check `start < end`, `step > 0` and that the range fits in [`MAX_BINS`].
    pub fn validate(&self) -> Result<(), String> {
        if self.start >= self.end {
            return Err(format!(
                "start frequency {} must be below end frequency {}",
                self.start, self.end
            ));
        }
        if self.step.0 == 0 {
            return Err("step size must be greater than zero".to_string());
        }
        let bins = (self.end.0 - self.start.0).div_ceil(self.step.0);
        if bins > MAX_BINS as u64 {
            return Err(format!(
                "{} bins requested, at most {} are supported",
                bins, MAX_BINS
            ));
        }
        Ok(())
    }

    /// Number of bins covering `[start, end)`. The last bin is padded past
    /// `end` when the span is not a multiple of `step`.
    pub fn bin_count(&self) -> usize {
        if self.validate().is_err() {
            return 0;
        }
        (self.end.0 - self.start.0).div_ceil(self.step.0) as usize
    }

    /// Lower edge of bin `index`.
    pub fn bin_start(&self, index: usize) -> f64 {
        self.start.as_f64() + index as f64 * self.step.as_f64()
    }

    /// Center frequency of bin `index`.
    pub fn bin_center(&self, index: usize) -> f64 {
        self.bin_start(index) + self.step.as_f64() / 2.0
    }
}

/// A carrier injected by the simulated receiver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tone {
    pub frequency: Hertz,
    /// Level relative to full scale. 0 dB is an amplitude of 1.0.
    pub level: Decibels,
}

/// Tuner gain setting.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum Gain {
    #[default]
    Auto,
    /// Manual gain in dB.
    Manual(f32),
}

/// Configuration for the receiver the session drives.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceConfig {
    /// Software receiver producing the listed carriers over Gaussian noise.
    Simulated {
        sample_rate: Hertz,
        tones: Vec<Tone>,
        noise_floor: Decibels,
        seed: u64,
    },
    /// RTL2832U dongle opened by index.
    RtlSdr {
        index: usize,
        sample_rate: Hertz,
        gain: Gain,
        ppm: i32,
    },
}

impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig::Simulated {
            sample_rate: Hertz(2_048_000),
            tones: Vec::new(),
            noise_floor: Decibels(-60.0),
            seed: 0,
        }
    }
}

impl SourceConfig {
    pub fn sample_rate(&self) -> Hertz {
        match self {
            SourceConfig::Simulated { sample_rate, .. } | SourceConfig::RtlSdr { sample_rate, .. } => {
                *sample_rate
            }
        }
    }
}

/// Window applied to each FFT frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WindowFunction {
    Rectangle,
    #[default]
    Hann,
    Hamming,
    Blackman,
}

/// Tuning of the acquisition task.
#[derive(Debug, Clone, PartialEq)]
pub struct AcquisitionOptions {
    /// FFT frames averaged per hop
    pub fft_averages: usize,
    pub window: WindowFunction,
    /// Fraction of each hop's bandwidth discarded at the band edges
    pub crop: f64,
    pub max_fft_size: usize,
    /// How long re-initialisation waits for the previous acquisition to release the receiver
    pub teardown_timeout: Duration,
    /// `None` sweeps until cancelled
    pub sweep_limit: Option<u64>,
}

impl Default for AcquisitionOptions {
    fn default() -> Self {
        Self {
            fft_averages: 8,
            window: WindowFunction::Hann,
            crop: 0.25,
            max_fft_size: 65_536,
            teardown_timeout: Duration::from_secs(2),
            sweep_limit: None,
        }
    }
}
