//! Software receiver: a set of carriers over complex Gaussian noise.

use num_complex::Complex;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};
use rtlscan_messages::{Decibels, Hertz, Tone};
use std::f64::consts::PI;
use std::ops::RangeInclusive;

use super::Tuner;
use crate::error::{Error, Result};

/// Carrier currently inside the passband, as seen from the tuned center.
struct ActiveTone {
    amplitude: f32,
    /// Phase advance per sample in radians
    increment: f64,
    phase: f64,
}

pub struct SimulatedTuner {
    sample_rate: Hertz,
    tones: Vec<Tone>,
    noise: Normal<f32>,
    rng: StdRng,
    center: Hertz,
    active: Vec<ActiveTone>,
}

impl SimulatedTuner {
    pub fn new(sample_rate: Hertz, tones: Vec<Tone>, noise_floor: Decibels, seed: u64) -> Result<Self> {
        if sample_rate.0 == 0 {
            return Err(Error::device("simulated receiver needs a non-zero sample rate"));
        }
        // Noise power is split evenly between I and Q
        let noise_power = noise_floor.to_power();
        let sigma = if noise_power.is_finite() {
            (noise_power / 2.0).sqrt()
        } else {
            0.0
        };
        let noise = Normal::new(0.0, sigma)
            .map_err(|e| Error::device(format!("invalid noise floor {}: {}", noise_floor, e)))?;

        let mut tuner = Self {
            sample_rate,
            tones,
            noise,
            rng: StdRng::seed_from_u64(seed),
            center: Hertz(0),
            active: Vec::new(),
        };
        tuner.select_tones();
        Ok(tuner)
    }

    pub fn center(&self) -> Hertz {
        self.center
    }

    /// Keep only carriers inside the tuned passband; the rest are filtered
    /// out by the receiver front end.
    fn select_tones(&mut self) {
        let fs = self.sample_rate.as_f64();
        let center = self.center.as_f64();
        self.active = self
            .tones
            .iter()
            .filter_map(|tone| {
                let offset = tone.frequency.as_f64() - center;
                (offset.abs() < fs / 2.0).then(|| ActiveTone {
                    amplitude: tone.level.to_amplitude(),
                    increment: 2.0 * PI * offset / fs,
                    phase: 0.0,
                })
            })
            .collect();
    }
}

impl Tuner for SimulatedTuner {
    fn sample_rate(&self) -> Hertz {
        self.sample_rate
    }

    fn frequency_range(&self) -> RangeInclusive<Hertz> {
        Hertz(0)..=Hertz::ghz(6)
    }

    fn tune(&mut self, center: Hertz) -> Result<()> {
        if !self.frequency_range().contains(&center) {
            return Err(Error::acquisition(format!("cannot tune to {}", center)));
        }
        self.center = center;
        self.select_tones();
        Ok(())
    }

    fn read_block(&mut self, buf: &mut [Complex<f32>]) -> Result<()> {
        for sample in buf.iter_mut() {
            let mut value = Complex::new(
                self.noise.sample(&mut self.rng),
                self.noise.sample(&mut self.rng),
            );
            for tone in &mut self.active {
                let (sin, cos) = tone.phase.sin_cos();
                value += Complex::new(cos as f32, sin as f32) * tone.amplitude;
                tone.phase = (tone.phase + tone.increment) % (2.0 * PI);
            }
            *sample = value;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn silent_tone(frequency: u64) -> Tone {
        Tone {
            frequency: Hertz(frequency),
            level: Decibels(0.0),
        }
    }

    #[test]
    fn test_tone_without_noise_has_unit_amplitude() {
        let mut tuner = SimulatedTuner::new(
            Hertz(1_000_000),
            vec![silent_tone(100_250_000)],
            Decibels(f32::NEG_INFINITY),
            1,
        )
        .unwrap();
        tuner.tune(Hertz(100_000_000)).unwrap();

        let mut buf = vec![Complex::new(0.0, 0.0); 256];
        tuner.read_block(&mut buf).unwrap();
        assert!(buf.iter().all(|s| (s.norm() - 1.0).abs() < 1e-4));
        // 250 kHz at 1 MS/s is a quarter turn per sample
        assert!((buf[1] - Complex::new(0.0, 1.0)).norm() < 1e-4);
    }

    #[test]
    fn test_out_of_band_tone_is_filtered() {
        let mut tuner = SimulatedTuner::new(
            Hertz(1_000_000),
            vec![silent_tone(300_000_000)],
            Decibels(f32::NEG_INFINITY),
            1,
        )
        .unwrap();
        tuner.tune(Hertz(100_000_000)).unwrap();

        let mut buf = vec![Complex::new(1.0, 1.0); 64];
        tuner.read_block(&mut buf).unwrap();
        assert!(buf.iter().all(|s| s.norm() == 0.0));
    }

    #[test]
    fn test_noise_power_matches_floor() {
        let mut tuner =
            SimulatedTuner::new(Hertz(1_000_000), Vec::new(), Decibels(-20.0), 7).unwrap();
        let mut buf = vec![Complex::new(0.0, 0.0); 20_000];
        tuner.read_block(&mut buf).unwrap();
        let power: f32 = buf.iter().map(|s| s.norm_sqr()).sum::<f32>() / buf.len() as f32;
        assert!((power - 0.01).abs() < 0.001, "measured noise power {power}");
    }

    #[test]
    fn test_same_seed_same_samples() {
        let read = |seed| {
            let mut tuner =
                SimulatedTuner::new(Hertz(1_000_000), Vec::new(), Decibels(-30.0), seed).unwrap();
            let mut buf = vec![Complex::new(0.0, 0.0); 16];
            tuner.read_block(&mut buf).unwrap();
            buf
        };
        assert_eq!(read(3), read(3));
        assert_ne!(read(3), read(4));
    }

    #[test]
    fn test_tune_outside_range_fails() {
        let mut tuner =
            SimulatedTuner::new(Hertz(1_000_000), Vec::new(), Decibels(-30.0), 0).unwrap();
        assert!(tuner.tune(Hertz::ghz(7)).is_err());
        assert_eq!(tuner.center(), Hertz(0));
    }
}
