//! Hop planning, per-hop power spectra and the contiguous bin buffer.

use num_complex::Complex;
use rtlscan_messages::{AcquisitionOptions, Hertz, ScanConfig};
use rustfft::{Fft, FftPlanner};
use std::ops::{Range, RangeInclusive};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::window;

const MIN_FFT_SIZE: usize = 16;

/// One retune of the receiver and the run of output bins it fills.
#[derive(Debug, Clone, PartialEq)]
pub struct Hop {
    pub center: Hertz,
    /// Output bins written by this hop
    pub bins: Range<usize>,
    /// For each output bin, the shifted FFT bins averaged into it
    fft_ranges: Vec<Range<usize>>,
}

impl Hop {
    /// Reduce a shifted power spectrum to this hop's output bins.
    pub fn reduce(&self, power: &[f32]) -> Vec<f32> {
        self.fft_ranges
            .iter()
            .map(|range| {
                let slice = &power[range.clone()];
                slice.iter().sum::<f32>() / slice.len() as f32
            })
            .collect()
    }
}

/// How a scan range is cut into hops for a receiver of a given sample rate.
#[derive(Debug, Clone)]
pub struct SweepPlan {
    config: ScanConfig,
    sample_rate: Hertz,
    fft_size: usize,
    hops: Vec<Hop>,
}

impl SweepPlan {
    pub fn new(config: &ScanConfig, sample_rate: Hertz, options: &AcquisitionOptions) -> Result<Self> {
        config.validate().map_err(Error::InvalidConfiguration)?;
        if sample_rate.0 == 0 {
            return Err(Error::InvalidConfiguration(
                "sample rate must be greater than zero".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&options.crop) {
            return Err(Error::InvalidConfiguration(format!(
                "crop {} must be in [0, 1)",
                options.crop
            )));
        }
        if options.fft_averages == 0 {
            return Err(Error::InvalidConfiguration(
                "at least one FFT frame per hop is required".to_string(),
            ));
        }

        let fs = sample_rate.as_f64();
        let step = config.step.as_f64();

        // Smallest power of two whose resolution is no coarser than one bin
        let wanted = (fs / step).ceil().max(1.0) as usize;
        let fft_size = wanted
            .next_power_of_two()
            .min(options.max_fft_size)
            .max(MIN_FFT_SIZE);
        let resolution = fs / fft_size as f64;

        let span = fs * (1.0 - options.crop);
        let bins_per_hop = ((span / step).floor() as usize).max(1);
        let bin_count = config.bin_count();

        let half = (fft_size / 2) as f64;
        let hops = (0..bin_count)
            .step_by(bins_per_hop)
            .map(|first| {
                let bins = first..(first + bins_per_hop).min(bin_count);
                let center = config.start.as_f64() + step * (bins.start + bins.end) as f64 / 2.0;

                let to_index = |freq: f64| (freq - center) / resolution + half;
                let fft_ranges = bins
                    .clone()
                    .map(|bin| {
                        let lo = to_index(config.bin_start(bin)).ceil().clamp(0.0, fft_size as f64);
                        let hi = to_index(config.bin_start(bin) + step)
                            .ceil()
                            .clamp(0.0, fft_size as f64);
                        let (lo, hi) = (lo as usize, hi as usize);
                        if lo < hi {
                            lo..hi
                        } else {
                            // Bin narrower than the FFT resolution: take the nearest FFT bin
                            let nearest = to_index(config.bin_center(bin))
                                .round()
                                .clamp(0.0, (fft_size - 1) as f64)
                                as usize;
                            nearest..nearest + 1
                        }
                    })
                    .collect();

                Hop {
                    center: Hertz(center.round() as u64),
                    bins,
                    fft_ranges,
                }
            })
            .collect();

        Ok(Self {
            config: *config,
            sample_rate,
            fft_size,
            hops,
        })
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub fn sample_rate(&self) -> Hertz {
        self.sample_rate
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    pub fn hops(&self) -> &[Hop] {
        &self.hops
    }

    pub fn bin_count(&self) -> usize {
        self.config.bin_count()
    }

    /// Reject plans whose hop centers the receiver cannot reach.
    pub fn check_tunable(&self, range: &RangeInclusive<Hertz>) -> Result<()> {
        match self.hops.iter().find(|hop| !range.contains(&hop.center)) {
            Some(hop) => Err(Error::InvalidConfiguration(format!(
                "hop center {} outside receiver range {}..={}",
                hop.center,
                range.start(),
                range.end()
            ))),
            None => Ok(()),
        }
    }
}

/// Windowed, averaged power spectrum of consecutive FFT frames.
pub struct PowerSpectrum {
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    frame: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    accumulated: Vec<f32>,
    frames: usize,
    /// 1 / (sum of window coefficients)^2
    norm: f32,
}

impl PowerSpectrum {
    pub fn new(fft_size: usize, window: rtlscan_messages::WindowFunction) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_size);
        let window = window::coefficients(window, fft_size);
        let gain: f32 = window.iter().sum();
        Self {
            scratch: vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()],
            frame: vec![Complex::new(0.0, 0.0); fft_size],
            accumulated: vec![0.0; fft_size],
            frames: 0,
            norm: 1.0 / (gain * gain),
            fft,
            window,
        }
    }

    pub fn fft_size(&self) -> usize {
        self.window.len()
    }

    /// Add one frame of exactly `fft_size` samples.
    pub fn accumulate(&mut self, samples: &[Complex<f32>]) {
        assert_eq!(samples.len(), self.fft_size(), "frame length must match FFT size");

        for ((dst, &s), &w) in self.frame.iter_mut().zip(samples).zip(&self.window) {
            *dst = s * w;
        }
        self.fft.process_with_scratch(&mut self.frame, &mut self.scratch);

        for (acc, x) in self.accumulated.iter_mut().zip(&self.frame) {
            *acc += x.norm_sqr() * self.norm;
        }
        self.frames += 1;
    }

    /// Average of the accumulated frames, FFT-shifted so index 0 is the most
    /// negative frequency. Resets the accumulator.
    pub fn finish(&mut self) -> Vec<f32> {
        let n = self.fft_size();
        let frames = self.frames.max(1) as f32;
        let mut power: Vec<f32> = self.accumulated.iter().map(|&p| p / frames).collect();

        // FFT shift: move DC from edges to center
        power.rotate_left(n / 2);

        self.accumulated.iter_mut().for_each(|p| *p = 0.0);
        self.frames = 0;
        power
    }
}

/// Linear power per bin, ascending frequency, covering the whole scan range.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BinBuffer {
    bins: Vec<f32>,
}

impl BinBuffer {
    pub fn new(len: usize) -> Self {
        Self {
            bins: vec![0.0; len],
        }
    }

    pub fn len(&self) -> usize {
        self.bins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.bins
    }

    /// Overwrite one hop's bins.
    pub fn commit(&mut self, range: Range<usize>, values: &[f32]) {
        assert_eq!(range.len(), values.len(), "hop result does not match its bin range");
        self.bins[range].copy_from_slice(values);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rtlscan_messages::WindowFunction;
    use std::f32::consts::PI;

    fn plan(start: u64, end: u64, step: u64, sample_rate: u64) -> SweepPlan {
        SweepPlan::new(
            &ScanConfig::new(start, end, step),
            Hertz(sample_rate),
            &AcquisitionOptions::default(),
        )
        .unwrap()
    }

    fn tone(freq_offset: f32, sample_rate: f32, len: usize, amplitude: f32) -> Vec<Complex<f32>> {
        (0..len)
            .map(|n| {
                let phase = 2.0 * PI * freq_offset * n as f32 / sample_rate;
                Complex::new(phase.cos(), phase.sin()) * amplitude
            })
            .collect()
    }

    #[test]
    fn test_single_hop_plan() {
        let plan = plan(1_000_000, 2_000_000, 100_000, 2_048_000);
        assert_eq!(plan.bin_count(), 10);
        assert_eq!(plan.fft_size(), 32);
        assert_eq!(plan.hops().len(), 1);
        let hop = &plan.hops()[0];
        assert_eq!(hop.bins, 0..10);
        assert_eq!(hop.center, Hertz(1_500_000));
    }

    #[test]
    fn test_hops_tile_bins_contiguously() {
        let plan = plan(88_000_000, 108_000_000, 10_000, 2_048_000);
        assert_eq!(plan.bin_count(), 2_000);
        let mut next = 0;
        for hop in plan.hops() {
            assert_eq!(hop.bins.start, next);
            assert!(!hop.bins.is_empty());
            assert_eq!(hop.fft_ranges.len(), hop.bins.len());
            next = hop.bins.end;
        }
        assert_eq!(next, plan.bin_count());
        // Last hop is truncated to the remaining bins
        let last = plan.hops().last().unwrap();
        assert!(last.bins.len() <= plan.hops()[0].bins.len());
    }

    #[test]
    fn test_fft_ranges_stay_inside_bins() {
        let plan = plan(100_000_000, 103_000_000, 25_000, 2_400_000);
        let resolution = plan.sample_rate().as_f64() / plan.fft_size() as f64;
        for hop in plan.hops() {
            for (bin, range) in hop.bins.clone().zip(&hop.fft_ranges) {
                for k in range.clone() {
                    let freq = hop.center.as_f64() + (k as f64 - (plan.fft_size() / 2) as f64) * resolution;
                    assert!(freq >= plan.config().bin_start(bin) - 1e-6);
                    assert!(freq < plan.config().bin_start(bin + 1) + 1e-6);
                }
            }
        }
    }

    #[test]
    fn test_wide_bins_use_one_bin_per_hop() {
        let plan = plan(100_000_000, 120_000_000, 5_000_000, 2_048_000);
        assert_eq!(plan.bin_count(), 4);
        assert_eq!(plan.hops().len(), 4);
        assert_eq!(plan.hops()[1].center, Hertz(107_500_000));
        assert_eq!(plan.fft_size(), MIN_FFT_SIZE);
    }

    #[test]
    fn test_fine_bins_clamp_fft_size_and_pick_nearest() {
        let options = AcquisitionOptions {
            max_fft_size: 64,
            ..AcquisitionOptions::default()
        };
        let plan = SweepPlan::new(
            &ScanConfig::new(100_000_000u64, 100_010_000u64, 100u64),
            Hertz(2_048_000),
            &options,
        )
        .unwrap();
        assert_eq!(plan.fft_size(), 64);
        for hop in plan.hops() {
            assert!(hop.fft_ranges.iter().all(|r| r.len() == 1));
        }
    }

    #[test]
    fn test_plan_rejects_bad_options() {
        let config = ScanConfig::new(1_000u64, 2_000u64, 10u64);
        let crop = AcquisitionOptions {
            crop: 1.0,
            ..AcquisitionOptions::default()
        };
        assert!(matches!(
            SweepPlan::new(&config, Hertz(1_000_000), &crop),
            Err(Error::InvalidConfiguration(_))
        ));
        assert!(matches!(
            SweepPlan::new(&config, Hertz(0), &AcquisitionOptions::default()),
            Err(Error::InvalidConfiguration(_))
        ));
        assert!(matches!(
            SweepPlan::new(
                &ScanConfig::new(2_000u64, 1_000u64, 10u64),
                Hertz(1_000_000),
                &AcquisitionOptions::default()
            ),
            Err(Error::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_check_tunable() {
        let plan = plan(1_000_000, 2_000_000, 100_000, 2_048_000);
        assert!(plan.check_tunable(&(Hertz(0)..=Hertz::ghz(6))).is_ok());
        assert!(plan.check_tunable(&(Hertz::mhz(24)..=Hertz::mhz(1766))).is_err());
    }

    #[test]
    fn test_power_spectrum_peak_at_tone() {
        let fft_size = 64;
        let sample_rate = 64_000.0;
        // Exactly on FFT bin +8 (8 kHz at 1 kHz resolution)
        let samples = tone(8_000.0, sample_rate, fft_size, 1.0);

        for window in [WindowFunction::Rectangle, WindowFunction::Hann, WindowFunction::Blackman] {
            let mut spectrum = PowerSpectrum::new(fft_size, window);
            spectrum.accumulate(&samples);
            let power = spectrum.finish();

            let (peak, &value) = power
                .iter()
                .enumerate()
                .max_by(|(_, a), (_, b)| a.total_cmp(b))
                .unwrap();
            // DC sits at index n/2 after the shift
            assert_eq!(peak, fft_size / 2 + 8);
            assert!((value - 1.0).abs() < 1e-3, "{window:?}: peak power {value}");
        }
    }

    #[test]
    fn test_power_spectrum_averages_and_resets() {
        let mut spectrum = PowerSpectrum::new(32, WindowFunction::Rectangle);
        spectrum.accumulate(&tone(0.0, 32.0, 32, 1.0));
        spectrum.accumulate(&tone(0.0, 32.0, 32, 0.0));
        let power = spectrum.finish();
        assert!((power[16] - 0.5).abs() < 1e-5);

        let power = spectrum.finish();
        assert!(power.iter().all(|&p| p == 0.0));
    }

    #[test]
    fn test_hop_reduce_averages_ranges() {
        let hop = Hop {
            center: Hertz(0),
            bins: 0..2,
            fft_ranges: vec![0..2, 2..3],
        };
        assert_eq!(hop.reduce(&[1.0, 3.0, 5.0]), vec![2.0, 5.0]);
    }

    #[test]
    fn test_bin_buffer_commit() {
        let mut buffer = BinBuffer::new(5);
        buffer.commit(1..3, &[7.0, 8.0]);
        assert_eq!(buffer.as_slice(), &[0.0, 7.0, 8.0, 0.0, 0.0]);
    }

    #[test]
    #[should_panic]
    fn test_bin_buffer_commit_length_mismatch_panics() {
        let mut buffer = BinBuffer::new(5);
        buffer.commit(1..3, &[7.0]);
    }
}
