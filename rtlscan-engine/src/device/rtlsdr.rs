//! RTL2832U receiver (requires the `rtlsdr` feature).
//!
//! Wraps the `rtl_sdr_rs` driver: the dongle is opened by index, configured
//! once, then retuned hop by hop by the acquisition task.

use log::{debug, info};
use num_complex::Complex;
use rtl_sdr_rs::{DEFAULT_BUF_LENGTH, RtlSdr, TunerGain};
use rtlscan_messages::{Gain, Hertz};
use std::ops::RangeInclusive;

use super::Tuner;
use crate::error::{Error, Result};

/// R820T/R820T2 tuning range
const MIN_FREQUENCY: Hertz = Hertz::mhz(24);
const MAX_FREQUENCY: Hertz = Hertz::mhz(1766);

pub struct RtlSdrTuner {
    rtlsdr: RtlSdr,
    sample_rate: Hertz,
    ppm: i32,
    buf: Vec<u8>,
    pos: usize,
    end: usize,
}

impl RtlSdrTuner {
    pub fn open(index: usize, sample_rate: Hertz, gain: Gain, ppm: i32) -> Result<Self> {
        let mut rtlsdr = RtlSdr::open_with_index(index)
            .map_err(|e| Error::device(format!("cannot open RTL-SDR #{}: {}", index, e)))?;

        let rate = u32::try_from(sample_rate.0)
            .map_err(|_| Error::device(format!("sample rate {} out of range", sample_rate)))?;
        rtlsdr.set_sample_rate(rate)?;
        match gain {
            Gain::Manual(gain_db) => {
                // Convert dB to rtl-sdr units (gain * 10)
                let gain_tenths = (gain_db * 10.0) as i32;
                rtlsdr.set_tuner_gain(TunerGain::Manual(gain_tenths))?
            }
            Gain::Auto => rtlsdr.set_tuner_gain(TunerGain::Auto)?,
        };
        rtlsdr.reset_buffer()?;
        info!("Opened RTL-SDR #{} at {} ({:?} gain)", index, sample_rate, gain);

        Ok(Self {
            rtlsdr,
            sample_rate,
            ppm,
            buf: vec![0u8; DEFAULT_BUF_LENGTH],
            pos: 0,
            end: 0,
        })
    }

    fn refill(&mut self) -> Result<()> {
        let read = self.rtlsdr.read_sync(&mut self.buf)?;
        if read == 0 {
            return Err(Error::acquisition("RTL-SDR returned no samples"));
        }
        self.pos = 0;
        // Drop a trailing odd byte so I/Q pairs stay aligned
        self.end = read & !1;
        Ok(())
    }
}

impl Tuner for RtlSdrTuner {
    fn sample_rate(&self) -> Hertz {
        self.sample_rate
    }

    fn frequency_range(&self) -> RangeInclusive<Hertz> {
        MIN_FREQUENCY..=MAX_FREQUENCY
    }

    fn tune(&mut self, center: Hertz) -> Result<()> {
        // Crystal error is folded into the requested frequency
        let corrected = center.as_f64() / (1.0 + self.ppm as f64 * 1e-6);
        let freq = u32::try_from(corrected.round() as u64)
            .map_err(|_| Error::acquisition(format!("cannot tune to {}", center)))?;
        self.rtlsdr.set_center_freq(freq)?;
        self.rtlsdr.reset_buffer()?;
        // Samples already in flight were taken before the PLL settled
        self.refill()?;
        self.pos = 0;
        self.end = 0;
        debug!("Tuned to {}", center);
        Ok(())
    }

    fn read_block(&mut self, out: &mut [Complex<f32>]) -> Result<()> {
        let mut filled = 0;
        while filled < out.len() {
            if self.pos >= self.end {
                self.refill()?;
            }
            let pairs = ((self.end - self.pos) / 2).min(out.len() - filled);
            let raw = &self.buf[self.pos..self.pos + pairs * 2];
            for (dst, c) in out[filled..filled + pairs].iter_mut().zip(raw.chunks_exact(2)) {
                *dst = Complex::new(
                    (c[0] as f32 - 127.5) / 128.0,
                    (c[1] as f32 - 127.5) / 128.0,
                );
            }
            self.pos += pairs * 2;
            filled += pairs;
        }
        Ok(())
    }
}
