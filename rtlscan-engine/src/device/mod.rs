#[cfg(feature = "rtlsdr")]
mod rtlsdr;
mod simulated;

use num_complex::Complex;
use rtlscan_messages::{Hertz, SourceConfig};
use std::ops::RangeInclusive;

use crate::error::Result;

#[cfg(feature = "rtlsdr")]
pub use rtlsdr::RtlSdrTuner;
pub use simulated::SimulatedTuner;

/// A receiver the acquisition task can retune and read from.
///
/// Implementations own the hardware handle; dropping the tuner releases it.
pub trait Tuner: Send {
    fn sample_rate(&self) -> Hertz;

    /// Center frequencies the receiver can be tuned to.
    fn frequency_range(&self) -> RangeInclusive<Hertz>;

    /// Retune. Samples read afterwards belong to the new center frequency.
    fn tune(&mut self, center: Hertz) -> Result<()>;

    /// Fill `buf` completely with IQ samples.
    fn read_block(&mut self, buf: &mut [Complex<f32>]) -> Result<()>;
}

/// Claim the receiver described by `source`.
pub fn open(source: &SourceConfig) -> Result<Box<dyn Tuner>> {
    match source {
        SourceConfig::Simulated {
            sample_rate,
            tones,
            noise_floor,
            seed,
        } => Ok(Box::new(SimulatedTuner::new(
            *sample_rate,
            tones.clone(),
            *noise_floor,
            *seed,
        )?)),
        #[cfg(feature = "rtlsdr")]
        SourceConfig::RtlSdr {
            index,
            sample_rate,
            gain,
            ppm,
        } => Ok(Box::new(RtlSdrTuner::open(*index, *sample_rate, *gain, *ppm)?)),
        #[cfg(not(feature = "rtlsdr"))]
        SourceConfig::RtlSdr { .. } => Err(crate::Error::device(
            "RTL-SDR support not compiled in (enable the `rtlsdr` feature)",
        )),
    }
}

/// Receiver used when the caller has not chosen one: the first RTL-SDR
/// dongle when hardware support is compiled in, the simulator otherwise.
pub fn default_source() -> SourceConfig {
    #[cfg(feature = "rtlsdr")]
    {
        SourceConfig::RtlSdr {
            index: 0,
            sample_rate: Hertz(2_048_000),
            gain: rtlscan_messages::Gain::Auto,
            ppm: 0,
        }
    }
    #[cfg(not(feature = "rtlsdr"))]
    {
        SourceConfig::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_simulated() {
        let tuner = open(&SourceConfig::default()).unwrap();
        assert_eq!(tuner.sample_rate(), Hertz(2_048_000));
        assert!(tuner.frequency_range().contains(&Hertz::mhz(100)));
    }

    #[cfg(not(feature = "rtlsdr"))]
    #[test]
    fn test_open_rtlsdr_without_feature_is_unavailable() {
        let source = SourceConfig::RtlSdr {
            index: 0,
            sample_rate: Hertz(2_048_000),
            gain: rtlscan_messages::Gain::Auto,
            ppm: 0,
        };
        let err = open(&source).err().unwrap();
        assert!(matches!(err, crate::Error::DeviceUnavailable(_)));
    }
}
