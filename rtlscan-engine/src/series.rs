//! Averaged recordings of decibel sweeps and their on-disk format.
//!
//! A series accumulates many `bins()` readings of one scan configuration so
//! that two locations (a "far" and a "near" recording) can be compared bin by
//! bin.
//!
//! File layout, little-endian:
//!
//! | field | type |
//! |---|---|
//! | start, end, step (Hz) | `u32` x3 |
//! | bin count | `u32` |
//! | frames | `u32` |
//! | running totals | `f64` x bin count |

use log::debug;
use rtlscan_messages::ScanConfig;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::error::{Error, Result};

/// Value recorded in place of a reading that is NaN or outside ±[`READING_LIMIT`].
pub const SANITIZED_READING: f64 = -25.0;
pub const READING_LIMIT: f64 = 100.0;
/// Marks difference bins below the threshold.
pub const DIFF_SUPPRESSED: f64 = -9999.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    config: ScanConfig,
    totals: Vec<f64>,
    frames: u32,
}

impl Series {
    pub fn new(config: ScanConfig) -> Self {
        Self {
            totals: vec![0.0; config.bin_count()],
            config,
            frames: 0,
        }
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub fn frames(&self) -> u32 {
        self.frames
    }

    pub fn len(&self) -> usize {
        self.totals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.totals.is_empty()
    }

    pub fn totals(&self) -> &[f64] {
        &self.totals
    }

    /// Add one decibel reading of every bin.
    pub fn record(&mut self, bins: &[f32]) -> Result<()> {
        if bins.len() != self.totals.len() {
            return Err(Error::format(format!(
                "reading has {} bins, series has {}",
                bins.len(),
                self.totals.len()
            )));
        }
        for (total, &value) in self.totals.iter_mut().zip(bins) {
            let value = f64::from(value);
            *total += if value.is_nan() || value.abs() > READING_LIMIT {
                SANITIZED_READING
            } else {
                value
            };
        }
        self.frames += 1;
        Ok(())
    }

    /// Mean reading per bin. All zeros before the first frame.
    pub fn average(&self) -> Vec<f64> {
        let frames = f64::from(self.frames.max(1));
        self.totals.iter().map(|t| t / frames).collect()
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<()> {
        for field in [
            hz_field(self.config.start.0)?,
            hz_field(self.config.end.0)?,
            hz_field(self.config.step.0)?,
            self.totals.len() as u32,
            self.frames,
        ] {
            w.write_all(&field.to_le_bytes())?;
        }
        for total in &self.totals {
            w.write_all(&total.to_le_bytes())?;
        }
        Ok(())
    }

    pub fn read_from<R: Read>(r: &mut R) -> Result<Self> {
        let start = read_u32(r)?;
        let end = read_u32(r)?;
        let step = read_u32(r)?;
        let bin_count = read_u32(r)? as usize;
        let frames = read_u32(r)?;

        let config = ScanConfig::new(start, end, step);
        config.validate().map_err(Error::Format)?;
        if bin_count != config.bin_count() {
            return Err(Error::format(format!(
                "header declares {} bins, configuration implies {}",
                bin_count,
                config.bin_count()
            )));
        }

        let totals = (0..bin_count)
            .map(|_| {
                let mut buf = [0u8; 8];
                read_exact(r, &mut buf)?;
                Ok(f64::from_le_bytes(buf))
            })
            .collect::<Result<Vec<f64>>>()?;

        Ok(Self {
            config,
            totals,
            frames,
        })
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut w = BufWriter::new(File::create(path.as_ref())?);
        self.write_to(&mut w)?;
        w.flush()?;
        debug!(
            "Saved series ({} bins, {} frames) to {}",
            self.len(),
            self.frames,
            path.as_ref().display()
        );
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut r = BufReader::new(File::open(path)?);
        Self::read_from(&mut r)
    }
}

/// `near - far` per bin. With a threshold, bins below it become [`DIFF_SUPPRESSED`].
pub fn difference(far: &Series, near: &Series, threshold: Option<f64>) -> Result<Vec<f64>> {
    if far.frames == 0 || near.frames == 0 {
        return Err(Error::format("both series need at least one frame"));
    }
    if far.len() != near.len() {
        return Err(Error::format(format!(
            "series sizes differ: {} vs {}",
            far.len(),
            near.len()
        )));
    }

    Ok(far
        .average()
        .iter()
        .zip(near.average())
        .map(|(f, n)| {
            let diff = n - f;
            match threshold {
                Some(t) if diff < t => DIFF_SUPPRESSED,
                _ => diff,
            }
        })
        .collect())
}

fn hz_field(hz: u64) -> Result<u32> {
    u32::try_from(hz).map_err(|_| Error::format(format!("{} Hz does not fit the series header", hz)))
}

fn read_exact<R: Read>(r: &mut R, buf: &mut [u8]) -> Result<()> {
    r.read_exact(buf).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => Error::format("truncated series file"),
        _ => Error::Io(e),
    })
}

fn read_u32<R: Read>(r: &mut R) -> Result<u32> {
    let mut buf = [0u8; 4];
    read_exact(r, &mut buf)?;
    Ok(u32::from_le_bytes(buf))
}
