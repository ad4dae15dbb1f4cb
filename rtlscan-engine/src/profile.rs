//! Saved scan settings: a four-line text file holding start, end and step in
//! hertz followed by the difference threshold in decibels.

use log::warn;
use rtlscan_messages::ScanConfig;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::error::{Error, Result};

pub const DEFAULT_START: u64 = 87_000_000;
pub const DEFAULT_END: u64 = 108_000_000;
pub const DEFAULT_STEP: u64 = 100;
pub const DEFAULT_THRESHOLD: f64 = 10.0;

#[derive(Debug, Clone, PartialEq)]
pub struct ScanProfile {
    pub config: ScanConfig,
    /// Minimum difference (dB) kept by the diff view
    pub threshold: f64,
}

impl Default for ScanProfile {
    fn default() -> Self {
        Self {
            config: ScanConfig::new(DEFAULT_START, DEFAULT_END, DEFAULT_STEP),
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

impl FromStr for ScanProfile {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut lines = s.lines().map(str::trim);
        let mut field = |name: &str| {
            lines
                .next()
                .filter(|l| !l.is_empty())
                .ok_or_else(|| Error::format(format!("profile is missing the {} line", name)))
        };

        let start = parse_hz(field("start")?)?;
        let end = parse_hz(field("end")?)?;
        let step = parse_hz(field("step")?)?;
        let threshold_line = field("threshold")?;
        let threshold = threshold_line
            .parse::<f64>()
            .map_err(|e| Error::format(format!("bad threshold {:?}: {}", threshold_line, e)))?;

        let config = ScanConfig::new(start, end, step);
        config.validate().map_err(Error::InvalidConfiguration)?;
        Ok(Self { config, threshold })
    }
}

impl ScanProfile {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        fs::read_to_string(path)?.parse()
    }

    /// Load `path`, falling back to the defaults when it is absent or unreadable.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(profile) => profile,
            Err(Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(e) => {
                warn!("Ignoring profile {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let text = format!(
            "{}\n{}\n{}\n{}\n",
            self.config.start.as_hz(),
            self.config.end.as_hz(),
            self.config.step.as_hz(),
            self.threshold
        );
        fs::write(path, text)?;
        Ok(())
    }
}

fn parse_hz(line: &str) -> Result<u64> {
    line.parse::<u64>()
        .map_err(|e| Error::format(format!("bad frequency {:?}: {}", line, e)))
}
