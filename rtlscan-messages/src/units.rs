/// Frequency in Hertz.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Hertz(pub u64);

impl std::fmt::Display for Hertz {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0 >= 1_000_000 {
            write!(f, "{:.4} MHz", self.0 as f64 / 1e6)
        } else if self.0 >= 1_000 {
            write!(f, "{:.3} kHz", self.0 as f64 / 1e3)
        } else {
            write!(f, "{} Hz", self.0)
        }
    }
}

impl Hertz {
    pub const fn khz(khz: u64) -> Self {
        Self(khz * 1_000)
    }

    pub const fn mhz(mhz: u64) -> Self {
        Self(mhz * 1_000_000)
    }

    pub const fn ghz(ghz: u64) -> Self {
        Self(ghz * 1_000_000_000)
    }

    pub const fn as_hz(self) -> u64 {
        self.0
    }

    pub fn as_f64(self) -> f64 {
        self.0 as f64
    }
}

impl From<u64> for Hertz {
    fn from(hz: u64) -> Self {
        Self(hz)
    }
}

impl From<u32> for Hertz {
    fn from(hz: u32) -> Self {
        Self(u64::from(hz))
    }
}

impl From<Hertz> for u64 {
    fn from(hz: Hertz) -> Self {
        hz.0
    }
}

impl std::str::FromStr for Hertz {
    type Err = String;

    /// Parses plain Hz or a value with a `k`, `M` or `G` suffix, e.g. `105.1M`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (digits, multiplier) = match s.chars().last() {
            Some('k' | 'K') => (&s[..s.len() - 1], 1e3),
            Some('m' | 'M') => (&s[..s.len() - 1], 1e6),
            Some('g' | 'G') => (&s[..s.len() - 1], 1e9),
            _ => (s, 1.0),
        };
        let value: f64 = digits
            .parse()
            .map_err(|_| format!("invalid frequency: {s:?}"))?;
        if !value.is_finite() || value < 0.0 {
            return Err(format!("invalid frequency: {s:?}"));
        }
        Ok(Self((value * multiplier).round() as u64))
    }
}

/// Level in Decibels (dB).
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd)]
pub struct Decibels(pub f32);

impl std::fmt::Display for Decibels {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.1} dB", self.0)
    }
}

impl Decibels {
    /// Convert decibels to linear amplitude.
    /// For voltage/amplitude: linear = 10^(dB/20)
    pub fn to_amplitude(self) -> f32 {
        10.0_f32.powf(self.0 / 20.0)
    }

    /// Convert decibels to linear power.
    /// For power: linear = 10^(dB/10)
    pub fn to_power(self) -> f32 {
        10.0_f32.powf(self.0 / 10.0)
    }

    /// Convert linear power to decibels.
    pub fn from_power(power: f32) -> Self {
        Self(10.0 * power.log10())
    }

    pub const fn as_db(self) -> f32 {
        self.0
    }
}

impl From<f32> for Decibels {
    fn from(db: f32) -> Self {
        Self(db)
    }
}

impl From<Decibels> for f32 {
    fn from(db: Decibels) -> Self {
        db.0
    }
}
