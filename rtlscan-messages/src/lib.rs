mod config;
mod event;
mod state;
mod units;

pub use config::{AcquisitionOptions, Gain, MAX_BINS, ScanConfig, SourceConfig, Tone, WindowFunction};
pub use event::Event;
pub use state::{ScalingMode, SessionState};
pub use units::{Decibels, Hertz};
