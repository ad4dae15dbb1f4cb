//! Swept spectrum acquisition for RTL-SDR class receivers.
//!
//! A [`Session`] retunes a [`Tuner`] across a frequency range in hops, turns
//! each hop into averaged FFT power and publishes the result as a fixed-size
//! buffer of bins. [`global`] exposes one such session behind flat functions
//! for callers that cannot hold a handle.

mod acquisition;
pub mod device;
mod error;
pub mod global;
pub mod profile;
pub mod scaling;
pub mod series;
mod session;
pub mod spectrum;
mod window;

pub use device::{SimulatedTuner, Tuner};
pub use error::{Error, Result};
pub use profile::ScanProfile;
pub use series::Series;
pub use session::Session;
