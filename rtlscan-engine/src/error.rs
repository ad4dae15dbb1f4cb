//! Error types for the scan engine.

use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;

static FAILURE_STAMP: AtomicU64 = AtomicU64::new(0);

/// Process-wide, strictly increasing stamp for ordering failures recorded by
/// different sessions and threads.
pub(crate) fn next_failure_stamp() -> u64 {
    FAILURE_STAMP.fetch_add(1, Ordering::Relaxed) + 1
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced at the session boundary.
#[derive(Debug, Error)]
pub enum Error {
    /// Bad sweep parameters
    #[error("Invalid scan configuration: {0}")]
    InvalidConfiguration(String),

    /// No compatible receiver could be claimed
    #[error("Device unavailable: {0}")]
    DeviceUnavailable(String),

    /// Query before the first complete sweep
    #[error("Session not ready: no complete sweep acquired yet")]
    SessionNotReady,

    /// The previous acquisition did not release the receiver in time
    #[error("Acquisition did not stop within {0:?}")]
    TeardownTimeout(Duration),

    /// Caller storage shorter than the bin buffer
    #[error("Buffer too small: need {needed} bins, got {provided}")]
    BufferTooSmall { needed: usize, provided: usize },

    /// Receiver failure while sweeping
    #[error("Acquisition error: {0}")]
    Acquisition(String),

    /// Malformed series or profile data
    #[error("Format error: {0}")]
    Format(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Integer code used across the C boundary. Zero is reserved for success.
    pub fn code(&self) -> i32 {
        match self {
            Error::InvalidConfiguration(_) => -1,
            Error::DeviceUnavailable(_) => -2,
            Error::TeardownTimeout(_) => -3,
            Error::SessionNotReady => -4,
            Error::BufferTooSmall { .. } => -5,
            Error::Acquisition(_) | Error::Format(_) | Error::Io(_) => -6,
        }
    }

    pub fn device<S: Into<String>>(msg: S) -> Self {
        Error::DeviceUnavailable(msg.into())
    }

    pub fn acquisition<S: Into<String>>(msg: S) -> Self {
        Error::Acquisition(msg.into())
    }

    pub fn format<S: Into<String>>(msg: S) -> Self {
        Error::Format(msg.into())
    }
}

#[cfg(feature = "rtlsdr")]
impl From<rtl_sdr_rs::error::RtlsdrError> for Error {
    fn from(err: rtl_sdr_rs::error::RtlsdrError) -> Self {
        Error::Acquisition(format!("RTL-SDR: {}", err))
    }
}
