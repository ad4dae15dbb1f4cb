//! Process-wide scan session behind flat functions.
//!
//! Backs handle-less callers such as the C surface: one session per process,
//! configured by [`initialize`] and polled by the query functions. Failures
//! are also recorded so that callers that only see sentinel values can fetch
//! the cause with [`last_error`].

use log::warn;
use rtlscan_messages::{AcquisitionOptions, ScalingMode, ScanConfig, SessionState, SourceConfig};
use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::Duration;

use crate::device::{self, Tuner};
use crate::error::{self, Error, Result};
use crate::session::Session;

/// A recorded failure: stamp, code, message.
type Failure = (u64, i32, String);

struct Global {
    session: Session,
    source: SourceConfig,
    options: AcquisitionOptions,
    last_error: Option<Failure>,
}

impl Global {
    fn record<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            self.last_error = Some((error::next_failure_stamp(), e.code(), e.to_string()));
        }
        result
    }

    /// Failure that ended the running acquisition, as a C-style record.
    fn acquisition_failure(&self) -> Option<Failure> {
        self.session.last_failure().map(|(stamp, msg)| {
            let e = Error::Acquisition(msg);
            (stamp, e.code(), e.to_string())
        })
    }

    fn newest_failure(&self) -> Option<Failure> {
        match (self.last_error.clone(), self.acquisition_failure()) {
            (Some(flat), Some(acq)) => Some(if acq.0 > flat.0 { acq } else { flat }),
            (flat, acq) => flat.or(acq),
        }
    }

    /// Keep the running session's failure before a restart discards it.
    fn harvest(&mut self) {
        self.last_error = self.newest_failure();
    }
}

fn global() -> MutexGuard<'static, Global> {
    static GLOBAL: OnceLock<Mutex<Global>> = OnceLock::new();
    GLOBAL
        .get_or_init(|| {
            Mutex::new(Global {
                session: Session::new(),
                source: device::default_source(),
                options: AcquisitionOptions::default(),
                last_error: None,
            })
        })
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

/// Receiver used by the next [`initialize`].
pub fn configure_source(source: SourceConfig) {
    global().source = source;
}

/// Acquisition tuning used by the next [`initialize`].
pub fn configure_acquisition(options: AcquisitionOptions) {
    global().options = options;
}

/// Whether [`initialize`] drives the simulated receiver rather than hardware.
pub fn is_simulated() -> bool {
    matches!(global().source, SourceConfig::Simulated { .. })
}

/// Start (or restart) the process-wide scan.
pub fn initialize(start: u32, end: u32, step: u32) -> Result<()> {
    let mut g = global();
    g.harvest();
    let config = ScanConfig::new(start, end, step);
    let (source, options) = (g.source.clone(), g.options.clone());
    if matches!(source, SourceConfig::Simulated { .. }) {
        warn!("Initialize: using the simulated receiver, bins are synthetic");
    }
    let result = g.session.initialize(config, &source, &options);
    if let Err(e) = &result {
        warn!("Initialize({}, {}, {}) failed: {}", start, end, step, e);
    }
    g.record(result)
}

/// Start (or restart) the process-wide scan on a receiver opened by the caller.
pub fn initialize_with_tuner(start: u32, end: u32, step: u32, tuner: Box<dyn Tuner>) -> Result<()> {
    let mut g = global();
    g.harvest();
    let config = ScanConfig::new(start, end, step);
    let options = g.options.clone();
    let result = g.session.initialize_with_tuner(config, tuner, &options);
    g.record(result)
}

/// Stop the process-wide scan.
pub fn shutdown() -> Result<()> {
    let mut g = global();
    g.harvest();
    let result = g.session.shutdown();
    g.record(result)
}

pub fn buffer_size() -> usize {
    global().session.buffer_size()
}

pub fn bins(out: &mut [f32]) -> Result<usize> {
    let mut g = global();
    let result = g.session.bins(out);
    g.record(result)
}

pub fn total_magnitude() -> Result<i32> {
    let mut g = global();
    let result = g.session.total_magnitude();
    g.record(result)
}

/// Toggle decibel scaling; returns whether decibel scaling was on before.
pub fn set_use_db(use_db: bool) -> bool {
    let mode = if use_db {
        ScalingMode::Decibel
    } else {
        ScalingMode::Linear
    };
    global().session.set_scaling(mode) == ScalingMode::Decibel
}

pub fn state() -> SessionState {
    global().session.state()
}

/// Code and message of the most recent failure, whether it came from a flat
/// call or ended the running acquisition.
pub fn last_error() -> Option<(i32, String)> {
    global()
        .newest_failure()
        .map(|(_, code, msg)| (code, msg))
}

/// Record a failure detected outside the engine, such as a bad pointer at the
/// C boundary. Returns its code.
pub fn record_failure(error: Error) -> i32 {
    let code = error.code();
    global().last_error = Some((error::next_failure_stamp(), code, error.to_string()));
    code
}

pub fn clear_last_error() {
    global().last_error = None;
}

/// Block until the process-wide scan has a full sweep.
pub fn wait_ready(timeout: Duration) -> Result<()> {
    // Waiting holds the global lock, which also keeps re-initialisation out
    let g = global();
    g.session.wait_ready(timeout)
}

/// Block until the process-wide acquisition thread has exited.
pub fn wait_stopped(timeout: Duration) -> Result<u64> {
    let g = global();
    g.session.wait_stopped(timeout)
}
