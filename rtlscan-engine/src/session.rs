//! Device session manager and query facade.

use flume::{Receiver, Sender};
use log::{debug, error, info, warn};
use rtlscan_messages::{AcquisitionOptions, Event, ScalingMode, ScanConfig, SessionState, SourceConfig};
use rustradio::graph::CancellationToken;
use std::ops::Range;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use crate::acquisition::Acquisition;
use crate::device;
use crate::device::Tuner;
use crate::error::{self, Error, Result};
use crate::scaling;
use crate::spectrum::{BinBuffer, PowerSpectrum, SweepPlan};

type Subscribers = Arc<Mutex<Vec<Sender<Event>>>>;

/// State written by one acquisition task and read by callers.
struct ScanState {
    state: SessionState,
    bins: BinBuffer,
    sweeps: u64,
    running: bool,
    /// Failure stamp and message
    last_error: Option<(u64, String)>,
}

/// Shared between a session and its acquisition thread. Each initialisation
/// gets a fresh instance, so a stale thread can never write into a new buffer.
pub(crate) struct Shared {
    inner: Mutex<ScanState>,
    changed: Condvar,
    subscribers: Subscribers,
}

impl Shared {
    fn new(bin_count: usize, subscribers: Subscribers) -> Self {
        Self {
            inner: Mutex::new(ScanState {
                state: SessionState::Initializing,
                bins: BinBuffer::new(bin_count),
                sweeps: 0,
                running: true,
                last_error: None,
            }),
            changed: Condvar::new(),
            subscribers,
        }
    }

    fn lock(&self) -> MutexGuard<'_, ScanState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: SessionState) {
        self.lock().state = state;
    }

    pub(crate) fn commit_hop(&self, range: Range<usize>, values: &[f32]) {
        self.lock().bins.commit(range, values);
    }

    pub(crate) fn complete_sweep(&self, sweep: u64) {
        let mut scan = self.lock();
        scan.sweeps = sweep;
        scan.state = SessionState::Ready;
        drop(scan);
        self.changed.notify_all();
    }

    /// Mark the acquisition thread as gone. A failure before the first full
    /// sweep leaves nothing worth reading, so the session drops back to
    /// `Uninitialized`; a ready session keeps its last data.
    pub(crate) fn finish(&self, failure: Option<String>) {
        let mut scan = self.lock();
        scan.running = false;
        if failure.is_some() && scan.state != SessionState::Ready {
            scan.state = SessionState::Uninitialized;
        }
        scan.last_error = failure.map(|msg| (error::next_failure_stamp(), msg));
        drop(scan);
        self.changed.notify_all();
    }

    pub(crate) fn broadcast(&self, event: Event) {
        let mut subscribers = self.subscribers.lock().unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

struct ActiveScan {
    config: ScanConfig,
    shared: Arc<Shared>,
    cancel_token: CancellationToken,
    /// Disconnects when the acquisition thread exits
    done_rx: Receiver<()>,
    handle: thread::JoinHandle<()>,
    teardown_timeout: Duration,
}

/// A single scan session: configuration, bin buffer, scaling mode and the
/// acquisition thread feeding it.
///
/// Queries take `&self` and only hold the buffer lock long enough to copy it.
/// `initialize` and `shutdown` take `&mut self`; each initialisation is a hard
/// reset that stops and joins the previous acquisition first.
pub struct Session {
    scaling: Mutex<ScalingMode>,
    subscribers: Subscribers,
    active: Option<ActiveScan>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            scaling: Mutex::new(ScalingMode::default()),
            subscribers: Arc::new(Mutex::new(Vec::new())),
            active: None,
        }
    }

    /// Validate `config`, stop any running scan, claim the receiver and start
    /// sweeping.
    pub fn initialize(
        &mut self,
        config: ScanConfig,
        source: &SourceConfig,
        options: &AcquisitionOptions,
    ) -> Result<()> {
        config.validate().map_err(Error::InvalidConfiguration)?;
        info!(
            "Initializing scan {}..{} step {} ({} bins)",
            config.start,
            config.end,
            config.step,
            config.bin_count()
        );

        self.teardown()?;

        let tuner = device::open(source)?;
        self.start(config, tuner, options)
    }

    /// Like [`initialize`](Self::initialize), driving a receiver the caller
    /// has already opened.
    pub fn initialize_with_tuner(
        &mut self,
        config: ScanConfig,
        tuner: Box<dyn Tuner>,
        options: &AcquisitionOptions,
    ) -> Result<()> {
        config.validate().map_err(Error::InvalidConfiguration)?;
        info!(
            "Initializing scan {}..{} step {} on a caller-supplied receiver",
            config.start, config.end, config.step
        );
        self.teardown()?;
        self.start(config, tuner, options)
    }

    fn start(
        &mut self,
        config: ScanConfig,
        tuner: Box<dyn Tuner>,
        options: &AcquisitionOptions,
    ) -> Result<()> {
        let plan = SweepPlan::new(&config, tuner.sample_rate(), options)?;
        plan.check_tunable(&tuner.frequency_range())?;
        debug!(
            "Sweep plan: {} hop(s), FFT size {}",
            plan.hops().len(),
            plan.fft_size()
        );

        let shared = Arc::new(Shared::new(plan.bin_count(), Arc::clone(&self.subscribers)));
        let cancel_token = CancellationToken::new();
        let (done_tx, done_rx) = flume::bounded::<()>(1);

        let acquisition = Acquisition {
            spectrum: PowerSpectrum::new(plan.fft_size(), options.window),
            tuner,
            plan,
            fft_averages: options.fft_averages,
            sweep_limit: options.sweep_limit,
            shared: Arc::clone(&shared),
            cancel_token: cancel_token.clone(),
        };

        shared.set_state(SessionState::Acquiring);
        let handle = thread::Builder::new()
            .name("rtlscan-acquisition".to_string())
            .spawn(move || {
                let _done = done_tx;
                acquisition.run();
            })?;

        self.active = Some(ActiveScan {
            config,
            shared,
            cancel_token,
            done_rx,
            handle,
            teardown_timeout: options.teardown_timeout,
        });
        Ok(())
    }

    /// Stop acquisition and release the receiver and buffer.
    pub fn shutdown(&mut self) -> Result<()> {
        self.teardown()?;
        info!("Session shut down");
        Ok(())
    }

    fn teardown(&mut self) -> Result<()> {
        let Some(active) = self.active.take() else {
            return Ok(());
        };
        debug!("Stopping acquisition");
        active.cancel_token.cancel();

        match active.done_rx.recv_timeout(active.teardown_timeout) {
            Err(flume::RecvTimeoutError::Timeout) => {
                // The thread keeps its own buffer; dropping the handle detaches it
                warn!(
                    "Acquisition did not release the receiver within {:?}",
                    active.teardown_timeout
                );
                return Err(Error::TeardownTimeout(active.teardown_timeout));
            }
            Ok(()) | Err(flume::RecvTimeoutError::Disconnected) => {}
        }

        if active.handle.join().is_err() {
            error!("Acquisition thread panicked");
        }
        Ok(())
    }

    pub fn state(&self) -> SessionState {
        match &self.active {
            Some(active) => active.shared.lock().state,
            None => SessionState::Uninitialized,
        }
    }

    pub fn config(&self) -> Option<ScanConfig> {
        self.active.as_ref().map(|active| active.config)
    }

    /// Number of bins, known as soon as `initialize` succeeds. Zero without a session.
    pub fn buffer_size(&self) -> usize {
        match &self.active {
            Some(active) => {
                let scan = active.shared.lock();
                if scan.state == SessionState::Uninitialized {
                    0
                } else {
                    scan.bins.len()
                }
            }
            None => 0,
        }
    }

    /// Copy the scaled bins into `out`, which must hold at least
    /// [`buffer_size`](Self::buffer_size) values. Returns the number written.
    pub fn bins(&self, out: &mut [f32]) -> Result<usize> {
        let mode = self.scaling();
        let active = self.active.as_ref().ok_or(Error::SessionNotReady)?;

        let n = {
            let scan = active.shared.lock();
            if !scan.state.is_ready() {
                return Err(Error::SessionNotReady);
            }
            let n = scan.bins.len();
            if out.len() < n {
                return Err(Error::BufferTooSmall {
                    needed: n,
                    provided: out.len(),
                });
            }
            out[..n].copy_from_slice(scan.bins.as_slice());
            n
        };

        scaling::scale_in_place(mode, &mut out[..n]);
        Ok(n)
    }

    pub fn bins_vec(&self) -> Result<Vec<f32>> {
        let mut out = vec![0.0; self.buffer_size()];
        let n = self.bins(&mut out)?;
        out.truncate(n);
        Ok(out)
    }

    /// Sum of the bins under the active scaling mode.
    pub fn total_magnitude(&self) -> Result<i32> {
        Ok(scaling::total_magnitude(&self.bins_vec()?))
    }

    pub fn scaling(&self) -> ScalingMode {
        *self.scaling.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Switch the read-time transform. Stored data is untouched. Returns the
    /// previous mode.
    pub fn set_scaling(&self, mode: ScalingMode) -> ScalingMode {
        let mut current = self.scaling.lock().unwrap_or_else(PoisonError::into_inner);
        let previous = *current;
        *current = mode;
        if previous != mode {
            debug!("Scaling mode {:?} -> {:?}", previous, mode);
        }
        previous
    }

    pub fn sweeps_completed(&self) -> u64 {
        self.active
            .as_ref()
            .map_or(0, |active| active.shared.lock().sweeps)
    }

    /// Whether the acquisition thread is still running.
    pub fn is_acquiring(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|active| active.shared.lock().running)
    }

    /// Failure that ended the current acquisition, if any.
    pub fn last_error(&self) -> Option<String> {
        self.last_failure().map(|(_, msg)| msg)
    }

    pub(crate) fn last_failure(&self) -> Option<(u64, String)> {
        self.active
            .as_ref()
            .and_then(|active| active.shared.lock().last_error.clone())
    }

    /// Block until the first full sweep is in the buffer.
    pub fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let active = self.active.as_ref().ok_or(Error::SessionNotReady)?;
        let scan = active.shared.lock();
        let (scan, _) = active
            .shared
            .changed
            .wait_timeout_while(scan, timeout, |s| !s.state.is_ready() && s.running)
            .unwrap_or_else(PoisonError::into_inner);

        if scan.state.is_ready() {
            Ok(())
        } else if let Some((_, err)) = &scan.last_error {
            Err(Error::Acquisition(err.clone()))
        } else {
            Err(Error::SessionNotReady)
        }
    }

    /// Block until the acquisition thread has exited (sweep limit reached or
    /// failure). Returns the number of completed sweeps.
    pub fn wait_stopped(&self, timeout: Duration) -> Result<u64> {
        let active = self.active.as_ref().ok_or(Error::SessionNotReady)?;
        let scan = active.shared.lock();
        let (scan, result) = active
            .shared
            .changed
            .wait_timeout_while(scan, timeout, |s| s.running)
            .unwrap_or_else(PoisonError::into_inner);

        if result.timed_out() && scan.running {
            return Err(Error::TeardownTimeout(timeout));
        }
        match &scan.last_error {
            Some((_, err)) => Err(Error::Acquisition(err.clone())),
            None => Ok(scan.sweeps),
        }
    }

    /// Receive acquisition events for this and all later initialisations.
    pub fn subscribe(&self) -> Receiver<Event> {
        let (tx, rx) = flume::unbounded();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Err(e) = self.teardown() {
            warn!("Session dropped without a clean shutdown: {}", e);
        }
    }
}
