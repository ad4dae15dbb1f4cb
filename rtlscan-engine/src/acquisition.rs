//! The background sweep loop. Sole writer of a session's bin buffer.

use log::{debug, error, info};
use num_complex::Complex;
use rtlscan_messages::Event;
use rustradio::graph::CancellationToken;
use std::sync::Arc;
use std::time::Instant;

use crate::device::Tuner;
use crate::error::Result;
use crate::session::Shared;
use crate::spectrum::{PowerSpectrum, SweepPlan};

pub(crate) struct Acquisition {
    pub tuner: Box<dyn Tuner>,
    pub plan: SweepPlan,
    pub spectrum: PowerSpectrum,
    pub fft_averages: usize,
    pub sweep_limit: Option<u64>,
    pub shared: Arc<Shared>,
    pub cancel_token: CancellationToken,
}

impl Acquisition {
    /// Run until cancelled, the sweep limit is reached, or the receiver fails.
    /// The outcome is recorded in the shared state; the tuner is dropped on return.
    pub fn run(mut self) {
        let shared = Arc::clone(&self.shared);
        match self.sweep() {
            Ok(sweeps) => {
                info!("Acquisition stopped after {} sweep(s)", sweeps);
                shared.finish(None);
                shared.broadcast(Event::Stopped { sweeps });
            }
            Err(e) => {
                error!("Acquisition failed: {}", e);
                let msg = e.to_string();
                shared.finish(Some(msg.clone()));
                shared.broadcast(Event::AcquisitionFailed(msg));
            }
        }
    }

    fn sweep(&mut self) -> Result<u64> {
        let mut frame = vec![Complex::new(0.0, 0.0); self.spectrum.fft_size()];
        let mut sweeps = 0;

        loop {
            let started = Instant::now();
            for hop in self.plan.hops() {
                self.tuner.tune(hop.center)?;

                for _ in 0..self.fft_averages {
                    if self.cancel_token.is_canceled() {
                        return Ok(sweeps);
                    }
                    self.tuner.read_block(&mut frame)?;
                    self.spectrum.accumulate(&frame);
                }

                // Reduce outside the lock, hold it only for the copy
                let values = hop.reduce(&self.spectrum.finish());
                self.shared.commit_hop(hop.bins.clone(), &values);
            }

            sweeps += 1;
            debug!(
                "Sweep {} done: {} hop(s) in {:?}",
                sweeps,
                self.plan.hops().len(),
                started.elapsed()
            );
            self.shared.complete_sweep(sweeps);
            self.shared.broadcast(Event::SweepComplete { sweep: sweeps });

            if self.sweep_limit.is_some_and(|limit| sweeps >= limit) {
                return Ok(sweeps);
            }
            if self.cancel_token.is_canceled() {
                return Ok(sweeps);
            }
        }
    }
}
