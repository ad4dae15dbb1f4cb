/// Events broadcast by the acquisition task to session subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Every hop of sweep number `sweep` (1-based) has been committed.
    SweepComplete { sweep: u64 },
    /// Acquisition stopped because of a receiver or processing failure.
    AcquisitionFailed(String),
    /// Acquisition ended normally (cancelled or sweep limit reached).
    Stopped { sweeps: u64 },
}
