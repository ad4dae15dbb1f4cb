/// Lifecycle of the scan session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    Uninitialized,
    /// Validating the configuration and claiming the receiver
    Initializing,
    /// Sweeping, no complete sweep committed yet
    Acquiring,
    /// At least one full sweep is in the bin buffer. Acquisition may still be running.
    Ready,
}

impl SessionState {
    pub fn is_ready(self) -> bool {
        self == SessionState::Ready
    }
}

/// How stored linear power is presented on read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ScalingMode {
    Linear,
    #[default]
    Decibel,
}

impl ScalingMode {
    /// Map the C-style integer flag: zero is linear, anything else decibel.
    pub fn from_flag(flag: i32) -> Self {
        if flag == 0 {
            ScalingMode::Linear
        } else {
            ScalingMode::Decibel
        }
    }

    pub fn as_flag(self) -> i32 {
        match self {
            ScalingMode::Linear => 0,
            ScalingMode::Decibel => 1,
        }
    }
}
