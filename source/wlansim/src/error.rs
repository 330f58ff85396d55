use core::fmt;

/// Errors that end a simulation run.
///
/// Ring-level `Full` and `Empty` conditions are expected steady-state events
/// and never show up here.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum SimError {
    /// A task needed a packet buffer and the pool was exhausted.
    OutOfPackets { capacity: usize },
    /// An internal consistency check failed.
    Invariant(&'static str),
    /// The settings can't describe a runnable simulation.
    InvalidConfig(&'static str),
    /// A task panicked or was torn down unexpectedly.
    TaskFailed(String),
}

impl fmt::Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfPackets { capacity } => {
                write!(f, "packet allocation failed (pool capacity {capacity})")
            }
            Self::Invariant(what) => write!(f, "consistency check failed: {what}"),
            Self::InvalidConfig(what) => write!(f, "invalid settings: {what}"),
            Self::TaskFailed(why) => write!(f, "simulation task failed: {why}"),
        }
    }
}

impl std::error::Error for SimError {}
