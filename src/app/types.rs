/// Component lifecycle states, tracked for diagnostics and orderly shutdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComponentState {
    Stopped,
    Starting,
    Running,
    Stopping,
    Failed,
}

/// Why the daemon is shutting down.
#[derive(Debug, Clone)]
pub enum ShutdownReason {
    Signal(String),
    Error(String),
    UserRequest,
    Stall,
}
