//! Concurrency policy enforcement.
use concron_model::ConcurrencyPolicy;

/// What to do with a new invocation, given what is already running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Start the new invocation; anything running keeps running.
    Start,
    /// Do not start; the invocation ends here.
    Refuse,
    /// Kill every running execution without waiting, then start.
    ReplaceRunning,
}

/// Decide the fate of a new invocation for a task with `running` live executions.
pub fn decide(policy: ConcurrencyPolicy, running: usize) -> Decision {
    if running == 0 {
        return Decision::Start;
    }
    match policy {
        ConcurrencyPolicy::Allow => Decision::Start,
        ConcurrencyPolicy::Forbid => Decision::Refuse,
        ConcurrencyPolicy::Replace => Decision::ReplaceRunning,
    }
}
