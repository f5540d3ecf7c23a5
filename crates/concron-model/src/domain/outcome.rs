use std::fmt;

use serde::{Deserialize, Serialize};

/// Why a process ended without success.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExitDetail {
    /// Process exited with a non-zero code.
    Code(i32),
    /// Process was terminated by a signal it did not receive from us.
    Signal(i32),
    /// Waiting on the process failed.
    Wait(String),
}

impl fmt::Display for ExitDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitDetail::Code(code) => write!(f, "exit code: {code}"),
            ExitDetail::Signal(sig) => write!(f, "terminated by signal {sig}"),
            ExitDetail::Wait(reason) => write!(f, "wait failed: {reason}"),
        }
    }
}

/// Terminal outcome of one execution, produced exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Outcome {
    /// Process exited with status zero.
    Success,
    /// Process ran and exited unsuccessfully.
    Failure(ExitDetail),
    /// Process was killed on request (e.g. replaced by a newer invocation).
    Killed,
    /// Process was killed because its deadline expired.
    TimedOut,
}

impl Outcome {
    #[inline]
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }

    /// Returns `true` if the process was terminated by us rather than exiting on its own.
    #[inline]
    pub fn is_kill(&self) -> bool {
        matches!(self, Outcome::Killed | Outcome::TimedOut)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Success => f.write_str("SUCCESS"),
            Outcome::Failure(detail) => write!(f, "ERROR ({detail})"),
            Outcome::Killed => f.write_str("KILLED"),
            Outcome::TimedOut => f.write_str("TIMED OUT"),
        }
    }
}
