use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::ModelError;

/// Rule governing whether overlapping invocations of one task may coexist.
///
/// - `Allow`: start a new invocation even if others are running.
/// - `Forbid`: refuse the new invocation while any other is running.
/// - `Replace`: kill every running invocation, then start the new one without waiting for them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConcurrencyPolicy {
    #[default]
    Allow,
    Forbid,
    Replace,
}

impl ConcurrencyPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConcurrencyPolicy::Allow => "Allow",
            ConcurrencyPolicy::Forbid => "Forbid",
            ConcurrencyPolicy::Replace => "Replace",
        }
    }
}

impl FromStr for ConcurrencyPolicy {
    type Err = ModelError;

    /// Parses the document value; an empty string means the default (`Allow`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "Allow" => Ok(ConcurrencyPolicy::Allow),
            "Forbid" => Ok(ConcurrencyPolicy::Forbid),
            "Replace" => Ok(ConcurrencyPolicy::Replace),
            other => Err(ModelError::InvalidPolicy(other.to_string())),
        }
    }
}

impl fmt::Display for ConcurrencyPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
