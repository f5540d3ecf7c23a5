use std::fmt;

use serde::{Deserialize, Serialize};

/// Sequence number of one execution, unique within its task.
///
/// Ids start at 1 and grow by one for every started invocation, including
/// those that fail to spawn; they are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionId(u64);

impl ExecutionId {
    #[inline]
    pub fn new(seq: u64) -> Self {
        Self(seq)
    }

    #[inline]
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ExecutionId {
    fn from(seq: u64) -> Self {
        Self(seq)
    }
}
