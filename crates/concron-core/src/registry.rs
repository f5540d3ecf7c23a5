//! Per-task set of live executions.
use std::collections::BTreeMap;

use concron_exec::KillSwitch;
use concron_model::ExecutionId;
use time::OffsetDateTime;

/// A live child process started for one invocation.
#[derive(Debug)]
pub struct Execution {
    id: ExecutionId,
    started_at: OffsetDateTime,
    pid: Option<u32>,
    kill: KillSwitch,
}

impl Execution {
    pub fn new(id: ExecutionId, pid: Option<u32>, kill: KillSwitch) -> Self {
        Self {
            id,
            started_at: OffsetDateTime::now_utc(),
            pid,
            kill,
        }
    }

    pub fn id(&self) -> ExecutionId {
        self.id
    }

    pub fn started_at(&self) -> OffsetDateTime {
        self.started_at
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Ask the process to die; the waiting controller removes the entry.
    pub fn stop(&self) {
        self.kill.kill();
    }

    pub fn info(&self) -> ExecutionInfo {
        ExecutionInfo {
            id: self.id,
            started_at: self.started_at,
            pid: self.pid,
            stopping: self.kill.is_killed(),
        }
    }
}

/// Read-only snapshot of an [`Execution`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionInfo {
    pub id: ExecutionId,
    pub started_at: OffsetDateTime,
    pub pid: Option<u32>,
    /// A kill was requested but the process has not been reaped yet.
    pub stopping: bool,
}

/// Executions of one task, keyed by id.
///
/// Not synchronized on its own; the owning task keeps it behind its lock.
#[derive(Debug, Default)]
pub struct ExecutionRegistry {
    executions: BTreeMap<ExecutionId, Execution>,
}

impl ExecutionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.executions.len()
    }

    /// Snapshot ordered by id.
    pub fn all(&self) -> Vec<ExecutionInfo> {
        self.executions.values().map(Execution::info).collect()
    }

    pub fn contains(&self, id: ExecutionId) -> bool {
        self.executions.contains_key(&id)
    }

    /// Insert an execution. Returns `false` (and keeps the existing entry) if the id is taken.
    pub fn insert(&mut self, exec: Execution) -> bool {
        if self.executions.contains_key(&exec.id) {
            return false;
        }
        self.executions.insert(exec.id, exec);
        true
    }

    pub fn remove(&mut self, id: ExecutionId) -> Option<Execution> {
        self.executions.remove(&id)
    }

    /// Kill every execution without removing it.
    ///
    /// Returns how many were newly signalled; executions already stopping are not counted.
    pub fn stop_all(&self) -> usize {
        self.executions
            .values()
            .filter(|exec| !exec.kill.is_killed())
            .inspect(|exec| exec.stop())
            .count()
    }
}
