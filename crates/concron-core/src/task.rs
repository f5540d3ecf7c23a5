use std::{path::Path, time::Duration};

use concron_exec::ProcConfig;
use concron_model::{ConcurrencyPolicy, ExecutionId, ModelError, TaskDefinition, TaskEnv};
use parking_lot::Mutex;

use crate::registry::{ExecutionInfo, ExecutionRegistry};

/// Runtime form of a [`TaskDefinition`].
///
/// Command line and environment are resolved once at construction. The execution
/// counter and the registry live behind one lock, so a whole
/// decide / start-or-kill / register step is atomic for the task.
#[derive(Debug)]
pub struct Task {
    name: String,
    schedule: String,
    policy: ConcurrencyPolicy,
    proc: ProcConfig,
    pub(crate) slot: Mutex<Slot>,
}

#[derive(Debug, Default)]
pub(crate) struct Slot {
    pub(crate) counter: u64,
    pub(crate) registry: ExecutionRegistry,
    pub(crate) stats: TaskStats,
}

/// Invocation counters since the task was loaded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskStats {
    /// Invocations that spawned a process.
    pub started: u64,
    /// Invocations refused by a `Forbid` policy.
    pub refused: u64,
    /// Invocations whose process could not be spawned.
    pub start_failures: u64,
    /// Executions killed to make room for a newer one.
    pub replaced: u64,
}

impl Task {
    pub fn new(
        name: impl Into<String>,
        schedule: impl Into<String>,
        policy: ConcurrencyPolicy,
        proc: ProcConfig,
    ) -> Self {
        Self {
            name: name.into(),
            schedule: schedule.into(),
            policy,
            proc,
            slot: Mutex::new(Slot::default()),
        }
    }

    /// Build a task from its document form.
    ///
    /// `env` is the daemon environment captured at load time: inherited as a whole
    /// when the task asks for it, reduced to `PATH` otherwise.
    pub fn from_definition(
        def: &TaskDefinition,
        shell: &str,
        env: &TaskEnv,
    ) -> Result<Self, ModelError> {
        let policy = def.validate()?;
        let (program, args) = resolve_command(def, shell);

        let proc = ProcConfig {
            program,
            args,
            env: if def.inherits_env() {
                env.clone()
            } else {
                env.only("PATH")
            },
            cwd: def.dir.clone().filter(|d| !d.as_os_str().is_empty()),
            deadline: def.deadline(),
            ..Default::default()
        };

        Ok(Self::new(&def.name, &def.crontab, policy, proc))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schedule(&self) -> &str {
        &self.schedule
    }

    pub fn policy(&self) -> ConcurrencyPolicy {
        self.policy
    }

    pub fn program(&self) -> &str {
        &self.proc.program
    }

    pub fn args(&self) -> &[String] {
        &self.proc.args
    }

    pub fn env(&self) -> &TaskEnv {
        &self.proc.env
    }

    pub fn dir(&self) -> Option<&Path> {
        self.proc.cwd.as_deref()
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.proc.deadline
    }

    pub(crate) fn proc(&self) -> &ProcConfig {
        &self.proc
    }

    /// Number of live executions.
    pub fn running(&self) -> usize {
        self.slot.lock().registry.count()
    }

    pub fn executions(&self) -> Vec<ExecutionInfo> {
        self.slot.lock().registry.all()
    }

    /// Id handed to the most recent invocation, if any was started.
    pub fn last_execution_id(&self) -> Option<ExecutionId> {
        let counter = self.slot.lock().counter;
        (counter > 0).then(|| ExecutionId::new(counter))
    }

    pub fn stats(&self) -> TaskStats {
        self.slot.lock().stats
    }

    /// Kill every live execution. Returns how many were signalled.
    pub fn stop_all(&self) -> usize {
        self.slot.lock().registry.stop_all()
    }
}

/// Executable and argument vector for a definition.
///
/// With a shell configured and `useShell` set, the command and its arguments are
/// joined into a single `-c` script; otherwise they are executed directly.
fn resolve_command(def: &TaskDefinition, shell: &str) -> (String, Vec<String>) {
    if shell.is_empty() || !def.use_shell {
        return (def.command.clone(), def.args.clone());
    }

    let mut script = def.command.clone();
    for arg in &def.args {
        script.push(' ');
        script.push_str(arg);
    }
    (shell.to_string(), vec!["-c".to_string(), script])
}
