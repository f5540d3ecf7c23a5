//! One invocation of a task, from the policy decision to the logged outcome.
use concron_exec::CapturedOutput;
use concron_model::{ExecutionId, Outcome};
use tracing::{debug, error, info, warn};

use crate::{
    policy::{Decision, decide},
    registry::Execution,
    task::Task,
};

/// How an invocation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    /// Refused by a `Forbid` policy; nothing was started.
    Refused { running: usize },
    /// The process could not be spawned; nothing was registered.
    StartFailed { id: ExecutionId, reason: String },
    /// The process ran and terminated.
    Finished { id: ExecutionId, outcome: Outcome },
}

impl Invocation {
    pub fn id(&self) -> Option<ExecutionId> {
        match self {
            Invocation::Refused { .. } => None,
            Invocation::StartFailed { id, .. } | Invocation::Finished { id, .. } => Some(*id),
        }
    }

    pub fn outcome(&self) -> Option<&Outcome> {
        match self {
            Invocation::Finished { outcome, .. } => Some(outcome),
            _ => None,
        }
    }
}

impl Task {
    /// Run one invocation of this task to completion.
    ///
    /// The policy decision, the kill of replaced executions, the spawn and the
    /// registration happen under the task lock. Waiting does not.
    pub async fn run(&self) -> Invocation {
        let (id, handle) = {
            let mut slot = self.slot.lock();
            let running = slot.registry.count();

            match decide(self.policy(), running) {
                Decision::Refuse => {
                    slot.stats.refused += 1;
                    info!(
                        target: "concron.core.controller",
                        task = %self.name(), running,
                        "cannot run, another {running} running executions"
                    );
                    return Invocation::Refused { running };
                }
                Decision::ReplaceRunning => {
                    info!(
                        target: "concron.core.controller",
                        task = %self.name(), running,
                        "found {running} running executions, cleaning"
                    );
                    let stopped = slot.registry.stop_all();
                    slot.stats.replaced += stopped as u64;
                }
                Decision::Start => {}
            }

            slot.counter += 1;
            let id = ExecutionId::new(slot.counter);

            let handle = match concron_exec::spawn(self.proc()) {
                Ok(handle) => handle,
                Err(e) => {
                    slot.stats.start_failures += 1;
                    error!(
                        target: "concron.core.controller",
                        task = %self.name(), exec = %id, error = %e,
                        "cannot start"
                    );
                    return Invocation::StartFailed {
                        id,
                        reason: e.to_string(),
                    };
                }
            };

            slot.stats.started += 1;
            slot.registry
                .insert(Execution::new(id, handle.pid(), handle.kill_switch()));
            (id, handle)
        };

        info!(
            target: "concron.core.controller",
            task = %self.name(), exec = %id, pid = ?handle.pid(),
            "started"
        );

        let exit = handle.wait().await;
        self.slot.lock().registry.remove(id);

        log_outcome(self.name(), id, &exit.outcome, &exit.output);
        Invocation::Finished {
            id,
            outcome: exit.outcome,
        }
    }
}

fn log_outcome(task: &str, id: ExecutionId, outcome: &Outcome, output: &CapturedOutput) {
    match outcome {
        Outcome::Success => {
            info!(target: "concron.core.controller", task, exec = %id, "{outcome}");
            debug!(target: "concron.core.controller", task, exec = %id, output = %output, "output");
        }
        Outcome::Failure(_) => {
            warn!(target: "concron.core.controller", task, exec = %id, output = %output, "{outcome}");
        }
        Outcome::Killed | Outcome::TimedOut => {
            info!(target: "concron.core.controller", task, exec = %id, output = %output, "{outcome}");
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::{sync::Arc, time::Duration};

    use concron_exec::ProcConfig;
    use concron_model::{ConcurrencyPolicy, ExitDetail};

    fn sh(name: &str, policy: ConcurrencyPolicy, script: &str) -> Arc<Task> {
        let mut proc = ProcConfig::new("/bin/sh", vec!["-c".into(), script.into()]);
        proc.env.push("PATH", std::env::var("PATH").unwrap_or_default());
        Arc::new(Task::new(name, "@every 1s", policy, proc))
    }

    async fn until_running(task: &Task, n: usize) {
        for _ in 0..200 {
            if task.running() >= n {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("task {} never reached {n} running executions", task.name());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn success_is_removed_from_registry() {
        let task = sh("echo", ConcurrencyPolicy::Allow, "echo hello");

        let inv = task.run().await;
        assert_eq!(
            inv,
            Invocation::Finished {
                id: ExecutionId::new(1),
                outcome: Outcome::Success
            }
        );
        assert_eq!(task.running(), 0);
        assert_eq!(task.stats().started, 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn forbid_refuses_while_running() {
        let task = sh("build", ConcurrencyPolicy::Forbid, "sleep 30");

        let first = tokio::spawn({
            let task = Arc::clone(&task);
            async move { task.run().await }
        });
        until_running(&task, 1).await;

        let second = task.run().await;
        assert_eq!(second, Invocation::Refused { running: 1 });
        assert_eq!(task.running(), 1);
        assert_eq!(task.stats().refused, 1);
        assert_eq!(task.last_execution_id(), Some(ExecutionId::new(1)));

        task.stop_all();
        let first = first.await.unwrap();
        assert_eq!(first.outcome(), Some(&Outcome::Killed));
        assert_eq!(task.running(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn allow_runs_alongside() {
        let task = sh("fanout", ConcurrencyPolicy::Allow, "sleep 1");

        let runs: Vec<_> = (0..3)
            .map(|_| {
                let task = Arc::clone(&task);
                tokio::spawn(async move { task.run().await })
            })
            .collect();
        until_running(&task, 3).await;

        let ids: Vec<u64> = task.executions().iter().map(|e| e.id.get()).collect();
        assert_eq!(ids, vec![1, 2, 3]);

        for run in runs {
            assert_eq!(run.await.unwrap().outcome(), Some(&Outcome::Success));
        }
        assert_eq!(task.running(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn replace_kills_previous() {
        let task = sh("deploy", ConcurrencyPolicy::Replace, "sleep 30");

        let first = tokio::spawn({
            let task = Arc::clone(&task);
            async move { task.run().await }
        });
        until_running(&task, 1).await;

        let second = tokio::spawn({
            let task = Arc::clone(&task);
            async move { task.run().await }
        });

        let first = first.await.unwrap();
        assert_eq!(first.outcome(), Some(&Outcome::Killed));

        until_running(&task, 1).await;
        let live = task.executions();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].id, ExecutionId::new(2));
        assert_eq!(task.stats().replaced, 1);

        task.stop_all();
        let second = second.await.unwrap();
        assert_eq!(second.id(), Some(ExecutionId::new(2)));
        assert_eq!(task.running(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn start_failure_registers_nothing() {
        let proc = ProcConfig::new("/nonexistent/concron-test-binary", vec![]);
        let task = Task::new("ghost", "@every 1s", ConcurrencyPolicy::Forbid, proc);

        let first = task.run().await;
        assert!(matches!(first, Invocation::StartFailed { id, .. } if id == ExecutionId::new(1)));
        assert_eq!(task.running(), 0);

        let second = task.run().await;
        assert_eq!(second.id(), Some(ExecutionId::new(2)));
        assert_eq!(task.stats().start_failures, 2);
        assert_eq!(task.stats().started, 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failure_does_not_block_next_run() {
        let task = sh("flaky", ConcurrencyPolicy::Forbid, "exit 1");

        let first = task.run().await;
        assert_eq!(
            first.outcome(),
            Some(&Outcome::Failure(ExitDetail::Code(1)))
        );

        let second = task.run().await;
        assert_eq!(second.id(), Some(ExecutionId::new(2)));
        assert_eq!(task.running(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn deadline_times_out() {
        let task = sh("slow", ConcurrencyPolicy::Allow, "sleep 30");
        let mut proc = task.proc().clone();
        proc.deadline = Some(Duration::from_millis(200));
        let task = Task::new("slow", "@every 1s", ConcurrencyPolicy::Allow, proc);

        let inv = task.run().await;
        assert_eq!(inv.outcome(), Some(&Outcome::TimedOut));
        assert_eq!(task.running(), 0);
    }
}
