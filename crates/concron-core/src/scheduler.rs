//! Cron-driven firing of tasks.
//!
//! Each registered task gets one driver future that sleeps until the next matching
//! instant and then spawns the task's controller. The driver never waits for the
//! previous firing, so firings of one task may overlap; the task's policy decides
//! what overlapping means.
use std::{sync::Arc, time::Duration};

use parking_lot::Mutex;
use time::{OffsetDateTime, UtcOffset};
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::{
    cron::CronExpr,
    error::CoreError,
    task::Task,
    zone::{FixedZone, LocalZone, Zone},
};

#[derive(Debug)]
struct Entry {
    task: Arc<Task>,
    expr: CronExpr,
}

#[derive(Debug)]
enum State {
    Stopped,
    Running { token: CancellationToken, rt: Handle },
}

/// Holds every task together with its parsed schedule.
#[derive(Debug)]
pub struct Scheduler {
    zone: Arc<dyn Zone>,
    // lock order: `state` before `entries`
    state: Mutex<State>,
    entries: Mutex<Vec<Arc<Entry>>>,
}

impl Scheduler {
    /// Scheduler evaluating expressions in the system time zone, following its
    /// daylight saving changes.
    pub fn new() -> Self {
        Self::with_zone(LocalZone)
    }

    /// Scheduler evaluating expressions at a fixed offset.
    pub fn with_offset(offset: UtcOffset) -> Self {
        Self::with_zone(FixedZone(offset))
    }

    pub fn with_zone(zone: impl Zone) -> Self {
        Self {
            zone: Arc::new(zone),
            state: Mutex::new(State::Stopped),
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Register tasks.
    ///
    /// Every schedule is parsed before anything is registered; one malformed
    /// expression rejects the whole batch. Tasks added to a running scheduler start
    /// firing immediately.
    pub fn add_tasks<I>(&self, tasks: I) -> Result<(), CoreError>
    where
        I: IntoIterator<Item = Task>,
    {
        let mut batch = Vec::new();
        for task in tasks {
            let expr = CronExpr::parse(task.schedule()).map_err(|source| CoreError::Schedule {
                task: task.name().to_string(),
                expr: task.schedule().to_string(),
                source,
            })?;
            batch.push(Arc::new(Entry {
                task: Arc::new(task),
                expr,
            }));
        }

        let state = self.state.lock();
        if let State::Running { token, rt } = &*state {
            for entry in &batch {
                rt.spawn(drive(Arc::clone(entry), Arc::clone(&self.zone), token.clone()));
            }
        }
        for entry in &batch {
            debug!(
                target: "concron.core.scheduler",
                task = %entry.task.name(), schedule = %entry.expr,
                "task registered"
            );
        }
        self.entries.lock().extend(batch);
        Ok(())
    }

    /// Begin firing. Must be called within a Tokio runtime.
    pub fn start(&self) -> Result<(), CoreError> {
        let mut state = self.state.lock();
        if matches!(*state, State::Running { .. }) {
            return Err(CoreError::AlreadyStarted);
        }
        let rt = Handle::try_current().map_err(|_| CoreError::NoRuntime)?;
        let token = CancellationToken::new();

        let entries = self.entries.lock();
        for entry in entries.iter() {
            rt.spawn(drive(Arc::clone(entry), Arc::clone(&self.zone), token.clone()));
        }
        info!(target: "concron.core.scheduler", tasks = entries.len(), "scheduler started");

        *state = State::Running { token, rt };
        Ok(())
    }

    /// Stop firing. Executions already running are left alone; see [`Scheduler::kill_running`].
    pub fn stop(&self) -> Result<(), CoreError> {
        let mut state = self.state.lock();
        match std::mem::replace(&mut *state, State::Stopped) {
            State::Stopped => Err(CoreError::NotRunning),
            State::Running { token, .. } => {
                token.cancel();
                info!(target: "concron.core.scheduler", "scheduler stopped");
                Ok(())
            }
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(*self.state.lock(), State::Running { .. })
    }

    /// Registered tasks in registration order.
    pub fn tasks(&self) -> Vec<Arc<Task>> {
        self.entries
            .lock()
            .iter()
            .map(|e| Arc::clone(&e.task))
            .collect()
    }

    pub fn task(&self, name: &str) -> Option<Arc<Task>> {
        self.entries
            .lock()
            .iter()
            .find(|e| e.task.name() == name)
            .map(|e| Arc::clone(&e.task))
    }

    /// Live executions across all tasks.
    pub fn running(&self) -> usize {
        self.tasks().iter().map(|t| t.running()).sum()
    }

    /// Kill every live execution of every task. Returns how many were signalled.
    pub fn kill_running(&self) -> usize {
        self.tasks().iter().map(|t| t.stop_all()).sum()
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

async fn drive(entry: Arc<Entry>, zone: Arc<dyn Zone>, token: CancellationToken) {
    let name = entry.task.name();
    let mut last = OffsetDateTime::now_utc();

    loop {
        // never compute from before the previous firing, or it fires twice
        let from = last.max(OffsetDateTime::now_utc());
        let Some(next) = entry.expr.next_in(from, zone.as_ref()) else {
            warn!(target: "concron.core.scheduler", task = %name, schedule = %entry.expr, "schedule never fires again");
            return;
        };
        trace!(target: "concron.core.scheduler", task = %name, next = %next, "next firing");

        let wait = Duration::try_from(next - OffsetDateTime::now_utc()).unwrap_or(Duration::ZERO);
        tokio::select! {
            biased;
            _ = token.cancelled() => return,
            _ = tokio::time::sleep(wait) => {}
        }
        last = next;

        debug!(target: "concron.core.scheduler", task = %name, "firing");
        let task = Arc::clone(&entry.task);
        tokio::spawn(async move {
            task.run().await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use concron_exec::ProcConfig;
    use concron_model::ConcurrencyPolicy;

    fn task(name: &str, schedule: &str, policy: ConcurrencyPolicy, script: &str) -> Task {
        let mut proc = ProcConfig::new("/bin/sh", vec!["-c".into(), script.into()]);
        proc.env.push("PATH", std::env::var("PATH").unwrap_or_default());
        Task::new(name, schedule, policy, proc)
    }

    fn scheduler() -> Scheduler {
        Scheduler::with_offset(UtcOffset::UTC)
    }

    #[test]
    fn malformed_schedule_registers_nothing() {
        let s = scheduler();
        let err = s
            .add_tasks([
                task("good", "@hourly", ConcurrencyPolicy::Allow, "true"),
                task("bad", "61 * * * * *", ConcurrencyPolicy::Allow, "true"),
            ])
            .unwrap_err();

        assert!(matches!(err, CoreError::Schedule { ref task, .. } if task == "bad"));
        assert!(s.tasks().is_empty());
    }

    #[test]
    fn start_requires_runtime() {
        let s = scheduler();
        assert!(matches!(s.start(), Err(CoreError::NoRuntime)));
        assert!(!s.is_running());
    }

    #[tokio::test]
    async fn start_and_stop_guards() {
        let s = scheduler();
        s.add_tasks([task("idle", "@yearly", ConcurrencyPolicy::Allow, "true")])
            .unwrap();

        assert!(matches!(s.stop(), Err(CoreError::NotRunning)));
        s.start().unwrap();
        assert!(s.is_running());
        assert!(matches!(s.start(), Err(CoreError::AlreadyStarted)));

        s.stop().unwrap();
        assert!(!s.is_running());
        assert!(matches!(s.stop(), Err(CoreError::NotRunning)));

        s.start().unwrap();
        s.stop().unwrap();
    }

    #[test]
    fn task_lookup() {
        let s = scheduler();
        s.add_tasks([
            task("a", "@hourly", ConcurrencyPolicy::Allow, "true"),
            task("b", "@daily", ConcurrencyPolicy::Forbid, "true"),
        ])
        .unwrap();

        let names: Vec<_> = s.tasks().iter().map(|t| t.name().to_string()).collect();
        assert_eq!(names, ["a", "b"]);
        assert_eq!(s.task("b").map(|t| t.policy()), Some(ConcurrencyPolicy::Forbid));
        assert!(s.task("c").is_none());
    }

    #[cfg(unix)]
    #[tokio::test(flavor = "multi_thread")]
    async fn fires_on_schedule() {
        let s = scheduler();
        s.add_tasks([task("tick", "@every 1s", ConcurrencyPolicy::Allow, "true")])
            .unwrap();
        s.start().unwrap();

        tokio::time::sleep(Duration::from_millis(2500)).await;
        s.stop().unwrap();

        let started = s.task("tick").unwrap().stats().started;
        assert!(started >= 2, "started {started} times");
    }

    #[cfg(unix)]
    #[tokio::test(flavor = "multi_thread")]
    async fn tasks_added_while_running_fire() {
        let s = scheduler();
        s.start().unwrap();
        s.add_tasks([task("late", "@every 1s", ConcurrencyPolicy::Allow, "true")])
            .unwrap();

        tokio::time::sleep(Duration::from_millis(1500)).await;
        s.stop().unwrap();
        assert!(s.task("late").unwrap().stats().started >= 1);
    }

    #[cfg(unix)]
    #[tokio::test(flavor = "multi_thread")]
    async fn stop_then_kill_running() {
        let s = scheduler();
        s.add_tasks([task("long", "* * * * * *", ConcurrencyPolicy::Allow, "sleep 30")])
            .unwrap();
        s.start().unwrap();

        let long = s.task("long").unwrap();
        for _ in 0..300 {
            if long.running() > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        s.stop().unwrap();
        assert!(s.kill_running() >= 1);

        for _ in 0..300 {
            if s.running() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(long.running(), 0);
    }

    // Forbid, two second job, fired every second.
    #[cfg(unix)]
    #[tokio::test(flavor = "multi_thread")]
    async fn forbid_scenario_never_overlaps() {
        let s = scheduler();
        s.add_tasks([task("build", "* * * * * *", ConcurrencyPolicy::Forbid, "sleep 2")])
            .unwrap();
        let build = s.task("build").unwrap();
        s.start().unwrap();

        let mut peak = 0;
        let until = tokio::time::Instant::now() + Duration::from_millis(3200);
        while tokio::time::Instant::now() < until {
            peak = peak.max(build.running());
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        s.stop().unwrap();
        s.kill_running();

        assert!(peak <= 1, "peak concurrency {peak}");
        assert!(build.stats().refused >= 1);
        assert!(build.stats().started >= 1);
    }

    // Replace, five second job, fired twice one second apart.
    #[cfg(unix)]
    #[tokio::test(flavor = "multi_thread")]
    async fn replace_scenario_kills_first() {
        use concron_model::Outcome;

        let deploy = Arc::new(task("deploy", "@every 1s", ConcurrencyPolicy::Replace, "sleep 5"));

        let first = tokio::spawn({
            let deploy = Arc::clone(&deploy);
            async move { deploy.run().await }
        });
        tokio::time::sleep(Duration::from_secs(1)).await;
        let second = deploy.run().await;

        assert_eq!(first.await.unwrap().outcome(), Some(&Outcome::Killed));
        assert_eq!(second.outcome(), Some(&Outcome::Success));
        assert_eq!(deploy.running(), 0);
    }
}
