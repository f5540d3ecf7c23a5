use std::{path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{ConcurrencyPolicy, DeadlineSecs, ModelError, TaskName};

/// Task document: the shell used for `useShell` tasks plus the task list.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDocument {
    /// Shell executable, e.g. `/bin/sh`. Empty disables shell wrapping for every task.
    #[serde(default)]
    pub shell: String,
    #[serde(default)]
    pub tasks: Vec<TaskDefinition>,
}

/// One scheduled job as written in the task document.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDefinition {
    /// Unique task name.
    pub name: TaskName,
    /// Cron-style schedule expression.
    pub crontab: String,
    /// Working directory.
    ///
    /// If `None`, the process inherits the working directory of the daemon.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
    /// Run `cmd` and `args` through the document's shell.
    #[serde(default)]
    pub use_shell: bool,
    /// Command to execute.
    #[serde(rename = "cmd")]
    pub command: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    /// Deadline in seconds; `0` disables it.
    #[serde(default)]
    pub deadline: DeadlineSecs,
    /// Pass the full daemon environment (default) or only `PATH`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_system_env: Option<bool>,
    /// Raw policy value, validated by [`TaskDefinition::validate`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concurrency_policy: Option<String>,
}

impl TaskDefinition {
    /// Check the definition and resolve its concurrency policy.
    ///
    /// Errors are tagged with the task name so that a whole document can be reported at once.
    pub fn validate(&self) -> Result<ConcurrencyPolicy, ModelError> {
        if self.name.trim().is_empty() {
            return Err(ModelError::EmptyName);
        }
        if self.command.trim().is_empty() {
            return Err(ModelError::EmptyCommand.in_task(&self.name));
        }
        self.concurrency_policy
            .as_deref()
            .unwrap_or_default()
            .parse()
            .map_err(|e: ModelError| e.in_task(&self.name))
    }

    #[inline]
    pub fn inherits_env(&self) -> bool {
        self.use_system_env.unwrap_or(true)
    }

    /// Deadline as a duration, `None` when disabled.
    pub fn deadline(&self) -> Option<Duration> {
        (self.deadline > 0).then(|| Duration::from_secs(u64::from(self.deadline)))
    }
}
