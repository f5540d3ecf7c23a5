//! Reading the task document and turning it into runtime tasks.
use std::{collections::HashSet, path::Path};

use concron_model::{ModelError, TaskDocument, TaskEnv};
use tracing::{debug, info};

use crate::{error::CoreError, task::Task};

/// Comma-separated task names; when set, only these tasks are loaded.
pub const ALLOWED_TASKS_ENV: &str = "ALLOWED_TASKS";

/// Name filter applied to the task document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowedTasks(Option<HashSet<String>>);

impl AllowedTasks {
    /// Permit every task.
    pub fn all() -> Self {
        Self(None)
    }

    /// Parse a comma-separated list. Blank entries are ignored.
    pub fn parse(list: &str) -> Self {
        let names = list
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        Self(Some(names))
    }

    /// Read [`ALLOWED_TASKS_ENV`]; an unset variable permits everything.
    pub fn from_env() -> Self {
        match std::env::var(ALLOWED_TASKS_ENV) {
            Ok(list) => Self::parse(&list),
            Err(_) => Self::all(),
        }
    }

    pub fn permits(&self, name: &str) -> bool {
        match &self.0 {
            None => true,
            Some(names) => names.contains(name),
        }
    }
}

/// Load the task document at `path`.
///
/// The daemon environment is captured here, once, for every task.
pub fn load_tasks(path: impl AsRef<Path>, allowed: &AllowedTasks) -> Result<Vec<Task>, CoreError> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path).map_err(|source| CoreError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(target: "concron.core.loader", path = %path.display(), "task document read");

    let env = TaskEnv::from_vars(
        std::env::vars_os()
            .map(|(k, v)| (k.to_string_lossy().into_owned(), v.to_string_lossy().into_owned())),
    );
    parse_tasks(&raw, &env, allowed)
}

/// Parse a task document.
///
/// Every definition is checked; all problems are reported together.
pub fn parse_tasks(raw: &str, env: &TaskEnv, allowed: &AllowedTasks) -> Result<Vec<Task>, CoreError> {
    let doc: TaskDocument = serde_yaml::from_str(raw)?;

    let mut seen = HashSet::new();
    let mut tasks = Vec::new();
    let mut errors = Vec::new();

    for def in doc.tasks.iter().filter(|d| allowed.permits(&d.name)) {
        if !def.name.is_empty() && !seen.insert(def.name.as_str()) {
            errors.push(ModelError::DuplicateName.in_task(&def.name));
            continue;
        }
        match Task::from_definition(def, &doc.shell, env) {
            Ok(task) => tasks.push(task),
            Err(e) => errors.push(e),
        }
    }

    if !errors.is_empty() {
        return Err(CoreError::InvalidTasks(errors));
    }

    let names: Vec<&str> = tasks.iter().map(Task::name).collect();
    info!(target: "concron.core.loader", count = tasks.len(), tasks = ?names, "tasks loaded");
    Ok(tasks)
}
