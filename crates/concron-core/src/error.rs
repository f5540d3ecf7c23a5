use std::path::PathBuf;

use concron_model::ModelError;
use thiserror::Error;

use crate::cron::CronParseError;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse task document: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("cannot parse tasks: {}", join(.0))]
    InvalidTasks(Vec<ModelError>),

    #[error("task '{task}': invalid schedule '{expr}': {source}")]
    Schedule {
        task: String,
        expr: String,
        #[source]
        source: CronParseError,
    },

    #[error("cannot start scheduler, already started")]
    AlreadyStarted,

    #[error("cannot stop scheduler, it is not running")]
    NotRunning,

    #[error("scheduler requires a tokio runtime")]
    NoRuntime,
}

fn join(errors: &[ModelError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
