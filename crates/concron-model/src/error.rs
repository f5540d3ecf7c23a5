use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("invalid value '{0}' for concurrencyPolicy, allowed: Allow, Forbid, Replace")]
    InvalidPolicy(String),
    #[error("task name is empty")]
    EmptyName,
    #[error("task name is used more than once")]
    DuplicateName,
    #[error("command is empty")]
    EmptyCommand,
    #[error("task '{task}': {source}")]
    InTask {
        task: String,
        #[source]
        source: Box<ModelError>,
    },
}

impl ModelError {
    /// Attach the owning task name to an error.
    pub fn in_task(self, task: impl Into<String>) -> Self {
        ModelError::InTask {
            task: task.into(),
            source: Box::new(self),
        }
    }
}
