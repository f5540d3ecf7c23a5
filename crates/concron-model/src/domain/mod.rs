mod kv;
pub use kv::KeyValue;

mod task_env;
pub use task_env::TaskEnv;

mod policy;
pub use policy::ConcurrencyPolicy;

mod definition;
pub use definition::{TaskDefinition, TaskDocument};

mod execution;
pub use execution::ExecutionId;

mod outcome;
pub use outcome::{ExitDetail, Outcome};

/// Task name, unique within one task document.
pub type TaskName = String;

/// Deadline value in seconds, `0` meaning "no deadline".
pub type DeadlineSecs = u32;
