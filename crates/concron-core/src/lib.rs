//! Task execution engine: schedules, per-task execution tracking and concurrency policies.

pub mod cron;
pub use cron::{CronExpr, CronParseError};

pub mod error;
pub use error::CoreError;

pub mod loader;
pub use loader::{ALLOWED_TASKS_ENV, AllowedTasks, load_tasks, parse_tasks};

pub mod policy;
pub use policy::{Decision, decide};

pub mod registry;
pub use registry::{Execution, ExecutionInfo, ExecutionRegistry};

pub mod task;
pub use task::{Task, TaskStats};

mod controller;
pub use controller::Invocation;

pub mod scheduler;
pub use scheduler::Scheduler;

pub mod zone;
pub use zone::{FixedZone, LocalZone, Zone};
