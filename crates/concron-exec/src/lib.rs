mod error;
pub use error::{ExecError, ExecResult};

mod buffer;
pub use buffer::{CapturedOutput, DEFAULT_OUTPUT_LIMIT, OutputBuffer};

mod util;

pub mod proc;
pub use proc::{KillSwitch, ProcConfig, ProcExit, ProcHandle, spawn};

pub mod prelude {
    pub use crate::error::{ExecError, ExecResult};
    pub use crate::proc::{KillSwitch, ProcConfig, ProcExit, ProcHandle, spawn};
}
