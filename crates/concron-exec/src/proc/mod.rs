//! Process runner: one child process per invocation.
//!
//! [`spawn`] starts the child synchronously and hands back a [`ProcHandle`].
//! A supervisor task owns the child from then on; it waits for the natural exit,
//! a kill request or the deadline, whichever comes first, drains the output pipes
//! and publishes a single [`ProcExit`].
use std::{
    path::PathBuf,
    process::{ExitStatus, Stdio},
    sync::Arc,
    time::Duration,
};

use concron_model::{ExitDetail, Outcome, TaskEnv};
use parking_lot::Mutex;
use tokio::{
    io::{AsyncRead, AsyncReadExt},
    process::Child,
    sync::oneshot,
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::{
    buffer::{CapturedOutput, DEFAULT_OUTPUT_LIMIT, OutputBuffer},
    error::{ExecError, ExecResult},
    util::{cmd_program, isolate, kill_tree},
};

/// How long to keep reading output after the child is gone.
const DRAIN_GRACE: Duration = Duration::from_secs(2);

/// Fully resolved process invocation.
#[derive(Clone, Debug)]
pub struct ProcConfig {
    pub program: String,
    pub args: Vec<String>,
    /// Complete child environment; nothing is inherited from the daemon.
    pub env: TaskEnv,
    pub cwd: Option<PathBuf>,
    /// Kill the child once this much time has passed since start.
    pub deadline: Option<Duration>,
    /// Capacity of the combined stdout/stderr buffer.
    pub output_limit: usize,
}

impl ProcConfig {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            ..Default::default()
        }
    }
}

impl Default for ProcConfig {
    fn default() -> Self {
        Self {
            program: String::new(),
            args: Vec::new(),
            env: TaskEnv::new(),
            cwd: None,
            deadline: None,
            output_limit: DEFAULT_OUTPUT_LIMIT,
        }
    }
}

/// Cloneable trigger that forcibly terminates one running process.
#[derive(Clone, Debug)]
pub struct KillSwitch(CancellationToken);

impl KillSwitch {
    /// Request termination. Returns immediately; the owner of the
    /// [`ProcHandle`] observes [`Outcome::Killed`].
    ///
    /// A request that races with a natural exit still reports `Killed`, even when
    /// the child had already exited successfully.
    pub fn kill(&self) {
        self.0.cancel();
    }

    pub fn is_killed(&self) -> bool {
        self.0.is_cancelled()
    }
}

impl From<CancellationToken> for KillSwitch {
    fn from(token: CancellationToken) -> Self {
        Self(token)
    }
}

/// Terminal state of a process plus everything it wrote.
#[derive(Debug)]
pub struct ProcExit {
    pub outcome: Outcome,
    pub output: CapturedOutput,
}

/// Handle to a started process.
#[derive(Debug)]
pub struct ProcHandle {
    pid: Option<u32>,
    kill: KillSwitch,
    done: oneshot::Receiver<ProcExit>,
}

impl ProcHandle {
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn kill_switch(&self) -> KillSwitch {
        self.kill.clone()
    }

    pub fn kill(&self) {
        self.kill.kill();
    }

    /// Wait until the process has terminated and its output is drained.
    pub async fn wait(self) -> ProcExit {
        self.done.await.unwrap_or_else(|_| ProcExit {
            outcome: Outcome::Failure(ExitDetail::Wait("supervisor terminated".into())),
            output: CapturedOutput::default(),
        })
    }
}

/// Start a process described by `cfg`.
///
/// Spawn errors (missing binary, permissions, bad working directory) are returned
/// synchronously and leave nothing behind. Must be called within a Tokio runtime.
pub fn spawn(cfg: &ProcConfig) -> ExecResult<ProcHandle> {
    if cfg.program.is_empty() {
        return Err(ExecError::MissingProgram);
    }

    let mut cmd = cmd_program(&cfg.program, &cfg.args);
    if let Some(cwd) = &cfg.cwd {
        cmd.current_dir(cwd);
    }
    cmd.env_clear();
    cmd.envs(cfg.env.pairs());
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    cmd.kill_on_drop(true);
    isolate(&mut cmd);

    trace!(target: "concron.exec.proc", program = %cfg.program, args = ?cfg.args, "spawn");
    let mut child = cmd.spawn().map_err(|source| ExecError::Spawn {
        program: cfg.program.clone(),
        source,
    })?;
    let pid = child.id();

    let buf = Arc::new(Mutex::new(OutputBuffer::new(cfg.output_limit)));
    let mut pumps = Vec::with_capacity(2);
    if let Some(stdout) = child.stdout.take() {
        pumps.push(tokio::spawn(pump(stdout, Arc::clone(&buf))));
    }
    if let Some(stderr) = child.stderr.take() {
        pumps.push(tokio::spawn(pump(stderr, Arc::clone(&buf))));
    }

    let token = CancellationToken::new();
    let (tx, rx) = oneshot::channel();
    tokio::spawn(supervise(child, pumps, buf, token.clone(), cfg.deadline, tx));

    Ok(ProcHandle {
        pid,
        kill: KillSwitch(token),
        done: rx,
    })
}

async fn supervise(
    mut child: Child,
    pumps: Vec<JoinHandle<()>>,
    buf: Arc<Mutex<OutputBuffer>>,
    token: CancellationToken,
    deadline: Option<Duration>,
    tx: oneshot::Sender<ProcExit>,
) {
    let outcome = tokio::select! {
        biased;
        _ = token.cancelled() => {
            debug!(target: "concron.exec.proc", pid = ?child.id(), "kill requested; killing process group");
            if let Err(e) = kill_tree(&mut child).await {
                warn!(target: "concron.exec.proc", error = %e, "kill failed");
            }
            Outcome::Killed
        }
        _ = expired(deadline) => {
            debug!(target: "concron.exec.proc", pid = ?child.id(), "deadline expired; killing process group");
            if let Err(e) = kill_tree(&mut child).await {
                warn!(target: "concron.exec.proc", error = %e, "kill failed");
            }
            Outcome::TimedOut
        }
        status = child.wait() => match status {
            Ok(status) => outcome_of(status),
            Err(e) => Outcome::Failure(ExitDetail::Wait(e.to_string())),
        },
    };

    drain(pumps).await;
    let output = buf.lock().take();
    let _ = tx.send(ProcExit { outcome, output });
}

async fn expired(deadline: Option<Duration>) {
    match deadline {
        Some(d) => tokio::time::sleep(d).await,
        None => std::future::pending().await,
    }
}

async fn pump<R>(mut reader: R, buf: Arc<Mutex<OutputBuffer>>)
where
    R: AsyncRead + Unpin,
{
    let mut chunk = [0u8; 4096];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => buf.lock().push(&chunk[..n]),
            Err(e) => {
                debug!(target: "concron.exec.proc", error = %e, "output pipe read failed");
                break;
            }
        }
    }
}

async fn drain(pumps: Vec<JoinHandle<()>>) {
    for mut pump in pumps {
        if tokio::time::timeout(DRAIN_GRACE, &mut pump).await.is_err() {
            warn!(target: "concron.exec.proc", "output pipe still open after exit; dropping the rest");
            pump.abort();
        }
    }
}

fn outcome_of(status: ExitStatus) -> Outcome {
    if status.success() {
        return Outcome::Success;
    }
    if let Some(code) = status.code() {
        return Outcome::Failure(ExitDetail::Code(code));
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(sig) = status.signal() {
            return Outcome::Failure(ExitDetail::Signal(sig));
        }
    }
    Outcome::Failure(ExitDetail::Wait(format!("unrecognized exit status: {status}")))
}
