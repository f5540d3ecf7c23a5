use tokio::process::{Child, Command};

pub fn cmd_program(program: &str, args: &[String]) -> Command {
    let mut cmd = Command::new(program);
    cmd.args(args.iter().map(|s| s.as_str()));
    cmd
}

/// Make the child the leader of a fresh process group.
#[cfg(unix)]
pub fn isolate(cmd: &mut Command) {
    cmd.process_group(0);
}

#[cfg(not(unix))]
pub fn isolate(_cmd: &mut Command) {}

/// Kill the child together with everything in its process group, then reap it.
#[cfg(unix)]
pub async fn kill_tree(child: &mut Child) -> std::io::Result<()> {
    if let Some(pid) = child.id() {
        // SAFETY: plain syscall; a negative pid addresses the group led by the child.
        unsafe {
            libc::kill(-(pid as libc::pid_t), libc::SIGKILL);
        }
    }
    child.kill().await
}

#[cfg(not(unix))]
pub async fn kill_tree(child: &mut Child) -> std::io::Result<()> {
    child.kill().await
}
