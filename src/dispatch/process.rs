use std::process::Stdio;

use tokio::process::{Child, Command};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::error::{Result, SupervisorError};

/// Observed state of a worker process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessStatus {
    Running,
    /// Process exited. `None` means it was killed by a signal before
    /// reporting an exit code.
    Exited(Option<i32>),
}

/// Handle to one spawned worker process.
///
/// The `Child` itself is owned by a background reaper task. The handle
/// requests termination through a token and observes exit through a watch
/// channel, so `terminate` never blocks and exit can be awaited from a
/// cloned receiver without holding the handle. Dropping the handle does not
/// kill the process; an abandoned worker keeps running until it exits on
/// its own or a successor job reaps it.
pub struct ProcessHandle {
    pid: Option<u32>,
    kill: CancellationToken,
    exit: watch::Receiver<ProcessStatus>,
}

impl ProcessHandle {
    /// Take ownership of a freshly spawned child and start its reaper.
    fn adopt(mut child: Child) -> Self {
        let pid = child.id();
        let kill = CancellationToken::new();
        let (tx, exit) = watch::channel(ProcessStatus::Running);

        let kill_rx = kill.clone();
        tokio::spawn(async move {
            let status = tokio::select! {
                status = child.wait() => status,
                _ = kill_rx.cancelled() => {
                    // Already-exited children make start_kill fail; the
                    // wait below still reaps them.
                    let _ = child.start_kill();
                    child.wait().await
                }
            };
            let code = status.ok().and_then(|s| s.code());
            let _ = tx.send(ProcessStatus::Exited(code));
        });

        Self { pid, kill, exit }
    }

    /// OS pid, if the process had not already been reaped at spawn time.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Request termination. Best-effort and non-blocking; calling this on a
    /// process that has already exited is a no-op.
    pub fn terminate(&self) {
        self.kill.cancel();
    }

    /// Receiver that can be awaited for exit without holding the handle.
    pub fn exit_watch(&self) -> watch::Receiver<ProcessStatus> {
        self.exit.clone()
    }

    /// Wait for the process to exit and return its exit code.
    pub async fn wait(&mut self) -> Option<i32> {
        await_exit(self.exit.clone()).await
    }

    #[cfg(test)]
    pub(crate) fn from_parts(
        pid: Option<u32>,
        kill: CancellationToken,
        exit: watch::Receiver<ProcessStatus>,
    ) -> Self {
        Self { pid, kill, exit }
    }
}

impl std::fmt::Debug for ProcessHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessHandle")
            .field("pid", &self.pid)
            .finish()
    }
}

/// Await exit on a cloned watch receiver.
pub(crate) async fn await_exit(mut exit: watch::Receiver<ProcessStatus>) -> Option<i32> {
    let status = exit
        .wait_for(|status| matches!(status, ProcessStatus::Exited(_)))
        .await;
    match status.map(|s| *s) {
        Ok(ProcessStatus::Exited(code)) => code,
        // The reaper publishes before dropping the sender; a closed channel
        // means it went away abnormally, which we treat as a signal death.
        _ => None,
    }
}

/// Starts worker processes. The dispatcher only ever talks to this trait,
/// which is what lets tests drive it with scripted in-memory processes.
pub trait ProcessLauncher: Send + Sync {
    fn spawn(&self, argv: &[String]) -> Result<ProcessHandle>;
}

/// Real launcher. Workers share the supervisor's stdout/stderr and get a
/// null stdin, and are never killed implicitly on handle drop.
#[derive(Debug, Default)]
pub struct TokioLauncher;

impl ProcessLauncher for TokioLauncher {
    fn spawn(&self, argv: &[String]) -> Result<ProcessHandle> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| SupervisorError::CommandBuild("empty command line".to_string()))?;
        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .spawn()
            .map_err(SupervisorError::Spawn)?;
        Ok(ProcessHandle::adopt(child))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn captures_exit_code() {
        let launcher = TokioLauncher;
        let mut handle = launcher
            .spawn(&[
                "/bin/sh".to_string(),
                "-c".to_string(),
                "exit 7".to_string(),
            ])
            .unwrap();
        assert_eq!(handle.wait().await, Some(7));
    }

    #[tokio::test]
    async fn terminate_kills_running_process() {
        let launcher = TokioLauncher;
        let mut handle = launcher
            .spawn(&["/bin/sleep".to_string(), "30".to_string()])
            .unwrap();
        handle.terminate();
        // Killed by signal, so no exit code.
        assert_eq!(handle.wait().await, None);
    }

    #[tokio::test]
    async fn terminate_after_exit_is_noop() {
        let launcher = TokioLauncher;
        let mut handle = launcher.spawn(&["/bin/true".to_string()]).unwrap();
        assert_eq!(handle.wait().await, Some(0));
        handle.terminate();
        handle.terminate();
        assert_eq!(handle.wait().await, Some(0));
    }

    #[tokio::test]
    async fn exit_watch_observes_from_clone() {
        let launcher = TokioLauncher;
        let handle = launcher.spawn(&["/bin/true".to_string()]).unwrap();
        let watch = handle.exit_watch();
        assert_eq!(await_exit(watch).await, Some(0));
    }

    #[test]
    fn empty_argv_is_a_build_error() {
        let launcher = TokioLauncher;
        assert!(matches!(
            launcher.spawn(&[]),
            Err(SupervisorError::CommandBuild(_))
        ));
    }

    #[tokio::test]
    async fn missing_program_is_a_spawn_error() {
        let launcher = TokioLauncher;
        assert!(matches!(
            launcher.spawn(&["/nonexistent/worker".to_string()]),
            Err(SupervisorError::Spawn(_))
        ));
    }
}
