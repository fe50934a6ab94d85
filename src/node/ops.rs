use std::fs::{self, OpenOptions};
use std::io::ErrorKind;
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::dispatch::request::CleanMode;
use crate::error::{Result, SupervisorError};
use crate::node::config::NodeConfig;
use crate::node::context::NodePaths;

const STOP_GRACE: Duration = Duration::from_secs(10);
const KILL_GRACE: Duration = Duration::from_secs(2);

/// Node lifecycle operations.
///
/// `start` is create-or-get: starting a node that is already running is a
/// no-op. `stop` stops a running node; a clean mode additionally discards
/// its data directory, and `CleanMode::All` its entire private state plus
/// any leadership it holds. `make_leader` records the node as the
/// cluster's boot node.
pub trait NodeOps {
    fn start(&self, config: &NodeConfig) -> Result<()>;
    fn stop(&self, config: &NodeConfig, clean: Option<CleanMode>) -> Result<()>;
    fn make_leader(&self, config: &NodeConfig) -> Result<()>;
}

/// Runs node programs as detached local processes.
///
/// Runtime state lives under the node's private directory: a pid file for
/// liveness, an append-only log capturing the program's output, and a data
/// directory that doubles as the program's working directory. Leadership
/// is a `boot` marker file at the top of the cluster's private directory
/// naming the leader.
pub struct LocalOps {
    paths: NodePaths,
}

impl LocalOps {
    pub fn new(paths: NodePaths) -> Self {
        Self { paths }
    }

    /// Pid of the running node process, if there is one. Pid files left
    /// behind by dead or unparseable state are cleared along the way.
    fn live_pid(&self) -> Result<Option<u32>> {
        let pid_file = self.paths.pid_file();
        let text = match fs::read_to_string(&pid_file) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let pid: u32 = match text.trim().parse() {
            Ok(pid) => pid,
            Err(_) => {
                fs::remove_file(&pid_file)?;
                return Ok(None);
            }
        };
        if process_alive(pid) {
            Ok(Some(pid))
        } else {
            fs::remove_file(&pid_file)?;
            Ok(None)
        }
    }

    fn stop_process(&self, pid: u32) -> Result<()> {
        tracing::info!(node = self.paths.name(), pid, "Stopping node process");
        signal(pid, "-TERM")?;
        if wait_for_death(pid, STOP_GRACE) {
            return Ok(());
        }
        tracing::warn!(node = self.paths.name(), pid, "Node ignored SIGTERM, killing");
        signal(pid, "-KILL")?;
        if wait_for_death(pid, KILL_GRACE) {
            return Ok(());
        }
        Err(SupervisorError::Ops(format!(
            "process {pid} did not terminate"
        )))
    }

    fn release_leadership(&self) -> Result<()> {
        let boot = self.paths.boot_file();
        match fs::read_to_string(&boot) {
            Ok(holder) if holder.trim() == self.paths.name() => {
                fs::remove_file(&boot)?;
                tracing::info!(node = self.paths.name(), "Leadership released");
                Ok(())
            }
            Ok(_) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl NodeOps for LocalOps {
    fn start(&self, config: &NodeConfig) -> Result<()> {
        if let Some(pid) = self.live_pid()? {
            tracing::info!(node = self.paths.name(), pid, "Node already running");
            return Ok(());
        }

        fs::create_dir_all(self.paths.private_dir())?;
        fs::create_dir_all(self.paths.data_dir())?;

        let log = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.paths.log_file())?;
        let stderr = log.try_clone()?;

        let child = Command::new(&config.command)
            .args(&config.args)
            .envs(&config.env)
            .current_dir(self.paths.data_dir())
            .stdin(Stdio::null())
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(stderr))
            .spawn()
            .map_err(|e| {
                SupervisorError::Ops(format!("cannot start {}: {e}", config.command))
            })?;

        fs::write(self.paths.pid_file(), child.id().to_string())?;
        tracing::info!(
            node = self.paths.name(),
            instance = config.instance(),
            pid = child.id(),
            "Node started"
        );
        Ok(())
    }

    fn stop(&self, config: &NodeConfig, clean: Option<CleanMode>) -> Result<()> {
        if let Some(pid) = self.live_pid()? {
            self.stop_process(pid)?;
        }
        let pid_file = self.paths.pid_file();
        if pid_file.exists() {
            fs::remove_file(pid_file)?;
        }

        if clean.is_some() {
            remove_dir_if_present(&self.paths.data_dir())?;
            tracing::info!(node = self.paths.name(), "Node data removed");
        }
        if clean == Some(CleanMode::All) {
            self.release_leadership()?;
            remove_dir_if_present(self.paths.private_dir())?;
            tracing::info!(
                node = self.paths.name(),
                instance = config.instance(),
                "Node state purged"
            );
        }
        Ok(())
    }

    fn make_leader(&self, config: &NodeConfig) -> Result<()> {
        if !self.paths.private_dir().exists() {
            tracing::warn!(
                node = self.paths.name(),
                "Node has never started, not recording leadership"
            );
            return Ok(());
        }
        fs::write(self.paths.boot_file(), self.paths.name())?;
        tracing::info!(
            node = self.paths.name(),
            instance = config.instance(),
            "Node recorded as boot leader"
        );
        Ok(())
    }
}

fn process_alive(pid: u32) -> bool {
    Path::new("/proc").join(pid.to_string()).exists()
}

/// Deliver a signal through kill(1). kill's exit status is not checked: the
/// process may die between the liveness check and the signal, and callers
/// recheck liveness afterwards.
fn signal(pid: u32, sig: &str) -> Result<()> {
    Command::new("kill")
        .arg(sig)
        .arg(pid.to_string())
        .status()
        .map_err(|e| SupervisorError::Ops(format!("cannot run kill: {e}")))?;
    Ok(())
}

fn wait_for_death(pid: u32, grace: Duration) -> bool {
    let deadline = Instant::now() + grace;
    while Instant::now() < deadline {
        if !process_alive(pid) {
            return true;
        }
        thread::sleep(Duration::from_millis(100));
    }
    !process_alive(pid)
}

fn remove_dir_if_present(dir: &Path) -> Result<()> {
    match fs::remove_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
