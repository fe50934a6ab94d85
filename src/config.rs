use std::path::PathBuf;

/// Supervisor-wide settings shared by the dispatcher and the node control
/// entry point.
#[derive(Debug, Clone)]
pub struct ClusterContext {
    /// Directory holding cluster and per-node configuration.
    pub conf_dir: PathBuf,
    /// Directory holding runtime state (pid files, logs, cached config).
    /// Defaults to `conf_dir`.
    pub private_dir: PathBuf,
    /// Terminate a superseded job's worker process instead of leaving it
    /// running in the background.
    pub kill_jobs: bool,
    /// Argv prefix used to launch worker processes. When empty, the current
    /// executable is re-invoked with its `node` subcommand.
    pub ctl_program: Vec<String>,
}

impl ClusterContext {
    pub fn new(conf_dir: impl Into<PathBuf>) -> Self {
        let conf_dir = conf_dir.into();
        Self {
            private_dir: conf_dir.clone(),
            conf_dir,
            kill_jobs: false,
            ctl_program: Vec::new(),
        }
    }

    pub fn with_private_dir(mut self, private_dir: impl Into<PathBuf>) -> Self {
        self.private_dir = private_dir.into();
        self
    }

    pub fn with_kill_jobs(mut self, kill_jobs: bool) -> Self {
        self.kill_jobs = kill_jobs;
        self
    }

    pub fn with_ctl_program(mut self, program: Vec<String>) -> Self {
        self.ctl_program = program;
        self
    }

    /// Cluster-wide configuration defaults file.
    pub fn config_defaults_file(&self) -> PathBuf {
        self.conf_dir.join("config.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn private_dir_defaults_to_conf_dir() {
        let ctx = ClusterContext::new("/etc/testnet");
        assert_eq!(ctx.conf_dir, PathBuf::from("/etc/testnet"));
        assert_eq!(ctx.private_dir, PathBuf::from("/etc/testnet"));
        assert!(!ctx.kill_jobs);
        assert!(ctx.ctl_program.is_empty());
    }

    #[test]
    fn private_dir_override() {
        let ctx = ClusterContext::new("/etc/testnet").with_private_dir("/var/lib/testnet");
        assert_eq!(ctx.conf_dir, PathBuf::from("/etc/testnet"));
        assert_eq!(ctx.private_dir, PathBuf::from("/var/lib/testnet"));
    }

    #[test]
    fn config_defaults_file_under_conf_dir() {
        let ctx = ClusterContext::new("/etc/testnet");
        assert_eq!(
            ctx.config_defaults_file(),
            PathBuf::from("/etc/testnet/config.json")
        );
    }

    #[test]
    fn kill_jobs_flag() {
        let ctx = ClusterContext::new(".").with_kill_jobs(true);
        assert!(ctx.kill_jobs);
    }
}
