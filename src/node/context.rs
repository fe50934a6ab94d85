use std::path::{Path, PathBuf};

use crate::config::ClusterContext;

/// Filesystem layout for one node's configuration and runtime state.
///
/// Configuration lives under the cluster's conf dir, runtime state (pid
/// file, log, data, cached config) under its private dir. The `boot` file
/// sits at the top of the private dir because leadership is cluster-wide.
#[derive(Debug, Clone)]
pub struct NodePaths {
    name: String,
    conf_dir: PathBuf,
    private_dir: PathBuf,
    defaults_file: PathBuf,
    cluster_private_dir: PathBuf,
}

impl NodePaths {
    pub fn new(ctx: &ClusterContext, name: &str) -> Self {
        Self {
            name: name.to_string(),
            conf_dir: ctx.conf_dir.join(name),
            private_dir: ctx.private_dir.join(name),
            defaults_file: ctx.config_defaults_file(),
            cluster_private_dir: ctx.private_dir.clone(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn conf_dir(&self) -> &Path {
        &self.conf_dir
    }

    pub fn private_dir(&self) -> &Path {
        &self.private_dir
    }

    /// Cluster-wide configuration defaults, first layer of the merge.
    pub fn defaults_file(&self) -> &Path {
        &self.defaults_file
    }

    /// Per-node configuration override, second layer of the merge.
    pub fn override_file(&self) -> PathBuf {
        self.conf_dir.join("config.json")
    }

    /// Merged configuration captured at the last successful start, final
    /// layer of the merge.
    pub fn state_file(&self) -> PathBuf {
        self.private_dir.join("_cached.config.json")
    }

    pub fn pid_file(&self) -> PathBuf {
        self.private_dir.join("node.pid")
    }

    pub fn log_file(&self) -> PathBuf {
        self.private_dir.join("node.log")
    }

    pub fn data_dir(&self) -> PathBuf {
        self.private_dir.join("data")
    }

    /// Leadership marker naming the cluster's boot node.
    pub fn boot_file(&self) -> PathBuf {
        self.cluster_private_dir.join("boot")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_derive_from_cluster_dirs() {
        let ctx = ClusterContext::new("/etc/testnet").with_private_dir("/var/lib/testnet");
        let paths = NodePaths::new(&ctx, "validator-1");

        assert_eq!(paths.name(), "validator-1");
        assert_eq!(paths.conf_dir(), Path::new("/etc/testnet/validator-1"));
        assert_eq!(paths.private_dir(), Path::new("/var/lib/testnet/validator-1"));
        assert_eq!(paths.defaults_file(), Path::new("/etc/testnet/config.json"));
        assert_eq!(
            paths.override_file(),
            PathBuf::from("/etc/testnet/validator-1/config.json")
        );
        assert_eq!(
            paths.state_file(),
            PathBuf::from("/var/lib/testnet/validator-1/_cached.config.json")
        );
        assert_eq!(
            paths.data_dir(),
            PathBuf::from("/var/lib/testnet/validator-1/data")
        );
    }

    #[test]
    fn boot_file_is_cluster_wide() {
        let ctx = ClusterContext::new("/etc/testnet").with_private_dir("/var/lib/testnet");
        let a = NodePaths::new(&ctx, "a");
        let b = NodePaths::new(&ctx, "b");
        assert_eq!(a.boot_file(), b.boot_file());
        assert_eq!(a.boot_file(), PathBuf::from("/var/lib/testnet/boot"));
    }
}
