use std::fs;

use crate::config::ClusterContext;
use crate::dispatch::request::CleanMode;
use crate::error::Result;
use crate::node::config::NodeConfig;
use crate::node::context::NodePaths;
use crate::node::ops::{LocalOps, NodeOps};

/// Orchestrates one node's lifecycle: merges the layered configuration,
/// drives the ops, and maintains the cached state layer.
pub struct NodeCtl {
    paths: NodePaths,
    ops: Box<dyn NodeOps>,
}

impl NodeCtl {
    pub fn new(ctx: &ClusterContext, name: &str) -> Self {
        let paths = NodePaths::new(ctx, name);
        let ops = Box::new(LocalOps::new(paths.clone()));
        Self { paths, ops }
    }

    /// Control layer over explicit ops. Tests substitute recording fakes.
    pub fn with_ops(paths: NodePaths, ops: Box<dyn NodeOps>) -> Self {
        Self { paths, ops }
    }

    fn load_config(&self) -> Result<NodeConfig> {
        let mut config = NodeConfig::load(&[
            self.paths.defaults_file().to_path_buf(),
            self.paths.override_file(),
            self.paths.state_file(),
        ])?;
        if config.instance_name.is_none() {
            config.instance_name =
                Some(format!("{}{}", config.instance_prefix, self.paths.name()));
        }
        Ok(config)
    }

    /// Start the node and pin the merged configuration as the state layer.
    pub fn start(&self) -> Result<()> {
        let config = self.load_config()?;
        self.ops.start(&config)?;
        config.save(&self.paths.state_file())
    }

    /// Stop the node and drop the state layer.
    pub fn stop(&self, clean: Option<CleanMode>) -> Result<()> {
        let config = self.load_config()?;
        self.ops.stop(&config, clean)?;
        let state = self.paths.state_file();
        if state.exists() {
            fs::remove_file(state)?;
        }
        Ok(())
    }

    pub fn restart(&self, clean: Option<CleanMode>) -> Result<()> {
        self.stop(clean)?;
        self.start()
    }

    pub fn make_leader(&self) -> Result<()> {
        let config = self.load_config()?;
        self.ops.make_leader(&config)
    }
}
