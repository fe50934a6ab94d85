use std::env;

use crate::config::ClusterContext;
use crate::dispatch::request::{CleanMode, ControlRequest, NodeAction};
use crate::error::{Result, SupervisorError};

/// Maps an accepted request to the argv of the worker process that executes
/// it. Failures here surface as a failed job, never as a dispatch rejection.
pub trait CommandBuilder: Send + Sync {
    fn build(&self, request: &ControlRequest) -> Result<Vec<String>>;
}

/// Default builder: runs the node control entry point with the cluster's
/// configuration directories, the node name and the action.
pub struct NodeCtlCommand {
    program: Vec<String>,
    conf_dir: String,
    private_dir: String,
}

impl NodeCtlCommand {
    pub fn new(ctx: &ClusterContext) -> Result<Self> {
        let program = if ctx.ctl_program.is_empty() {
            // Re-invoke this executable's `node` subcommand.
            let exe = env::current_exe().map_err(|e| {
                SupervisorError::CommandBuild(format!("cannot resolve current executable: {e}"))
            })?;
            vec![exe.to_string_lossy().into_owned(), "node".to_string()]
        } else {
            ctx.ctl_program.clone()
        };
        Ok(Self {
            program,
            conf_dir: ctx.conf_dir.to_string_lossy().into_owned(),
            private_dir: ctx.private_dir.to_string_lossy().into_owned(),
        })
    }
}

impl CommandBuilder for NodeCtlCommand {
    fn build(&self, request: &ControlRequest) -> Result<Vec<String>> {
        let mut argv = self.program.clone();
        argv.push("-d".to_string());
        argv.push(self.conf_dir.clone());
        argv.push("-p".to_string());
        argv.push(self.private_dir.clone());
        argv.push(request.node.clone());
        argv.push(request.action.to_string());
        // The clean argument only means something to stop and restart.
        if matches!(request.action, NodeAction::Stop | NodeAction::Restart) {
            match request.args.clean {
                Some(CleanMode::Data) => argv.push("-c".to_string()),
                Some(CleanMode::All) => argv.push("-C".to_string()),
                None => {}
            }
        }
        Ok(argv)
    }
}
