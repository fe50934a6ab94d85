use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::config::ClusterContext;
use crate::dispatch::command::{CommandBuilder, NodeCtlCommand};
use crate::dispatch::job::{self, Job};
use crate::dispatch::process::{ProcessLauncher, TokioLauncher};
use crate::dispatch::registry::JobRegistry;
use crate::dispatch::request::{ControlRequest, JobKey};
use crate::error::Result;

/// Accepts control requests and guarantees at most one active job per key.
///
/// Dispatch is fire-and-forget: a well-formed request is accepted
/// immediately and its worker runs in the background. Only request-shape
/// violations surface to the caller; execution outcomes are visible in
/// logs and in the registry snapshot, never as a return value.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<Mutex<JobRegistry>>,
    builder: Arc<dyn CommandBuilder>,
    launcher: Arc<dyn ProcessLauncher>,
    kill_jobs: bool,
    shutdown: CancellationToken,
}

impl Dispatcher {
    /// Dispatcher wired to the real node-ctl command line and launcher.
    pub fn new(ctx: &ClusterContext) -> Result<Self> {
        Ok(Self::with_collaborators(
            Arc::new(NodeCtlCommand::new(ctx)?),
            Arc::new(TokioLauncher),
            ctx.kill_jobs,
        ))
    }

    /// Dispatcher with explicit collaborators. Tests use this to drive the
    /// control path with scripted processes.
    pub fn with_collaborators(
        builder: Arc<dyn CommandBuilder>,
        launcher: Arc<dyn ProcessLauncher>,
        kill_jobs: bool,
    ) -> Self {
        Self {
            registry: Arc::new(Mutex::new(JobRegistry::new())),
            builder,
            launcher,
            kill_jobs,
            shutdown: CancellationToken::new(),
        }
    }

    /// Derive every job's cancellation token from `token`, so cancelling it
    /// drains all in-flight jobs cooperatively.
    pub fn with_shutdown_token(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    /// Accept a control request.
    ///
    /// At most one job is active per key. A request identical to the key's
    /// active job is a duplicate notification and does nothing; any other
    /// request for an occupied key supersedes it: the active job's task is
    /// cancelled before the new job is installed, and its live worker
    /// process, if any, moves to the new job as an inherited process. The
    /// whole decision runs under the registry lock with no suspension
    /// between lookup and install.
    pub async fn dispatch(&self, request: ControlRequest) -> Result<()> {
        request.validate()?;
        let key = request.key();

        let mut registry = self.registry.lock().await;

        if let Some(current) = registry.get(&key) {
            if !self.kill_jobs && *current.request() == request {
                tracing::debug!(key = %key, job_id = %current.id(), "Duplicate request ignored");
                return Ok(());
            }
        }

        let job = Job::new(request, self.shutdown.child_token());

        if let Some(previous) = registry.get(&key) {
            tracing::info!(
                key = %key,
                superseded = %previous.id(),
                job_id = %job.id(),
                "Superseding active job"
            );
            previous.cancel();
            if let Some(handle) = previous.take_process().await {
                if self.kill_jobs {
                    tracing::debug!(key = %key, pid = ?handle.pid(), "Terminating superseded process");
                    handle.terminate();
                }
                job.inherit_process(handle).await;
            }
        } else {
            tracing::info!(key = %key, job_id = %job.id(), action = %job.request().action, "Job scheduled");
        }

        registry.put(job.clone());
        drop(registry);

        self.spawn_driver(job);
        Ok(())
    }

    /// Snapshot of currently registered jobs, oldest first.
    pub async fn jobs(&self) -> Vec<Job> {
        self.registry
            .lock()
            .await
            .all()
            .into_iter()
            .cloned()
            .collect()
    }

    /// The active job for `key`, if one is registered.
    pub async fn job_for(&self, key: &JobKey) -> Option<Job> {
        self.registry.lock().await.get(key).cloned()
    }

    fn spawn_driver(&self, job: Job) {
        let registry = Arc::clone(&self.registry);
        let builder = Arc::clone(&self.builder);
        let launcher = Arc::clone(&self.launcher);
        tokio::spawn(async move {
            job::drive(job, registry, builder, launcher).await;
        });
    }
}
