use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{watch, Mutex};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::dispatch::command::CommandBuilder;
use crate::dispatch::process::{self, ProcessHandle, ProcessLauncher, ProcessStatus};
use crate::dispatch::registry::JobRegistry;
use crate::dispatch::request::{ControlRequest, JobKey};
use crate::error::SupervisorError;

/// Terminal state of a job's driving task.
#[derive(Debug)]
pub enum JobOutcome {
    /// Own process exited. The exit code is recorded, not interpreted;
    /// what a worker's exit status means is the worker's business.
    Completed { exit_code: Option<i32> },
    /// Superseded by a newer request. The successor owns all cleanup.
    Cancelled,
    /// Command construction or spawn failed.
    Failed(SupervisorError),
}

/// The in-flight work registered for one key.
///
/// A job owns at most one process at a time through its process slot. The
/// handle in the slot belongs to this job alone until the dispatch path
/// explicitly moves it to a successor during supersession; the slot is the
/// one piece of job state shared between the registry record and the
/// driving task.
#[derive(Debug, Clone)]
pub struct Job {
    id: Uuid,
    key: JobKey,
    request: ControlRequest,
    scheduled_at: DateTime<Utc>,
    cancel: CancellationToken,
    process: Arc<Mutex<Option<ProcessHandle>>>,
}

impl Job {
    pub(crate) fn new(request: ControlRequest, cancel: CancellationToken) -> Self {
        Self {
            id: Uuid::new_v4(),
            key: request.key(),
            request,
            scheduled_at: Utc::now(),
            cancel,
            process: Arc::new(Mutex::new(None)),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn key(&self) -> &JobKey {
        &self.key
    }

    pub fn request(&self) -> &ControlRequest {
        &self.request
    }

    pub fn scheduled_at(&self) -> DateTime<Utc> {
        self.scheduled_at
    }

    /// Request cooperative cancellation. Takes effect at the task's next
    /// suspension point; it never interrupts a spawn in progress.
    pub(crate) fn cancel(&self) {
        self.cancel.cancel();
    }

    pub(crate) fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Move this job's process handle out, if it currently owns one.
    pub(crate) async fn take_process(&self) -> Option<ProcessHandle> {
        self.process.lock().await.take()
    }

    /// Hand an inherited process handle to this job. Called on the dispatch
    /// path only, before the driving task starts.
    pub(crate) async fn inherit_process(&self, handle: ProcessHandle) {
        *self.process.lock().await = Some(handle);
    }

    /// Record a freshly spawned process and return its exit watch.
    ///
    /// Registration is one cancellation-checked step under the slot lock:
    /// if this job was superseded while the spawn was in flight, no
    /// successor can ever inherit the new process, so it is terminated here
    /// and `None` is returned.
    pub(crate) async fn register_process(
        &self,
        handle: ProcessHandle,
    ) -> Option<watch::Receiver<ProcessStatus>> {
        let mut slot = self.process.lock().await;
        if self.cancel.is_cancelled() {
            handle.terminate();
            return None;
        }
        let exit = handle.exit_watch();
        *slot = Some(handle);
        Some(exit)
    }

    /// Exit watch of the owned process, if any.
    pub(crate) async fn process_exit_watch(&self) -> Option<watch::Receiver<ProcessStatus>> {
        self.process.lock().await.as_ref().map(|h| h.exit_watch())
    }

    /// Drop the owned process handle. The process itself is unaffected.
    pub(crate) async fn clear_process(&self) {
        self.process.lock().await.take();
    }

    #[cfg(test)]
    pub(crate) async fn owns_process(&self) -> bool {
        self.process.lock().await.is_some()
    }
}

/// Drive a job through its lifecycle, then clean up its registry slot.
///
/// Completed and failed jobs remove themselves, but only while still the
/// slot's current occupant. Cancelled jobs never touch the registry; the
/// superseding dispatch already replaced them.
pub(crate) async fn drive(
    job: Job,
    registry: Arc<Mutex<JobRegistry>>,
    builder: Arc<dyn CommandBuilder>,
    launcher: Arc<dyn ProcessLauncher>,
) {
    let outcome = run_phases(&job, builder.as_ref(), launcher.as_ref()).await;
    match outcome {
        JobOutcome::Completed { exit_code } => {
            tracing::info!(
                key = %job.key(),
                job_id = %job.id(),
                exit_code = ?exit_code,
                "Job completed"
            );
            registry.lock().await.remove_if_current(job.key(), job.id());
        }
        JobOutcome::Cancelled => {
            tracing::info!(key = %job.key(), job_id = %job.id(), "Job cancelled");
        }
        JobOutcome::Failed(err) => {
            tracing::error!(key = %job.key(), job_id = %job.id(), error = %err, "Job failed");
            registry.lock().await.remove_if_current(job.key(), job.id());
        }
    }
}

async fn run_phases(
    job: &Job,
    builder: &dyn CommandBuilder,
    launcher: &dyn ProcessLauncher,
) -> JobOutcome {
    let cancel = job.cancel_token();

    // A job created by supersession may start out owning its predecessor's
    // process. That one has to exit before this job's own work begins; its
    // exit code belongs to an abandoned request and is ignored.
    if let Some(exit) = job.process_exit_watch().await {
        tracing::info!(key = %job.key(), job_id = %job.id(), "Waiting for inherited process");
        tokio::select! {
            _ = cancel.cancelled() => return JobOutcome::Cancelled,
            code = process::await_exit(exit) => {
                tracing::debug!(
                    key = %job.key(),
                    job_id = %job.id(),
                    exit_code = ?code,
                    "Inherited process exited"
                );
            }
        }
        job.clear_process().await;
    }

    if cancel.is_cancelled() {
        return JobOutcome::Cancelled;
    }

    let argv = match builder.build(job.request()) {
        Ok(argv) => argv,
        Err(err) => return JobOutcome::Failed(err),
    };

    tracing::info!(key = %job.key(), job_id = %job.id(), command = ?argv, "Spawning worker");
    let handle = match launcher.spawn(&argv) {
        Ok(handle) => handle,
        Err(err) => return JobOutcome::Failed(err),
    };

    let exit = match job.register_process(handle).await {
        Some(exit) => exit,
        None => return JobOutcome::Cancelled,
    };

    tokio::select! {
        _ = cancel.cancelled() => JobOutcome::Cancelled,
        code = process::await_exit(exit) => JobOutcome::Completed { exit_code: code },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::request::NodeAction;

    fn scripted_handle(pid: u32) -> (ProcessHandle, watch::Sender<ProcessStatus>, CancellationToken)
    {
        let kill = CancellationToken::new();
        let (tx, rx) = watch::channel(ProcessStatus::Running);
        (
            ProcessHandle::from_parts(Some(pid), kill.clone(), rx),
            tx,
            kill,
        )
    }

    fn job() -> Job {
        Job::new(
            ControlRequest::new("n1", NodeAction::Start),
            CancellationToken::new(),
        )
    }

    #[tokio::test]
    async fn inherited_handle_can_be_taken_back_out() {
        let job = job();
        let (handle, _tx, _kill) = scripted_handle(10);
        job.inherit_process(handle).await;
        assert!(job.owns_process().await);

        let taken = job.take_process().await;
        assert_eq!(taken.and_then(|h| h.pid()), Some(10));
        assert!(!job.owns_process().await);
    }

    #[tokio::test]
    async fn register_installs_handle_when_live() {
        let job = job();
        let (handle, _tx, kill) = scripted_handle(11);
        let exit = job.register_process(handle).await;
        assert!(exit.is_some());
        assert!(job.owns_process().await);
        assert!(!kill.is_cancelled());
    }

    #[tokio::test]
    async fn register_after_cancellation_terminates_fresh_process() {
        let job = job();
        job.cancel();
        let (handle, _tx, kill) = scripted_handle(12);
        let exit = job.register_process(handle).await;
        assert!(exit.is_none());
        assert!(!job.owns_process().await);
        assert!(kill.is_cancelled());
    }
}
