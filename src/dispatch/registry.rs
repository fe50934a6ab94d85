use std::collections::HashMap;

use uuid::Uuid;

use crate::dispatch::job::Job;
use crate::dispatch::request::JobKey;

/// Active jobs, at most one per key.
///
/// No internal locking: every mutation happens on the dispatcher's control
/// path under its lock, and never across a suspension point.
#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: HashMap<JobKey, Job>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self {
            jobs: HashMap::new(),
        }
    }

    pub fn get(&self, key: &JobKey) -> Option<&Job> {
        self.jobs.get(key)
    }

    /// Install `job` as the active job for its key, returning the previous
    /// occupant if it replaced one.
    pub fn put(&mut self, job: Job) -> Option<Job> {
        self.jobs.insert(job.key().clone(), job)
    }

    /// Remove the entry for `key` only while `job_id` still identifies the
    /// current occupant. A superseded task must never evict its successor.
    pub fn remove_if_current(&mut self, key: &JobKey, job_id: Uuid) -> bool {
        match self.jobs.get(key) {
            Some(current) if current.id() == job_id => {
                self.jobs.remove(key);
                true
            }
            _ => false,
        }
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Snapshot of the active jobs, oldest first.
    pub fn all(&self) -> Vec<&Job> {
        let mut jobs: Vec<&Job> = self.jobs.values().collect();
        jobs.sort_by_key(|j| j.scheduled_at());
        jobs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::request::{ControlRequest, NodeAction};
    use tokio_util::sync::CancellationToken;

    fn job(node: &str, action: NodeAction) -> Job {
        Job::new(ControlRequest::new(node, action), CancellationToken::new())
    }

    #[test]
    fn put_then_get() {
        let mut registry = JobRegistry::new();
        let j = job("n1", NodeAction::Start);
        let id = j.id();
        assert!(registry.put(j).is_none());
        assert_eq!(registry.get(&JobKey::Node("n1".to_string())).map(Job::id), Some(id));
    }

    #[test]
    fn put_replaces_previous_occupant() {
        let mut registry = JobRegistry::new();
        let old = job("n1", NodeAction::Start);
        let old_id = old.id();
        registry.put(old);

        let new = job("n1", NodeAction::Stop);
        let replaced = registry.put(new);
        assert_eq!(replaced.map(|j| j.id()), Some(old_id));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn remove_if_current_removes_matching_occupant() {
        let mut registry = JobRegistry::new();
        let j = job("n1", NodeAction::Start);
        let key = j.key().clone();
        let id = j.id();
        registry.put(j);

        assert!(registry.remove_if_current(&key, id));
        assert!(registry.get(&key).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn remove_if_current_ignores_stale_job() {
        let mut registry = JobRegistry::new();
        let old = job("n1", NodeAction::Start);
        let old_id = old.id();
        let key = old.key().clone();
        registry.put(old);

        let new = job("n1", NodeAction::Restart);
        let new_id = new.id();
        registry.put(new);

        // The superseded job's cleanup must not evict its successor.
        assert!(!registry.remove_if_current(&key, old_id));
        assert_eq!(registry.get(&key).map(Job::id), Some(new_id));
    }

    #[test]
    fn separate_keys_do_not_interfere() {
        let mut registry = JobRegistry::new();
        registry.put(job("n1", NodeAction::Start));
        registry.put(job("n2", NodeAction::Start));
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.all().len(), 2);
    }
}
