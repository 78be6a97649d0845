// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! In-memory replication engine.
//!
//! Implements both [`JobStore`] and [`TaskMonitor`] without any I/O, so the
//! controller can be exercised without a live CouchDB. Jobs are kept in
//! identifier order, which makes scans deterministic.
//!
//! By default a created job is immediately `triggered`, and the task listing
//! is derived from the jobs: every triggered job has one running replication
//! task. Tests flip a job's state with [`MemoryEngine::set_state`] to
//! simulate the engine giving up on it.

use super::{BoxFuture, JobSpec, JobState, JobStore, ReplicationJob, TaskMonitor, TaskRecord};
use crate::error::ReplicationError;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::RwLock;

/// How [`MemoryEngine::list_tasks`] answers.
#[derive(Debug, Clone)]
enum TaskSource {
    /// One task per triggered job.
    FromJobs,
    /// A fixed listing set by the test.
    Fixed(Vec<TaskRecord>),
}

/// In-memory job store and task monitor.
pub struct MemoryEngine {
    jobs: RwLock<BTreeMap<String, ReplicationJob>>,
    tasks: RwLock<TaskSource>,
    /// State given to newly created jobs.
    initial_state: JobState,
    next_id: AtomicUsize,
    created: RwLock<Vec<JobSpec>>,
    deleted: RwLock<Vec<String>>,
    /// Make enumerate() fail (simulates an unreachable engine).
    unavailable: AtomicBool,
}

impl MemoryEngine {
    /// Create an empty engine whose new jobs start `triggered`.
    pub fn new() -> Self {
        Self::with_initial_state(JobState::Triggered)
    }

    /// Create an empty engine whose new jobs start in `state`.
    pub fn with_initial_state(state: JobState) -> Self {
        Self {
            jobs: RwLock::new(BTreeMap::new()),
            tasks: RwLock::new(TaskSource::FromJobs),
            initial_state: state,
            next_id: AtomicUsize::new(1),
            created: RwLock::new(Vec::new()),
            deleted: RwLock::new(Vec::new()),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Insert a job document directly (bypasses the create log).
    pub async fn insert(&self, job: ReplicationJob) {
        self.jobs.write().await.insert(job.id.clone(), job);
    }

    /// Change a job's replication state, as the engine would.
    pub async fn set_state(&self, id: &str, state: JobState) -> bool {
        match self.jobs.write().await.get_mut(id) {
            Some(job) => {
                job.state = state;
                true
            }
            None => false,
        }
    }

    /// Replace the derived task listing with a fixed one.
    pub async fn set_tasks(&self, tasks: Vec<TaskRecord>) {
        *self.tasks.write().await = TaskSource::Fixed(tasks);
    }

    /// Go back to deriving tasks from triggered jobs.
    pub async fn derive_tasks_from_jobs(&self) {
        *self.tasks.write().await = TaskSource::FromJobs;
    }

    /// Make enumerate() fail until switched back.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Snapshot of all stored jobs in identifier order.
    pub async fn jobs(&self) -> Vec<ReplicationJob> {
        self.jobs.read().await.values().cloned().collect()
    }

    /// Every spec passed to create(), in call order.
    pub async fn created(&self) -> Vec<JobSpec> {
        self.created.read().await.clone()
    }

    /// Every identifier passed to delete(), in call order.
    pub async fn deleted(&self) -> Vec<String> {
        self.deleted.read().await.clone()
    }
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl JobStore for MemoryEngine {
    fn create(&self, spec: JobSpec) -> BoxFuture<'_, String> {
        Box::pin(async move {
            let id = format!("job-{:04}", self.next_id.fetch_add(1, Ordering::SeqCst));
            self.created.write().await.push(spec.clone());
            let job = ReplicationJob::from_spec(id.clone(), spec, self.initial_state.clone());
            self.jobs.write().await.insert(id.clone(), job);
            Ok(id)
        })
    }

    fn get(&self, id: &str) -> BoxFuture<'_, ReplicationJob> {
        let id = id.to_string();
        Box::pin(async move {
            self.jobs
                .read()
                .await
                .get(&id)
                .cloned()
                .ok_or(ReplicationError::NotFound(id))
        })
    }

    fn enumerate(&self) -> BoxFuture<'_, Vec<String>> {
        Box::pin(async move {
            if self.unavailable.load(Ordering::SeqCst) {
                return Err(ReplicationError::http_msg("enumerate", "engine unavailable"));
            }
            Ok(self.jobs.read().await.keys().cloned().collect())
        })
    }

    fn delete(&self, job: &ReplicationJob) -> BoxFuture<'_, ()> {
        let id = job.id.clone();
        Box::pin(async move {
            if self.jobs.write().await.remove(&id).is_none() {
                return Err(ReplicationError::NotFound(id));
            }
            tracing::trace!(id = %id, "MemoryEngine: deleted job");
            self.deleted.write().await.push(id);
            Ok(())
        })
    }
}

impl TaskMonitor for MemoryEngine {
    fn list_tasks(&self) -> BoxFuture<'_, Vec<TaskRecord>> {
        Box::pin(async move {
            let source = self.tasks.read().await.clone();
            Ok(match source {
                TaskSource::Fixed(tasks) => tasks,
                TaskSource::FromJobs => self
                    .jobs
                    .read()
                    .await
                    .values()
                    .filter(|job| job.state.is_triggered())
                    .map(|job| TaskRecord::replication(job.id.clone(), format!("rep-{}", job.id), job.progress))
                    .collect(),
            })
        })
    }
}
