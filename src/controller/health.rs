// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Health wait: hold a cycle open while every desired job has a running task.

use super::types::WaitOutcome;
use super::{sleep_or_shutdown, ReplicationController};
use crate::engine::{ReplicationJob, TaskRecord};
use crate::error::Result;
use crate::metrics;
use std::collections::{BTreeMap, HashSet};
use tokio::sync::watch;
use tracing::{debug, info};

impl ReplicationController {
    /// Poll running tasks until the number belonging to `desired` changes.
    ///
    /// Tasks are listed right away and then once per poll interval while the
    /// count still matches. An empty desired set diverges immediately since
    /// there is nothing to watch.
    pub async fn wait_for_divergence(
        &self,
        desired: &[ReplicationJob],
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<WaitOutcome> {
        let expected = desired.len();
        if expected == 0 {
            return Ok(WaitOutcome::Diverged { expected, running: 0 });
        }
        let ids: HashSet<&str> = desired.iter().map(|job| job.id.as_str()).collect();

        loop {
            let tasks = self.monitor.list_tasks().await?;
            let running: Vec<&TaskRecord> = tasks
                .iter()
                .filter(|task| task.is_replication())
                .filter(|task| task.doc_id.as_deref().is_some_and(|id| ids.contains(id)))
                .collect();

            self.report_progress(&running);

            if running.len() != expected {
                info!(expected, running = running.len(), "Running replications diverged from desired set");
                return Ok(WaitOutcome::Diverged {
                    expected,
                    running: running.len(),
                });
            }
            debug!(expected, "All desired replications running");

            if !sleep_or_shutdown(self.settings.health_poll_interval(), shutdown).await {
                return Ok(WaitOutcome::Shutdown);
            }
        }
    }

    fn report_progress(&self, running: &[&TaskRecord]) {
        let progress: BTreeMap<&str, f64> = running
            .iter()
            .filter_map(|task| Some((task.replication_id.as_deref()?, task.progress.unwrap_or(0.0))))
            .collect();

        for (replication_id, value) in &progress {
            metrics::set_task_progress(&self.name, replication_id, *value);
        }
        metrics::set_running_tasks(&self.name, running.len());
        info!(replications_progress = ?progress, "Replication progress");
    }
}
