// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Metrics for observability.
//!
//! Records through the `metrics` facade. No exporter is installed by this
//! crate; an embedding process that installs a recorder gets these for free,
//! otherwise they are no-ops.
//!
//! # Metric Naming Convention
//!
//! All metrics are prefixed with `replication_` and labeled with the group
//! name where one applies:
//! - Counters end in `_total`
//! - Gauges represent current state
//! - Histograms track durations in seconds

use metrics::{counter, gauge, histogram};
use std::time::Duration;

/// Record a job created by a controller.
pub fn record_job_created(group: &str) {
    counter!("replication_jobs_created_total", "group" => group.to_string()).increment(1);
}

/// Record an unhealthy job deleted by a controller.
pub fn record_job_deleted(group: &str) {
    counter!("replication_jobs_deleted_total", "group" => group.to_string()).increment(1);
}

/// Record a source added to a group's blacklist.
pub fn record_source_blacklisted(group: &str) {
    counter!("replication_sources_blacklisted_total", "group" => group.to_string()).increment(1);
}

/// Record a blacklist reset after every source was excluded.
pub fn record_sources_exhausted(group: &str) {
    counter!("replication_sources_exhausted_total", "group" => group.to_string()).increment(1);
}

/// Record the current blacklist size.
pub fn set_blacklist_size(group: &str, size: usize) {
    gauge!("replication_blacklist_size", "group" => group.to_string()).set(size as f64);
}

/// Record the size of the desired set after slot filling.
pub fn set_desired_jobs(group: &str, count: usize) {
    gauge!("replication_desired_jobs", "group" => group.to_string()).set(count as f64);
}

/// Record how many desired jobs have a running task.
pub fn set_running_tasks(group: &str, count: usize) {
    gauge!("replication_running_tasks", "group" => group.to_string()).set(count as f64);
}

/// Record the progress reported for a running replication task.
pub fn set_task_progress(group: &str, replication_id: &str, progress: f64) {
    gauge!(
        "replication_task_progress",
        "group" => group.to_string(),
        "replication_id" => replication_id.to_string()
    )
    .set(progress);
}

/// Record a completed reconciliation cycle.
pub fn record_cycle(group: &str, duration: Duration) {
    counter!("replication_cycles_total", "group" => group.to_string()).increment(1);
    histogram!("replication_cycle_duration_seconds", "group" => group.to_string())
        .record(duration.as_secs_f64());
}

/// Record a controller restart by the supervisor.
pub fn record_controller_restart(group: &str) {
    counter!("replication_controller_restarts_total", "group" => group.to_string()).increment(1);
}

/// Record a controller exit and how it ended ("ok", "error", "panic").
pub fn record_controller_exit(group: &str, outcome: &str) {
    counter!(
        "replication_controller_exits_total",
        "group" => group.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Record the number of groups currently supervised.
pub fn set_supervised_groups(count: usize) {
    gauge!("replication_supervised_groups").set(count as f64);
}

/// Record replication engine request latency by operation.
pub fn record_engine_request(operation: &str, success: bool, duration: Duration) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "replication_engine_requests_total",
        "operation" => operation.to_string(),
        "status" => status
    )
    .increment(1);
    histogram!("replication_engine_request_duration_seconds", "operation" => operation.to_string())
        .record(duration.as_secs_f64());
}

/// Record a source discovery lookup.
pub fn record_discovery(strategy: &str, sources: usize, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "replication_discovery_lookups_total",
        "strategy" => strategy.to_string(),
        "status" => status
    )
    .increment(1);
    if success {
        gauge!("replication_discovered_sources", "strategy" => strategy.to_string()).set(sources as f64);
    }
}
