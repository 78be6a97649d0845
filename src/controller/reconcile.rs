// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Slot filling: pick the jobs that represent a group for one cycle.
//!
//! Each of the `minimal_replications` slots is filled by scanning the job
//! store for a continuous job into the group's target whose source is in the
//! pool and not yet chosen this cycle:
//!
//! 1. A matching job that is not `triggered` is deleted and its source is
//!    blacklisted. Scanning continues.
//! 2. A matching triggered job on a blacklisted source is passed over.
//! 3. The first remaining matching triggered job takes the slot.
//!
//! If the scan comes up empty a new job is created for a random source from
//! the whitelist (pool minus blacklist minus chosen). If the whitelist is
//! empty too, the blacklist is reset and the pass ends early.

use super::types::{message_id, Reconciliation};
use super::ReplicationController;
use crate::engine::{is_reserved_id, JobSpec, JobState, ReplicationJob};
use crate::error::{ReplicationError, Result};
use crate::metrics;
use rand::seq::SliceRandom;
use std::collections::HashSet;
use tracing::{debug, info, warn};
use url::Url;

impl ReplicationController {
    /// Run one slot-filling pass against the current source pool.
    ///
    /// Creates and deletes jobs as needed and updates the blacklist. When the
    /// whitelist runs dry the blacklist is cleared immediately and the result
    /// is marked [`exhausted`](Reconciliation::exhausted); the caller owns the
    /// backoff before the next pass.
    pub async fn reconcile(&mut self) -> Result<Reconciliation> {
        let pool = self.sources.resolve().await?;
        let mut outcome = Reconciliation::default();
        let mut chosen: HashSet<String> = HashSet::new();

        for slot in 0..self.minimal_replications {
            let selected = match self.scan_for_slot(&pool, &chosen, &mut outcome).await? {
                Some(job) => {
                    debug!(slot, id = %job.id, source = %strip_credentials(&job.source), "Keeping triggered job");
                    job
                }
                None => match self.pick_source(&pool, &chosen) {
                    Some(source) => self.create_job(source, &mut outcome).await?,
                    None => {
                        warn!(
                            slot,
                            pool = pool.len(),
                            blacklisted = self.blacklist.len(),
                            "All sources are blacklisted, resetting blacklist"
                        );
                        metrics::record_sources_exhausted(&self.name);
                        self.blacklist.clear();
                        outcome.exhausted = true;
                        break;
                    }
                },
            };
            chosen.insert(selected.source.clone());
            outcome.desired.push(selected);
        }

        metrics::set_desired_jobs(&self.name, outcome.desired.len());
        metrics::set_blacklist_size(&self.name, self.blacklist.len());
        Ok(outcome)
    }

    /// Scan the store once for a job that can take the next slot.
    async fn scan_for_slot(
        &mut self,
        pool: &HashSet<String>,
        chosen: &HashSet<String>,
        outcome: &mut Reconciliation,
    ) -> Result<Option<ReplicationJob>> {
        let ids = self.store.enumerate().await?;
        for id in ids {
            if is_reserved_id(&id) {
                continue;
            }

            let job = match self.store.get(&id).await {
                Ok(job) => job,
                Err(e) if e.is_not_found() => {
                    debug!(id = %id, "Job vanished during scan");
                    continue;
                }
                Err(e) => return Err(e),
            };

            if !self.is_candidate(&job, pool, chosen) {
                continue;
            }

            if !job.state.is_triggered() {
                self.remove_unhealthy(job, outcome).await?;
                continue;
            }

            if self.blacklist.contains(&job.source) {
                debug!(id = %job.id, source = %strip_credentials(&job.source), "Skipping job on blacklisted source");
                continue;
            }

            return Ok(Some(job));
        }
        Ok(None)
    }

    fn is_candidate(&self, job: &ReplicationJob, pool: &HashSet<String>, chosen: &HashSet<String>) -> bool {
        job.target == self.target
            && job.continuous
            && pool.contains(&job.source)
            && !chosen.contains(&job.source)
    }

    /// Delete a job the engine is no longer running and blacklist its source.
    async fn remove_unhealthy(&mut self, job: ReplicationJob, outcome: &mut Reconciliation) -> Result<()> {
        match self.store.delete(&job).await {
            Ok(()) => {}
            // Already gone: the source is still suspect.
            Err(ReplicationError::NotFound(_)) => {}
            Err(e) => return Err(e),
        }
        info!(
            message_id = message_id::DELETE_REPLICATION,
            id = %job.id,
            state = %job.state,
            "Deleted replication that is not triggered"
        );
        metrics::record_job_deleted(&self.name);
        outcome.deleted.push(job.id);

        info!(
            message_id = message_id::BLACKLISTED,
            source = %endpoint_label(&job.source),
            "Source blacklisted"
        );
        if self.blacklist.insert(job.source.clone()) {
            metrics::record_source_blacklisted(&self.name);
            outcome.blacklisted.push(job.source);
        }
        Ok(())
    }

    /// Choose a whitelisted source uniformly at random.
    fn pick_source(&mut self, pool: &HashSet<String>, chosen: &HashSet<String>) -> Option<String> {
        let mut whitelist: Vec<&String> = pool
            .iter()
            .filter(|source| !self.blacklist.contains(*source) && !chosen.contains(*source))
            .collect();
        // Set iteration order varies between runs; sort so a seeded rng repeats.
        whitelist.sort();
        whitelist.choose(&mut self.rng).map(|source| (*source).clone())
    }

    async fn create_job(&mut self, source: String, outcome: &mut Reconciliation) -> Result<ReplicationJob> {
        let spec = JobSpec::continuous(source, self.target.clone());
        let id = self.store.create(spec.clone()).await?;
        info!(
            message_id = message_id::CREATE_REPLICATION,
            id = %id,
            direction = %describe_direction(&spec.source, &spec.target),
            "Created replication"
        );
        metrics::record_job_created(&self.name);
        outcome.created.push(id.clone());
        Ok(ReplicationJob::from_spec(id, spec, JobState::Created))
    }
}

/// Remove user info from an endpoint before it is logged.
///
/// Endpoints that don't parse as URLs keep whatever follows the last `@`.
pub fn strip_credentials(endpoint: &str) -> String {
    match Url::parse(endpoint) {
        Ok(mut url) if url.has_host() => {
            let _ = url.set_username("");
            let _ = url.set_password(None);
            url.to_string()
        }
        _ => endpoint
            .rsplit_once('@')
            .map(|(_, rest)| rest)
            .unwrap_or(endpoint)
            .to_string(),
    }
}

/// `host/path -> host/path`, or the bare paths when an endpoint has no host.
pub fn describe_direction(source: &str, target: &str) -> String {
    format!("{} -> {}", endpoint_label(source), endpoint_label(target))
}

fn endpoint_label(endpoint: &str) -> String {
    match Url::parse(endpoint) {
        Ok(url) => match url.host_str() {
            Some(host) => match url.port() {
                Some(port) => format!("{}:{}{}", host, port, url.path()),
                None => format!("{}{}", host, url.path()),
            },
            None => strip_credentials(url.path()),
        },
        Err(_) => strip_credentials(endpoint),
    }
}
