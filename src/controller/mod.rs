// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Per-group replication controller.
//!
//! A controller keeps `minimal_replications` continuous jobs triggered for
//! one group, each on a distinct source drawn from the group's pool. It owns
//! the group's blacklist: sources whose jobs the engine stopped running are
//! excluded from selection until every source is excluded, at which point
//! the blacklist is reset.
//!
//! # Cycle
//!
//! 1. Resolve the source pool and fill the slots (see [`reconcile`](ReplicationController::reconcile))
//! 2. Sleep the settle delay so the engine can start new tasks
//!    (skipped after an exhaustion backoff)
//! 3. Wait while every desired job has a running task
//!    (see [`wait_for_divergence`](ReplicationController::wait_for_divergence))
//! 4. Sleep the recheck delay and start over
//!
//! Every sleep is raced against the shutdown signal. Engine and discovery
//! errors end [`run`](ReplicationController::run); the supervisor restarts
//! the controller with an empty blacklist.

mod health;
mod reconcile;
mod types;

pub use reconcile::{describe_direction, strip_credentials};
pub use types::{message_id, Reconciliation, WaitOutcome};

use crate::config::{ControllerSettings, GroupConfig};
use crate::discovery::{SourcePool, SourceResolver};
use crate::engine::couch::CouchEngine;
use crate::engine::{JobStore, TaskMonitor};
use crate::error::{ReplicationError, Result};
use crate::metrics;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{error, info, info_span, Instrument};

/// Reconciles one replication group against the replication engine.
pub struct ReplicationController {
    /// Group name, used as span field and metric label.
    name: String,

    /// Target every job of this group replicates into.
    target: String,

    minimal_replications: usize,

    settings: ControllerSettings,

    store: Arc<dyn JobStore>,

    monitor: Arc<dyn TaskMonitor>,

    sources: Arc<dyn SourceResolver>,

    /// Sources excluded from selection. Lives as long as the controller.
    blacklist: HashSet<String>,

    rng: StdRng,
}

impl ReplicationController {
    /// Create a controller for a group.
    pub fn new(
        name: impl Into<String>,
        group: &GroupConfig,
        settings: ControllerSettings,
        store: Arc<dyn JobStore>,
        monitor: Arc<dyn TaskMonitor>,
        sources: Arc<dyn SourceResolver>,
    ) -> Self {
        Self {
            name: name.into(),
            target: group.target.clone(),
            minimal_replications: group.minimal_replications,
            settings,
            store,
            monitor,
            sources,
            blacklist: HashSet::new(),
            rng: StdRng::from_entropy(),
        }
    }

    /// Create a controller that talks to the CouchDB server at the group's
    /// `admin` URL and resolves sources with the group's strategy.
    pub fn couchdb(name: impl Into<String>, group: &GroupConfig, settings: ControllerSettings) -> Result<Self> {
        let timeout = settings.request_timeout_duration();
        let engine = Arc::new(CouchEngine::new(&group.admin, timeout)?);
        let pool = Arc::new(SourcePool::from_group(group, timeout)?);
        Ok(Self::new(name, group, settings, engine.clone(), engine, pool))
    }

    /// Make source selection deterministic.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sources currently excluded from selection.
    pub fn blacklist(&self) -> &HashSet<String> {
        &self.blacklist
    }

    /// Fail if the pool cannot hold `minimal_replications` distinct sources.
    pub async fn check_sources(&self) -> Result<usize> {
        let available = self.sources.resolve().await?.len();
        if self.minimal_replications > available {
            error!(
                message_id = message_id::REPLICATIONS_COUNT_IS_LOWER,
                required = self.minimal_replications,
                available,
                "Replications count is lower then possible sources list"
            );
            return Err(ReplicationError::InsufficientSources {
                required: self.minimal_replications,
                available,
            });
        }
        Ok(available)
    }

    /// Run cycles until shutdown is signalled or an error escapes.
    pub async fn run(&mut self, shutdown: watch::Receiver<bool>) -> Result<()> {
        let span = info_span!("controller", group = %self.name);
        self.run_cycles(shutdown).instrument(span).await
    }

    async fn run_cycles(&mut self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let available = self.check_sources().await?;
        info!(
            target_db = %strip_credentials(&self.target),
            minimal_replications = self.minimal_replications,
            sources = available,
            "Controller started"
        );

        // Mark the current value as seen so changed() only fires on a new signal
        let _ = shutdown.borrow_and_update();

        loop {
            if *shutdown.borrow() {
                break;
            }
            let started = Instant::now();

            let outcome = self.reconcile().await?;
            let pause = if outcome.exhausted {
                self.settings.exhaustion_backoff()
            } else {
                self.settings.settle_delay()
            };
            if !sleep_or_shutdown(pause, &mut shutdown).await {
                break;
            }

            if let WaitOutcome::Shutdown = self.wait_for_divergence(&outcome.desired, &mut shutdown).await? {
                break;
            }
            metrics::record_cycle(&self.name, started.elapsed());

            if !sleep_or_shutdown(self.settings.recheck_delay(), &mut shutdown).await {
                break;
            }
        }

        info!("Shutdown signal received, controller stopped");
        Ok(())
    }
}

/// Sleep for `duration` unless shutdown is signalled first.
///
/// Returns `false` on shutdown (or when the signal's sender is gone).
pub(crate) async fn sleep_or_shutdown(duration: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    if *shutdown.borrow() {
        return false;
    }
    let sleep = tokio::time::sleep(duration);
    tokio::pin!(sleep);

    loop {
        tokio::select! {
            _ = &mut sleep => return true,
            result = shutdown.changed() => {
                if result.is_err() || *shutdown.borrow() {
                    return false;
                }
            }
        }
    }
}
