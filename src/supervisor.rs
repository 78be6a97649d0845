// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Group supervisor: one controller task per group, restarted when it ends.
//!
//! Every check interval the supervisor looks for controller tasks that have
//! finished, whether they returned, failed, or panicked. Finished controllers
//! are rebuilt from the same configuration after the restart delay. There is
//! no backoff: a group with a permanently bad configuration is retried at the
//! same pace forever.
//!
//! Controllers share the supervisor's shutdown signal. Once it fires the
//! supervisor stops restarting and waits (bounded) for every controller to
//! finish its current sleep.

use crate::config::{ControllerSettings, GroupConfig, ManagerConfig, SupervisorSettings};
use crate::controller::{sleep_or_shutdown, ReplicationController};
use crate::error::Result;
use crate::metrics;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tracing::{error, info, warn};

/// Builds a controller for a named group.
pub type ControllerFactory = Arc<dyn Fn(&str, &GroupConfig) -> Result<ReplicationController> + Send + Sync>;

/// Factory wiring each group to its CouchDB server and source strategy.
pub fn couchdb_factory(settings: ControllerSettings) -> ControllerFactory {
    Arc::new(move |name: &str, group: &GroupConfig| ReplicationController::couchdb(name, group, settings.clone()))
}

type ControllerHandle = JoinHandle<Result<()>>;

/// Runs and restarts one controller per configured group.
pub struct GroupSupervisor {
    groups: BTreeMap<String, GroupConfig>,
    settings: SupervisorSettings,
    factory: ControllerFactory,
}

impl GroupSupervisor {
    /// Supervise every group of a loaded configuration against CouchDB.
    pub fn new(config: &ManagerConfig) -> Self {
        Self::with_factory(
            config.groups.clone(),
            config.supervisor.clone(),
            couchdb_factory(config.controller.clone()),
        )
    }

    /// Supervise groups with a custom controller factory.
    pub fn with_factory(
        groups: BTreeMap<String, GroupConfig>,
        settings: SupervisorSettings,
        factory: ControllerFactory,
    ) -> Self {
        Self {
            groups,
            settings,
            factory,
        }
    }

    /// Names of the supervised groups.
    pub fn group_names(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    /// Run until `shutdown` is set to `true`.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut running: BTreeMap<String, Option<ControllerHandle>> = BTreeMap::new();
        for (name, group) in &self.groups {
            running.insert(name.clone(), self.spawn(name, group, shutdown.clone()));
        }
        metrics::set_supervised_groups(running.len());
        info!(groups = running.len(), "Supervisor started");

        let _ = shutdown.borrow_and_update();

        loop {
            if !sleep_or_shutdown(self.settings.check_interval(), &mut shutdown).await {
                break;
            }

            let finished: Vec<String> = running
                .iter()
                .filter(|(_, handle)| handle.as_ref().map_or(true, JoinHandle::is_finished))
                .map(|(name, _)| name.clone())
                .collect();
            if finished.is_empty() {
                continue;
            }

            for name in &finished {
                if let Some(handle) = running.get_mut(name).and_then(Option::take) {
                    report_exit(name, handle.await);
                }
            }

            if !sleep_or_shutdown(self.settings.restart_delay(), &mut shutdown).await {
                break;
            }

            for name in finished {
                let Some(group) = self.groups.get(&name) else {
                    continue;
                };
                warn!(group = %name, "Restarting controller");
                metrics::record_controller_restart(&name);
                let handle = self.spawn(&name, group, shutdown.clone());
                running.insert(name, handle);
            }
        }

        info!("Shutdown signal received, stopping controllers");
        self.drain(running).await;
        info!("Supervisor stopped");
    }

    /// Build and start a controller. A factory failure leaves the slot empty
    /// so the next check retries it.
    fn spawn(&self, name: &str, group: &GroupConfig, shutdown: watch::Receiver<bool>) -> Option<ControllerHandle> {
        match (self.factory)(name, group) {
            Ok(mut controller) => {
                info!(group = %name, "Starting controller");
                Some(tokio::spawn(async move { controller.run(shutdown).await }))
            }
            Err(e) => {
                error!(group = %name, error = %e, "Failed to build controller");
                metrics::record_controller_exit(name, "error");
                None
            }
        }
    }

    /// Wait for every controller concurrently, aborting any that overrun the
    /// shutdown timeout.
    async fn drain(&self, running: BTreeMap<String, Option<ControllerHandle>>) {
        let timeout = self.settings.shutdown_timeout();
        let waits = running
            .into_iter()
            .filter_map(|(name, handle)| Some((name, handle?)))
            .map(|(name, handle)| async move {
                let abort = handle.abort_handle();
                match tokio::time::timeout(timeout, handle).await {
                    Ok(result) => report_exit(&name, result),
                    Err(_) => {
                        warn!(group = %name, timeout_secs = timeout.as_secs(), "Controller did not stop in time, aborting");
                        abort.abort();
                    }
                }
            });
        futures::future::join_all(waits).await;
    }
}

fn report_exit(name: &str, result: std::result::Result<Result<()>, JoinError>) {
    match result {
        Ok(Ok(())) => {
            info!(group = %name, "Controller finished");
            metrics::record_controller_exit(name, "ok");
        }
        Ok(Err(e)) => {
            warn!(group = %name, error = %e, "Controller failed");
            metrics::record_controller_exit(name, "error");
        }
        Err(e) if e.is_panic() => {
            error!(group = %name, "Controller panicked");
            metrics::record_controller_exit(name, "panic");
        }
        Err(e) => {
            warn!(group = %name, error = %e, "Controller task cancelled");
            metrics::record_controller_exit(name, "cancelled");
        }
    }
}
