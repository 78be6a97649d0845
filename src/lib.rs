// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! # Replication Manager
//!
//! Keeps a fixed number of continuous CouchDB replications alive for each
//! configured group, drawing sources from a pool and replacing replications
//! the engine stops running.
//!
//! ## Architecture
//!
//! The manager never copies data itself. It edits job documents in the
//! replication engine's `_replicator` database and watches `_active_tasks`:
//!
//! ```text
//!  ┌─────────────────┐  one task per group  ┌───────────────────────┐
//!  │ GroupSupervisor │─────────────────────►│ ReplicationController │
//!  │ (restart loop)  │                      │ (slots + blacklist)   │
//!  └─────────────────┘                      └───────────────────────┘
//!                                              │        │        │
//!                          ┌───────────────────┘        │        └──────────────┐
//!                          ▼                            ▼                       ▼
//!                  ┌───────────────┐          ┌──────────────────┐   ┌─────────────────────┐
//!                  │ SourcePool    │          │ JobStore         │   │ TaskMonitor         │
//!                  │ consul / dns /│          │ _replicator docs │   │ _active_tasks       │
//!                  │ static        │          └──────────────────┘   └─────────────────────┘
//!                  └───────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use replication_manager::{GroupSupervisor, ManagerConfig};
//! use tokio::sync::watch;
//!
//! #[tokio::main]
//! async fn main() -> replication_manager::Result<()> {
//!     let config = ManagerConfig::from_file("replication.yaml")?;
//!     let supervisor = GroupSupervisor::new(&config);
//!
//!     let (tx, rx) = watch::channel(false);
//!     let task = tokio::spawn(async move { supervisor.run(rx).await });
//!
//!     // ... later
//!     let _ = tx.send(true);
//!     let _ = task.await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod controller;
pub mod discovery;
pub mod engine;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod resilience;
pub mod supervisor;

// Re-exports for convenience
pub use config::{ControllerSettings, GroupConfig, ManagerConfig, SupervisorSettings};
pub use controller::{Reconciliation, ReplicationController, WaitOutcome};
pub use discovery::{FixedSources, SourcePool, SourceResolver};
pub use engine::memory::MemoryEngine;
pub use engine::couch::CouchEngine;
pub use engine::{JobSpec, JobState, JobStore, ReplicationJob, TaskMonitor, TaskRecord};
pub use error::{ReplicationError, Result};
pub use supervisor::{couchdb_factory, ControllerFactory, GroupSupervisor};
