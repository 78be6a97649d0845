// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Replication engine integration traits.
//!
//! The controller never moves data itself. It talks to an external
//! replication engine through two narrow interfaces:
//!
//! - [`JobStore`]: CRUD over replication job documents
//! - [`TaskMonitor`]: read-only listing of running engine tasks
//!
//! [`couch::CouchEngine`] implements both against CouchDB's `_replicator`
//! database and `_active_tasks` endpoint. [`memory::MemoryEngine`] implements
//! both in memory for tests and dry runs.
//!
//! # Example
//!
//! ```rust,no_run
//! use replication_manager::engine::{BoxFuture, JobStore, JobSpec, ReplicationJob};
//!
//! struct MyStore;
//!
//! impl JobStore for MyStore {
//!     fn create(&self, spec: JobSpec) -> BoxFuture<'_, String> {
//!         Box::pin(async move { Ok(format!("job-for-{}", spec.source)) })
//!     }
//!
//!     fn get(&self, id: &str) -> BoxFuture<'_, ReplicationJob> {
//!         let id = id.to_string();
//!         Box::pin(async move { Err(replication_manager::ReplicationError::NotFound(id)) })
//!     }
//!
//!     fn enumerate(&self) -> BoxFuture<'_, Vec<String>> {
//!         Box::pin(async { Ok(vec![]) })
//!     }
//!
//!     fn delete(&self, _job: &ReplicationJob) -> BoxFuture<'_, ()> {
//!         Box::pin(async { Ok(()) })
//!     }
//! }
//! ```

pub mod couch;
pub mod memory;
mod types;

pub use types::{
    JobSpec, JobState, ReplicationJob, TaskRecord, REPLICATION_TASK_TYPE, RESERVED_ID_PREFIX,
};

use crate::error::Result;
use std::future::Future;
use std::pin::Pin;

/// Type alias for boxed async futures (reduces trait signature complexity).
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// CRUD interface over replication job documents.
///
/// Implementations must be object safe; the controller holds them as
/// `Arc<dyn JobStore>`.
pub trait JobStore: Send + Sync + 'static {
    /// Create a job document and return its identifier.
    fn create(&self, spec: JobSpec) -> BoxFuture<'_, String>;

    /// Fetch a job document.
    ///
    /// Returns [`ReplicationError::NotFound`](crate::ReplicationError::NotFound)
    /// if no document has this identifier.
    fn get(&self, id: &str) -> BoxFuture<'_, ReplicationJob>;

    /// List all document identifiers, including reserved ones
    /// (see [`is_reserved_id`]).
    fn enumerate(&self) -> BoxFuture<'_, Vec<String>>;

    /// Delete a job document.
    fn delete(&self, job: &ReplicationJob) -> BoxFuture<'_, ()>;
}

/// Read-only interface over the engine's running tasks.
pub trait TaskMonitor: Send + Sync + 'static {
    /// List all currently running tasks (of every type).
    fn list_tasks(&self) -> BoxFuture<'_, Vec<TaskRecord>>;
}

/// Whether a document identifier denotes an engine-internal entry.
pub fn is_reserved_id(id: &str) -> bool {
    id.starts_with(RESERVED_ID_PREFIX)
}
