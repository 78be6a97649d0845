// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Controller result types and log tags.
//!
//! # Cycle Shape
//!
//! ```text
//!   resolve pool ──→ fill slots ──→ settle ──→ health wait ──→ recheck delay ─┐
//!        ↑              │                          ↑                          │
//!        │              │ (whitelist empty)        │                          │
//!        │              └──→ backoff, reset ───────┘                          │
//!        └────────────────────────────────────────────────────────────────────┘
//! ```

use crate::engine::ReplicationJob;

/// Values of the `message_id` field on tagged log events.
pub mod message_id {
    /// A job was created for a freshly chosen source.
    pub const CREATE_REPLICATION: &str = "CREATE_REPLICATION";
    /// An unhealthy job was deleted.
    pub const DELETE_REPLICATION: &str = "DELETE_REPLICATION";
    /// A source was excluded from selection.
    pub const BLACKLISTED: &str = "BLACKLISTED";
    /// The group needs more replications than it has sources.
    pub const REPLICATIONS_COUNT_IS_LOWER: &str = "REPLICATIONS_COUNT_IS_LOWER";
}

/// What one slot-filling pass did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reconciliation {
    /// Jobs chosen to represent the group this cycle, one per distinct source.
    pub desired: Vec<ReplicationJob>,

    /// Identifiers of jobs created during the pass.
    pub created: Vec<String>,

    /// Identifiers of unhealthy jobs deleted during the pass.
    pub deleted: Vec<String>,

    /// Sources added to the blacklist during the pass.
    pub blacklisted: Vec<String>,

    /// Every source was excluded; the blacklist has been reset and the
    /// remaining slots were left empty.
    pub exhausted: bool,
}

impl Reconciliation {
    /// Sources of the desired jobs, in slot order.
    pub fn desired_sources(&self) -> Vec<&str> {
        self.desired.iter().map(|job| job.source.as_str()).collect()
    }

    /// Identifiers of the desired jobs, in slot order.
    pub fn desired_ids(&self) -> Vec<&str> {
        self.desired.iter().map(|job| job.id.as_str()).collect()
    }

    /// Nothing was created or deleted.
    pub fn is_noop(&self) -> bool {
        self.created.is_empty() && self.deleted.is_empty()
    }
}

/// How a health wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The number of running desired tasks no longer matches the desired set.
    Diverged { expected: usize, running: usize },
    /// Shutdown was signalled while waiting.
    Shutdown,
}
