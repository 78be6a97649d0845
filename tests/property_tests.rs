//! Property-based tests using proptest.
//!
//! These tests verify invariants of a slot-filling pass that should hold for
//! any starting store, helping catch edge cases that unit tests might miss.

mod common;

use common::*;
use proptest::prelude::*;
use replication_manager::{JobSpec, JobState, MemoryEngine, Reconciliation, ReplicationJob};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

const POOL: [&str; 5] = [
    "http://u:p@couch-0:5984/db",
    "http://u:p@couch-1:5984/db",
    "http://u:p@couch-2:5984/db",
    "http://u:p@couch-3:5984/db",
    "http://u:p@couch-4:5984/db",
];

#[derive(Debug, Clone)]
struct JobShape {
    source: usize,
    state: JobState,
    continuous: bool,
    same_target: bool,
}

fn job_state() -> impl Strategy<Value = JobState> {
    prop_oneof![
        4 => Just(JobState::Triggered),
        1 => Just(JobState::Error),
        1 => Just(JobState::Created),
        1 => Just(JobState::Completed),
    ]
}

fn job_shape() -> impl Strategy<Value = JobShape> {
    // Source index 5 is outside every pool.
    (0usize..6, job_state(), prop::bool::weighted(0.9), prop::bool::weighted(0.9)).prop_map(
        |(source, state, continuous, same_target)| JobShape {
            source,
            state,
            continuous,
            same_target,
        },
    )
}

fn source_url(index: usize) -> String {
    POOL.get(index)
        .map(|s| s.to_string())
        .unwrap_or_else(|| "http://u:p@couch-elsewhere:5984/db".to_string())
}

/// Seed an engine, run passes, and return the outcomes with the controller's
/// final blacklist and the store as it was before each pass.
fn run_passes(
    shapes: &[JobShape],
    pool_size: usize,
    minimal: usize,
    passes: usize,
) -> Vec<(Reconciliation, HashSet<String>, HashMap<String, ReplicationJob>)> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();

    runtime.block_on(async {
        let engine = Arc::new(MemoryEngine::new());
        for (i, shape) in shapes.iter().enumerate() {
            let target = if shape.same_target { TARGET } else { "http://couch-local:5984/other" };
            let mut job = ReplicationJob::from_spec(
                format!("seed-{:03}", i),
                JobSpec::continuous(source_url(shape.source), target),
                shape.state.clone(),
            );
            job.continuous = shape.continuous;
            engine.insert(job).await;
        }

        let mut c = controller(&engine, minimal, &POOL[..pool_size]);
        let mut results = Vec::new();
        for _ in 0..passes {
            let before: HashMap<String, ReplicationJob> =
                engine.jobs().await.into_iter().map(|job| (job.id.clone(), job)).collect();
            let outcome = c.reconcile().await.unwrap();
            results.push((outcome, c.blacklist().clone(), before));
        }
        results
    })
}

proptest! {
    /// Desired sources are pairwise distinct, drawn from the pool, and never
    /// blacklisted.
    #[test]
    fn desired_sources_distinct_and_not_blacklisted(
        shapes in prop::collection::vec(job_shape(), 0..12),
        pool_size in 1usize..=5,
        minimal_seed in 1usize..=5,
    ) {
        let minimal = minimal_seed.min(pool_size);
        for (outcome, blacklist, _) in run_passes(&shapes, pool_size, minimal, 3) {
            let sources: Vec<&str> = outcome.desired_sources();
            let distinct: HashSet<&str> = sources.iter().copied().collect();
            prop_assert_eq!(distinct.len(), sources.len());

            for source in &sources {
                prop_assert!(POOL[..pool_size].contains(source));
                prop_assert!(!blacklist.contains(*source));
            }
        }
    }

    /// A job found by scanning only enters the desired set while triggered.
    #[test]
    fn only_triggered_jobs_are_kept(
        shapes in prop::collection::vec(job_shape(), 0..12),
        pool_size in 1usize..=5,
        minimal_seed in 1usize..=5,
    ) {
        let minimal = minimal_seed.min(pool_size);
        for (outcome, _, before) in run_passes(&shapes, pool_size, minimal, 3) {
            for job in &outcome.desired {
                if outcome.created.contains(&job.id) {
                    continue;
                }
                let stored = &before[&job.id];
                prop_assert!(stored.state.is_triggered());
                prop_assert!(stored.continuous);
                prop_assert_eq!(stored.target.as_str(), TARGET);
            }
        }
    }

    /// Every slot is filled unless the pool ran dry; nothing is over-filled.
    #[test]
    fn slots_filled_unless_exhausted(
        shapes in prop::collection::vec(job_shape(), 0..12),
        pool_size in 1usize..=5,
        minimal_seed in 1usize..=5,
    ) {
        let minimal = minimal_seed.min(pool_size);
        for (outcome, blacklist, _) in run_passes(&shapes, pool_size, minimal, 3) {
            prop_assert!(outcome.desired.len() <= minimal);
            if outcome.exhausted {
                prop_assert!(blacklist.is_empty());
            } else {
                prop_assert_eq!(outcome.desired.len(), minimal);
            }
        }
    }

    /// Deleted jobs were matching, non-triggered jobs and their sources end
    /// up blacklisted (unless the pass then reset the blacklist).
    #[test]
    fn deletions_are_unhealthy_group_jobs(
        shapes in prop::collection::vec(job_shape(), 0..12),
        pool_size in 1usize..=5,
        minimal_seed in 1usize..=5,
    ) {
        let minimal = minimal_seed.min(pool_size);
        for (outcome, blacklist, before) in run_passes(&shapes, pool_size, minimal, 3) {
            for id in &outcome.deleted {
                let job = &before[id];
                prop_assert!(!job.state.is_triggered());
                prop_assert!(job.continuous);
                prop_assert_eq!(job.target.as_str(), TARGET);
                prop_assert!(POOL[..pool_size].contains(&job.source.as_str()));
                if !outcome.exhausted {
                    prop_assert!(blacklist.contains(&job.source));
                }
            }
        }
    }
}
