// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Replication job and task types.
//!
//! These mirror the documents the replication engine keeps in its
//! replicator collection and the entries of its running-tasks listing.
//! Only the fields the controller reads are modeled.

use serde::{Deserialize, Deserializer, Serialize};

/// Job identifiers with this prefix are engine-internal (design documents).
pub const RESERVED_ID_PREFIX: &str = "_design/";

/// Task type reported for replication tasks.
pub const REPLICATION_TASK_TYPE: &str = "replication";

/// Replication state of a job, as reported by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum JobState {
    /// Accepted by the engine, not yet running.
    Created,
    /// Running.
    Triggered,
    /// Failed.
    Error,
    /// Finished (only non-continuous jobs complete).
    Completed,
    /// Anything else, including a missing state.
    Other(String),
}

impl JobState {
    /// Parse the engine's state string.
    pub fn parse(state: &str) -> Self {
        match state {
            "created" => Self::Created,
            "triggered" => Self::Triggered,
            "error" => Self::Error,
            "completed" => Self::Completed,
            other => Self::Other(other.to_string()),
        }
    }

    /// The engine's string for this state.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Created => "created",
            Self::Triggered => "triggered",
            Self::Error => "error",
            Self::Completed => "completed",
            Self::Other(s) => s,
        }
    }

    pub fn is_triggered(&self) -> bool {
        matches!(self, Self::Triggered)
    }
}

impl Default for JobState {
    fn default() -> Self {
        Self::Other(String::new())
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for JobState {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for JobState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let state = Option::<String>::deserialize(deserializer)?;
        Ok(state.map(|s| Self::parse(&s)).unwrap_or_default())
    }
}

/// The body of a job the controller asks the engine to create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSpec {
    pub source: String,
    pub target: String,
    pub continuous: bool,
    pub create_target: bool,
}

impl JobSpec {
    /// A continuous job that creates the target if missing.
    pub fn continuous(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            continuous: true,
            create_target: true,
        }
    }
}

/// A replication job document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplicationJob {
    #[serde(rename = "_id")]
    pub id: String,

    /// Revision token; required by the engine to delete the document.
    #[serde(rename = "_rev", default, skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,

    #[serde(default, deserialize_with = "endpoint")]
    pub source: String,

    #[serde(default, deserialize_with = "endpoint")]
    pub target: String,

    #[serde(default)]
    pub continuous: bool,

    #[serde(default)]
    pub create_target: bool,

    #[serde(rename = "_replication_state", default)]
    pub state: JobState,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
}

impl ReplicationJob {
    /// Build a job document from a spec (used by in-memory stores).
    pub fn from_spec(id: impl Into<String>, spec: JobSpec, state: JobState) -> Self {
        Self {
            id: id.into(),
            rev: None,
            source: spec.source,
            target: spec.target,
            continuous: spec.continuous,
            create_target: spec.create_target,
            state,
            progress: None,
        }
    }
}

/// One entry of the engine's running-tasks listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    #[serde(rename = "type", default)]
    pub task_type: String,

    /// Identifier of the job document that started this task.
    #[serde(default)]
    pub doc_id: Option<String>,

    #[serde(default)]
    pub replication_id: Option<String>,

    #[serde(default)]
    pub progress: Option<f64>,
}

impl TaskRecord {
    /// A replication task for the given job.
    pub fn replication(doc_id: impl Into<String>, replication_id: impl Into<String>, progress: Option<f64>) -> Self {
        Self {
            task_type: REPLICATION_TASK_TYPE.to_string(),
            doc_id: Some(doc_id.into()),
            replication_id: Some(replication_id.into()),
            progress,
        }
    }

    pub fn is_replication(&self) -> bool {
        self.task_type == REPLICATION_TASK_TYPE
    }
}

/// Endpoints are either a URL string or an object with a `url` field.
fn endpoint<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Endpoint {
        Url(String),
        Object { url: String },
    }

    Ok(match Option::<Endpoint>::deserialize(deserializer)? {
        Some(Endpoint::Url(url)) | Some(Endpoint::Object { url }) => url,
        None => String::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_state_parse() {
        assert_eq!(JobState::parse("triggered"), JobState::Triggered);
        assert_eq!(JobState::parse("error"), JobState::Error);
        assert_eq!(JobState::parse("crashing"), JobState::Other("crashing".into()));
        assert!(JobState::Triggered.is_triggered());
        assert!(!JobState::Created.is_triggered());
    }

    #[test]
    fn test_job_from_engine_document() {
        let doc = r#"{
            "_id": "abc",
            "_rev": "3-xyz",
            "source": "http://user:pw@a.example:5984/db",
            "target": {"url": "http://localhost:5984/db", "headers": {}},
            "continuous": true,
            "create_target": true,
            "_replication_state": "triggered",
            "_replication_id": "r1"
        }"#;
        let job: ReplicationJob = serde_json::from_str(doc).unwrap();
        assert_eq!(job.id, "abc");
        assert_eq!(job.rev.as_deref(), Some("3-xyz"));
        assert_eq!(job.source, "http://user:pw@a.example:5984/db");
        assert_eq!(job.target, "http://localhost:5984/db");
        assert!(job.continuous);
        assert!(job.state.is_triggered());
    }

    #[test]
    fn test_job_without_state_is_not_triggered() {
        let job: ReplicationJob = serde_json::from_str(r#"{"_id": "a", "source": "s", "target": "t"}"#).unwrap();
        assert!(!job.state.is_triggered());
        assert!(!job.continuous);
    }

    #[test]
    fn test_job_spec_serializes_creation_flags() {
        let body = serde_json::to_value(JobSpec::continuous("s", "t")).unwrap();
        assert_eq!(body["continuous"], true);
        assert_eq!(body["create_target"], true);
        assert_eq!(body["source"], "s");
        assert_eq!(body["target"], "t");
    }

    #[test]
    fn test_task_record_tolerates_missing_fields() {
        let tasks: Vec<TaskRecord> = serde_json::from_str(
            r#"[
                {"type": "replication", "doc_id": "a", "replication_id": "r1", "progress": 42},
                {"type": "indexer", "database": "db"}
            ]"#,
        )
        .unwrap();
        assert!(tasks[0].is_replication());
        assert_eq!(tasks[0].progress, Some(42.0));
        assert!(!tasks[1].is_replication());
        assert!(tasks[1].doc_id.is_none());
    }
}
