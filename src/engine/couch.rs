// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! CouchDB replication engine client.
//!
//! Jobs are documents in the `_replicator` database; running tasks come from
//! `_active_tasks`. Credentials embedded in the admin URL are stripped from
//! the request URL and sent as HTTP basic auth instead.
//!
//! | Operation | Request |
//! |-----------|---------|
//! | enumerate | `GET /_replicator/_all_docs` |
//! | get | `GET /_replicator/{id}` |
//! | create | `POST /_replicator` |
//! | delete | `DELETE /_replicator/{id}?rev={rev}` |
//! | list_tasks | `GET /_active_tasks` |
//!
//! Every request carries the configured timeout. Reads are retried with
//! backoff on transient errors; writes are sent once.

use super::{BoxFuture, JobSpec, JobStore, ReplicationJob, TaskMonitor, TaskRecord};
use crate::error::{ReplicationError, Result};
use crate::metrics;
use crate::resilience::{retry, RetryConfig};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::debug;
use url::Url;

/// Name of the replicator database.
pub const REPLICATOR_DB: &str = "_replicator";

/// Name of the running-tasks endpoint.
pub const ACTIVE_TASKS: &str = "_active_tasks";

#[derive(Deserialize)]
struct AllDocs {
    rows: Vec<AllDocsRow>,
}

#[derive(Deserialize)]
struct AllDocsRow {
    id: String,
}

#[derive(Deserialize)]
struct CreateResponse {
    id: String,
}

/// HTTP client for one CouchDB server acting as replication engine.
pub struct CouchEngine {
    client: Client,
    base: Url,
    credentials: Option<(String, Option<String>)>,
    retry: RetryConfig,
}

impl CouchEngine {
    /// Create a client for the server at `admin` (may carry credentials).
    pub fn new(admin: &str, request_timeout: Duration) -> Result<Self> {
        let mut base = Url::parse(admin)
            .map_err(|e| ReplicationError::Config(format!("invalid admin URL: {}", e)))?;
        if base.cannot_be_a_base() {
            return Err(ReplicationError::Config(format!("admin URL cannot be a base: {}", admin)));
        }

        let credentials = if base.username().is_empty() {
            None
        } else {
            Some((base.username().to_string(), base.password().map(str::to_string)))
        };
        // Both setters only fail for cannot-be-a-base URLs, ruled out above.
        let _ = base.set_username("");
        let _ = base.set_password(None);

        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| ReplicationError::http("build client", e))?;

        Ok(Self {
            client,
            base,
            credentials,
            retry: RetryConfig::default(),
        })
    }

    /// Override the read retry policy.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// The server URL without credentials.
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Build `base/segment/segment/...`, percent-encoding each segment.
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| ReplicationError::Internal("admin URL cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.credentials {
            Some((user, password)) => builder.basic_auth(user, password.as_deref()),
            None => builder,
        }
    }

    /// Send a request and decode a JSON body, recording latency.
    async fn send_json<T: DeserializeOwned>(&self, operation: &str, builder: RequestBuilder) -> Result<T> {
        let start = Instant::now();
        let result: Result<T> = async {
            let response = builder
                .send()
                .await
                .map_err(|e| ReplicationError::http(operation, e))?;
            let response = check_status(operation, response).await?;
            response
                .json::<T>()
                .await
                .map_err(|e| ReplicationError::http(operation, e))
        }
        .await;
        metrics::record_engine_request(operation, result.is_ok(), start.elapsed());
        result
    }

    /// GET with retries.
    async fn get_json<T: DeserializeOwned>(&self, operation: &str, url: Url) -> Result<T> {
        retry(&self.retry, operation, || {
            let builder = self.request(Method::GET, url.clone());
            self.send_json(operation, builder)
        })
        .await
    }
}

async fn check_status(operation: &str, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(ReplicationError::NotFound(operation.to_string()));
    }
    let message = response.text().await.unwrap_or_default();
    Err(ReplicationError::Engine {
        operation: operation.to_string(),
        status: status.as_u16(),
        message,
    })
}

impl JobStore for CouchEngine {
    fn create(&self, spec: JobSpec) -> BoxFuture<'_, String> {
        Box::pin(async move {
            let url = self.url(&[REPLICATOR_DB])?;
            let builder = self.request(Method::POST, url).json(&spec);
            let created: CreateResponse = self.send_json("create", builder).await?;
            debug!(id = %created.id, "Created replicator document");
            Ok(created.id)
        })
    }

    fn get(&self, id: &str) -> BoxFuture<'_, ReplicationJob> {
        let id = id.to_string();
        Box::pin(async move {
            let url = self.url(&[REPLICATOR_DB, &id])?;
            self.get_json("get", url).await.map_err(|e| {
                if e.is_not_found() {
                    ReplicationError::NotFound(id.clone())
                } else {
                    e
                }
            })
        })
    }

    fn enumerate(&self) -> BoxFuture<'_, Vec<String>> {
        Box::pin(async move {
            let url = self.url(&[REPLICATOR_DB, "_all_docs"])?;
            let docs: AllDocs = self.get_json("enumerate", url).await?;
            Ok(docs.rows.into_iter().map(|row| row.id).collect())
        })
    }

    fn delete(&self, job: &ReplicationJob) -> BoxFuture<'_, ()> {
        let job = job.clone();
        Box::pin(async move {
            let rev = match job.rev {
                Some(rev) => rev,
                None => self
                    .get(&job.id)
                    .await?
                    .rev
                    .ok_or_else(|| ReplicationError::Internal(format!("document {} has no revision", job.id)))?,
            };

            let mut url = self.url(&[REPLICATOR_DB, &job.id])?;
            url.query_pairs_mut().append_pair("rev", &rev);
            let builder = self.request(Method::DELETE, url);
            let _: serde_json::Value = self.send_json("delete", builder).await.map_err(|e| {
                if e.is_not_found() {
                    ReplicationError::NotFound(job.id.clone())
                } else {
                    e
                }
            })?;
            Ok(())
        })
    }
}

impl TaskMonitor for CouchEngine {
    fn list_tasks(&self) -> BoxFuture<'_, Vec<TaskRecord>> {
        Box::pin(async move {
            let url = self.url(&[ACTIVE_TASKS])?;
            self.get_json("list_tasks", url).await
        })
    }
}
