// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Source discovery.
//!
//! Turns a group's configuration into the set of candidate source URLs. The
//! set is resolved again at the start of every reconciliation cycle, so
//! catalog and DNS changes are picked up without a restart.
//!
//! Exactly one strategy is active per group (see
//! [`GroupConfig::source_strategy`]):
//!
//! - **Consul catalog**: one entry per catalog node, identified by `ServiceID`
//! - **DNS**: every resolved address templated into
//!   `http://{user}:{password}@{address}:{port}/{database}`
//! - **Static**: the configured `url` list

use crate::config::{ConsulSources, DnsSources, GroupConfig, SourceStrategy};
use crate::engine::BoxFuture;
use crate::error::{ReplicationError, Result};
use crate::metrics;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashSet;
use std::net::IpAddr;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Port used for address resolution; only the addresses matter.
const DNS_LOOKUP_PORT: u16 = 80;

/// Something that can produce the current source pool for a group.
pub trait SourceResolver: Send + Sync + 'static {
    /// Resolve the current set of source endpoint URLs.
    fn resolve(&self) -> BoxFuture<'_, HashSet<String>>;
}

#[derive(Debug, Clone)]
enum Strategy {
    Consul(ConsulSources),
    Dns(DnsSources),
    Static(HashSet<String>),
}

/// The configured source strategy of one group.
pub struct SourcePool {
    strategy: Strategy,
    client: Client,
}

impl SourcePool {
    /// Build the resolver for a group.
    pub fn from_group(group: &GroupConfig, request_timeout: Duration) -> Result<Self> {
        let strategy = match group.source_strategy() {
            SourceStrategy::Consul(consul) => Strategy::Consul(consul.clone()),
            SourceStrategy::Dns(dns) => Strategy::Dns(dns.clone()),
            SourceStrategy::Static(sources) => {
                Strategy::Static(sources.iter().map(|s| s.url.clone()).collect())
            }
        };
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| ReplicationError::http("build client", e))?;
        Ok(Self { strategy, client })
    }

    /// Short name of the active strategy.
    pub fn strategy_name(&self) -> &'static str {
        match self.strategy {
            Strategy::Consul(_) => "consul",
            Strategy::Dns(_) => "dns",
            Strategy::Static(_) => "static",
        }
    }

    async fn resolve_consul(&self, consul: &ConsulSources) -> Result<HashSet<String>> {
        let url = catalog_url(consul)?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ReplicationError::discovery("consul", e.to_string()))?;
        if !response.status().is_success() {
            return Err(ReplicationError::discovery(
                "consul",
                format!("catalog returned status {}", response.status()),
            ));
        }
        let entries: Vec<CatalogEntry> = response
            .json()
            .await
            .map_err(|e| ReplicationError::discovery("consul", e.to_string()))?;
        Ok(entries.into_iter().map(|entry| entry.service_id).collect())
    }

    async fn resolve_dns(&self, dns: &DnsSources) -> Result<HashSet<String>> {
        let addrs = tokio::net::lookup_host((dns.dns_url.as_str(), DNS_LOOKUP_PORT))
            .await
            .map_err(|e| ReplicationError::discovery("dns", format!("{}: {}", dns.dns_url, e)))?;
        Ok(addrs.map(|addr| dns_source_url(addr.ip(), dns)).collect())
    }
}

impl SourceResolver for SourcePool {
    fn resolve(&self) -> BoxFuture<'_, HashSet<String>> {
        Box::pin(async move {
            let result = match &self.strategy {
                Strategy::Consul(consul) => self.resolve_consul(consul).await,
                Strategy::Dns(dns) => self.resolve_dns(dns).await,
                Strategy::Static(sources) => Ok(sources.clone()),
            };
            match &result {
                Ok(sources) => {
                    debug!(strategy = self.strategy_name(), count = sources.len(), "Resolved source pool");
                    metrics::record_discovery(self.strategy_name(), sources.len(), true);
                }
                Err(_) => metrics::record_discovery(self.strategy_name(), 0, false),
            }
            result
        })
    }
}

/// A fixed set of sources, independent of any configuration.
#[derive(Debug, Clone, Default)]
pub struct FixedSources(pub HashSet<String>);

impl<S: Into<String>> FromIterator<S> for FixedSources {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl SourceResolver for FixedSources {
    fn resolve(&self) -> BoxFuture<'_, HashSet<String>> {
        Box::pin(async move { Ok(self.0.clone()) })
    }
}

#[derive(Deserialize)]
struct CatalogEntry {
    #[serde(rename = "ServiceID")]
    service_id: String,
}

/// `{address}/v1/catalog/service/{name}[?tag={tag}]`
fn catalog_url(consul: &ConsulSources) -> Result<Url> {
    let mut url = Url::parse(&consul.address)
        .map_err(|e| ReplicationError::Config(format!("invalid consul address: {}", e)))?;
    url.path_segments_mut()
        .map_err(|_| ReplicationError::Config("consul address cannot be a base".to_string()))?
        .pop_if_empty()
        .extend(["v1", "catalog", "service", consul.name.as_str()]);
    if let Some(tag) = &consul.tag {
        url.query_pairs_mut().append_pair("tag", tag);
    }
    Ok(url)
}

/// Template a resolved address into a credentialed source URL.
pub fn dns_source_url(ip: IpAddr, dns: &DnsSources) -> String {
    let host = match ip {
        IpAddr::V4(v4) => v4.to_string(),
        IpAddr::V6(v6) => format!("[{}]", v6),
    };
    format!(
        "http://{}:{}@{}:{}/{}",
        dns.user, dns.password, host, dns.port, dns.database
    )
}
