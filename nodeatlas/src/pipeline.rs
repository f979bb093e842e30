//! Run orchestration: concurrent source fetch, then
//! correlation → enrichment → aggregation for one network.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use serde_json::json;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{info, instrument};

use crate::aggregate::{aggregate, AggregateResult};
use crate::config::AtlasConfig;
use crate::correlate::{correlate, CorrelationOutput, SourceBatch};
use crate::error::{AtlasError, Result};
use crate::geo::GeoReader;
use crate::model::{CrawlRun, EnrichedNode, Metadata, ProbeMode};
use crate::probes::{Network, NetworkSources};

/// Everything one network run produced.
#[derive(Debug, Serialize)]
pub struct RunOutcome {
    /// Network that was probed
    pub network: String,
    /// Output shape for rendering
    pub mode: ProbeMode,
    /// Enriched nodes in production order, for rendering and upsert
    pub nodes: Vec<EnrichedNode>,
    /// Aggregated distributions
    pub stats: AggregateResult,
    /// Names of sources that failed this run; surfaced, never hidden
    pub failed_sources: Vec<String>,
    /// When the run started (UTC)
    pub started_at: DateTime<Utc>,
    /// Wall-clock duration in seconds
    pub duration_seconds: f64,
}

impl RunOutcome {
    /// Build the audit record for persistence.
    pub fn crawl_run(&self) -> CrawlRun {
        let mut meta = Metadata::new();
        meta.insert("mode".to_string(), json!(self.mode));
        if !self.failed_sources.is_empty() {
            meta.insert("failed_sources".to_string(), json!(self.failed_sources));
        }
        CrawlRun {
            id: None,
            network: self.network.clone(),
            timestamp: self.started_at,
            node_count: self.nodes.len() as u64,
            duration_seconds: self.duration_seconds,
            meta,
        }
    }
}

/// Probe one network end to end.
#[instrument(skip_all, fields(network = %network))]
pub async fn run_network(
    network: Network,
    config: &AtlasConfig,
    geo: &GeoReader,
    client: &reqwest::Client,
) -> Result<RunOutcome> {
    let sources = network.build_sources(&config.sources, client);
    let per_source = Duration::from_secs(config.sources.source_timeout_seconds);
    run_with_sources(network.name(), network.mode(), sources, per_source, geo).await
}

/// Pipeline core, callable with arbitrary source sets.
///
/// All fetches are issued concurrently; each is bounded by `per_source`,
/// and a timed-out or failed source becomes an entry in the
/// partial-failure set rather than an error.
pub async fn run_with_sources(
    network: &str,
    mode: ProbeMode,
    sources: NetworkSources,
    per_source: Duration,
    geo: &GeoReader,
) -> Result<RunOutcome> {
    let started_at = Utc::now();
    let started = Instant::now();

    let declared_role = sources.declared_role;
    let peer_futures = sources
        .peers
        .into_iter()
        .map(|source| fetch_batch(source.name, source.fetch, per_source));
    let authority_future = async {
        match sources.authority {
            None => None,
            Some(source) => Some(fetch_batch(source.name, source.fetch, per_source).await),
        }
    };

    let (peer_batches, authority_batch) = tokio::join!(join_all(peer_futures), authority_future);

    let CorrelationOutput {
        nodes,
        failed_sources,
    } = correlate(network, peer_batches, authority_batch, declared_role)?;

    let enriched = geo.enrich_all(nodes);
    let stats = aggregate(&enriched);

    let outcome = RunOutcome {
        network: network.to_string(),
        mode,
        nodes: enriched,
        stats,
        failed_sources,
        started_at,
        duration_seconds: started.elapsed().as_secs_f64(),
    };

    info!(
        nodes = outcome.nodes.len(),
        failed_sources = outcome.failed_sources.len(),
        duration_secs = format!("{:.2}", outcome.duration_seconds).as_str(),
        "Run complete"
    );
    Ok(outcome)
}

/// Fetch one source under the per-source timeout, folding any failure
/// into the batch rather than surfacing it.
async fn fetch_batch<T>(
    name: &'static str,
    fetch: futures::future::BoxFuture<'static, Result<Vec<T>>>,
    per_source: Duration,
) -> SourceBatch<T> {
    match timeout(per_source, fetch).await {
        Ok(Ok(records)) => SourceBatch::ok(name, records),
        Ok(Err(e)) => SourceBatch::failed(
            name,
            AtlasError::SourceTransport {
                name: name.to_string(),
                reason: e.to_string(),
            }
            .to_string(),
        ),
        Err(_) => SourceBatch::failed(
            name,
            AtlasError::SourceTimeout {
                name: name.to_string(),
                timeout_secs: per_source.as_secs(),
            }
            .to_string(),
        ),
    }
}
