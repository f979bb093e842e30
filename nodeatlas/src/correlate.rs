//! Correlation engine: merges per-source listings into one node set.
//!
//! Reconciles zero-or-more peer-discovery listings and zero-or-one
//! authority listing into a deduplicated, identity-tagged set of
//! `CorrelatedNode`s. Source failures arrive as explicit outcome values,
//! never as errors crossing the merge boundary, so a flaky source cannot
//! abort an otherwise-successful correlation.

use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use tracing::{debug, warn};

use crate::error::{AtlasError, Result};
use crate::model::{AuthorityRecord, CorrelatedNode, NodeRole, RawPeer};

/// What one named source produced: data, or a failure reason.
#[derive(Debug, Clone)]
pub struct SourceBatch<T> {
    /// Source name, surfaced in the partial-failure set
    pub source: String,
    /// Fetched records, or the transport/timeout failure reason
    pub outcome: std::result::Result<Vec<T>, String>,
}

impl<T> SourceBatch<T> {
    pub fn ok(source: impl Into<String>, records: Vec<T>) -> Self {
        Self {
            source: source.into(),
            outcome: Ok(records),
        }
    }

    pub fn failed(source: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            outcome: Err(reason.into()),
        }
    }
}

/// Correlated node set plus the names of the sources that failed.
#[derive(Debug)]
pub struct CorrelationOutput {
    /// Deduplicated nodes, in first-seen order (unmatched authorities last)
    pub nodes: Vec<CorrelatedNode>,
    /// Names of sources that failed; empty on a clean run
    pub failed_sources: Vec<String>,
}

/// Merge the available source listings for one network.
///
/// Peers are deduplicated by (ip, port); later sources in input order
/// overwrite metadata on conflict while an already-set identity key is
/// preserved. Authority records match peers exactly on identity key
/// (never on IP) and unmatched records still yield an IP-less node.
/// `declared_role` covers the single-endpoint case where configuration
/// declares the only known address authoritative (sequencer DNS).
///
/// Fails with `NoSourcesAvailable` only when every configured source
/// failed; an empty result from every source is an empty set, not an
/// error.
pub fn correlate(
    network: &str,
    peer_batches: Vec<SourceBatch<RawPeer>>,
    authority_batch: Option<SourceBatch<AuthorityRecord>>,
    declared_role: Option<NodeRole>,
) -> Result<CorrelationOutput> {
    let total_sources = peer_batches.len() + usize::from(authority_batch.is_some());

    let mut failed_sources = Vec::new();
    let mut peers: Vec<Vec<RawPeer>> = Vec::new();
    for batch in peer_batches {
        match batch.outcome {
            Ok(records) => peers.push(records),
            Err(reason) => {
                warn!(network, source = %batch.source, reason = %reason, "Peer source failed");
                failed_sources.push(batch.source);
            }
        }
    }

    let mut authorities: Option<Vec<AuthorityRecord>> = None;
    if let Some(batch) = authority_batch {
        match batch.outcome {
            Ok(records) => authorities = Some(records),
            Err(reason) => {
                warn!(network, source = %batch.source, reason = %reason, "Authority source failed");
                failed_sources.push(batch.source);
            }
        }
    }

    if total_sources > 0 && failed_sources.len() == total_sources {
        return Err(AtlasError::NoSourcesAvailable {
            network: network.to_string(),
        });
    }

    let base_role = declared_role.unwrap_or(NodeRole::Peer);
    let mut nodes: Vec<CorrelatedNode> = Vec::new();
    let mut by_endpoint: HashMap<(IpAddr, u16), usize> = HashMap::new();

    for peer in peers.into_iter().flatten() {
        match by_endpoint.get(&(peer.ip, peer.port)) {
            Some(&idx) => {
                let node = &mut nodes[idx];
                // Later sources overwrite metadata; identity sticks once set
                node.metadata.extend(peer.metadata);
                if node.identity.is_none() {
                    node.identity = peer.identity;
                }
            }
            None => {
                by_endpoint.insert((peer.ip, peer.port), nodes.len());
                nodes.push(CorrelatedNode {
                    network: network.to_string(),
                    ip: Some(peer.ip),
                    port: Some(peer.port),
                    identity: peer.identity,
                    role: base_role,
                    label: None,
                    weight: None,
                    metadata: peer.metadata,
                });
            }
        }
    }

    if let Some(records) = authorities {
        apply_authorities(network, records, &mut nodes);
    }

    debug!(
        network,
        nodes = nodes.len(),
        failed = failed_sources.len(),
        "Correlation complete"
    );

    Ok(CorrelationOutput {
        nodes,
        failed_sources,
    })
}

/// Match authority records against the merged peer set by identity key.
///
/// Duplicate authority identities are dropped (first occurrence wins) and
/// each identity upgrades at most one peer, keeping identity keys unique
/// within the authority-matched subset.
fn apply_authorities(
    network: &str,
    records: Vec<AuthorityRecord>,
    nodes: &mut Vec<CorrelatedNode>,
) {
    let mut by_identity: HashMap<String, usize> = HashMap::new();
    for (idx, node) in nodes.iter().enumerate() {
        if let Some(identity) = &node.identity {
            by_identity.entry(identity.clone()).or_insert(idx);
        }
    }

    let mut seen: HashSet<String> = HashSet::new();
    for record in records {
        if !seen.insert(record.identity.clone()) {
            debug!(network, identity = %record.identity, "Duplicate authority record dropped");
            continue;
        }

        match by_identity.get(&record.identity) {
            Some(&idx) => {
                let node = &mut nodes[idx];
                node.role = NodeRole::Authority;
                node.label = record.label;
                node.weight = record.weight;
                node.metadata.extend(record.metadata);
            }
            None => {
                // Declared but not observed reachable; keep it, IP-less,
                // so the authority set's size is never silently lost
                let mut metadata = record.metadata;
                if let Some((ip, port)) = record.endpoint {
                    metadata.insert(
                        "declared_endpoint".to_string(),
                        serde_json::json!(format!("{}:{}", ip, port)),
                    );
                }
                nodes.push(CorrelatedNode {
                    network: network.to_string(),
                    ip: None,
                    port: None,
                    identity: Some(record.identity),
                    role: NodeRole::Authority,
                    label: record.label,
                    weight: record.weight,
                    metadata,
                });
            }
        }
    }
}
