use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::IpAddr;

/// Opaque source-specific metadata attached to peers and nodes.
///
/// Keys are source-defined (client version, enode URL, vote count, ...).
/// A BTreeMap keeps serialized output stable across runs.
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// One observation of a reachable endpoint from a single discovery source.
///
/// Ephemeral: produced per discovery call and consumed by correlation,
/// never persisted directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawPeer {
    /// Protocol-level identity (enode id, pubkey, account address), if known
    pub identity: Option<String>,
    /// Observed IP address
    pub ip: IpAddr,
    /// Observed listening port
    pub port: u16,
    /// Source-specific metadata, passed through opaquely
    #[serde(default)]
    pub metadata: Metadata,
}

/// One entry from an authoritative on-chain or registry listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorityRecord {
    /// Stable identity key; the join key against RawPeer
    pub identity: String,
    /// Declared network endpoint, if the listing carries one
    pub endpoint: Option<(IpAddr, u16)>,
    /// Human-readable label (validator moniker, witness URL)
    pub label: Option<String>,
    /// Weight or stake metric (vote count, staked amount)
    pub weight: Option<u64>,
    /// Source-specific metadata
    #[serde(default)]
    pub metadata: Metadata,
}

/// Role assigned to a correlated node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    /// Matched against (or declared by) the authority set
    Authority,
    /// Observed on the network but not in the authority set
    Peer,
}

impl NodeRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeRole::Authority => "authority",
            NodeRole::Peer => "peer",
        }
    }
}

/// Output shape of a probe run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeMode {
    /// One known endpoint (L2 sequencers)
    Single,
    /// Full validator/producer listing
    List,
    /// Large crawl; aggregate statistics only
    Aggregate,
}

/// The result of merging RawPeers with zero-or-one matching AuthorityRecord.
///
/// Invariants: at most one CorrelatedNode per (network, ip, port) per run;
/// identity is unique within the authority-matched subset of a run. An
/// authority with no reachable peer keeps `ip`/`port` as None so the
/// authority set's size is never silently lost.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelatedNode {
    /// Network name (e.g. "bsc", "tron")
    pub network: String,
    /// IP address, None for declared-but-unreachable authorities
    pub ip: Option<IpAddr>,
    /// Port, None whenever `ip` is None
    pub port: Option<u16>,
    /// Resolved identity key, if any source supplied one
    pub identity: Option<String>,
    /// Node role
    pub role: NodeRole,
    /// Human-readable label from the authority listing
    pub label: Option<String>,
    /// Weight or stake metric from the authority listing
    pub weight: Option<u64>,
    /// Metadata merged across sources (later sources win on conflict)
    #[serde(default)]
    pub metadata: Metadata,
}

/// A CorrelatedNode plus geographic and hosting classification.
///
/// The location fields (city, country, country_code, latitude, longitude)
/// are all populated or all None; same for the ownership pair (asn,
/// asn_org). `is_cloud` implies `cloud_provider` is Some.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichedNode {
    /// The underlying correlated node
    #[serde(flatten)]
    pub node: CorrelatedNode,
    /// City name
    pub city: Option<String>,
    /// Country name
    pub country: Option<String>,
    /// ISO 3166-1 alpha-2 country code
    pub country_code: Option<String>,
    /// Latitude in degrees
    pub latitude: Option<f64>,
    /// Longitude in degrees
    pub longitude: Option<f64>,
    /// Autonomous System Number
    pub asn: Option<u32>,
    /// AS organization name
    pub asn_org: Option<String>,
    /// Cloud provider name, if the ASN is a known cloud ASN
    pub cloud_provider: Option<String>,
    /// Inferred cloud region (nearest datacenter of the provider)
    pub cloud_region: Option<String>,
    /// Whether the IP belongs to a known cloud provider
    pub is_cloud: bool,
}

impl EnrichedNode {
    /// Wrap a node with no geo data at all (null IP, lookup misses, or
    /// enrichment disabled).
    pub fn unenriched(node: CorrelatedNode) -> Self {
        Self {
            node,
            city: None,
            country: None,
            country_code: None,
            latitude: None,
            longitude: None,
            asn: None,
            asn_org: None,
            cloud_provider: None,
            cloud_region: None,
            is_cloud: false,
        }
    }
}

/// Audit record for a single probe execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlRun {
    /// UUID assigned at persist time; None until persisted
    pub id: Option<String>,
    /// Network that was probed
    pub network: String,
    /// When the crawl started (UTC)
    pub timestamp: DateTime<Utc>,
    /// Number of nodes discovered
    pub node_count: u64,
    /// Wall-clock duration of the probe run in seconds
    pub duration_seconds: f64,
    /// Extra information about the run (failed sources, source counts)
    #[serde(default)]
    pub meta: Metadata,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn peer_node() -> CorrelatedNode {
        CorrelatedNode {
            network: "bsc".to_string(),
            ip: Some(IpAddr::V4(Ipv4Addr::new(203, 0, 113, 7))),
            port: Some(30303),
            identity: Some("abcd".to_string()),
            role: NodeRole::Peer,
            label: None,
            weight: None,
            metadata: Metadata::new(),
        }
    }

    #[test]
    fn test_role_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&NodeRole::Authority).unwrap(),
            "\"authority\""
        );
        assert_eq!(serde_json::to_string(&NodeRole::Peer).unwrap(), "\"peer\"");
    }

    #[test]
    fn test_unenriched_has_no_geo_fields() {
        let enriched = EnrichedNode::unenriched(peer_node());
        assert!(enriched.city.is_none());
        assert!(enriched.asn.is_none());
        assert!(!enriched.is_cloud);
        assert!(enriched.cloud_provider.is_none());
    }

    #[test]
    fn test_enriched_node_flattens_on_serialize() {
        let enriched = EnrichedNode::unenriched(peer_node());
        let value = serde_json::to_value(&enriched).unwrap();
        assert_eq!(value["network"], "bsc");
        assert_eq!(value["role"], "peer");
        assert!(value["city"].is_null());
    }
}
