//! Streaming aggregation of enriched nodes into distribution statistics.
//!
//! The accumulator processes one node at a time and never needs the full
//! sequence in memory. Partial accumulators merge by pointwise addition,
//! which is commutative and associative, so parallel workers can each keep
//! their own and merge in any order.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::model::EnrichedNode;

/// Bucket key for nodes whose country or ASN could not be resolved.
/// Counting them explicitly keeps every distribution reconcilable with
/// the total node count.
pub const UNKNOWN_BUCKET: &str = "unknown";

/// Running counters over a sequence of enriched nodes.
#[derive(Debug, Default, Clone)]
pub struct Accumulator {
    country_counts: HashMap<String, u64>,
    asn_counts: HashMap<String, u64>,
    region_counts: HashMap<String, u64>,
    cloud: u64,
    bare_metal: u64,
    total: u64,
    coordinates: Vec<(f64, f64)>,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one node into the running counters.
    pub fn add(&mut self, node: &EnrichedNode) {
        self.total += 1;

        let country_key = node
            .country
            .clone()
            .unwrap_or_else(|| UNKNOWN_BUCKET.to_string());
        *self.country_counts.entry(country_key).or_insert(0) += 1;

        let asn_key = match node.asn {
            Some(asn) => match &node.asn_org {
                Some(org) => format!("AS{} / {}", asn, org),
                None => format!("AS{}", asn),
            },
            None => UNKNOWN_BUCKET.to_string(),
        };
        *self.asn_counts.entry(asn_key).or_insert(0) += 1;

        if node.is_cloud {
            self.cloud += 1;
            if let (Some(provider), Some(region)) = (&node.cloud_provider, &node.cloud_region) {
                let key = format!("{}/{}", provider, region);
                *self.region_counts.entry(key).or_insert(0) += 1;
            }
        } else {
            self.bare_metal += 1;
        }

        if let (Some(lat), Some(lon)) = (node.latitude, node.longitude) {
            self.coordinates.push((lat, lon));
        }
    }

    /// Pointwise merge of two partial accumulators.
    pub fn merge(mut self, other: Accumulator) -> Accumulator {
        for (key, count) in other.country_counts {
            *self.country_counts.entry(key).or_insert(0) += count;
        }
        for (key, count) in other.asn_counts {
            *self.asn_counts.entry(key).or_insert(0) += count;
        }
        for (key, count) in other.region_counts {
            *self.region_counts.entry(key).or_insert(0) += count;
        }
        self.cloud += other.cloud;
        self.bare_metal += other.bare_metal;
        self.total += other.total;
        self.coordinates.extend(other.coordinates);
        self
    }

    /// Sort the counters into the final result.
    pub fn finalize(self) -> AggregateResult {
        AggregateResult {
            total: self.total,
            country_distribution: sorted_distribution(self.country_counts),
            asn_distribution: sorted_distribution(self.asn_counts),
            region_breakdown: sorted_distribution(self.region_counts),
            cloud_nodes: self.cloud,
            bare_metal_nodes: self.bare_metal,
            coordinates: self.coordinates,
        }
    }
}

/// Count descending; ties break lexicographically ascending by key.
fn sorted_distribution(counts: HashMap<String, u64>) -> Vec<(String, u64)> {
    let mut entries: Vec<(String, u64)> = counts.into_iter().collect();
    entries.sort_by(|(key_a, count_a), (key_b, count_b)| {
        count_b.cmp(count_a).then_with(|| key_a.cmp(key_b))
    });
    entries
}

/// Aggregate statistics computed from a sequence of enriched nodes.
///
/// Recomputed fresh each run; distributions carry the full bucket set,
/// the `top_*` accessors only truncate the view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateResult {
    /// Total node count; every bucket family sums back to this
    pub total: u64,
    /// (country, count), count descending
    pub country_distribution: Vec<(String, u64)>,
    /// ("AS<n> / <org>", count), count descending
    pub asn_distribution: Vec<(String, u64)>,
    /// ("<provider>/<region>", count) for cloud nodes with a region
    pub region_breakdown: Vec<(String, u64)>,
    /// Nodes hosted at a known cloud provider
    pub cloud_nodes: u64,
    /// Everything else (including nodes with no ASN data)
    pub bare_metal_nodes: u64,
    /// (lat, lon) of every located node, for downstream visualization
    pub coordinates: Vec<(f64, f64)>,
}

impl AggregateResult {
    /// Top-N view of the country distribution (display only).
    pub fn top_countries(&self, n: usize) -> &[(String, u64)] {
        &self.country_distribution[..self.country_distribution.len().min(n)]
    }

    /// Top-N view of the ASN distribution (display only).
    pub fn top_asns(&self, n: usize) -> &[(String, u64)] {
        &self.asn_distribution[..self.asn_distribution.len().min(n)]
    }
}

/// Aggregate a full sequence in one pass.
pub fn aggregate<'a, I>(nodes: I) -> AggregateResult
where
    I: IntoIterator<Item = &'a EnrichedNode>,
{
    let mut acc = Accumulator::new();
    for node in nodes {
        acc.add(node);
    }
    acc.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CorrelatedNode, Metadata, NodeRole};
    use std::net::IpAddr;

    fn node(country: Option<&str>, asn: Option<u32>, is_cloud: bool) -> EnrichedNode {
        let base = CorrelatedNode {
            network: "ethereum".to_string(),
            ip: Some(IpAddr::from([198, 51, 100, 1])),
            port: Some(30303),
            identity: None,
            role: NodeRole::Peer,
            label: None,
            weight: None,
            metadata: Metadata::new(),
        };
        let mut enriched = EnrichedNode::unenriched(base);
        enriched.country = country.map(str::to_string);
        enriched.country_code = country.map(|_| "XX".to_string());
        enriched.city = country.map(|_| "Somewhere".to_string());
        if country.is_some() {
            enriched.latitude = Some(50.0);
            enriched.longitude = Some(8.0);
        }
        enriched.asn = asn;
        enriched.asn_org = asn.map(|_| "ExampleNet".to_string());
        enriched.is_cloud = is_cloud;
        if is_cloud {
            enriched.cloud_provider = Some("AWS".to_string());
            enriched.cloud_region = Some("eu-central-1".to_string());
        }
        enriched
    }

    #[test]
    fn test_buckets_reconcile_with_total() {
        let nodes = vec![
            node(Some("Germany"), Some(16509), true),
            node(Some("Germany"), Some(24940), false),
            node(Some("Finland"), None, false),
            node(None, None, false),
        ];
        let result = aggregate(&nodes);

        assert_eq!(result.total, 4);
        let country_sum: u64 = result.country_distribution.iter().map(|(_, c)| c).sum();
        let asn_sum: u64 = result.asn_distribution.iter().map(|(_, c)| c).sum();
        assert_eq!(country_sum, 4);
        assert_eq!(asn_sum, 4);
        assert_eq!(result.cloud_nodes + result.bare_metal_nodes, 4);
    }

    #[test]
    fn test_unknown_bucket_counts_unresolved() {
        let nodes = vec![node(None, None, false), node(None, None, false)];
        let result = aggregate(&nodes);

        assert_eq!(
            result.country_distribution,
            vec![(UNKNOWN_BUCKET.to_string(), 2)]
        );
        assert_eq!(result.asn_distribution, vec![(UNKNOWN_BUCKET.to_string(), 2)]);
    }

    #[test]
    fn test_sort_descending_with_lexicographic_tie_break() {
        let nodes = vec![
            node(Some("Germany"), None, false),
            node(Some("Finland"), None, false),
            node(Some("Finland"), None, false),
            node(Some("Austria"), None, false),
        ];
        let result = aggregate(&nodes);

        assert_eq!(result.country_distribution[0].0, "Finland");
        // Austria and Germany tie at 1; lexicographic order decides
        assert_eq!(result.country_distribution[1].0, "Austria");
        assert_eq!(result.country_distribution[2].0, "Germany");
    }

    #[test]
    fn test_asn_key_format() {
        let nodes = vec![node(Some("Germany"), Some(16509), true)];
        let result = aggregate(&nodes);
        assert_eq!(result.asn_distribution[0].0, "AS16509 / ExampleNet");
    }

    #[test]
    fn test_merge_equals_sequential() {
        let nodes: Vec<EnrichedNode> = vec![
            node(Some("Germany"), Some(16509), true),
            node(Some("Finland"), Some(24940), false),
            node(None, None, false),
            node(Some("Germany"), None, false),
        ];

        let mut sequential = Accumulator::new();
        for n in &nodes {
            sequential.add(n);
        }

        let mut left = Accumulator::new();
        let mut right = Accumulator::new();
        for n in &nodes[..2] {
            left.add(n);
        }
        for n in &nodes[2..] {
            right.add(n);
        }

        // Merge order must not matter
        let merged = right.merge(left).finalize();
        let sequential = sequential.finalize();
        assert_eq!(merged.country_distribution, sequential.country_distribution);
        assert_eq!(merged.asn_distribution, sequential.asn_distribution);
        assert_eq!(merged.cloud_nodes, sequential.cloud_nodes);
        assert_eq!(merged.bare_metal_nodes, sequential.bare_metal_nodes);
        assert_eq!(merged.total, sequential.total);
    }

    #[test]
    fn test_region_breakdown_only_counts_regioned_cloud_nodes() {
        let nodes = vec![
            node(Some("Germany"), Some(16509), true),
            node(Some("Germany"), Some(3320), false),
        ];
        let result = aggregate(&nodes);
        assert_eq!(
            result.region_breakdown,
            vec![("AWS/eu-central-1".to_string(), 1)]
        );
    }

    #[test]
    fn test_coordinates_collected_for_located_nodes() {
        let nodes = vec![
            node(Some("Germany"), None, false),
            node(None, None, false),
        ];
        let result = aggregate(&nodes);
        assert_eq!(result.coordinates, vec![(50.0, 8.0)]);
    }

    #[test]
    fn test_top_n_truncates_view_only() {
        let nodes = vec![
            node(Some("Germany"), None, false),
            node(Some("Finland"), None, false),
            node(Some("Austria"), None, false),
        ];
        let result = aggregate(&nodes);
        assert_eq!(result.top_countries(2).len(), 2);
        assert_eq!(result.country_distribution.len(), 3);
        assert_eq!(result.top_countries(10).len(), 3);
    }

    #[test]
    fn test_empty_sequence() {
        let nodes: Vec<EnrichedNode> = Vec::new();
        let result = aggregate(&nodes);
        assert_eq!(result.total, 0);
        assert!(result.country_distribution.is_empty());
        assert_eq!(result.cloud_nodes + result.bare_metal_nodes, 0);
    }
}
