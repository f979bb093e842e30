//! Geo enrichment: MaxMind lookups, cloud detection, region inference.

use maxminddb::{geoip2, Reader};
use std::net::IpAddr;
use std::path::Path;
use tracing::{debug, warn};

use crate::cloud;
use crate::config::GeoDbConfig;
use crate::error::{AtlasError, Result};
use crate::model::{CorrelatedNode, EnrichedNode};

/// IP ranges that never resolve in the public databases; checked before
/// any lookup so private deployments do not produce garbage classifications.
const RESERVED_RANGES: &[&str] = &[
    "10.0.0.0/8",
    "100.64.0.0/10",
    "127.0.0.0/8",
    "169.254.0.0/16",
    "172.16.0.0/12",
    "192.168.0.0/16",
    "::1/128",
    "fc00::/7",
    "fe80::/10",
];

/// City/country/coordinate result of a location lookup.
///
/// All fields are mandatory: a database record missing any of them is
/// treated as a complete miss, never a partial record.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationInfo {
    pub city: String,
    pub country: String,
    pub country_code: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// ASN/organization result of a network-ownership lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct OwnershipInfo {
    pub asn: u32,
    pub org: String,
}

/// Wrapper around the MaxMind GeoLite2 database readers.
///
/// Tolerant of missing database files when configured so: a side whose
/// database could not be opened simply misses on every lookup. The readers
/// are immutable after open and safe to share across tasks.
pub struct GeoReader {
    city: Option<Reader<Vec<u8>>>,
    asn: Option<Reader<Vec<u8>>>,
}

impl GeoReader {
    /// Open the configured databases.
    ///
    /// An unconfigured path disables that lookup side. A configured path
    /// that fails to open is a warning in degraded mode
    /// (`allow_missing = true`) and `ReferenceData` otherwise.
    pub fn open(config: &GeoDbConfig) -> Result<Self> {
        let city = Self::open_db("GeoLite2-City", config.city_db.as_deref(), config.allow_missing)?;
        let asn = Self::open_db("GeoLite2-ASN", config.asn_db.as_deref(), config.allow_missing)?;
        Ok(Self { city, asn })
    }

    /// A reader with both lookup sides disabled (enrichment passthrough).
    pub fn disabled() -> Self {
        Self {
            city: None,
            asn: None,
        }
    }

    fn open_db(
        name: &str,
        path: Option<&str>,
        allow_missing: bool,
    ) -> Result<Option<Reader<Vec<u8>>>> {
        let Some(path) = path else {
            debug!(db = name, "No database configured; lookups disabled");
            return Ok(None);
        };

        match Reader::open_readfile(Path::new(path)) {
            Ok(reader) => {
                debug!(db = name, path = %path, "Opened geo database");
                Ok(Some(reader))
            }
            Err(e) if allow_missing => {
                warn!(db = name, path = %path, error = %e, "Failed to open geo database; lookups disabled");
                Ok(None)
            }
            Err(e) => Err(AtlasError::ReferenceData(format!(
                "{} at {}: {}",
                name, path, e
            ))),
        }
    }

    /// Look up city/country/coordinates for an IP.
    ///
    /// Returns None for reserved ranges, database misses, and records
    /// missing any location field.
    pub fn lookup_location(&self, ip: IpAddr) -> Option<LocationInfo> {
        if is_reserved(ip) {
            return None;
        }
        let reader = self.city.as_ref()?;
        let record: geoip2::City = match reader.lookup(ip) {
            Ok(record) => record,
            Err(e) => {
                debug!(ip = %ip, error = %e, "City lookup miss");
                return None;
            }
        };

        let city = record
            .city
            .as_ref()
            .and_then(|c| c.names.as_ref())
            .and_then(|names| names.get("en"))
            .map(|s| s.to_string())?;
        let country_rec = record.country.as_ref()?;
        let country = country_rec
            .names
            .as_ref()
            .and_then(|names| names.get("en"))
            .map(|s| s.to_string())?;
        let country_code = country_rec.iso_code.map(|s| s.to_string())?;
        let location = record.location.as_ref()?;
        let latitude = location.latitude?;
        let longitude = location.longitude?;

        Some(LocationInfo {
            city,
            country,
            country_code,
            latitude,
            longitude,
        })
    }

    /// Look up ASN and organization for an IP.
    pub fn lookup_ownership(&self, ip: IpAddr) -> Option<OwnershipInfo> {
        if is_reserved(ip) {
            return None;
        }
        let reader = self.asn.as_ref()?;
        let record: geoip2::Asn = match reader.lookup(ip) {
            Ok(record) => record,
            Err(e) => {
                debug!(ip = %ip, error = %e, "ASN lookup miss");
                return None;
            }
        };

        Some(OwnershipInfo {
            asn: record.autonomous_system_number?,
            org: record.autonomous_system_organization?.to_string(),
        })
    }

    /// Enrich a single node.
    ///
    /// Deterministic: the same IP against unchanged databases yields an
    /// identical result on every call. Nodes with no IP pass through with
    /// all geo fields empty.
    pub fn enrich(&self, node: CorrelatedNode) -> EnrichedNode {
        let Some(ip) = node.ip else {
            return EnrichedNode::unenriched(node);
        };

        let location = self.lookup_location(ip);
        let ownership = self.lookup_ownership(ip);

        let mut enriched = EnrichedNode::unenriched(node);
        if let Some(loc) = &location {
            enriched.city = Some(loc.city.clone());
            enriched.country = Some(loc.country.clone());
            enriched.country_code = Some(loc.country_code.clone());
            enriched.latitude = Some(loc.latitude);
            enriched.longitude = Some(loc.longitude);
        }
        if let Some(own) = &ownership {
            enriched.asn = Some(own.asn);
            enriched.asn_org = Some(own.org.clone());
        }

        let coords = location.as_ref().map(|loc| (loc.latitude, loc.longitude));
        let (is_cloud, provider, region) = classify_cloud(enriched.asn, coords);
        enriched.is_cloud = is_cloud;
        enriched.cloud_provider = provider.map(str::to_string);
        enriched.cloud_region = region.map(str::to_string);

        enriched
    }

    /// Enrich a batch of nodes, preserving order.
    pub fn enrich_all(&self, nodes: Vec<CorrelatedNode>) -> Vec<EnrichedNode> {
        nodes.into_iter().map(|node| self.enrich(node)).collect()
    }
}

/// Classify an ASN against the cloud reference tables.
///
/// Region inference runs only when the ASN is a cloud ASN and coordinates
/// are available.
pub fn classify_cloud(
    asn: Option<u32>,
    coords: Option<(f64, f64)>,
) -> (bool, Option<&'static str>, Option<&'static str>) {
    let Some(provider) = asn.and_then(cloud::provider_for_asn) else {
        return (false, None, None);
    };
    let region = coords.and_then(|(lat, lon)| cloud::infer_region(provider, lat, lon));
    (true, Some(provider), region)
}

/// Whether the IP falls inside a private or reserved range.
pub fn is_reserved(ip: IpAddr) -> bool {
    RESERVED_RANGES.iter().any(|range| {
        range
            .parse::<ipnet::IpNet>()
            .map(|net| net.contains(&ip))
            .unwrap_or(false)
    })
}
