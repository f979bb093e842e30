//! Static reference tables for cloud-provider classification.
//!
//! Two tables: well-known cloud ASNs mapped to provider names, and
//! approximate datacenter coordinates per provider region. Both are
//! compiled in and immutable, so lookups are safe from any thread.

/// Well-known cloud-provider ASNs
pub const CLOUD_ASNS: &[(u32, &str)] = &[
    // AWS
    (16509, "AWS"),
    (14618, "AWS"),
    // Google Cloud
    (15169, "GCP"),
    (396982, "GCP"),
    // Microsoft Azure
    (8075, "Azure"),
    (8068, "Azure"),
    // Oracle Cloud
    (31898, "Oracle"),
    // DigitalOcean
    (14061, "DigitalOcean"),
    // Hetzner
    (24940, "Hetzner"),
    // OVH
    (16276, "OVH"),
    // Linode / Akamai Cloud
    (63949, "Linode"),
    // Vultr
    (20473, "Vultr"),
    // Alibaba Cloud
    (45102, "Alibaba"),
    // Tencent Cloud
    (132203, "Tencent"),
    // Scaleway / Online SAS
    (12876, "Scaleway"),
    // Equinix Metal
    (54825, "Equinix"),
    // IBM Cloud / SoftLayer
    (36351, "IBM"),
    // Cloudflare (often fronts producer endpoints)
    (13335, "Cloudflare"),
    // Leaseweb
    (60781, "Leaseweb"),
    // Contabo
    (40021, "Contabo"),
    // Cherry Servers
    (59642, "Cherry"),
    // Latitude.sh
    (28186, "Latitude"),
];

/// Approximate datacenter coordinates: (provider, region, lat, lon)
pub const REGION_COORDS: &[(&str, &str, f64, f64)] = &[
    // AWS
    ("AWS", "us-east-1", 39.04, -77.49),
    ("AWS", "us-east-2", 39.96, -83.00),
    ("AWS", "us-west-1", 37.35, -121.96),
    ("AWS", "us-west-2", 45.59, -122.60),
    ("AWS", "eu-west-1", 53.35, -6.26),
    ("AWS", "eu-west-2", 51.51, -0.13),
    ("AWS", "eu-west-3", 48.86, 2.35),
    ("AWS", "eu-central-1", 50.11, 8.68),
    ("AWS", "eu-north-1", 59.33, 18.07),
    ("AWS", "ap-southeast-1", 1.35, 103.82),
    ("AWS", "ap-southeast-2", -33.87, 151.21),
    ("AWS", "ap-northeast-1", 35.68, 139.69),
    ("AWS", "ap-northeast-2", 37.57, 126.98),
    ("AWS", "ap-south-1", 19.08, 72.88),
    ("AWS", "sa-east-1", -23.55, -46.63),
    ("AWS", "ca-central-1", 45.50, -73.57),
    // GCP
    ("GCP", "us-central1", 41.26, -95.86),
    ("GCP", "us-east1", 33.20, -80.02),
    ("GCP", "us-east4", 39.04, -77.49),
    ("GCP", "us-west1", 45.60, -121.18),
    ("GCP", "us-west4", 36.20, -115.14),
    ("GCP", "europe-west1", 50.45, 3.82),
    ("GCP", "europe-west2", 51.51, -0.13),
    ("GCP", "europe-west3", 50.11, 8.68),
    ("GCP", "europe-west4", 53.44, 6.84),
    ("GCP", "europe-north1", 60.57, 27.19),
    ("GCP", "asia-east1", 24.05, 120.52),
    ("GCP", "asia-northeast1", 35.68, 139.69),
    ("GCP", "asia-southeast1", 1.35, 103.82),
    ("GCP", "australia-southeast1", -33.87, 151.21),
    ("GCP", "southamerica-east1", -23.55, -46.63),
    // Azure
    ("Azure", "eastus", 37.37, -79.46),
    ("Azure", "eastus2", 36.67, -78.93),
    ("Azure", "westus", 37.78, -122.42),
    ("Azure", "westus2", 47.23, -119.85),
    ("Azure", "centralus", 41.88, -93.10),
    ("Azure", "northeurope", 53.35, -6.26),
    ("Azure", "westeurope", 52.37, 4.90),
    ("Azure", "uksouth", 51.51, -0.13),
    ("Azure", "southeastasia", 1.35, 103.82),
    ("Azure", "eastasia", 22.27, 114.16),
    ("Azure", "japaneast", 35.68, 139.69),
    ("Azure", "australiaeast", -33.87, 151.21),
    ("Azure", "brazilsouth", -23.55, -46.63),
    // Hetzner
    ("Hetzner", "fsn1", 50.47, 12.37),
    ("Hetzner", "nbg1", 49.45, 11.08),
    ("Hetzner", "hel1", 60.17, 24.94),
    ("Hetzner", "ash", 39.04, -77.49),
    // OVH
    ("OVH", "gra", 50.10, 2.39),
    ("OVH", "sbg", 48.57, 7.75),
    ("OVH", "bhs", 46.39, -72.74),
    ("OVH", "sgp", 1.35, 103.82),
    // DigitalOcean
    ("DigitalOcean", "nyc", 40.71, -74.01),
    ("DigitalOcean", "sfo", 37.77, -122.42),
    ("DigitalOcean", "ams", 52.37, 4.90),
    ("DigitalOcean", "sgp", 1.35, 103.82),
    ("DigitalOcean", "lon", 51.51, -0.13),
    ("DigitalOcean", "fra", 50.11, 8.68),
    ("DigitalOcean", "blr", 12.97, 77.59),
    ("DigitalOcean", "syd", -33.87, 151.21),
];

/// Look up the cloud provider for an ASN, if it is a known cloud ASN.
pub fn provider_for_asn(asn: u32) -> Option<&'static str> {
    CLOUD_ASNS
        .iter()
        .find(|(cloud_asn, _)| *cloud_asn == asn)
        .map(|(_, provider)| *provider)
}

/// Great-circle distance in kilometres between two points (haversine).
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    const EARTH_RADIUS_KM: f64 = 6371.0;

    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();
    let a = (dlat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (dlon / 2.0).sin().powi(2);
    EARTH_RADIUS_KM * 2.0 * a.sqrt().atan2((1.0 - a).sqrt())
}

/// Infer the cloud region closest to the given coordinates.
///
/// Only regions belonging to `provider` are considered. Equidistant
/// candidates resolve to the lexicographically smaller region code so the
/// classification is deterministic across runs.
pub fn infer_region(provider: &str, latitude: f64, longitude: f64) -> Option<&'static str> {
    let mut best: Option<(&'static str, f64)> = None;

    for (region_provider, region, rlat, rlon) in REGION_COORDS {
        if *region_provider != provider {
            continue;
        }
        let dist = haversine_km(latitude, longitude, *rlat, *rlon);
        let closer = match best {
            None => true,
            Some((best_region, best_dist)) => {
                dist < best_dist || (dist == best_dist && *region < best_region)
            }
        };
        if closer {
            best = Some((region, dist));
        }
    }

    best.map(|(region, _)| region)
}
