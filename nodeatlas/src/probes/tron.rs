//! TRON sources via the java-tron HTTP API.
//!
//! `wallet/listnodes` yields reachable peers (host is hex-encoded ASCII),
//! `wallet/listwitnesses` yields the Super Representative listing used as
//! the authority set.

use serde_json::{json, Value};
use tracing::{debug, info};

use crate::error::{AtlasError, Result};
use crate::model::{AuthorityRecord, Metadata, RawPeer};

/// Default TRON p2p port, used when a node entry omits one.
const DEFAULT_P2P_PORT: u16 = 18888;

/// Fetch the node's peer list.
pub async fn list_nodes(client: reqwest::Client, api_url: String) -> Result<Vec<RawPeer>> {
    let response = post(&client, &api_url, "wallet/listnodes").await?;
    let entries = response
        .get("nodes")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let mut peers = Vec::new();
    for entry in &entries {
        if let Some(peer) = parse_node(entry) {
            peers.push(peer);
        }
    }

    info!(url = %api_url, peers = peers.len(), "listnodes fetched");
    Ok(peers)
}

fn parse_node(entry: &Value) -> Option<RawPeer> {
    let address = entry.get("address")?;
    let host_hex = address.get("host").and_then(Value::as_str)?;
    let host = decode_hex_host(host_hex)?;
    let port = address
        .get("port")
        .and_then(Value::as_u64)
        .map(|p| p as u16)
        .unwrap_or(DEFAULT_P2P_PORT);

    Some(RawPeer {
        identity: None,
        ip: host.parse().ok()?,
        port,
        metadata: Metadata::new(),
    })
}

/// Fetch the Super Representative listing.
pub async fn list_witnesses(client: reqwest::Client, api_url: String) -> Result<Vec<AuthorityRecord>> {
    let response = post(&client, &api_url, "wallet/listwitnesses").await?;
    let entries = response
        .get("witnesses")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let mut records = Vec::new();
    for entry in &entries {
        let Some(address) = entry.get("address").and_then(Value::as_str) else {
            continue;
        };
        let mut metadata = Metadata::new();
        if let Some(is_jobs) = entry.get("isJobs") {
            metadata.insert("is_jobs".to_string(), is_jobs.clone());
        }
        records.push(AuthorityRecord {
            identity: address.to_string(),
            endpoint: None,
            label: entry.get("url").and_then(Value::as_str).map(str::to_string),
            weight: entry.get("voteCount").and_then(Value::as_u64),
            metadata,
        });
    }

    info!(url = %api_url, witnesses = records.len(), "listwitnesses fetched");
    Ok(records)
}

async fn post(client: &reqwest::Client, api_url: &str, path: &str) -> Result<Value> {
    let url = format!("{}/{}", api_url.trim_end_matches('/'), path);
    debug!(url = %url, "TRON API call");

    client
        .post(&url)
        .json(&json!({}))
        .send()
        .await
        .map_err(|e| AtlasError::Other(format!("{} request failed: {}", path, e)))?
        .json()
        .await
        .map_err(|e| AtlasError::Serialization(format!("{} response: {}", path, e)))
}

/// Decode java-tron's hex-encoded ASCII host field.
///
/// Iterates bytes, not char-indexed slices, so hostile non-ASCII input
/// from the API is rejected rather than slicing mid-character.
fn decode_hex_host(hex: &str) -> Option<String> {
    if hex.len() % 2 != 0 || !hex.is_ascii() {
        return None;
    }
    let bytes: Option<Vec<u8>> = hex
        .as_bytes()
        .chunks(2)
        .map(|pair| {
            let hi = (pair[0] as char).to_digit(16)?;
            let lo = (pair[1] as char).to_digit(16)?;
            Some((hi * 16 + lo) as u8)
        })
        .collect();
    String::from_utf8(bytes?).ok()
}
