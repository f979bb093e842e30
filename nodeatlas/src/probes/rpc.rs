//! BSC JSON-RPC sources: live peers and the on-chain validator set.

use serde_json::{json, Value};
use std::net::IpAddr;
use tracing::{debug, info};

use crate::error::{AtlasError, Result};
use crate::model::{AuthorityRecord, Metadata, RawPeer};

/// BSCValidatorSet system contract.
const VALIDATOR_SET_CONTRACT: &str = "0x0000000000000000000000000000000000001000";
/// Selector of `getValidators()`.
const GET_VALIDATORS_SELECTOR: &str = "0xb7ab4db5";

/// Fetch the node's live peer list via `admin_peers`.
pub async fn admin_peers(client: reqwest::Client, url: String) -> Result<Vec<RawPeer>> {
    let result = json_rpc(&client, &url, "admin_peers", json!([])).await?;
    let Some(entries) = result.as_array() else {
        return Err(AtlasError::Serialization(
            "admin_peers result is not an array".to_string(),
        ));
    };

    let mut peers = Vec::new();
    for entry in entries {
        if let Some(peer) = parse_admin_peer(entry) {
            peers.push(peer);
        }
    }

    info!(url = %url, peers = peers.len(), "admin_peers fetched");
    Ok(peers)
}

fn parse_admin_peer(entry: &Value) -> Option<RawPeer> {
    let enode = entry.get("enode").and_then(Value::as_str);
    let mut identity = entry
        .get("id")
        .and_then(Value::as_str)
        .map(str::to_string);
    let mut endpoint: Option<(IpAddr, u16)> = None;

    if let Some((pubkey, ip, port)) = enode.and_then(parse_enode) {
        identity = Some(pubkey);
        endpoint = Some((ip, port));
    }
    if endpoint.is_none() {
        // Fall back to the connection's remote address
        let remote = entry
            .get("network")
            .and_then(|n| n.get("remoteAddress"))
            .and_then(Value::as_str)?;
        let (ip, port) = remote.rsplit_once(':')?;
        endpoint = Some((ip.parse().ok()?, port.parse().ok()?));
    }

    let (ip, port) = endpoint?;
    let mut metadata = Metadata::new();
    if let Some(name) = entry.get("name").and_then(Value::as_str) {
        metadata.insert("client".to_string(), json!(name));
    }
    if let Some(enode) = enode {
        metadata.insert("enode".to_string(), json!(enode));
    }

    Some(RawPeer {
        identity,
        ip,
        port,
        metadata,
    })
}

/// Fetch the active validator set from the BSCValidatorSet contract.
///
/// Identity keys are lowercase 0x-prefixed consensus addresses; they only
/// correlate with peers whose sources expose the same key format, so most
/// of these records surface as declared-but-unreachable authorities.
pub async fn bsc_validators(client: reqwest::Client, url: String) -> Result<Vec<AuthorityRecord>> {
    let params = json!([
        { "to": VALIDATOR_SET_CONTRACT, "data": GET_VALIDATORS_SELECTOR },
        "latest"
    ]);
    let result = json_rpc(&client, &url, "eth_call", params).await?;
    let Some(hex) = result.as_str() else {
        return Err(AtlasError::Serialization(
            "eth_call result is not a string".to_string(),
        ));
    };

    let addresses = decode_address_array(hex)?;
    info!(url = %url, validators = addresses.len(), "Validator set fetched");

    Ok(addresses
        .into_iter()
        .map(|address| AuthorityRecord {
            identity: address,
            endpoint: None,
            label: None,
            weight: None,
            metadata: Metadata::new(),
        })
        .collect())
}

/// Issue one JSON-RPC call and unwrap the `result` field.
async fn json_rpc(
    client: &reqwest::Client,
    url: &str,
    method: &str,
    params: Value,
) -> Result<Value> {
    debug!(url = %url, method, "JSON-RPC call");
    let body = json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": method,
        "params": params,
    });

    let response: Value = client
        .post(url)
        .json(&body)
        .send()
        .await
        .map_err(|e| AtlasError::Other(format!("{} request failed: {}", method, e)))?
        .json()
        .await
        .map_err(|e| AtlasError::Serialization(format!("{} response: {}", method, e)))?;

    if let Some(error) = response.get("error") {
        return Err(AtlasError::Other(format!("{} error: {}", method, error)));
    }
    response
        .get("result")
        .cloned()
        .ok_or_else(|| AtlasError::Serialization(format!("{} response has no result", method)))
}

/// Split an enode URL into (pubkey, ip, port).
pub fn parse_enode(url: &str) -> Option<(String, IpAddr, u16)> {
    let rest = url.strip_prefix("enode://")?;
    let (pubkey, addr) = rest.split_once('@')?;
    // Discovery ports may trail as ?discport=...
    let addr = addr.split('?').next()?;
    let (host, port) = addr.rsplit_once(':')?;
    Some((pubkey.to_string(), host.parse().ok()?, port.parse().ok()?))
}

/// Decode an ABI-encoded `address[]` return value.
fn decode_address_array(hex: &str) -> Result<Vec<String>> {
    let data = hex.strip_prefix("0x").unwrap_or(hex);
    if data.is_empty() {
        return Ok(Vec::new());
    }
    // Word offsets below slice by byte; non-ASCII payloads are malformed
    // and must not reach them
    if !data.is_ascii() {
        return Err(AtlasError::Serialization(
            "address[] payload contains non-hex characters".to_string(),
        ));
    }
    if data.len() % 64 != 0 || data.len() < 128 {
        return Err(AtlasError::Serialization(format!(
            "malformed address[] payload ({} hex chars)",
            data.len()
        )));
    }

    let word = |i: usize| &data[i * 64..(i + 1) * 64];
    let count = usize::from_str_radix(word(1), 16)
        .map_err(|e| AtlasError::Serialization(format!("bad array length: {}", e)))?;
    if data.len() < (2 + count) * 64 {
        return Err(AtlasError::Serialization(
            "address[] payload shorter than its declared length".to_string(),
        ));
    }

    let mut addresses = Vec::with_capacity(count);
    for i in 0..count {
        let w = word(2 + i);
        addresses.push(format!("0x{}", w[24..].to_ascii_lowercase()));
    }
    Ok(addresses)
}
