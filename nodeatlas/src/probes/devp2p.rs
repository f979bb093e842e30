//! DHT crawling via the external `devp2p` binary.
//!
//! Runs `devp2p discv4 crawl` against the network's bootnodes and parses
//! the node set it writes. The crawl output format varies slightly across
//! versions; entries are parsed leniently and those without a usable
//! endpoint are skipped.

use serde_json::{json, Value};
use std::net::IpAddr;
use tokio::process::Command;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{AtlasError, Result};
use crate::model::{Metadata, RawPeer};

use super::rpc::parse_enode;

/// Run a discv4 crawl and collect the discovered peers.
pub async fn crawl(binary: String, crawl_seconds: u64) -> Result<Vec<RawPeer>> {
    let output_path =
        std::env::temp_dir().join(format!("nodeatlas-crawl-{}.json", Uuid::new_v4().simple()));

    info!(binary = %binary, seconds = crawl_seconds, "Starting devp2p crawl");
    let output = Command::new(&binary)
        .arg("discv4")
        .arg("crawl")
        .arg("-timeout")
        .arg(format!("{}s", crawl_seconds))
        .arg(&output_path)
        .output()
        .await
        .map_err(|e| AtlasError::Other(format!("failed to spawn {}: {}", binary, e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(AtlasError::Other(format!(
            "{} exited with {}: {}",
            binary,
            output.status,
            stderr.trim()
        )));
    }

    let text = tokio::fs::read_to_string(&output_path).await?;
    let peers = parse_crawl_output(&text)?;
    let _ = tokio::fs::remove_file(&output_path).await;

    info!(peers = peers.len(), "Crawl finished");
    Ok(peers)
}

/// Parse the nodes JSON written by `devp2p discv4 crawl`.
///
/// The file is an object keyed by node id. An entry's endpoint is taken
/// from its `enode` URL when present, otherwise from `ip`/`tcp` fields.
pub fn parse_crawl_output(text: &str) -> Result<Vec<RawPeer>> {
    let root: Value = serde_json::from_str(text)?;
    let Some(entries) = root.as_object() else {
        return Err(AtlasError::Serialization(
            "crawl output is not a JSON object".to_string(),
        ));
    };

    let mut peers = Vec::new();
    let mut skipped = 0usize;
    for (node_id, entry) in entries {
        match parse_entry(node_id, entry) {
            Some(peer) => peers.push(peer),
            None => skipped += 1,
        }
    }

    if skipped > 0 {
        warn!(skipped, "Crawl entries without a usable endpoint");
    }
    debug!(parsed = peers.len(), "Parsed crawl output");
    Ok(peers)
}

fn parse_entry(node_id: &str, entry: &Value) -> Option<RawPeer> {
    let mut identity = Some(node_id.to_string());
    let mut endpoint: Option<(IpAddr, u16)> = None;

    if let Some(enode) = entry.get("enode").and_then(Value::as_str) {
        if let Some((pubkey, ip, port)) = parse_enode(enode) {
            identity = Some(pubkey);
            endpoint = Some((ip, port));
        }
    }
    if endpoint.is_none() {
        let ip = entry.get("ip").and_then(Value::as_str)?.parse().ok()?;
        let port = entry.get("tcp").and_then(Value::as_u64)? as u16;
        endpoint = Some((ip, port));
    }

    let (ip, port) = endpoint?;
    let mut metadata = Metadata::new();
    if let Some(seq) = entry.get("seq") {
        metadata.insert("seq".to_string(), seq.clone());
    }
    if let Some(score) = entry.get("score") {
        metadata.insert("score".to_string(), score.clone());
    }
    metadata.insert("source".to_string(), json!("devp2p"));

    Some(RawPeer {
        identity,
        ip,
        port,
        metadata,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_entries_with_enode() {
        let text = r#"{
            "abc123": {
                "seq": 5,
                "score": 10,
                "enode": "enode://deadbeef@198.51.100.7:30303"
            }
        }"#;
        let peers = parse_crawl_output(text).unwrap();
        assert_eq!(peers.len(), 1);
        assert_eq!(peers[0].identity.as_deref(), Some("deadbeef"));
        assert_eq!(peers[0].ip.to_string(), "198.51.100.7");
        assert_eq!(peers[0].port, 30303);
        assert_eq!(peers[0].metadata["seq"], 5);
    }

    #[test]
    fn test_parse_entries_with_flat_fields() {
        let text = r#"{
            "node-1": { "ip": "203.0.113.9", "tcp": 30304 }
        }"#;
        let peers = parse_crawl_output(text).unwrap();
        assert_eq!(peers.len(), 1);
        assert_eq!(peers[0].identity.as_deref(), Some("node-1"));
        assert_eq!(peers[0].port, 30304);
    }

    #[test]
    fn test_entries_without_endpoint_are_skipped() {
        let text = r#"{
            "good": { "ip": "203.0.113.9", "tcp": 30303 },
            "bad": { "seq": 1 }
        }"#;
        let peers = parse_crawl_output(text).unwrap();
        assert_eq!(peers.len(), 1);
    }

    #[test]
    fn test_non_object_output_rejected() {
        assert!(parse_crawl_output("[1, 2, 3]").is_err());
        assert!(parse_crawl_output("not json").is_err());
    }

    #[tokio::test]
    async fn test_missing_binary_is_transport_failure() {
        let err = crawl("/nonexistent/devp2p".to_string(), 1).await.unwrap_err();
        assert!(err.to_string().contains("failed to spawn"));
    }
}
