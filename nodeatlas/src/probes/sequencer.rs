//! L2 sequencer discovery via DNS.
//!
//! The L2 networks publish a single sequencer endpoint behind a known
//! hostname; resolving it is the whole discovery step.

use serde_json::json;
use tracing::info;

use crate::dns;
use crate::error::Result;
use crate::model::{Metadata, RawPeer};

/// Resolve a sequencer hostname into raw peers, one per resolved address.
pub async fn resolve(hostname: &'static str, port: u16) -> Result<Vec<RawPeer>> {
    let addrs = dns::resolve_all(hostname, port).await?;
    info!(hostname, addresses = addrs.len(), "Sequencer resolved");

    Ok(addrs
        .into_iter()
        .map(|(ip, port)| {
            let mut metadata = Metadata::new();
            metadata.insert("hostname".to_string(), json!(hostname));
            RawPeer {
                identity: None,
                ip,
                port,
                metadata,
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_resolve_carries_hostname_metadata() {
        let peers = resolve("localhost", 443).await.unwrap();
        assert!(!peers.is_empty());
        for peer in &peers {
            assert_eq!(peer.port, 443);
            assert_eq!(peer.metadata["hostname"], "localhost");
            assert!(peer.identity.is_none());
        }
    }
}
