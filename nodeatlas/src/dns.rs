//! DNS resolution helper for sequencer discovery.

use std::collections::HashSet;
use std::net::{IpAddr, SocketAddr};
use tokio::net::lookup_host;
use tracing::debug;

use crate::error::Result;

/// Resolve a hostname to deduplicated (ip, port) pairs.
///
/// Covers both A and AAAA records; order follows the resolver's answer
/// with duplicates removed.
pub async fn resolve_all(hostname: &str, port: u16) -> Result<Vec<(IpAddr, u16)>> {
    debug!(hostname, port, "Resolving");

    let addrs: Vec<SocketAddr> = lookup_host((hostname, port)).await?.collect();

    let mut seen: HashSet<(IpAddr, u16)> = HashSet::new();
    let mut out = Vec::new();
    for addr in addrs {
        let key = (addr.ip(), addr.port());
        if seen.insert(key) {
            out.push(key);
        }
    }

    debug!(hostname, addresses = out.len(), "Resolved");
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_resolve_localhost() {
        let addrs = resolve_all("localhost", 443).await.unwrap();
        assert!(!addrs.is_empty());
        assert!(addrs.iter().all(|(_, port)| *port == 443));
        // Deduplicated
        let unique: HashSet<_> = addrs.iter().collect();
        assert_eq!(unique.len(), addrs.len());
    }

    #[tokio::test]
    async fn test_resolve_invalid_hostname_fails() {
        let result = resolve_all("no-such-host.invalid", 443).await;
        assert!(result.is_err());
    }
}
