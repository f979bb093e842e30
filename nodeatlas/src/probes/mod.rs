//! Per-network probe registry.
//!
//! Each supported network maps to a fixed set of discovery/authority
//! sources. The set is closed: adding a network means adding a variant
//! here, not registering anything dynamically.

pub mod devp2p;
pub mod rpc;
pub mod sequencer;
pub mod tron;

use futures::future::BoxFuture;
use std::fmt;
use std::str::FromStr;

use crate::config::SourcesConfig;
use crate::error::{AtlasError, Result};
use crate::model::{AuthorityRecord, NodeRole, ProbeMode, RawPeer};

/// A named producer of raw peers.
pub struct PeerSource {
    /// Name surfaced in the partial-failure set
    pub name: &'static str,
    /// The fetch, not yet awaited
    pub fetch: BoxFuture<'static, Result<Vec<RawPeer>>>,
}

/// A named producer of authority records.
pub struct AuthoritySource {
    pub name: &'static str,
    pub fetch: BoxFuture<'static, Result<Vec<AuthorityRecord>>>,
}

/// Everything the pipeline needs to run one network.
pub struct NetworkSources {
    pub peers: Vec<PeerSource>,
    pub authority: Option<AuthoritySource>,
    /// Role forced onto peers when configuration declares the endpoint
    /// authoritative (sequencer DNS case)
    pub declared_role: Option<NodeRole>,
}

/// Supported blockchain networks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Network {
    Base,
    Optimism,
    Starknet,
    Bsc,
    Tron,
    Ethereum,
}

impl Network {
    pub const ALL: [Network; 6] = [
        Network::Base,
        Network::Optimism,
        Network::Starknet,
        Network::Bsc,
        Network::Tron,
        Network::Ethereum,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Network::Base => "base",
            Network::Optimism => "optimism",
            Network::Starknet => "starknet",
            Network::Bsc => "bsc",
            Network::Tron => "tron",
            Network::Ethereum => "ethereum",
        }
    }

    /// Output shape of this network's probe.
    pub fn mode(&self) -> ProbeMode {
        match self {
            Network::Base | Network::Optimism | Network::Starknet => ProbeMode::Single,
            Network::Bsc | Network::Tron => ProbeMode::List,
            Network::Ethereum => ProbeMode::Aggregate,
        }
    }

    /// Build this network's source set from configuration.
    ///
    /// The futures capture owned copies of the endpoints so they can be
    /// driven concurrently without borrowing the config.
    pub fn build_sources(&self, config: &SourcesConfig, client: &reqwest::Client) -> NetworkSources {
        match self {
            Network::Base => sequencer_sources("mainnet-sequencer.base.org"),
            Network::Optimism => sequencer_sources("mainnet-sequencer.optimism.io"),
            Network::Starknet => sequencer_sources("alpha-mainnet.starknet.io"),
            Network::Bsc => {
                let crawl_binary = config.devp2p_binary.clone();
                let crawl_seconds = config.crawl_seconds;
                let rpc_url = config.bsc_rpc_url.clone();
                let peers_client = client.clone();
                let peers_url = rpc_url.clone();
                let auth_client = client.clone();
                NetworkSources {
                    peers: vec![
                        PeerSource {
                            name: "devp2p-crawl",
                            fetch: Box::pin(devp2p::crawl(crawl_binary, crawl_seconds)),
                        },
                        PeerSource {
                            name: "admin-peers",
                            fetch: Box::pin(rpc::admin_peers(peers_client, peers_url)),
                        },
                    ],
                    authority: Some(AuthoritySource {
                        name: "validator-set",
                        fetch: Box::pin(rpc::bsc_validators(auth_client, rpc_url)),
                    }),
                    declared_role: None,
                }
            }
            Network::Tron => {
                let api_url = config.tron_api_url.clone();
                let nodes_client = client.clone();
                let nodes_url = api_url.clone();
                let witness_client = client.clone();
                NetworkSources {
                    peers: vec![PeerSource {
                        name: "listnodes",
                        fetch: Box::pin(tron::list_nodes(nodes_client, nodes_url)),
                    }],
                    authority: Some(AuthoritySource {
                        name: "listwitnesses",
                        fetch: Box::pin(tron::list_witnesses(witness_client, api_url)),
                    }),
                    declared_role: None,
                }
            }
            Network::Ethereum => {
                let crawl_binary = config.devp2p_binary.clone();
                let crawl_seconds = config.crawl_seconds;
                NetworkSources {
                    peers: vec![PeerSource {
                        name: "devp2p-crawl",
                        fetch: Box::pin(devp2p::crawl(crawl_binary, crawl_seconds)),
                    }],
                    authority: None,
                    declared_role: None,
                }
            }
        }
    }
}

fn sequencer_sources(hostname: &'static str) -> NetworkSources {
    NetworkSources {
        peers: vec![PeerSource {
            name: "sequencer-dns",
            fetch: Box::pin(sequencer::resolve(hostname, 443)),
        }],
        authority: None,
        // The resolved endpoint is the declared producer; there is no
        // separate authority listing to cross-check
        declared_role: Some(NodeRole::Authority),
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Network {
    type Err = AtlasError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "base" => Ok(Network::Base),
            "optimism" => Ok(Network::Optimism),
            "starknet" => Ok(Network::Starknet),
            "bsc" => Ok(Network::Bsc),
            "tron" => Ok(Network::Tron),
            "ethereum" => Ok(Network::Ethereum),
            other => Err(AtlasError::UnknownNetwork(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_round_trip() {
        for network in Network::ALL {
            assert_eq!(network.name().parse::<Network>().unwrap(), network);
        }
    }

    #[test]
    fn test_network_parse_is_case_insensitive() {
        assert_eq!("BSC".parse::<Network>().unwrap(), Network::Bsc);
    }

    #[test]
    fn test_unknown_network_rejected() {
        let err = "dogechain".parse::<Network>().unwrap_err();
        assert!(matches!(err, AtlasError::UnknownNetwork(_)));
    }

    #[test]
    fn test_probe_modes() {
        assert_eq!(Network::Base.mode(), ProbeMode::Single);
        assert_eq!(Network::Bsc.mode(), ProbeMode::List);
        assert_eq!(Network::Ethereum.mode(), ProbeMode::Aggregate);
    }

    #[test]
    fn test_source_sets_per_network() {
        let config = crate::config::AtlasConfig::default().sources;
        let client = reqwest::Client::new();

        let bsc = Network::Bsc.build_sources(&config, &client);
        assert_eq!(bsc.peers.len(), 2);
        assert!(bsc.authority.is_some());
        assert!(bsc.declared_role.is_none());

        let base = Network::Base.build_sources(&config, &client);
        assert_eq!(base.peers.len(), 1);
        assert!(base.authority.is_none());
        assert_eq!(base.declared_role, Some(NodeRole::Authority));

        let ethereum = Network::Ethereum.build_sources(&config, &client);
        assert_eq!(ethereum.peers.len(), 1);
        assert!(ethereum.authority.is_none());
    }
}
