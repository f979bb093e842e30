//! End-to-end pipeline tests with stubbed sources, plus persistence of
//! full run outcomes.

use std::net::IpAddr;
use std::time::Duration;

use nodeatlas::error::AtlasError;
use nodeatlas::geo::GeoReader;
use nodeatlas::model::{AuthorityRecord, Metadata, NodeRole, ProbeMode, RawPeer};
use nodeatlas::persist;
use nodeatlas::pipeline::run_with_sources;
use nodeatlas::probes::{AuthoritySource, NetworkSources, PeerSource};

fn ip(last: u8) -> IpAddr {
    IpAddr::from([198, 51, 100, last])
}

fn peer(last: u8, identity: Option<&str>) -> RawPeer {
    RawPeer {
        identity: identity.map(str::to_string),
        ip: ip(last),
        port: 30303,
        metadata: Metadata::new(),
    }
}

fn authority(identity: &str, label: &str, weight: u64) -> AuthorityRecord {
    AuthorityRecord {
        identity: identity.to_string(),
        endpoint: None,
        label: Some(label.to_string()),
        weight: Some(weight),
        metadata: Metadata::new(),
    }
}

#[tokio::test]
async fn test_full_run_with_authority_matching() {
    let sources = NetworkSources {
        peers: vec![PeerSource {
            name: "crawl",
            fetch: Box::pin(async {
                Ok(vec![
                    peer(1, Some("k1")),
                    peer(2, Some("k2")),
                    peer(3, None),
                ])
            }),
        }],
        authority: Some(AuthoritySource {
            name: "validators",
            fetch: Box::pin(async {
                Ok(vec![
                    authority("k1", "Validator-1", 100),
                    authority("k-offline", "Validator-Offline", 50),
                ])
            }),
        }),
        declared_role: None,
    };

    let geo = GeoReader::disabled();
    let outcome = run_with_sources("bsc", ProbeMode::List, sources, Duration::from_secs(5), &geo)
        .await
        .unwrap();

    // 3 reachable peers + 1 declared-but-unreachable authority
    assert_eq!(outcome.nodes.len(), 4);
    assert!(outcome.failed_sources.is_empty());

    let matched = outcome
        .nodes
        .iter()
        .find(|n| n.node.identity.as_deref() == Some("k1"))
        .unwrap();
    assert_eq!(matched.node.role, NodeRole::Authority);
    assert_eq!(matched.node.label.as_deref(), Some("Validator-1"));
    assert!(matched.node.ip.is_some());

    let offline = outcome
        .nodes
        .iter()
        .find(|n| n.node.identity.as_deref() == Some("k-offline"))
        .unwrap();
    assert!(offline.node.ip.is_none());
    assert_eq!(offline.node.weight, Some(50));

    // Aggregation reconciles with node count
    assert_eq!(outcome.stats.total, 4);
    assert_eq!(
        outcome.stats.cloud_nodes + outcome.stats.bare_metal_nodes,
        4
    );
}

#[tokio::test]
async fn test_all_failing_sources_produce_no_nodes() {
    let sources = NetworkSources {
        peers: vec![
            PeerSource {
                name: "crawl",
                fetch: Box::pin(async { Err(AtlasError::Other("dns failure".into())) }),
            },
            PeerSource {
                name: "rpc",
                fetch: Box::pin(async { Err(AtlasError::Other("refused".into())) }),
            },
        ],
        authority: Some(AuthoritySource {
            name: "validators",
            fetch: Box::pin(async { Err(AtlasError::Other("reverted".into())) }),
        }),
        declared_role: None,
    };

    let geo = GeoReader::disabled();
    let err = run_with_sources("bsc", ProbeMode::List, sources, Duration::from_secs(5), &geo)
        .await
        .unwrap_err();
    assert!(matches!(err, AtlasError::NoSourcesAvailable { .. }));
}

#[tokio::test]
async fn test_partial_failure_keeps_results_and_flags() {
    let sources = NetworkSources {
        peers: vec![
            PeerSource {
                name: "broken-source",
                fetch: Box::pin(async { Err(AtlasError::Other("boom".into())) }),
            },
            PeerSource {
                name: "healthy-source",
                fetch: Box::pin(async { Ok((1..=5).map(|i| peer(i, None)).collect()) }),
            },
        ],
        authority: None,
        declared_role: None,
    };

    let geo = GeoReader::disabled();
    let outcome = run_with_sources(
        "ethereum",
        ProbeMode::Aggregate,
        sources,
        Duration::from_secs(5),
        &geo,
    )
    .await
    .unwrap();

    assert_eq!(outcome.nodes.len(), 5);
    assert_eq!(outcome.stats.total, 5);
    assert_eq!(outcome.failed_sources, vec!["broken-source".to_string()]);
}

#[tokio::test]
async fn test_outcome_persists_and_upserts() {
    let sources = NetworkSources {
        peers: vec![PeerSource {
            name: "dns",
            fetch: Box::pin(async { Ok(vec![peer(1, None)]) }),
        }],
        authority: None,
        declared_role: Some(NodeRole::Authority),
    };

    let geo = GeoReader::disabled();
    let outcome = run_with_sources("base", ProbeMode::Single, sources, Duration::from_secs(5), &geo)
        .await
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("atlas.db");
    let mut conn = persist::init_db(db_path.to_str().unwrap()).unwrap();

    let run_id = persist::save_crawl_run(&conn, &outcome.crawl_run()).unwrap();
    persist::save_nodes(&mut conn, &outcome.nodes, &run_id).unwrap();

    // Second run over the same endpoint keeps a single row
    let run_id_2 = persist::save_crawl_run(&conn, &outcome.crawl_run()).unwrap();
    persist::save_nodes(&mut conn, &outcome.nodes, &run_id_2).unwrap();

    let node_rows: i64 = conn
        .query_row("SELECT COUNT(*) FROM nodes", [], |row| row.get(0))
        .unwrap();
    let run_rows: i64 = conn
        .query_row("SELECT COUNT(*) FROM crawl_runs", [], |row| row.get(0))
        .unwrap();
    assert_eq!(node_rows, 1);
    assert_eq!(run_rows, 2);

    let role: String = conn
        .query_row("SELECT role FROM nodes", [], |row| row.get(0))
        .unwrap();
    assert_eq!(role, "authority");
}
