//! SQLite persistence: crawl-run audit records and node upserts.
//!
//! Nodes are keyed (network, ip, port). `first_seen` is written once and
//! preserved across upserts; everything else, including `last_seen`,
//! follows the latest run. Enrichment being deterministic (same IP, same
//! databases, same fields) is what makes these timestamps meaningful.

use chrono::Utc;
use rusqlite::{params, Connection};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::Result;
use crate::model::{CrawlRun, EnrichedNode};

const SCHEMA_VERSION: i64 = 1;

const SCHEMA_V1: &str = "\
CREATE TABLE IF NOT EXISTS crawl_runs (
    id                TEXT PRIMARY KEY,
    network           TEXT NOT NULL,
    timestamp         TEXT NOT NULL,
    node_count        INTEGER NOT NULL,
    duration_seconds  REAL NOT NULL,
    meta              TEXT NOT NULL DEFAULT '{}'
);

CREATE TABLE IF NOT EXISTS nodes (
    network        TEXT NOT NULL,
    ip             TEXT,
    port           INTEGER,
    identity       TEXT,
    role           TEXT NOT NULL,
    label          TEXT,
    weight         INTEGER,
    city           TEXT,
    country        TEXT,
    country_code   TEXT,
    latitude       REAL,
    longitude      REAL,
    asn            INTEGER,
    asn_org        TEXT,
    cloud_provider TEXT,
    cloud_region   TEXT,
    is_cloud       INTEGER NOT NULL,
    metadata       TEXT NOT NULL DEFAULT '{}',
    first_seen     TEXT NOT NULL,
    last_seen      TEXT NOT NULL,
    crawl_run_id   TEXT,
    UNIQUE (network, ip, port)
);
";

/// Open (or create) the database and apply pending migrations.
pub fn init_db(path: &str) -> Result<Connection> {
    let conn = Connection::open(path)?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    migrate(&conn)?;
    Ok(conn)
}

/// Persist a crawl run and return its generated UUID.
pub fn save_crawl_run(conn: &Connection, run: &CrawlRun) -> Result<String> {
    let run_id = Uuid::new_v4().simple().to_string();
    conn.execute(
        "INSERT INTO crawl_runs (id, network, timestamp, node_count, duration_seconds, meta)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            run_id,
            run.network,
            run.timestamp.to_rfc3339(),
            run.node_count,
            run.duration_seconds,
            serde_json::to_string(&run.meta)?,
        ],
    )?;
    debug!(run_id = %run_id, network = %run.network, "Crawl run saved");
    Ok(run_id)
}

/// Upsert discovered nodes.
///
/// On conflict (same network, ip, port) every field is updated except
/// `first_seen`.
pub fn save_nodes(conn: &mut Connection, nodes: &[EnrichedNode], crawl_run_id: &str) -> Result<()> {
    let now = Utc::now().to_rfc3339();
    let tx = conn.transaction()?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO nodes (
                network, ip, port, identity, role, label, weight,
                city, country, country_code, latitude, longitude,
                asn, asn_org, cloud_provider, cloud_region, is_cloud,
                metadata, first_seen, last_seen, crawl_run_id
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12,
                      ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21)
            ON CONFLICT (network, ip, port) DO UPDATE SET
                identity       = excluded.identity,
                role           = excluded.role,
                label          = excluded.label,
                weight         = excluded.weight,
                city           = excluded.city,
                country        = excluded.country,
                country_code   = excluded.country_code,
                latitude       = excluded.latitude,
                longitude      = excluded.longitude,
                asn            = excluded.asn,
                asn_org        = excluded.asn_org,
                cloud_provider = excluded.cloud_provider,
                cloud_region   = excluded.cloud_region,
                is_cloud       = excluded.is_cloud,
                metadata       = excluded.metadata,
                last_seen      = excluded.last_seen,
                crawl_run_id   = excluded.crawl_run_id",
        )?;

        for node in nodes {
            stmt.execute(params![
                node.node.network,
                node.node.ip.map(|ip| ip.to_string()),
                node.node.port,
                node.node.identity,
                node.node.role.as_str(),
                node.node.label,
                node.node.weight,
                node.city,
                node.country,
                node.country_code,
                node.latitude,
                node.longitude,
                node.asn,
                node.asn_org,
                node.cloud_provider,
                node.cloud_region,
                node.is_cloud,
                serde_json::to_string(&node.node.metadata)?,
                now,
                now,
                crawl_run_id,
            ])?;
        }
    }
    tx.commit()?;

    info!(nodes = nodes.len(), crawl_run_id = %crawl_run_id, "Nodes upserted");
    Ok(())
}

fn migrate(conn: &Connection) -> Result<()> {
    let current: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    if current >= SCHEMA_VERSION {
        return Ok(());
    }

    if current < 1 {
        debug!("Applying schema migration v0 -> v1");
        conn.execute_batch(SCHEMA_V1)?;
    }

    conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    debug!(version = SCHEMA_VERSION, "Database schema up to date");
    Ok(())
}
