use serde::{Deserialize, Serialize};

/// Main configuration for the nodeatlas tool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AtlasConfig {
    /// Persistence settings
    pub database: DatabaseConfig,
    /// Geo reference database settings
    pub geodb: GeoDbConfig,
    /// Per-network source endpoints
    pub sources: SourcesConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Persistence settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file
    pub path: String,
}

/// Geo reference database settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoDbConfig {
    /// Path to GeoLite2-City.mmdb, if configured
    pub city_db: Option<String>,
    /// Path to GeoLite2-ASN.mmdb, if configured
    pub asn_db: Option<String>,
    /// Proceed with enrichment disabled when a database is missing.
    /// When false, a missing database aborts the run at startup.
    pub allow_missing: bool,
}

/// Per-network source endpoints and timeouts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    /// Path (or bare name for $PATH lookup) of the devp2p binary used for
    /// DHT crawling
    pub devp2p_binary: String,
    /// Extra time budget handed to the devp2p crawl itself, in seconds
    pub crawl_seconds: u64,
    /// JSON-RPC endpoint of a BSC node (admin_peers + eth_call)
    pub bsc_rpc_url: String,
    /// HTTP API endpoint of a java-tron node
    pub tron_api_url: String,
    /// Per-source fetch timeout in seconds
    pub source_timeout_seconds: u64,
    /// Whole-run deadline per network in seconds
    pub run_deadline_seconds: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter when RUST_LOG is not set
    pub level: String,
    /// Log output format: text or json
    pub format: String,
}

impl Default for AtlasConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                path: "nodeatlas.db".to_string(),
            },
            geodb: GeoDbConfig {
                city_db: None,
                asn_db: None,
                allow_missing: true,
            },
            sources: SourcesConfig {
                devp2p_binary: "devp2p".to_string(),
                crawl_seconds: 120,
                bsc_rpc_url: "http://localhost:8545".to_string(),
                tron_api_url: "http://localhost:8090".to_string(),
                source_timeout_seconds: 180,
                run_deadline_seconds: 600,
            },
            logging: LoggingConfig {
                level: "nodeatlas=info".to_string(),
                format: "text".to_string(),
            },
        }
    }
}

impl AtlasConfig {
    /// Load configuration from a TOML file, with NODEATLAS_* environment
    /// variable overrides
    pub fn from_file(path: &str) -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("NODEATLAS").separator("__"))
            .build()?;

        settings.try_deserialize()
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.database.path.is_empty() {
            return Err("Database path cannot be empty".to_string());
        }

        if self.sources.source_timeout_seconds == 0 {
            return Err("Source timeout cannot be 0".to_string());
        }

        if self.sources.run_deadline_seconds < self.sources.source_timeout_seconds {
            return Err("Run deadline cannot be shorter than the source timeout".to_string());
        }

        if self.sources.bsc_rpc_url.is_empty() {
            return Err("BSC RPC URL cannot be empty".to_string());
        }

        if self.sources.tron_api_url.is_empty() {
            return Err("TRON API URL cannot be empty".to_string());
        }

        match self.logging.format.as_str() {
            "text" | "json" => {}
            other => return Err(format!("Unknown log format '{}'", other)),
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = AtlasConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut config = AtlasConfig::default();
        config.sources.source_timeout_seconds = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_deadline_shorter_than_timeout_rejected() {
        let mut config = AtlasConfig::default();
        config.sources.run_deadline_seconds = 10;
        config.sources.source_timeout_seconds = 60;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_log_format_rejected() {
        let mut config = AtlasConfig::default();
        config.logging.format = "xml".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_loading_from_file() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        writeln!(
            file,
            r#"
[database]
path = "/tmp/test-atlas.db"

[geodb]
allow_missing = true

[sources]
devp2p_binary = "devp2p"
crawl_seconds = 30
bsc_rpc_url = "http://10.0.0.1:8545"
tron_api_url = "http://10.0.0.1:8090"
source_timeout_seconds = 60
run_deadline_seconds = 300

[logging]
level = "debug"
format = "text"
"#
        )
        .unwrap();

        let config = AtlasConfig::from_file(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.database.path, "/tmp/test-atlas.db");
        assert_eq!(config.sources.bsc_rpc_url, "http://10.0.0.1:8545");
        assert_eq!(config.sources.source_timeout_seconds, 60);
        assert!(config.geodb.city_db.is_none());
        assert!(config.validate().is_ok());
    }
}
