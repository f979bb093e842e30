use thiserror::Error;

/// Errors that can occur in the nodeatlas library
#[derive(Error, Debug)]
pub enum AtlasError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network I/O error
    #[error("Network I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A single source exceeded its deadline; recorded per run, not fatal
    #[error("Source '{name}' timed out after {timeout_secs}s")]
    SourceTimeout { name: String, timeout_secs: u64 },

    /// A single source failed outright; recorded per run, not fatal
    #[error("Source '{name}' failed: {reason}")]
    SourceTransport { name: String, reason: String },

    /// Every source for a network failed; fatal for that network's run only
    #[error("No sources available for network '{network}'")]
    NoSourcesAvailable { network: String },

    /// A location/ownership reference database failed to load
    #[error("Reference data unavailable: {0}")]
    ReferenceData(String),

    /// Persistence layer error
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Unknown network name
    #[error("Unknown network '{0}'")]
    UnknownNetwork(String),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

/// Result type alias using AtlasError
pub type Result<T> = std::result::Result<T, AtlasError>;

impl From<String> for AtlasError {
    fn from(s: String) -> Self {
        AtlasError::Other(s)
    }
}

impl From<&str> for AtlasError {
    fn from(s: &str) -> Self {
        AtlasError::Other(s.to_string())
    }
}

impl From<serde_json::Error> for AtlasError {
    fn from(err: serde_json::Error) -> Self {
        AtlasError::Serialization(err.to_string())
    }
}

impl From<rusqlite::Error> for AtlasError {
    fn from(err: rusqlite::Error) -> Self {
        AtlasError::Persistence(err.to_string())
    }
}
