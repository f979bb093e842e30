//! nodeatlas library
//!
//! Discovers block-producing endpoints across blockchain networks,
//! correlates them with authority-set data, enriches each address with
//! geographic and hosting-provider information, and aggregates the result
//! into distribution statistics.

pub mod aggregate;
pub mod cloud;
pub mod config;
pub mod correlate;
pub mod dns;
pub mod error;
pub mod geo;
pub mod model;
pub mod output;
pub mod persist;
pub mod pipeline;
pub mod probes;

// Re-export commonly used types
pub use aggregate::{Accumulator, AggregateResult};
pub use config::AtlasConfig;
pub use correlate::{correlate, CorrelationOutput, SourceBatch};
pub use error::{AtlasError, Result};
pub use geo::GeoReader;
pub use model::{AuthorityRecord, CorrelatedNode, EnrichedNode, NodeRole, ProbeMode, RawPeer};
pub use pipeline::{run_network, RunOutcome};
pub use probes::Network;
