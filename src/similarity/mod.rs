//! Lexical near-duplicate detection
//!
//! Texts become sets of word (or character) shingles; responses whose sets
//! overlap by at least a Jaccard threshold are linked, and each connected
//! group of linked responses is one component. Components surface
//! coordinated campaign submissions within a consultation.

mod cluster;
mod config;
mod shingle;

pub use cluster::{add_components, cluster, component_sizes, ComponentMap};
pub use config::{
    ClusterConfig, ConfigError, ShingleUnit, DEFAULT_SHINGLE_SIZE, DEFAULT_SIMILARITY_THRESHOLD,
};
pub use shingle::{jaccard, normalize, shingles, ShingleSet};
