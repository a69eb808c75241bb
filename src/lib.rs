//! Consultatie: incremental collector for public consultation responses
//!
//! Harvests consultation metadata and individual public responses from the
//! Dutch government consultation portal into a local store, and flags
//! coordinated campaign submissions by grouping near-duplicate responses.
//!
//! # Core Concepts
//!
//! - **Records**: consultations keyed by slug, responses keyed by slug + id
//! - **Incremental store**: keyed, durable, skip-if-present; re-runs resume
//! - **Components**: connected groups of responses whose shingle sets overlap
//!   by at least a Jaccard threshold
//!
//! # Example
//!
//! ```
//! use consultatie::{add_components, ClusterConfig, ResponseRecord};
//!
//! let records = vec![
//!     ResponseRecord::new("wind", "A", "Please reject this proposal entirely"),
//!     ResponseRecord::new("wind", "B", "Please reject this proposal entirely."),
//!     ResponseRecord::new("wind", "C", "I support this regulation fully"),
//! ];
//! let config = ClusterConfig::new(3, 0.3).unwrap();
//! let labeled = add_components(records, &config);
//!
//! assert_eq!(labeled[0].component, labeled[1].component);
//! assert_ne!(labeled[0].component, labeled[2].component);
//! ```

pub mod collect;
pub mod config;
mod record;
pub mod similarity;
pub mod source;
pub mod storage;

pub use collect::{
    CancellationToken, CollectError, CollectReport, CollectResult, Collector, ConsultationOptions, ResponseOptions,
};
pub use config::{HarvestConfig, SettingsError};
pub use record::{AttachmentRef, ComponentLabel, ConsultationRecord, ConsultationSlug, ResponseKey, ResponseRecord};
pub use similarity::{add_components, cluster, jaccard, shingles, ClusterConfig, ConfigError, ShingleUnit};
pub use source::{
    AttachmentResolver, FetchError, HttpAttachmentResolver, ListingEntry, ListingPage, PortalSource, RecordSource,
};
pub use storage::{OpenStore, PutOutcome, RecordStore, SqliteStore, StorageError, StorageResult};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
