//! Storage trait definitions

use crate::record::{ConsultationRecord, ConsultationSlug, ResponseKey, ResponseRecord};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Date parsing error: {0}")]
    DateParse(String),

    /// A record already stored under `key` disagrees on a snapshot field
    #[error("Conflicting record for {key}: field '{field}' differs from stored value")]
    Conflict { key: String, field: &'static str },

    #[error("Store lock poisoned")]
    LockPoisoned,
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// What a `put` did to the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    /// The key was new
    Inserted,
    /// The key existed and additive fields changed
    Merged,
    /// The key existed with exactly this content
    Unchanged,
}

/// Trait for incremental record stores
///
/// A store never holds two records under the same natural key. Every `put`
/// is committed before it returns, so records written before a crash survive
/// it. Implementations must be thread-safe (Send + Sync); concurrent `put`s
/// are serialized.
pub trait RecordStore: Send + Sync {
    // === Consultation Operations ===

    /// Whether a consultation with this slug is stored
    fn contains_consultation(&self, slug: &ConsultationSlug) -> StorageResult<bool>;

    /// Insert a consultation, or merge additive fields into the stored one
    ///
    /// Fails with `StorageError::Conflict` when the stored snapshot differs.
    fn put_consultation(&self, record: &ConsultationRecord) -> StorageResult<PutOutcome>;

    /// Load a consultation by slug
    fn load_consultation(&self, slug: &ConsultationSlug) -> StorageResult<Option<ConsultationRecord>>;

    /// All consultations in insertion order
    fn load_consultations(&self) -> StorageResult<Vec<ConsultationRecord>>;

    // === Response Operations ===

    /// Whether a response with this key is stored
    fn contains_response(&self, key: &ResponseKey) -> StorageResult<bool>;

    /// Insert a response, or merge additive fields into the stored one
    ///
    /// Fails with `StorageError::Conflict` when an immutable field differs.
    fn put_response(&self, record: &ResponseRecord) -> StorageResult<PutOutcome>;

    /// `put_response` for a batch, committed as one transaction
    ///
    /// Either every record lands or none does. Returns how many stored
    /// records changed.
    fn put_responses(&self, records: &[ResponseRecord]) -> StorageResult<usize>;

    /// Load a response by key
    fn load_response(&self, key: &ResponseKey) -> StorageResult<Option<ResponseRecord>>;

    /// All responses of one consultation in insertion order
    fn load_responses(&self, slug: &ConsultationSlug) -> StorageResult<Vec<ResponseRecord>>;

    /// Number of stored responses for one consultation
    fn count_responses(&self, slug: &ConsultationSlug) -> StorageResult<usize> {
        Ok(self.load_responses(slug)?.len())
    }
}

/// Extension trait for opening stores from paths
pub trait OpenStore: RecordStore + Sized {
    /// Open or create a store at the given path
    fn open(path: impl AsRef<Path>) -> StorageResult<Self>;

    /// Create an in-memory store (useful for testing)
    fn open_in_memory() -> StorageResult<Self>;
}
