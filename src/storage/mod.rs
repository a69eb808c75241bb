//! Incremental record storage
//!
//! Records are persisted through the `RecordStore` trait, keyed by their
//! natural key. The primary implementation is `SqliteStore`.

mod sqlite;
mod traits;

pub use sqlite::SqliteStore;
pub use traits::{OpenStore, PutOutcome, RecordStore, StorageError, StorageResult};
