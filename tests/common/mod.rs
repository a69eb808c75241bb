//! Common test utilities for collection and clustering tests
//!
//! Scripted collaborators stand in for the portal; seeded corpora drive the
//! clustering properties.

#![allow(dead_code)]

pub mod corpus;
pub mod scripted;

pub use corpus::{campaign_corpus, partition, refines};
pub use scripted::{ScriptedResolver, ScriptedSource};

use consultatie::{OpenStore, SqliteStore};
use std::sync::Arc;

/// Fresh in-memory store
pub fn create_test_store() -> Arc<SqliteStore> {
    Arc::new(SqliteStore::open_in_memory().unwrap())
}
