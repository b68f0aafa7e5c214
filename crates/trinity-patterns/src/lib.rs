//! Durable pattern storage with optional semantic search (§4.2).
//!
//! [`db::SqlitePatternStore`] is the production implementation, built on
//! `rusqlite` + `sqlite-vec` the way `tandem-memory` builds its
//! vector-backed stores. [`store::PatternStore`] is the trait
//! `trinity-roles` programs against so WITNESS/ARCHITECT can be tested
//! against [`store::InMemoryPatternStore`] without pulling in SQLite.

pub mod db;
pub mod embeddings;
pub mod store;
pub mod types;

pub use db::SqlitePatternStore;
pub use store::{InMemoryPatternStore, PatternStore};
pub use types::{
    EmbeddingHealth, PatternError, PatternResult, PatternStats, SearchQuery, SuccessUpdateLogEntry,
};
