//! Storage layer for logflow
//!
//! This crate provides:
//! - The tenant-partitioned `LogStore` interface
//! - SQLite document storage (`sqlite://`)
//! - An in-memory store (`memory://`)

pub mod error;
pub mod memory;
pub mod sqlite;
pub mod store;

use std::sync::Arc;

pub use error::{Result, StorageError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use store::{DeadLetter, LogStore, StoreLayout};

/// Open the store named by `url`.
pub async fn connect(url: &str, layout: StoreLayout) -> Result<Arc<dyn LogStore>> {
    if url.starts_with("memory:") {
        Ok(Arc::new(MemoryStore::new(layout)))
    } else if url.starts_with("sqlite:") {
        Ok(Arc::new(SqliteStore::connect(url, layout).await?))
    } else {
        Err(StorageError::UnsupportedUrl(url.to_string()))
    }
}
