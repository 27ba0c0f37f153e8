//! Durable store facade.
//!
//! The core treats the underlying database as an opaque transactional
//! table store with foreign-key cascades, WAL snapshot semantics, and (for
//! archived messages) full-text search maintained by triggers. This module
//! exposes that contract as a trait so the rest of the crate never talks
//! to SQL directly; `MemoryStore` backs tests and default use,
//! `SqliteStore` (feature `sqlite`) backs real deployments.

#[cfg(feature = "sqlite")]
pub mod sqlite;

use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A single row, namespaced by table and primary key, stored as an opaque
/// serialized blob. Subsystems (contact store, offline queue) serialize
/// their own row types on top of this.
#[async_trait]
pub trait Store: Send + Sync {
    async fn put(&self, table: &str, key: &str, value: Vec<u8>) -> Result<()>;
    async fn get(&self, table: &str, key: &str) -> Result<Option<Vec<u8>>>;
    async fn delete(&self, table: &str, key: &str) -> Result<()>;
    async fn list(&self, table: &str) -> Result<Vec<(String, Vec<u8>)>>;

    /// Cascade-delete every row in `table` whose key starts with `prefix`
    /// — used for foreign-key-cascade-shaped deletes (e.g. a chat's
    /// messages when the chat itself is removed).
    async fn delete_prefix(&self, table: &str, prefix: &str) -> Result<()>;

    /// On-demand consistency check; real backends verify page/WAL
    /// integrity, the in-memory backend trivially always passes.
    async fn integrity_check(&self) -> Result<bool>;

    /// Drop everything. Used from tests to reset state between cases.
    async fn delete_database(&self) -> Result<()>;
}

/// Simple in-process table store used by default and by every unit test
/// in this crate. WAL/FTS/FK-cascade semantics are simulated faithfully
/// enough for the core's own invariants (prefix-scoped delete gives
/// cascade-shaped behavior) without a real database engine.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<String, HashMap<String, Vec<u8>>>>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn put(&self, table: &str, key: &str, value: Vec<u8>) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables
            .entry(table.to_string())
            .or_default()
            .insert(key.to_string(), value);
        Ok(())
    }

    async fn get(&self, table: &str, key: &str) -> Result<Option<Vec<u8>>> {
        let tables = self.tables.read().await;
        Ok(tables.get(table).and_then(|t| t.get(key)).cloned())
    }

    async fn delete(&self, table: &str, key: &str) -> Result<()> {
        let mut tables = self.tables.write().await;
        if let Some(t) = tables.get_mut(table) {
            t.remove(key);
        }
        Ok(())
    }

    async fn list(&self, table: &str) -> Result<Vec<(String, Vec<u8>)>> {
        let tables = self.tables.read().await;
        Ok(tables
            .get(table)
            .map(|t| t.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default())
    }

    async fn delete_prefix(&self, table: &str, prefix: &str) -> Result<()> {
        let mut tables = self.tables.write().await;
        if let Some(t) = tables.get_mut(table) {
            t.retain(|k, _| !k.starts_with(prefix));
        }
        Ok(())
    }

    async fn integrity_check(&self) -> Result<bool> {
        Ok(true)
    }

    async fn delete_database(&self) -> Result<()> {
        self.tables.write().await.clear();
        Ok(())
    }
}
