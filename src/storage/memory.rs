//! In-memory entity store.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::interfaces::entity_store::Result;
use crate::interfaces::{EntityStore, StoreError};
use crate::model::MarkerRow;

/// Rows keyed by `(entity_id, sort_key)`, with failure toggles for tests.
#[derive(Default)]
pub struct MemoryEntityStore {
    rows: RwLock<BTreeMap<(String, String), MarkerRow>>,
    fail_on_put: RwLock<bool>,
    fail_on_delete: RwLock<bool>,
    fail_on_scan: RwLock<bool>,
}

impl MemoryEntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with rows.
    pub fn with_rows(rows: impl IntoIterator<Item = MarkerRow>) -> Self {
        let rows = rows
            .into_iter()
            .map(|row| ((row.entity_id.clone(), row.location.sort_key.clone()), row))
            .collect();
        Self {
            rows: RwLock::new(rows),
            ..Default::default()
        }
    }

    pub async fn set_fail_on_put(&self, fail: bool) {
        *self.fail_on_put.write().await = fail;
    }

    pub async fn set_fail_on_delete(&self, fail: bool) {
        *self.fail_on_delete.write().await = fail;
    }

    pub async fn set_fail_on_scan(&self, fail: bool) {
        *self.fail_on_scan.write().await = fail;
    }

    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }

    pub async fn get(&self, entity_id: &str, sort_key: &str) -> Option<MarkerRow> {
        self.rows
            .read()
            .await
            .get(&(entity_id.to_string(), sort_key.to_string()))
            .cloned()
    }
}

#[async_trait]
impl EntityStore for MemoryEntityStore {
    async fn put(&self, row: &MarkerRow) -> Result<()> {
        if *self.fail_on_put.read().await {
            return Err(StoreError::Database("put rejected".to_string()));
        }
        self.rows.write().await.insert(
            (row.entity_id.clone(), row.location.sort_key.clone()),
            row.clone(),
        );
        Ok(())
    }

    async fn delete(&self, entity_id: &str, sort_key: &str) -> Result<()> {
        if *self.fail_on_delete.read().await {
            return Err(StoreError::Database("delete rejected".to_string()));
        }
        self.rows
            .write()
            .await
            .remove(&(entity_id.to_string(), sort_key.to_string()));
        Ok(())
    }

    async fn scan(&self) -> Result<Vec<MarkerRow>> {
        if *self.fail_on_scan.read().await {
            return Err(StoreError::Database("scan rejected".to_string()));
        }
        Ok(self.rows.read().await.values().cloned().collect())
    }

    async fn latest(&self, entity_id: &str) -> Result<Option<MarkerRow>> {
        Ok(self
            .rows
            .read()
            .await
            .values()
            .filter(|row| row.entity_id == entity_id)
            .max_by_key(|row| row.location.occurred_at)
            .cloned())
    }
}
