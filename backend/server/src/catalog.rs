//! # Catalog
//!
//! Ranks and keys sold in the shop, held as one in-memory list per table.
//!
//! ## Reads
//! Lists come back sorted by `display_order`. Equal orders keep the order the
//! backend sent them in.
//!
//! ## Writes
//! Confirm-then-apply: the backend write goes first and the local list only
//! changes once it succeeds. A failed write leaves the list as it was.
//!
//! New entries take `display_order = count + 1`. Two admins adding at the same
//! time can end up with equal orders.
use std::sync::Arc;

use remote::{
    Backend, Record, Tables,
    models::{Key, KeyDraft, Rank, RankDraft},
};
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

pub trait CatalogItem: Record {
    type Draft: Serialize + Send + Sync + 'static;

    fn entry_id(&self) -> Uuid;

    fn display_order(&self) -> i32;

    fn name(&self) -> &str;

    fn template(display_order: i32) -> Self::Draft;

    fn validate(&self) -> AppResult<()>;
}

impl CatalogItem for Rank {
    type Draft = RankDraft;

    fn entry_id(&self) -> Uuid {
        self.id
    }

    fn display_order(&self) -> i32 {
        self.display_order
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn template(display_order: i32) -> RankDraft {
        RankDraft::template(display_order)
    }

    fn validate(&self) -> AppResult<()> {
        require_name(&self.name)?;
        if self.price.is_sign_negative() {
            return Err(AppError::Validation("Rank price cannot be negative".to_string()));
        }

        Ok(())
    }
}

impl CatalogItem for Key {
    type Draft = KeyDraft;

    fn entry_id(&self) -> Uuid {
        self.id
    }

    fn display_order(&self) -> i32 {
        self.display_order
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn template(display_order: i32) -> KeyDraft {
        KeyDraft::template(display_order)
    }

    fn validate(&self) -> AppResult<()> {
        require_name(&self.name)?;
        if self.price <= Decimal::ZERO {
            return Err(AppError::Validation("Key price must be above zero".to_string()));
        }

        Ok(())
    }
}

fn require_name(name: &str) -> AppResult<()> {
    if name.trim().is_empty() {
        return Err(AppError::Validation("Name is required".to_string()));
    }

    Ok(())
}

pub struct CatalogStore<T> {
    backend: Arc<dyn Backend>,
    items: RwLock<Vec<T>>,
}

impl<T: CatalogItem> CatalogStore<T> {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            items: RwLock::new(Vec::new()),
        }
    }

    pub async fn list(&self) -> Vec<T> {
        let mut items = self.items.read().await.clone();
        items.sort_by_key(|item| item.display_order());

        items
    }

    /// Refetches the table. On failure the current list stays, which is empty
    /// until the first fetch succeeds.
    pub async fn refresh(&self) -> Vec<T> {
        let fetched: Result<Vec<T>, _> = self.backend.fetch_all(None).await;

        match fetched {
            Ok(items) => *self.items.write().await = items,
            Err(e) => warn!("Fetching {} failed: {e}", T::TABLE.as_str()),
        }

        self.list().await
    }

    /// Adds a templated entry at the end of the list.
    pub async fn create(&self, token: Option<&str>) -> AppResult<T> {
        let count = self.items.read().await.len();
        let order = i32::try_from(count + 1).unwrap_or(i32::MAX);

        let created: T = self.backend.create(&T::template(order), token).await?;

        info!("Created {} {}", T::TABLE.as_str(), created.name());
        self.items.write().await.push(created.clone());

        Ok(created)
    }

    pub async fn update(&self, item: T, token: Option<&str>) -> AppResult<T> {
        item.validate()?;

        let saved: T = self.backend.save(&item, token).await?;

        let mut items = self.items.write().await;
        match items.iter_mut().find(|existing| existing.entry_id() == saved.entry_id()) {
            Some(existing) => *existing = saved.clone(),
            None => items.push(saved.clone()),
        }

        info!("Updated {} {}", T::TABLE.as_str(), saved.name());
        Ok(saved)
    }

    pub async fn delete(&self, id: Uuid, token: Option<&str>) -> AppResult<()> {
        self.backend.delete(T::TABLE, id, token).await?;

        self.items.write().await.retain(|item| item.entry_id() != id);

        info!("Deleted {} {id}", T::TABLE.as_str());
        Ok(())
    }

    pub async fn get(&self, id: Uuid) -> Option<T> {
        self.items
            .read()
            .await
            .iter()
            .find(|item| item.entry_id() == id)
            .cloned()
    }
}
