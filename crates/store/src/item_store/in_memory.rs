use std::collections::HashMap;
use std::sync::RwLock;

use freshcart_catalog::Item;
use freshcart_core::{CallCtx, ItemId, ShopId};

use super::r#trait::{ItemStore, ItemStoreError, StockWrite};

/// In-memory versioned item store.
///
/// A single `RwLock` over the whole map gives the multi-key commit its
/// atomicity for free: the write lock *is* the transaction. Intended for
/// tests/dev. Not optimized for performance.
#[derive(Debug, Default)]
pub struct InMemoryItemStore {
    items: RwLock<HashMap<ItemId, Item>>,
}

impl InMemoryItemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with catalog items (each lands at version 1).
    pub fn with_items(items: impl IntoIterator<Item = Item>) -> Self {
        let store = Self::new();
        let ctx = CallCtx::background();
        for item in items {
            // Seeding cannot fail: the lock is fresh and the ctx has no deadline.
            let _ = store.upsert(item, &ctx);
        }
        store
    }

    fn check_ctx(ctx: &CallCtx) -> Result<(), ItemStoreError> {
        if ctx.is_expired() {
            return Err(ItemStoreError::DeadlineExceeded);
        }
        Ok(())
    }
}

impl ItemStore for InMemoryItemStore {
    fn get(&self, item_id: ItemId, ctx: &CallCtx) -> Result<Option<Item>, ItemStoreError> {
        Self::check_ctx(ctx)?;
        let items = self
            .items
            .read()
            .map_err(|_| ItemStoreError::Unavailable("lock poisoned".to_string()))?;
        Ok(items.get(&item_id).cloned())
    }

    fn list_for_shop(&self, shop_id: ShopId, ctx: &CallCtx) -> Result<Vec<Item>, ItemStoreError> {
        Self::check_ctx(ctx)?;
        let items = self
            .items
            .read()
            .map_err(|_| ItemStoreError::Unavailable("lock poisoned".to_string()))?;
        let mut result: Vec<Item> = items
            .values()
            .filter(|item| item.shop_id == shop_id)
            .cloned()
            .collect();
        result.sort_by_key(|item| item.id);
        Ok(result)
    }

    fn upsert(&self, mut item: Item, ctx: &CallCtx) -> Result<(), ItemStoreError> {
        Self::check_ctx(ctx)?;
        let mut items = self
            .items
            .write()
            .map_err(|_| ItemStoreError::Unavailable("lock poisoned".to_string()))?;
        item.version = items.get(&item.id).map(|cur| cur.version).unwrap_or(0) + 1;
        items.insert(item.id, item);
        Ok(())
    }

    fn remove(&self, item_id: ItemId, ctx: &CallCtx) -> Result<(), ItemStoreError> {
        Self::check_ctx(ctx)?;
        let mut items = self
            .items
            .write()
            .map_err(|_| ItemStoreError::Unavailable("lock poisoned".to_string()))?;
        items.remove(&item_id);
        Ok(())
    }

    fn conditional_commit(
        &self,
        writes: &[StockWrite],
        ctx: &CallCtx,
    ) -> Result<(), ItemStoreError> {
        Self::check_ctx(ctx)?;
        if writes.is_empty() {
            return Ok(());
        }

        let mut items = self
            .items
            .write()
            .map_err(|_| ItemStoreError::Unavailable("lock poisoned".to_string()))?;

        // First pass: verify every expected version. A missing key counts as
        // a conflict (it was concurrently removed since the snapshot).
        let conflicting: Vec<ItemId> = writes
            .iter()
            .filter(|w| {
                items
                    .get(&w.item_id)
                    .map(|item| item.version != w.expected_version)
                    .unwrap_or(true)
            })
            .map(|w| w.item_id)
            .collect();

        if !conflicting.is_empty() {
            return Err(ItemStoreError::Conflict { conflicting });
        }

        // Second pass: apply. Still under the write lock, so the whole set
        // becomes visible at once.
        for w in writes {
            let item = items
                .get_mut(&w.item_id)
                .ok_or_else(|| ItemStoreError::Unavailable("item vanished mid-commit".to_string()))?;
            item.stock = w.new_stock;
            item.version += 1;
        }

        Ok(())
    }
}
