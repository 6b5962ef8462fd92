use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, RwLock};

use freshcart_catalog::Item;
use freshcart_core::{CallCtx, ItemId, ShopId};

use super::r#trait::{ItemStore, ItemStoreError, StockWrite};

/// Item store for backends without native multi-key transactions.
///
/// Each item sits behind its own exclusive section. A multi-key commit
/// acquires the sections of its write set in a fixed global order (sorted by
/// item id) so two overlapping commits can never deadlock, verifies every
/// expected version, applies all writes, then releases in reverse order.
///
/// The outer map lock is held shared for the duration of a commit so a
/// concurrent `remove` cannot detach an item that is about to be written.
#[derive(Debug, Default)]
pub struct StripedItemStore {
    slots: RwLock<BTreeMap<ItemId, Arc<Mutex<Item>>>>,
}

impl StripedItemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with catalog items (each lands at version 1).
    pub fn with_items(items: impl IntoIterator<Item = Item>) -> Self {
        let store = Self::new();
        let ctx = CallCtx::background();
        for item in items {
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

    fn poisoned() -> ItemStoreError {
        ItemStoreError::Unavailable("lock poisoned".to_string())
    }
}

impl ItemStore for StripedItemStore {
    fn get(&self, item_id: ItemId, ctx: &CallCtx) -> Result<Option<Item>, ItemStoreError> {
        Self::check_ctx(ctx)?;
        let slots = self.slots.read().map_err(|_| Self::poisoned())?;
        match slots.get(&item_id) {
            Some(slot) => {
                let item = slot.lock().map_err(|_| Self::poisoned())?;
                Ok(Some(item.clone()))
            }
            None => Ok(None),
        }
    }

    fn list_for_shop(&self, shop_id: ShopId, ctx: &CallCtx) -> Result<Vec<Item>, ItemStoreError> {
        Self::check_ctx(ctx)?;
        let slots = self.slots.read().map_err(|_| Self::poisoned())?;
        let mut result = Vec::new();
        // BTreeMap iteration is id-ordered already.
        for slot in slots.values() {
            let item = slot.lock().map_err(|_| Self::poisoned())?;
            if item.shop_id == shop_id {
                result.push(item.clone());
            }
        }
        Ok(result)
    }

    fn upsert(&self, mut item: Item, ctx: &CallCtx) -> Result<(), ItemStoreError> {
        Self::check_ctx(ctx)?;
        let mut slots = self.slots.write().map_err(|_| Self::poisoned())?;
        match slots.get(&item.id) {
            Some(slot) => {
                let mut current = slot.lock().map_err(|_| Self::poisoned())?;
                item.version = current.version + 1;
                *current = item;
            }
            None => {
                item.version = 1;
                slots.insert(item.id, Arc::new(Mutex::new(item)));
            }
        }
        Ok(())
    }

    fn remove(&self, item_id: ItemId, ctx: &CallCtx) -> Result<(), ItemStoreError> {
        Self::check_ctx(ctx)?;
        let mut slots = self.slots.write().map_err(|_| Self::poisoned())?;
        slots.remove(&item_id);
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

        // Fixed global acquisition order: sort the write set by item id.
        let mut ordered: Vec<&StockWrite> = writes.iter().collect();
        ordered.sort_by_key(|w| w.item_id);
        if ordered.windows(2).any(|w| w[0].item_id == w[1].item_id) {
            return Err(ItemStoreError::Unavailable(
                "duplicate item_id in write set".to_string(),
            ));
        }

        // Shared outer lock for the whole commit: keeps removal out while
        // the per-item sections are held.
        let slots = self.slots.read().map_err(|_| Self::poisoned())?;

        let mut handles: Vec<(StockWrite, Arc<Mutex<Item>>)> = Vec::with_capacity(ordered.len());
        let mut missing = Vec::new();
        for w in &ordered {
            match slots.get(&w.item_id) {
                Some(slot) => handles.push((**w, Arc::clone(slot))),
                None => missing.push(w.item_id),
            }
        }
        if !missing.is_empty() {
            return Err(ItemStoreError::Conflict { conflicting: missing });
        }

        // Acquire in ascending id order.
        let mut guards = Vec::with_capacity(handles.len());
        for (w, slot) in &handles {
            let guard = slot.lock().map_err(|_| Self::poisoned())?;
            guards.push((*w, guard));
        }

        // Verify every expected version before touching anything.
        let conflicting: Vec<ItemId> = guards
            .iter()
            .filter(|(w, item)| item.version != w.expected_version)
            .map(|(w, _)| w.item_id)
            .collect();

        if conflicting.is_empty() {
            for (w, item) in &mut guards {
                item.stock = w.new_stock;
                item.version += 1;
            }
        }

        // Release in reverse acquisition order.
        while let Some(guard) = guards.pop() {
            drop(guard);
        }

        if conflicting.is_empty() {
            Ok(())
        } else {
            Err(ItemStoreError::Conflict { conflicting })
        }
    }
}
