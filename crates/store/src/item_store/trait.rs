use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use freshcart_catalog::Item;
use freshcart_core::{CallCtx, ItemId, ShopId};

/// One entry of a conditional multi-key stock commit.
///
/// `expected_version` is the version observed in the snapshot the caller
/// validated against; the store applies the write only if the item is still
/// at exactly that version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockWrite {
    pub item_id: ItemId,
    pub expected_version: u64,
    pub new_stock: u32,
}

/// Item store operation error.
///
/// `Conflict` is the optimistic-concurrency outcome: at least one key's
/// current version differed from the expected one and **no** write was
/// applied. The other variants are infrastructure conditions.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ItemStoreError {
    /// Version check failed for the listed keys; nothing was written.
    #[error("stock commit conflict on {} item(s)", conflicting.len())]
    Conflict { conflicting: Vec<ItemId> },

    #[error("item store unavailable: {0}")]
    Unavailable(String),

    /// The caller's deadline expired before the operation ran.
    #[error("deadline exceeded")]
    DeadlineExceeded,
}

/// Versioned item storage with an atomic multi-key conditional write.
///
/// ## Commit semantics
///
/// `conditional_commit` applies **all** writes or none. It succeeds only if
/// every key's current version equals the expected version supplied; on
/// success every included item's version increments by exactly 1 and its
/// stock is set to `new_stock`. On any mismatch the error names the stale
/// key(s) and no state changes.
///
/// ## Implementation requirements
///
/// - Backends with native multi-key transactions map `conditional_commit`
///   onto one transaction.
/// - Backends without them build the equivalent by acquiring per-item
///   exclusive sections in a fixed global order (sorted by item id) to avoid
///   deadlock, applying all writes, then releasing in reverse order.
/// - Every operation honors the caller's `CallCtx` deadline; an expired
///   context fails fast with `DeadlineExceeded` and leaves no partial write.
/// - Reads never block on other callers' writes longer than the backing
///   storage's latency.
pub trait ItemStore: Send + Sync {
    /// Current value and version of one item. `Ok(None)` if unknown.
    fn get(&self, item_id: ItemId, ctx: &CallCtx) -> Result<Option<Item>, ItemStoreError>;

    /// All items of one shop (catalog read path).
    fn list_for_shop(&self, shop_id: ShopId, ctx: &CallCtx) -> Result<Vec<Item>, ItemStoreError>;

    /// Insert or replace an item (catalog management). Bumps the stored
    /// version by 1 regardless of the version carried by `item`.
    fn upsert(&self, item: Item, ctx: &CallCtx) -> Result<(), ItemStoreError>;

    /// Remove an item (catalog management). Unknown ids are a no-op.
    fn remove(&self, item_id: ItemId, ctx: &CallCtx) -> Result<(), ItemStoreError>;

    /// Atomically apply every write, or none.
    fn conditional_commit(
        &self,
        writes: &[StockWrite],
        ctx: &CallCtx,
    ) -> Result<(), ItemStoreError>;
}

impl<S> ItemStore for Arc<S>
where
    S: ItemStore + ?Sized,
{
    fn get(&self, item_id: ItemId, ctx: &CallCtx) -> Result<Option<Item>, ItemStoreError> {
        (**self).get(item_id, ctx)
    }

    fn list_for_shop(&self, shop_id: ShopId, ctx: &CallCtx) -> Result<Vec<Item>, ItemStoreError> {
        (**self).list_for_shop(shop_id, ctx)
    }

    fn upsert(&self, item: Item, ctx: &CallCtx) -> Result<(), ItemStoreError> {
        (**self).upsert(item, ctx)
    }

    fn remove(&self, item_id: ItemId, ctx: &CallCtx) -> Result<(), ItemStoreError> {
        (**self).remove(item_id, ctx)
    }

    fn conditional_commit(
        &self,
        writes: &[StockWrite],
        ctx: &CallCtx,
    ) -> Result<(), ItemStoreError> {
        (**self).conditional_commit(writes, ctx)
    }
}
