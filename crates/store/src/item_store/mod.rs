//! Versioned key-value view over catalog items.

mod in_memory;
mod striped;
mod r#trait;

pub use in_memory::InMemoryItemStore;
pub use striped::StripedItemStore;
pub use r#trait::{ItemStore, ItemStoreError, StockWrite};
