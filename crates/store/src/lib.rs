//! `freshcart-store` — storage traits, in-memory backends, and the
//! transactional order-placement coordinator.
//!
//! The only writes this crate ever applies to shared state are all-or-nothing:
//! a multi-key conditional stock commit, or a single order append. Nothing in
//! here can leave a partial write behind.

pub mod coordinator;
pub mod item_store;
pub mod ledger;
pub mod retry;

pub use coordinator::{CheckoutConfig, TransactionCoordinator};
pub use item_store::{InMemoryItemStore, ItemStore, ItemStoreError, StockWrite, StripedItemStore};
pub use ledger::{InMemoryOrderLedger, OrderLedger, OrderLedgerError};
pub use retry::{AttemptOutcome, ConflictRetryPolicy, RetryDecision};
