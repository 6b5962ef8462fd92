//! `freshcart-core` — domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod ctx;
pub mod error;
pub mod id;

pub use ctx::CallCtx;
pub use error::{DomainError, DomainResult};
pub use id::{ItemId, OrderId, ShopId, UserId};
