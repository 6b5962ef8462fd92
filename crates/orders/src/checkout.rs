//! Checkout request and error surface for order placement.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use freshcart_core::{ItemId, OrderId, ShopId, UserId};

use crate::order::OrderLine;

/// One `place_order` call, as submitted by a buyer.
///
/// `order_id` is optional: callers that want safe retry after an ambiguous
/// failure pre-generate the id and resubmit it. A replay of an id that
/// already committed reports success without creating a second order record
/// or decrementing stock again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutRequest {
    pub order_id: Option<OrderId>,
    pub customer_id: UserId,
    pub shop_id: ShopId,
    pub lines: Vec<OrderLine>,
    /// Already computed by the geolocation collaborator; never recomputed here.
    pub delivery_eta_minutes: u32,
    pub customer_location: String,
}

impl CheckoutRequest {
    pub fn new(
        customer_id: UserId,
        shop_id: ShopId,
        lines: Vec<OrderLine>,
        delivery_eta_minutes: u32,
        customer_location: impl Into<String>,
    ) -> Self {
        Self {
            order_id: None,
            customer_id,
            shop_id,
            lines,
            delivery_eta_minutes,
            customer_location: customer_location.into(),
        }
    }

    /// Pin the order id (idempotent client-side retry).
    pub fn with_order_id(mut self, order_id: OrderId) -> Self {
        self.order_id = Some(order_id);
        self
    }
}

/// Why a `place_order` call failed.
///
/// Validation variants are permanent: the request cannot succeed as given
/// and is never retried internally. `Contention` and `StorageUnavailable`
/// are "try again" conditions surfaced only after the internal retry budget
/// is spent.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlaceOrderError {
    #[error("cart is empty")]
    EmptyCart,

    #[error("item {0} not found")]
    ItemNotFound(ItemId),

    #[error("item {item_id} belongs to shop {found}, order is against shop {expected}")]
    ShopMismatch {
        item_id: ItemId,
        expected: ShopId,
        found: ShopId,
    },

    #[error("invalid quantity {quantity} for item {item_id}")]
    InvalidQuantity { item_id: ItemId, quantity: u32 },

    #[error("insufficient stock for item {item_id}: available {available}, requested {requested}")]
    InsufficientStock {
        item_id: ItemId,
        available: u32,
        requested: u32,
    },

    /// The commit lost every race within the retry budget.
    #[error("order commit lost {attempts} conflict race(s); try again")]
    Contention { attempts: u32 },

    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("order {0} already exists")]
    DuplicateOrderId(OrderId),
}

impl PlaceOrderError {
    /// Whether this failure is a permanent verdict on the request itself.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            PlaceOrderError::EmptyCart
                | PlaceOrderError::ItemNotFound(_)
                | PlaceOrderError::ShopMismatch { .. }
                | PlaceOrderError::InvalidQuantity { .. }
                | PlaceOrderError::InsufficientStock { .. }
        )
    }
}
