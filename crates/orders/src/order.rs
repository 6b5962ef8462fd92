use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use freshcart_core::{ItemId, OrderId, ShopId, UserId};

/// Order status lifecycle.
///
/// Transitions only move forward: `pending -> dispatched -> delivered`, with
/// `delivered` terminal. Everything else is rejected by the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Dispatched,
    Delivered,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Delivered)
    }

    /// Whether moving from `self` to `next` is a legal forward edge.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (OrderStatus::Pending, OrderStatus::Dispatched)
                | (OrderStatus::Dispatched, OrderStatus::Delivered)
        )
    }
}

impl core::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Dispatched => "dispatched",
            OrderStatus::Delivered => "delivered",
        };
        f.write_str(s)
    }
}

/// One line of a submitted order. Immutable once part of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub item_id: ItemId,
    pub shop_id: ShopId,
    pub quantity: u32,
}

impl OrderLine {
    pub fn new(item_id: ItemId, shop_id: ShopId, quantity: u32) -> Self {
        Self {
            item_id,
            shop_id,
            quantity,
        }
    }
}

/// A placed order.
///
/// Created exactly once, atomically with the stock decrements it represents.
/// `total_amount` is computed from the prices observed in the same snapshot
/// the commit was validated against and is never recomputed. After creation
/// only `status` mutates, through the ledger's status updater.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub customer_id: UserId,
    pub shop_id: ShopId,
    pub lines: Vec<OrderLine>,
    /// Total in smallest currency unit (e.g., cents).
    pub total_amount: u64,
    pub delivery_eta_minutes: u32,
    pub customer_location: String,
    pub created_at: DateTime<Utc>,
    pub status: OrderStatus,
}
