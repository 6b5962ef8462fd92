//! Append-only order ledger with a narrow status-transition updater.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use thiserror::Error;

use freshcart_core::{CallCtx, OrderId, ShopId, UserId};
use freshcart_orders::{Order, OrderStatus};

/// Order ledger operation error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OrderLedgerError {
    /// The order id was already appended. This is the idempotency guard:
    /// a client retrying a pre-generated id after an ambiguous failure gets
    /// this instead of a second order record.
    #[error("order {0} already exists")]
    DuplicateOrderId(OrderId),

    #[error("illegal status transition {from} -> {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("order {0} not found")]
    NotFound(OrderId),

    #[error("order ledger unavailable: {0}")]
    Unavailable(String),

    #[error("deadline exceeded")]
    DeadlineExceeded,
}

/// Append-only store of order records.
///
/// Orders are immutable once appended except for the `status` field, which
/// moves only forward (`pending -> dispatched -> delivered`) and never
/// touches stock. Status updates are safe to run concurrently with
/// unrelated order placement.
pub trait OrderLedger: Send + Sync {
    /// Insert an immutable order record. Fails if the id already exists.
    fn append(&self, order: Order, ctx: &CallCtx) -> Result<(), OrderLedgerError>;

    /// Advance an order's status along the legal forward edges.
    fn update_status(
        &self,
        order_id: OrderId,
        new_status: OrderStatus,
        ctx: &CallCtx,
    ) -> Result<(), OrderLedgerError>;

    fn get(&self, order_id: OrderId, ctx: &CallCtx) -> Result<Option<Order>, OrderLedgerError>;

    /// All orders placed against one shop (owner dashboard read path).
    fn orders_for_shop(&self, shop_id: ShopId, ctx: &CallCtx)
        -> Result<Vec<Order>, OrderLedgerError>;

    /// All orders placed by one customer.
    fn orders_for_customer(
        &self,
        customer_id: UserId,
        ctx: &CallCtx,
    ) -> Result<Vec<Order>, OrderLedgerError>;
}

impl<L> OrderLedger for Arc<L>
where
    L: OrderLedger + ?Sized,
{
    fn append(&self, order: Order, ctx: &CallCtx) -> Result<(), OrderLedgerError> {
        (**self).append(order, ctx)
    }

    fn update_status(
        &self,
        order_id: OrderId,
        new_status: OrderStatus,
        ctx: &CallCtx,
    ) -> Result<(), OrderLedgerError> {
        (**self).update_status(order_id, new_status, ctx)
    }

    fn get(&self, order_id: OrderId, ctx: &CallCtx) -> Result<Option<Order>, OrderLedgerError> {
        (**self).get(order_id, ctx)
    }

    fn orders_for_shop(
        &self,
        shop_id: ShopId,
        ctx: &CallCtx,
    ) -> Result<Vec<Order>, OrderLedgerError> {
        (**self).orders_for_shop(shop_id, ctx)
    }

    fn orders_for_customer(
        &self,
        customer_id: UserId,
        ctx: &CallCtx,
    ) -> Result<Vec<Order>, OrderLedgerError> {
        (**self).orders_for_customer(customer_id, ctx)
    }
}

/// In-memory order ledger. Intended for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryOrderLedger {
    orders: RwLock<HashMap<OrderId, Order>>,
}

impl InMemoryOrderLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.orders.read().map(|o| o.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_ctx(ctx: &CallCtx) -> Result<(), OrderLedgerError> {
        if ctx.is_expired() {
            return Err(OrderLedgerError::DeadlineExceeded);
        }
        Ok(())
    }

    fn poisoned() -> OrderLedgerError {
        OrderLedgerError::Unavailable("lock poisoned".to_string())
    }
}

impl OrderLedger for InMemoryOrderLedger {
    fn append(&self, order: Order, ctx: &CallCtx) -> Result<(), OrderLedgerError> {
        Self::check_ctx(ctx)?;
        let mut orders = self.orders.write().map_err(|_| Self::poisoned())?;
        if orders.contains_key(&order.id) {
            return Err(OrderLedgerError::DuplicateOrderId(order.id));
        }
        orders.insert(order.id, order);
        Ok(())
    }

    fn update_status(
        &self,
        order_id: OrderId,
        new_status: OrderStatus,
        ctx: &CallCtx,
    ) -> Result<(), OrderLedgerError> {
        Self::check_ctx(ctx)?;
        let mut orders = self.orders.write().map_err(|_| Self::poisoned())?;
        let order = orders
            .get_mut(&order_id)
            .ok_or(OrderLedgerError::NotFound(order_id))?;

        if !order.status.can_transition_to(new_status) {
            return Err(OrderLedgerError::InvalidTransition {
                from: order.status,
                to: new_status,
            });
        }

        order.status = new_status;
        Ok(())
    }

    fn get(&self, order_id: OrderId, ctx: &CallCtx) -> Result<Option<Order>, OrderLedgerError> {
        Self::check_ctx(ctx)?;
        let orders = self.orders.read().map_err(|_| Self::poisoned())?;
        Ok(orders.get(&order_id).cloned())
    }

    fn orders_for_shop(
        &self,
        shop_id: ShopId,
        ctx: &CallCtx,
    ) -> Result<Vec<Order>, OrderLedgerError> {
        Self::check_ctx(ctx)?;
        let orders = self.orders.read().map_err(|_| Self::poisoned())?;
        let mut result: Vec<Order> = orders
            .values()
            .filter(|o| o.shop_id == shop_id)
            .cloned()
            .collect();
        result.sort_by_key(|o| o.created_at);
        Ok(result)
    }

    fn orders_for_customer(
        &self,
        customer_id: UserId,
        ctx: &CallCtx,
    ) -> Result<Vec<Order>, OrderLedgerError> {
        Self::check_ctx(ctx)?;
        let orders = self.orders.read().map_err(|_| Self::poisoned())?;
        let mut result: Vec<Order> = orders
            .values()
            .filter(|o| o.customer_id == customer_id)
            .cloned()
            .collect();
        result.sort_by_key(|o| o.created_at);
        Ok(result)
    }
}
