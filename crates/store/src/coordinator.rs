//! Transactional order placement (read-validate-commit-retry loop).
//!
//! One `place_order` call either commits every stock decrement together with
//! the order record, or changes nothing. Concurrency control is optimistic:
//! proceed without locks, detect competing writers through the item store's
//! version check at commit time, and retry lost races with a fresh snapshot.

use std::collections::BTreeMap;

use chrono::Utc;
use tracing::{debug, warn};

use freshcart_core::{CallCtx, ItemId, OrderId};
use freshcart_orders::{CheckoutRequest, Order, OrderStatus, PlaceOrderError};

use crate::item_store::{ItemStore, ItemStoreError, StockWrite};
use crate::ledger::{OrderLedger, OrderLedgerError};
use crate::retry::{AttemptOutcome, ConflictRetryPolicy, RetryDecision};

/// Checkout configuration, passed explicitly into the coordinator — there is
/// no process-wide handle to reach around it.
#[derive(Debug, Clone, Default)]
pub struct CheckoutConfig {
    pub retry: ConflictRetryPolicy,
}

/// Orchestrates one `place_order` call against an item store and an order
/// ledger.
///
/// The coordinator holds no per-call state and no lock shared across calls:
/// any number of callers may run `place_order` concurrently. Calls touching
/// disjoint item sets proceed fully in parallel; among calls racing over an
/// overlapping item, the first commit physically accepted by the store wins
/// and the rest observe a version conflict and retry against the new state.
#[derive(Debug)]
pub struct TransactionCoordinator<S, L> {
    items: S,
    ledger: L,
    config: CheckoutConfig,
}

impl<S, L> TransactionCoordinator<S, L> {
    pub fn new(items: S, ledger: L, config: CheckoutConfig) -> Self {
        Self {
            items,
            ledger,
            config,
        }
    }

    pub fn into_parts(self) -> (S, L) {
        (self.items, self.ledger)
    }
}

/// One item's slice of the snapshot taken at the start of an attempt.
#[derive(Debug, Clone, Copy)]
struct SnapshotEntry {
    version: u64,
    stock: u32,
    price: u64,
}

impl<S, L> TransactionCoordinator<S, L>
where
    S: ItemStore,
    L: OrderLedger,
{
    /// Place a multi-line order atomically.
    ///
    /// Exactly one successful call produces exactly one order record and
    /// decrements stock for every referenced item by its requested quantity.
    /// Failed and retried attempts leave all observable state unchanged.
    ///
    /// Validation failures (`EmptyCart`, `ItemNotFound`, `ShopMismatch`,
    /// `InvalidQuantity`, `InsufficientStock`) are permanent and surface
    /// immediately. Version conflicts and transient storage errors are
    /// retried with a fresh snapshot, up to the configured attempt budget.
    pub fn place_order(
        &self,
        request: CheckoutRequest,
        ctx: &CallCtx,
    ) -> Result<OrderId, PlaceOrderError> {
        let wanted = dedupe_lines(&request)?;

        // Generated once and reused across internal retries, so an order can
        // never be appended twice by one call. Callers may pin their own id
        // for safe client-side retry.
        let order_id = request.order_id.unwrap_or_default();
        let retry_seed = order_id.as_uuid().as_u64_pair().0;

        // A pinned id that already landed means an earlier call of this same
        // logical order fully committed. Replaying must not touch stock again.
        if let Some(pinned) = request.order_id {
            match self.ledger.get(pinned, ctx) {
                Ok(Some(_)) => {
                    debug!(order_id = %pinned, "pinned order already committed; replay is a no-op");
                    return Ok(pinned);
                }
                Ok(None) => {}
                Err(err) => return Err(PlaceOrderError::StorageUnavailable(err.to_string())),
            }
        }

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            if ctx.is_expired() {
                return Err(PlaceOrderError::StorageUnavailable(
                    "deadline exceeded".to_string(),
                ));
            }

            match self.attempt_once(&request, &wanted, order_id, ctx) {
                Ok(order_id) => {
                    debug!(%order_id, attempt, "order committed");
                    return Ok(order_id);
                }
                Err(AttemptError::Permanent(err)) => return Err(err),
                Err(AttemptError::Retryable(outcome, detail)) => {
                    match self.config.retry.decide(attempt, outcome, retry_seed) {
                        RetryDecision::Retry(delay) => {
                            debug!(%order_id, attempt, ?outcome, delay_ms = delay.as_millis() as u64,
                                "attempt failed; backing off");
                            // Never sleep past the caller's deadline.
                            let delay = match ctx.remaining() {
                                Some(remaining) => delay.min(remaining),
                                None => delay,
                            };
                            std::thread::sleep(delay);
                        }
                        RetryDecision::GiveUp => {
                            warn!(%order_id, attempt, ?outcome, "retry budget exhausted");
                            return Err(match outcome {
                                AttemptOutcome::Conflict => {
                                    PlaceOrderError::Contention { attempts: attempt }
                                }
                                _ => PlaceOrderError::StorageUnavailable(detail),
                            });
                        }
                    }
                }
            }
        }
    }

    /// One read-validate-commit attempt. No effect on failure.
    fn attempt_once(
        &self,
        request: &CheckoutRequest,
        wanted: &BTreeMap<ItemId, u32>,
        order_id: OrderId,
        ctx: &CallCtx,
    ) -> Result<OrderId, AttemptError> {
        // Snapshot every referenced item: (version, stock, price) as of now.
        let mut snapshot: BTreeMap<ItemId, SnapshotEntry> = BTreeMap::new();
        for (&item_id, &quantity) in wanted {
            let item = self
                .items
                .get(item_id, ctx)
                .map_err(classify_store_error)?
                .ok_or(AttemptError::Permanent(PlaceOrderError::ItemNotFound(
                    item_id,
                )))?;

            if item.shop_id != request.shop_id {
                return Err(AttemptError::Permanent(PlaceOrderError::ShopMismatch {
                    item_id,
                    expected: request.shop_id,
                    found: item.shop_id,
                }));
            }
            if item.stock < quantity {
                // Permanent: a fresh snapshot cannot change the request.
                return Err(AttemptError::Permanent(PlaceOrderError::InsufficientStock {
                    item_id,
                    available: item.stock,
                    requested: quantity,
                }));
            }

            snapshot.insert(
                item_id,
                SnapshotEntry {
                    version: item.version,
                    stock: item.stock,
                    price: item.price,
                },
            );
        }

        // Total from the same snapshot the commit is conditioned on. Checked
        // arithmetic: a cart whose total cannot be represented is rejected,
        // not wrapped.
        let mut total_amount: u64 = 0;
        for (&item_id, &quantity) in wanted {
            total_amount = snapshot[&item_id]
                .price
                .checked_mul(u64::from(quantity))
                .and_then(|line| total_amount.checked_add(line))
                .ok_or(AttemptError::Permanent(PlaceOrderError::InvalidQuantity {
                    item_id,
                    quantity,
                }))?;
        }

        let writes: Vec<StockWrite> = wanted
            .iter()
            .map(|(&item_id, &quantity)| {
                let entry = snapshot[&item_id];
                StockWrite {
                    item_id,
                    expected_version: entry.version,
                    new_stock: entry.stock - quantity,
                }
            })
            .collect();

        self.items
            .conditional_commit(&writes, ctx)
            .map_err(classify_store_error)?;

        let order = Order {
            id: order_id,
            customer_id: request.customer_id,
            shop_id: request.shop_id,
            lines: request.lines.clone(),
            total_amount,
            delivery_eta_minutes: request.delivery_eta_minutes,
            customer_location: request.customer_location.clone(),
            created_at: Utc::now(),
            status: OrderStatus::Pending,
        };

        match self.ledger.append(order, ctx) {
            Ok(()) => Ok(order_id),
            // A pinned id can still collide here if a concurrent replay won
            // the race after our pre-flight ledger check; report success,
            // not a duplicate.
            Err(OrderLedgerError::DuplicateOrderId(id)) if request.order_id.is_some() => Ok(id),
            Err(OrderLedgerError::DuplicateOrderId(id)) => {
                Err(AttemptError::Permanent(PlaceOrderError::DuplicateOrderId(id)))
            }
            Err(err) => {
                // Stock is already decremented; retrying the whole attempt
                // would decrement it again, so surface the ambiguity.
                warn!(%order_id, %err, "ledger append failed after stock commit");
                Err(AttemptError::Permanent(PlaceOrderError::StorageUnavailable(
                    err.to_string(),
                )))
            }
        }
    }
}

/// Internal attempt verdict: retryable failures carry the outcome class the
/// retry policy decides on plus a human-readable detail for the terminal
/// error message.
#[derive(Debug)]
enum AttemptError {
    Permanent(PlaceOrderError),
    Retryable(AttemptOutcome, String),
}

fn classify_store_error(err: ItemStoreError) -> AttemptError {
    match err {
        ItemStoreError::Conflict { .. } => {
            AttemptError::Retryable(AttemptOutcome::Conflict, err.to_string())
        }
        ItemStoreError::Unavailable(msg) => {
            AttemptError::Retryable(AttemptOutcome::TransientStorage, msg)
        }
        ItemStoreError::DeadlineExceeded => AttemptError::Permanent(
            PlaceOrderError::StorageUnavailable("deadline exceeded".to_string()),
        ),
    }
}

/// Deduplicate lines by item id, summing quantities for repeated references,
/// and reject structurally invalid requests.
fn dedupe_lines(request: &CheckoutRequest) -> Result<BTreeMap<ItemId, u32>, PlaceOrderError> {
    if request.lines.is_empty() {
        return Err(PlaceOrderError::EmptyCart);
    }

    let mut wanted: BTreeMap<ItemId, u32> = BTreeMap::new();
    for line in &request.lines {
        if line.quantity == 0 {
            return Err(PlaceOrderError::InvalidQuantity {
                item_id: line.item_id,
                quantity: line.quantity,
            });
        }
        if line.shop_id != request.shop_id {
            return Err(PlaceOrderError::ShopMismatch {
                item_id: line.item_id,
                expected: request.shop_id,
                found: line.shop_id,
            });
        }
        let slot = wanted.entry(line.item_id).or_insert(0);
        *slot = slot.checked_add(line.quantity).ok_or(
            PlaceOrderError::InvalidQuantity {
                item_id: line.item_id,
                quantity: line.quantity,
            },
        )?;
    }

    Ok(wanted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use freshcart_catalog::Item;
    use freshcart_core::{ShopId, UserId};
    use freshcart_orders::OrderLine;

    use crate::item_store::InMemoryItemStore;
    use crate::ledger::InMemoryOrderLedger;

    struct Fixture {
        shop_id: ShopId,
        a: ItemId,
        b: ItemId,
        coordinator: TransactionCoordinator<InMemoryItemStore, InMemoryOrderLedger>,
    }

    /// Two items: A stock=2 price=10, B stock=3 price=15.
    fn fixture() -> Fixture {
        let shop_id = ShopId::new();
        let a = Item::new(ItemId::new(), shop_id, "A", 10, 2).unwrap();
        let b = Item::new(ItemId::new(), shop_id, "B", 15, 3).unwrap();
        let (a_id, b_id) = (a.id, b.id);
        Fixture {
            shop_id,
            a: a_id,
            b: b_id,
            coordinator: TransactionCoordinator::new(
                InMemoryItemStore::with_items([a, b]),
                InMemoryOrderLedger::new(),
                CheckoutConfig::default(),
            ),
        }
    }

    fn request(f: &Fixture, lines: Vec<OrderLine>) -> CheckoutRequest {
        CheckoutRequest::new(UserId::new(), f.shop_id, lines, 25, "40.712800, -74.006000")
    }

    fn stock_of(f: &Fixture, item_id: ItemId) -> u32 {
        f.coordinator
            .items
            .get(item_id, &CallCtx::background())
            .unwrap()
            .unwrap()
            .stock
    }

    #[test]
    fn multi_line_order_commits_snapshot_total_and_decrements() {
        let f = fixture();
        let req = request(
            &f,
            vec![
                OrderLine::new(f.a, f.shop_id, 2),
                OrderLine::new(f.b, f.shop_id, 2),
            ],
        );

        let order_id = f.coordinator.place_order(req, &CallCtx::background()).unwrap();

        let order = f
            .coordinator
            .ledger
            .get(order_id, &CallCtx::background())
            .unwrap()
            .unwrap();
        assert_eq!(order.total_amount, 2 * 10 + 2 * 15);
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.delivery_eta_minutes, 25);
        assert_eq!(stock_of(&f, f.a), 0);
        assert_eq!(stock_of(&f, f.b), 1);
    }

    #[test]
    fn insufficient_stock_changes_nothing() {
        let f = fixture();
        // Drain A first: stocks become [0, 1].
        f.coordinator
            .place_order(
                request(
                    &f,
                    vec![
                        OrderLine::new(f.a, f.shop_id, 2),
                        OrderLine::new(f.b, f.shop_id, 2),
                    ],
                ),
                &CallCtx::background(),
            )
            .unwrap();

        let err = f
            .coordinator
            .place_order(
                request(
                    &f,
                    vec![
                        OrderLine::new(f.a, f.shop_id, 1),
                        OrderLine::new(f.b, f.shop_id, 2),
                    ],
                ),
                &CallCtx::background(),
            )
            .unwrap_err();
        assert_eq!(
            err,
            PlaceOrderError::InsufficientStock {
                item_id: f.a,
                available: 0,
                requested: 1,
            }
        );

        // State exactly as before the failed call.
        assert_eq!(stock_of(&f, f.a), 0);
        assert_eq!(stock_of(&f, f.b), 1);
        assert_eq!(f.coordinator.ledger.len(), 1);
    }

    #[test]
    fn empty_cart_is_rejected() {
        let f = fixture();
        let err = f
            .coordinator
            .place_order(request(&f, vec![]), &CallCtx::background())
            .unwrap_err();
        assert_eq!(err, PlaceOrderError::EmptyCart);
    }

    #[test]
    fn zero_quantity_is_rejected() {
        let f = fixture();
        let err = f
            .coordinator
            .place_order(
                request(&f, vec![OrderLine::new(f.a, f.shop_id, 0)]),
                &CallCtx::background(),
            )
            .unwrap_err();
        assert!(matches!(err, PlaceOrderError::InvalidQuantity { .. }));
        assert_eq!(stock_of(&f, f.a), 2);
    }

    #[test]
    fn unknown_item_is_rejected() {
        let f = fixture();
        let ghost = ItemId::new();
        let err = f
            .coordinator
            .place_order(
                request(&f, vec![OrderLine::new(ghost, f.shop_id, 1)]),
                &CallCtx::background(),
            )
            .unwrap_err();
        assert_eq!(err, PlaceOrderError::ItemNotFound(ghost));
    }

    #[test]
    fn cross_shop_line_is_rejected() {
        let f = fixture();
        let other_shop = ShopId::new();
        let err = f
            .coordinator
            .place_order(
                request(&f, vec![OrderLine::new(f.a, other_shop, 1)]),
                &CallCtx::background(),
            )
            .unwrap_err();
        assert!(matches!(err, PlaceOrderError::ShopMismatch { .. }));
        assert_eq!(stock_of(&f, f.a), 2);
    }

    #[test]
    fn duplicate_lines_are_merged() {
        let f = fixture();
        let req = request(
            &f,
            vec![
                OrderLine::new(f.a, f.shop_id, 1),
                OrderLine::new(f.a, f.shop_id, 1),
            ],
        );
        f.coordinator.place_order(req, &CallCtx::background()).unwrap();
        assert_eq!(stock_of(&f, f.a), 0);
        // One order, not two.
        assert_eq!(f.coordinator.ledger.len(), 1);
    }

    #[test]
    fn merged_duplicates_exceeding_stock_are_rejected_whole() {
        let f = fixture();
        let err = f
            .coordinator
            .place_order(
                request(
                    &f,
                    vec![
                        OrderLine::new(f.a, f.shop_id, 2),
                        OrderLine::new(f.a, f.shop_id, 1),
                    ],
                ),
                &CallCtx::background(),
            )
            .unwrap_err();
        assert_eq!(
            err,
            PlaceOrderError::InsufficientStock {
                item_id: f.a,
                available: 2,
                requested: 3,
            }
        );
        assert_eq!(stock_of(&f, f.a), 2);
    }

    #[test]
    fn pinned_order_id_replay_is_a_noop_success() {
        let f = fixture();
        let pinned = OrderId::new();
        let req = request(&f, vec![OrderLine::new(f.b, f.shop_id, 1)]).with_order_id(pinned);

        let first = f
            .coordinator
            .place_order(req.clone(), &CallCtx::background())
            .unwrap();
        assert_eq!(first, pinned);
        assert_eq!(stock_of(&f, f.b), 2);

        // The replay reports success without a second order record and
        // without decrementing stock again.
        let second = f.coordinator.place_order(req, &CallCtx::background()).unwrap();
        assert_eq!(second, pinned);
        assert_eq!(f.coordinator.ledger.len(), 1);
        assert_eq!(stock_of(&f, f.b), 2);
    }

    #[test]
    fn overflowing_total_is_rejected_whole() {
        let shop_id = ShopId::new();
        let pricey = Item::new(ItemId::new(), shop_id, "Saffron", u64::MAX, 5).unwrap();
        let item_id = pricey.id;
        let coordinator = TransactionCoordinator::new(
            InMemoryItemStore::with_items([pricey]),
            InMemoryOrderLedger::new(),
            CheckoutConfig::default(),
        );

        let req = CheckoutRequest::new(
            UserId::new(),
            shop_id,
            vec![OrderLine::new(item_id, shop_id, 2)],
            25,
            "0, 0",
        );
        let err = coordinator.place_order(req, &CallCtx::background()).unwrap_err();
        assert!(matches!(err, PlaceOrderError::InvalidQuantity { quantity: 2, .. }));

        let (store, ledger) = coordinator.into_parts();
        assert_eq!(
            store.get(item_id, &CallCtx::background()).unwrap().unwrap().stock,
            5
        );
        assert!(ledger.is_empty());
    }

    #[test]
    fn expired_deadline_fails_before_any_write() {
        let f = fixture();
        let err = f
            .coordinator
            .place_order(
                request(&f, vec![OrderLine::new(f.a, f.shop_id, 1)]),
                &CallCtx::with_timeout(std::time::Duration::ZERO),
            )
            .unwrap_err();
        assert!(matches!(err, PlaceOrderError::StorageUnavailable(_)));
        assert_eq!(stock_of(&f, f.a), 2);
        assert!(f.coordinator.ledger.is_empty());
    }

    mod contention_doubles {
        //! Coordinator behavior against misbehaving stores.

        use super::*;
        use std::sync::atomic::{AtomicU32, Ordering};

        /// Fails the first `failures` conditional commits, then delegates.
        struct FlakyStore {
            inner: InMemoryItemStore,
            failures: u32,
            mode: ItemStoreError,
            seen: AtomicU32,
        }

        impl ItemStore for FlakyStore {
            fn get(
                &self,
                item_id: ItemId,
                ctx: &CallCtx,
            ) -> Result<Option<Item>, ItemStoreError> {
                self.inner.get(item_id, ctx)
            }

            fn list_for_shop(
                &self,
                shop_id: ShopId,
                ctx: &CallCtx,
            ) -> Result<Vec<Item>, ItemStoreError> {
                self.inner.list_for_shop(shop_id, ctx)
            }

            fn upsert(&self, item: Item, ctx: &CallCtx) -> Result<(), ItemStoreError> {
                self.inner.upsert(item, ctx)
            }

            fn remove(&self, item_id: ItemId, ctx: &CallCtx) -> Result<(), ItemStoreError> {
                self.inner.remove(item_id, ctx)
            }

            fn conditional_commit(
                &self,
                writes: &[StockWrite],
                ctx: &CallCtx,
            ) -> Result<(), ItemStoreError> {
                if self.seen.fetch_add(1, Ordering::SeqCst) < self.failures {
                    return Err(self.mode.clone());
                }
                self.inner.conditional_commit(writes, ctx)
            }
        }

        fn fast_retry() -> CheckoutConfig {
            CheckoutConfig {
                retry: ConflictRetryPolicy {
                    base_delay: std::time::Duration::from_millis(1),
                    ..Default::default()
                },
            }
        }

        fn flaky_fixture(failures: u32, mode: ItemStoreError) -> (ShopId, ItemId, FlakyStore) {
            let shop_id = ShopId::new();
            let item = Item::new(ItemId::new(), shop_id, "A", 10, 5).unwrap();
            let item_id = item.id;
            let store = FlakyStore {
                inner: InMemoryItemStore::with_items([item]),
                failures,
                mode,
                seen: AtomicU32::new(0),
            };
            (shop_id, item_id, store)
        }

        #[test]
        fn conflict_is_retried_with_fresh_snapshot_and_succeeds() {
            let (shop_id, item_id, store) = flaky_fixture(
                2,
                ItemStoreError::Conflict {
                    conflicting: vec![],
                },
            );
            let coordinator =
                TransactionCoordinator::new(store, InMemoryOrderLedger::new(), fast_retry());

            let req = CheckoutRequest::new(
                UserId::new(),
                shop_id,
                vec![OrderLine::new(item_id, shop_id, 1)],
                25,
                "0, 0",
            );
            coordinator.place_order(req, &CallCtx::background()).unwrap();

            let (store, ledger) = coordinator.into_parts();
            assert_eq!(
                store.inner.get(item_id, &CallCtx::background()).unwrap().unwrap().stock,
                4
            );
            assert_eq!(ledger.len(), 1);
        }

        #[test]
        fn persistent_conflict_surfaces_contention() {
            let (shop_id, item_id, store) = flaky_fixture(
                u32::MAX,
                ItemStoreError::Conflict {
                    conflicting: vec![],
                },
            );
            let coordinator =
                TransactionCoordinator::new(store, InMemoryOrderLedger::new(), fast_retry());

            let req = CheckoutRequest::new(
                UserId::new(),
                shop_id,
                vec![OrderLine::new(item_id, shop_id, 1)],
                25,
                "0, 0",
            );
            let err = coordinator.place_order(req, &CallCtx::background()).unwrap_err();
            assert_eq!(err, PlaceOrderError::Contention { attempts: 5 });

            let (store, ledger) = coordinator.into_parts();
            assert_eq!(
                store.inner.get(item_id, &CallCtx::background()).unwrap().unwrap().stock,
                5
            );
            assert!(ledger.is_empty());
        }

        #[test]
        fn transient_storage_error_is_retried_then_surfaced() {
            let (shop_id, item_id, store) =
                flaky_fixture(u32::MAX, ItemStoreError::Unavailable("backend down".into()));
            let coordinator =
                TransactionCoordinator::new(store, InMemoryOrderLedger::new(), fast_retry());

            let req = CheckoutRequest::new(
                UserId::new(),
                shop_id,
                vec![OrderLine::new(item_id, shop_id, 1)],
                25,
                "0, 0",
            );
            let err = coordinator.place_order(req, &CallCtx::background()).unwrap_err();
            assert!(matches!(err, PlaceOrderError::StorageUnavailable(_)));
        }

        #[test]
        fn transient_blip_recovers() {
            let (shop_id, item_id, store) =
                flaky_fixture(1, ItemStoreError::Unavailable("blip".into()));
            let coordinator =
                TransactionCoordinator::new(store, InMemoryOrderLedger::new(), fast_retry());

            let req = CheckoutRequest::new(
                UserId::new(),
                shop_id,
                vec![OrderLine::new(item_id, shop_id, 2)],
                25,
                "0, 0",
            );
            coordinator.place_order(req, &CallCtx::background()).unwrap();
            let (store, _) = coordinator.into_parts();
            assert_eq!(
                store.inner.get(item_id, &CallCtx::background()).unwrap().unwrap().stock,
                3
            );
        }
    }
}
