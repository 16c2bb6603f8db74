use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use super::aggregate::{plan_cancellation, plan_order, Order, VendorOrderFragment};
use super::commands::{PlaceOrder, TransitionFragment, TransitionOrder};
use super::errors::OrderError;
use super::events::{OrderDeleted, OrderSnapshot, OrderTransitioned};
use super::value_objects::OrderStatus;
use crate::metrics::Metrics;
use crate::store::Storage;

// ============================================================================
// Order Lifecycle Manager
// ============================================================================
//
// Orchestrates: Command → Aggregate → Snapshot(s) → StoreTransaction
//
// Every write path runs inside one transaction; an early return drops the
// transaction and with it every staged write.
//
// ============================================================================

pub struct OrderLifecycleManager {
    store: Arc<dyn Storage>,
    metrics: Arc<Metrics>,
}

impl OrderLifecycleManager {
    pub fn new(store: Arc<dyn Storage>, metrics: Arc<Metrics>) -> Self {
        Self { store, metrics }
    }

    /// Persist a new order and one vendor order per distinct vendor.
    pub async fn place_order(&self, command: PlaceOrder) -> Result<OrderSnapshot, OrderError> {
        self.place_order_inner(command)
            .await
            .inspect_err(|e| self.record_failure("place_order", e))
    }

    async fn place_order_inner(&self, command: PlaceOrder) -> Result<OrderSnapshot, OrderError> {
        let (order, fragments) = plan_order(&command.buyer_id, &command.items, Utc::now())?;

        let mut tx = self.store.begin().await?;
        tx.insert_order(&order).await?;
        for fragment in &fragments {
            tx.insert_fragment(fragment).await?;
        }
        tx.commit().await?;

        self.metrics.record_order_created(fragments.len());
        tracing::info!(
            order_id = %order.id,
            buyer_id = %order.buyer_id,
            item_count = command.items.len(),
            vendor_count = fragments.len(),
            "Order placed"
        );

        Ok(OrderSnapshot { order, fragments })
    }

    /// Move an order to `target`, cascading cancellation to its vendor orders.
    pub async fn transition_order(
        &self,
        command: TransitionOrder,
    ) -> Result<OrderTransitioned, OrderError> {
        self.transition_order_inner(command)
            .await
            .inspect_err(|e| self.record_failure("transition_order", e))
    }

    async fn transition_order_inner(
        &self,
        command: TransitionOrder,
    ) -> Result<OrderTransitioned, OrderError> {
        let now = Utc::now();
        let mut tx = self.store.begin().await?;

        let current = tx
            .lock_order(command.order_id)
            .await?
            .ok_or(OrderError::OrderNotFound(command.order_id))?;
        let next = current.transition(command.target, now)?;
        tx.update_order(&next).await?;

        let mut fragments = tx.fragments_for_order(next.id).await?;
        let mut exceptions = Vec::new();

        if next.status == OrderStatus::Cancelled {
            let (cancelled, skipped) = plan_cancellation(&fragments, now);
            for fragment in &cancelled {
                tx.update_fragment(fragment).await?;
            }
            replace_fragments(&mut fragments, cancelled);
            exceptions = skipped;
        }

        tx.commit().await?;

        self.metrics
            .record_order_transition(current.status.as_str(), next.status.as_str());
        for exception in &exceptions {
            tracing::warn!(
                order_id = %next.id,
                fragment_id = %exception.fragment_id,
                vendor_id = %exception.vendor_id,
                status = %exception.status,
                "Cancellation did not reach vendor order"
            );
        }
        tracing::info!(
            order_id = %next.id,
            from = %current.status,
            to = %next.status,
            "Order status changed"
        );

        Ok(OrderTransitioned {
            order: next,
            fragments,
            exceptions,
        })
    }

    /// Vendor-driven move of a single vendor order.
    pub async fn transition_fragment(
        &self,
        command: TransitionFragment,
    ) -> Result<VendorOrderFragment, OrderError> {
        self.transition_fragment_inner(command)
            .await
            .inspect_err(|e| self.record_failure("transition_fragment", e))
    }

    async fn transition_fragment_inner(
        &self,
        command: TransitionFragment,
    ) -> Result<VendorOrderFragment, OrderError> {
        let not_found = || OrderError::FragmentNotFound {
            vendor_id: command.vendor_id.clone(),
            fragment_id: command.fragment_id,
        };

        // Locks are taken parent first, the same order transition_order uses.
        let order_id = self
            .store
            .get_fragment(command.fragment_id)
            .await?
            .filter(|f| f.vendor_id == command.vendor_id)
            .ok_or_else(not_found)?
            .order_id;

        let mut tx = self.store.begin().await?;
        let parent = tx
            .lock_order(order_id)
            .await?
            .ok_or(OrderError::OrderNotFound(order_id))?;
        let current = tx
            .lock_fragment(command.fragment_id)
            .await?
            .filter(|f| f.vendor_id == command.vendor_id && f.order_id == parent.id)
            .ok_or_else(not_found)?;

        let next = current.transition(
            command.target,
            parent.status,
            command.tracking_number.clone(),
            Utc::now(),
        )?;
        tx.update_fragment(&next).await?;
        tx.commit().await?;

        self.metrics
            .record_fragment_transition(current.status.as_str(), next.status.as_str());
        tracing::info!(
            order_id = %parent.id,
            fragment_id = %next.id,
            vendor_id = %next.vendor_id,
            from = %current.status,
            to = %next.status,
            "Vendor order status changed"
        );

        Ok(next)
    }

    /// Delete an order; its vendor orders go with it.
    pub async fn delete_order(&self, order_id: Uuid) -> Result<OrderDeleted, OrderError> {
        self.delete_order_inner(order_id)
            .await
            .inspect_err(|e| self.record_failure("delete_order", e))
    }

    async fn delete_order_inner(&self, order_id: Uuid) -> Result<OrderDeleted, OrderError> {
        let mut tx = self.store.begin().await?;
        tx.lock_order(order_id)
            .await?
            .ok_or(OrderError::OrderNotFound(order_id))?;
        let fragments_removed = tx.delete_order(order_id).await?;
        tx.commit().await?;

        tracing::info!(order_id = %order_id, fragments_removed, "Order deleted");

        Ok(OrderDeleted {
            order_id,
            fragments_removed,
        })
    }

    pub async fn get_order(&self, order_id: Uuid) -> Result<OrderSnapshot, OrderError> {
        let order = self
            .store
            .get_order(order_id)
            .await?
            .ok_or(OrderError::OrderNotFound(order_id))?;
        let fragments = self.store.list_fragments_by_order(order_id).await?;
        Ok(OrderSnapshot { order, fragments })
    }

    pub async fn list_orders(&self) -> Result<Vec<Order>, OrderError> {
        Ok(self.store.list_orders().await?)
    }

    /// Orders of one buyer, newest first. Unknown buyers get an empty list.
    pub async fn list_orders_by_buyer(&self, buyer_id: &str) -> Result<Vec<Order>, OrderError> {
        let orders = self.store.list_orders_by_buyer(buyer_id).await?;
        tracing::debug!(buyer_id = %buyer_id, count = orders.len(), "Listed buyer orders");
        Ok(orders)
    }

    pub async fn list_fragments_by_vendor(
        &self,
        vendor_id: &str,
    ) -> Result<Vec<VendorOrderFragment>, OrderError> {
        let fragments = self.store.list_fragments_by_vendor(vendor_id).await?;
        tracing::debug!(vendor_id = %vendor_id, count = fragments.len(), "Listed vendor orders");
        Ok(fragments)
    }

    fn record_failure(&self, operation: &str, error: &OrderError) {
        self.metrics.record_lifecycle_failure(error.kind());
        match error {
            OrderError::Storage(e) => {
                tracing::error!(operation, error = %e, "Order storage failed");
            }
            _ => tracing::debug!(operation, error = %error, "Order command rejected"),
        }
    }
}

fn replace_fragments(fragments: &mut [VendorOrderFragment], updated: Vec<VendorOrderFragment>) {
    for next in updated {
        if let Some(slot) = fragments.iter_mut().find(|f| f.id == next.id) {
            *slot = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::LineItem;
    use crate::store::{
        MemoryStore, OrderStore, StoreError, StoreTransaction, Transactional, VendorOrderStore,
        VendorOrderSummary,
    };
    use async_trait::async_trait;
    use rust_decimal::Decimal;

    fn dec(value: &str) -> Decimal {
        value.parse().unwrap()
    }

    fn manager(store: &MemoryStore) -> OrderLifecycleManager {
        OrderLifecycleManager::new(Arc::new(store.clone()), Arc::new(Metrics::new().unwrap()))
    }

    fn two_vendor_order() -> PlaceOrder {
        PlaceOrder {
            buyer_id: "U1".to_string(),
            items: vec![
                LineItem::new("V1", dec("20.0")),
                LineItem::new("V2", dec("10.0")),
                LineItem::new("V1", dec("5.0")),
            ],
        }
    }

    fn move_order(order_id: Uuid, target: OrderStatus) -> TransitionOrder {
        TransitionOrder { order_id, target }
    }

    fn move_fragment(fragment: &VendorOrderFragment, target: OrderStatus) -> TransitionFragment {
        TransitionFragment {
            vendor_id: fragment.vendor_id.clone(),
            fragment_id: fragment.id,
            target,
            tracking_number: None,
        }
    }

    #[tokio::test]
    async fn test_place_order_fans_out_per_vendor() {
        let store = MemoryStore::new();
        let manager = manager(&store);

        let placed = manager.place_order(two_vendor_order()).await.unwrap();

        assert_eq!(placed.order.status, OrderStatus::Created);
        assert_eq!(placed.fragments.len(), 2);
        assert_eq!(placed.fragments[0].vendor_id, "V1");
        assert_eq!(placed.fragments[0].total_amount, dec("25.0"));
        assert_eq!(placed.fragments[1].vendor_id, "V2");
        assert_eq!(placed.fragments[1].total_amount, dec("10.0"));

        let loaded = manager.get_order(placed.order.id).await.unwrap();
        assert_eq!(loaded.order, placed.order);
        assert_eq!(loaded.fragments, placed.fragments);
    }

    #[tokio::test]
    async fn test_empty_order_persists_nothing() {
        let store = MemoryStore::new();
        let manager = manager(&store);

        let err = manager
            .place_order(PlaceOrder {
                buyer_id: "U1".to_string(),
                items: vec![],
            })
            .await
            .unwrap_err();

        assert!(matches!(err, OrderError::EmptyOrder));
        assert_eq!(store.order_count().await, 0);
        assert_eq!(store.fragment_count().await, 0);
    }

    #[tokio::test]
    async fn test_illegal_transition_leaves_status_unchanged() {
        let store = MemoryStore::new();
        let manager = manager(&store);
        let placed = manager.place_order(two_vendor_order()).await.unwrap();

        let err = manager
            .transition_order(move_order(placed.order.id, OrderStatus::Delivered))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            OrderError::IllegalTransition {
                from: OrderStatus::Created,
                to: OrderStatus::Delivered
            }
        ));
        let loaded = manager.get_order(placed.order.id).await.unwrap();
        assert_eq!(loaded.order.status, OrderStatus::Created);
    }

    #[tokio::test]
    async fn test_transition_unknown_order_is_not_found() {
        let manager = manager(&MemoryStore::new());
        let err = manager
            .transition_order(move_order(Uuid::now_v7(), OrderStatus::Confirmed))
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::OrderNotFound(_)));
    }

    #[tokio::test]
    async fn test_forward_transition_does_not_touch_fragments() {
        let store = MemoryStore::new();
        let manager = manager(&store);
        let placed = manager.place_order(two_vendor_order()).await.unwrap();

        let moved = manager
            .transition_order(move_order(placed.order.id, OrderStatus::Confirmed))
            .await
            .unwrap();

        assert_eq!(moved.order.status, OrderStatus::Confirmed);
        assert!(moved.exceptions.is_empty());
        assert!(moved
            .fragments
            .iter()
            .all(|f| f.status == OrderStatus::Created));
    }

    #[tokio::test]
    async fn test_cancel_cascades_and_reports_delivered_fragments() {
        let store = MemoryStore::new();
        let manager = manager(&store);
        let placed = manager.place_order(two_vendor_order()).await.unwrap();
        let order_id = placed.order.id;
        let v1 = placed.fragments[0].clone();

        manager
            .transition_order(move_order(order_id, OrderStatus::Confirmed))
            .await
            .unwrap();
        manager
            .transition_fragment(move_fragment(&v1, OrderStatus::Confirmed))
            .await
            .unwrap();

        // Force the V1 fragment to DELIVERED directly so the cascade meets a
        // fragment it must not touch.
        let mut tx = store.begin().await.unwrap();
        let mut delivered = tx.lock_fragment(v1.id).await.unwrap().unwrap();
        delivered.status = OrderStatus::Delivered;
        tx.update_fragment(&delivered).await.unwrap();
        tx.commit().await.unwrap();

        let cancelled = manager
            .transition_order(move_order(order_id, OrderStatus::Cancelled))
            .await
            .unwrap();

        assert_eq!(cancelled.order.status, OrderStatus::Cancelled);
        assert_eq!(cancelled.exceptions.len(), 1);
        assert_eq!(cancelled.exceptions[0].vendor_id, "V1");
        assert_eq!(cancelled.exceptions[0].status, OrderStatus::Delivered);

        let stored = store.list_fragments_by_order(order_id).await.unwrap();
        let status_of = |vendor: &str| {
            stored
                .iter()
                .find(|f| f.vendor_id == vendor)
                .map(|f| f.status)
                .unwrap()
        };
        assert_eq!(status_of("V1"), OrderStatus::Delivered);
        assert_eq!(status_of("V2"), OrderStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_fragment_cannot_run_ahead_of_order() {
        let store = MemoryStore::new();
        let manager = manager(&store);
        let placed = manager.place_order(two_vendor_order()).await.unwrap();

        let err = manager
            .transition_fragment(move_fragment(&placed.fragments[1], OrderStatus::Confirmed))
            .await
            .unwrap_err();

        assert!(matches!(err, OrderError::AheadOfParent { .. }));
        let stored = store.get_fragment(placed.fragments[1].id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Created);
    }

    #[tokio::test]
    async fn test_fragment_of_other_vendor_is_not_found() {
        let store = MemoryStore::new();
        let manager = manager(&store);
        let placed = manager.place_order(two_vendor_order()).await.unwrap();

        let mut command = move_fragment(&placed.fragments[0], OrderStatus::Cancelled);
        command.vendor_id = "V2".to_string();

        let err = manager.transition_fragment(command).await.unwrap_err();
        assert!(matches!(err, OrderError::FragmentNotFound { .. }));
    }

    #[tokio::test]
    async fn test_fragment_transition_keeps_tracking_number() {
        let store = MemoryStore::new();
        let manager = manager(&store);
        let placed = manager.place_order(two_vendor_order()).await.unwrap();
        let order_id = placed.order.id;
        let v2 = placed.fragments[1].clone();

        for target in [OrderStatus::Confirmed, OrderStatus::Shipped] {
            manager
                .transition_order(move_order(order_id, target))
                .await
                .unwrap();
        }
        manager
            .transition_fragment(move_fragment(&v2, OrderStatus::Confirmed))
            .await
            .unwrap();
        let shipped = manager
            .transition_fragment(TransitionFragment {
                tracking_number: Some("TRK-1".to_string()),
                ..move_fragment(&v2, OrderStatus::Shipped)
            })
            .await
            .unwrap();

        assert_eq!(shipped.status, OrderStatus::Shipped);
        assert_eq!(shipped.tracking_number.as_deref(), Some("TRK-1"));
    }

    #[tokio::test]
    async fn test_buyer_orders_are_newest_first() {
        let store = MemoryStore::new();
        let manager = manager(&store);

        let first = manager.place_order(two_vendor_order()).await.unwrap();
        let second = manager.place_order(two_vendor_order()).await.unwrap();

        let orders = manager.list_orders_by_buyer("U1").await.unwrap();
        let ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();
        assert_eq!(ids, vec![second.order.id, first.order.id]);

        assert!(manager.list_orders_by_buyer("U-unknown").await.unwrap().is_empty());
        assert_eq!(manager.list_fragments_by_vendor("V2").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_delete_removes_fragments() {
        let store = MemoryStore::new();
        let manager = manager(&store);
        let placed = manager.place_order(two_vendor_order()).await.unwrap();

        let deleted = manager.delete_order(placed.order.id).await.unwrap();

        assert_eq!(deleted.fragments_removed, 2);
        assert_eq!(store.order_count().await, 0);
        assert_eq!(store.fragment_count().await, 0);
        assert!(matches!(
            manager.delete_order(placed.order.id).await,
            Err(OrderError::OrderNotFound(_))
        ));
    }

    // ------------------------------------------------------------------------
    // Failure injection
    // ------------------------------------------------------------------------

    /// Store whose transactions refuse fragments of one vendor.
    struct FailingFanOut {
        inner: MemoryStore,
        vendor_id: &'static str,
    }

    struct FailingTransaction {
        inner: Box<dyn StoreTransaction>,
        vendor_id: &'static str,
    }

    #[async_trait]
    impl OrderStore for FailingFanOut {
        async fn list_orders(&self) -> Result<Vec<Order>, StoreError> {
            self.inner.list_orders().await
        }

        async fn list_orders_by_buyer(&self, buyer_id: &str) -> Result<Vec<Order>, StoreError> {
            self.inner.list_orders_by_buyer(buyer_id).await
        }

        async fn get_order(&self, id: Uuid) -> Result<Option<Order>, StoreError> {
            self.inner.get_order(id).await
        }
    }

    #[async_trait]
    impl VendorOrderStore for FailingFanOut {
        async fn list_fragments_by_vendor(
            &self,
            vendor_id: &str,
        ) -> Result<Vec<VendorOrderFragment>, StoreError> {
            self.inner.list_fragments_by_vendor(vendor_id).await
        }

        async fn list_fragments_by_order(
            &self,
            order_id: Uuid,
        ) -> Result<Vec<VendorOrderFragment>, StoreError> {
            self.inner.list_fragments_by_order(order_id).await
        }

        async fn get_fragment(&self, id: Uuid) -> Result<Option<VendorOrderFragment>, StoreError> {
            self.inner.get_fragment(id).await
        }

        async fn summarize_vendor(&self, vendor_id: &str) -> Result<VendorOrderSummary, StoreError> {
            self.inner.summarize_vendor(vendor_id).await
        }
    }

    #[async_trait]
    impl Transactional for FailingFanOut {
        async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError> {
            Ok(Box::new(FailingTransaction {
                inner: self.inner.begin().await?,
                vendor_id: self.vendor_id,
            }))
        }
    }

    #[async_trait]
    impl StoreTransaction for FailingTransaction {
        async fn lock_order(&mut self, id: Uuid) -> Result<Option<Order>, StoreError> {
            self.inner.lock_order(id).await
        }

        async fn lock_fragment(
            &mut self,
            id: Uuid,
        ) -> Result<Option<VendorOrderFragment>, StoreError> {
            self.inner.lock_fragment(id).await
        }

        async fn fragments_for_order(
            &mut self,
            order_id: Uuid,
        ) -> Result<Vec<VendorOrderFragment>, StoreError> {
            self.inner.fragments_for_order(order_id).await
        }

        async fn insert_order(&mut self, order: &Order) -> Result<(), StoreError> {
            self.inner.insert_order(order).await
        }

        async fn insert_fragment(
            &mut self,
            fragment: &VendorOrderFragment,
        ) -> Result<(), StoreError> {
            if fragment.vendor_id == self.vendor_id {
                return Err(StoreError::Unavailable("connection reset".to_string()));
            }
            self.inner.insert_fragment(fragment).await
        }

        async fn update_order(&mut self, order: &Order) -> Result<(), StoreError> {
            self.inner.update_order(order).await
        }

        async fn update_fragment(
            &mut self,
            fragment: &VendorOrderFragment,
        ) -> Result<(), StoreError> {
            self.inner.update_fragment(fragment).await
        }

        async fn delete_order(&mut self, id: Uuid) -> Result<u64, StoreError> {
            self.inner.delete_order(id).await
        }

        async fn commit(self: Box<Self>) -> Result<(), StoreError> {
            self.inner.commit().await
        }
    }

    #[tokio::test]
    async fn test_failed_fan_out_rolls_back_order() {
        let store = MemoryStore::new();
        let failing = FailingFanOut {
            inner: store.clone(),
            vendor_id: "V2",
        };
        let metrics = Arc::new(Metrics::new().unwrap());
        let manager = OrderLifecycleManager::new(Arc::new(failing), metrics.clone());

        let err = manager.place_order(two_vendor_order()).await.unwrap_err();

        assert!(matches!(err, OrderError::Storage(StoreError::Unavailable(_))));
        assert_eq!(store.order_count().await, 0);
        assert_eq!(store.fragment_count().await, 0);
        assert_eq!(metrics.orders_created.get(), 0);
        assert_eq!(
            metrics
                .lifecycle_failures
                .with_label_values(&["StorageUnavailable"])
                .get(),
            1
        );
    }
}
