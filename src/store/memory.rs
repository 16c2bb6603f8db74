use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{
    OrderStore, ProductCatalog, StoreError, StoreTransaction, Transactional, VendorOrderStore,
    VendorOrderSummary,
};
use crate::domain::order::{Order, OrderStatus, VendorOrderFragment};

// ============================================================================
// In-Memory Store
// ============================================================================
//
// A transaction takes the state lock for its whole lifetime and works on a
// staged copy, so transactions are serialized and commit is a single swap.
//
// ============================================================================

#[derive(Debug, Clone, Default)]
struct MemoryState {
    orders: HashMap<Uuid, Order>,
    fragments: HashMap<Uuid, VendorOrderFragment>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn order_count(&self) -> usize {
        self.state.lock().await.orders.len()
    }

    pub async fn fragment_count(&self) -> usize {
        self.state.lock().await.fragments.len()
    }
}

fn newest_first_orders(mut orders: Vec<Order>) -> Vec<Order> {
    orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
    orders
}

fn newest_first_fragments(mut fragments: Vec<VendorOrderFragment>) -> Vec<VendorOrderFragment> {
    fragments.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
    fragments
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn list_orders(&self) -> Result<Vec<Order>, StoreError> {
        let state = self.state.lock().await;
        Ok(newest_first_orders(state.orders.values().cloned().collect()))
    }

    async fn list_orders_by_buyer(&self, buyer_id: &str) -> Result<Vec<Order>, StoreError> {
        let state = self.state.lock().await;
        Ok(newest_first_orders(
            state
                .orders
                .values()
                .filter(|o| o.buyer_id == buyer_id)
                .cloned()
                .collect(),
        ))
    }

    async fn get_order(&self, id: Uuid) -> Result<Option<Order>, StoreError> {
        Ok(self.state.lock().await.orders.get(&id).cloned())
    }
}

#[async_trait]
impl VendorOrderStore for MemoryStore {
    async fn list_fragments_by_vendor(
        &self,
        vendor_id: &str,
    ) -> Result<Vec<VendorOrderFragment>, StoreError> {
        let state = self.state.lock().await;
        Ok(newest_first_fragments(
            state
                .fragments
                .values()
                .filter(|f| f.vendor_id == vendor_id)
                .cloned()
                .collect(),
        ))
    }

    async fn list_fragments_by_order(
        &self,
        order_id: Uuid,
    ) -> Result<Vec<VendorOrderFragment>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.fragments_for_order(order_id))
    }

    async fn get_fragment(&self, id: Uuid) -> Result<Option<VendorOrderFragment>, StoreError> {
        Ok(self.state.lock().await.fragments.get(&id).cloned())
    }

    async fn summarize_vendor(&self, vendor_id: &str) -> Result<VendorOrderSummary, StoreError> {
        let state = self.state.lock().await;
        let summary = state
            .fragments
            .values()
            .filter(|f| f.vendor_id == vendor_id)
            .fold(VendorOrderSummary::default(), |mut acc, f| {
                acc.fragment_count += 1;
                if !f.status.is_terminal() {
                    acc.pending_count += 1;
                }
                if f.status == OrderStatus::Delivered {
                    acc.delivered_total += f.total_amount;
                }
                acc
            });
        Ok(summary)
    }
}

impl MemoryState {
    fn fragments_for_order(&self, order_id: Uuid) -> Vec<VendorOrderFragment> {
        let mut fragments: Vec<_> = self
            .fragments
            .values()
            .filter(|f| f.order_id == order_id)
            .cloned()
            .collect();
        fragments.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        fragments
    }
}

#[async_trait]
impl Transactional for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError> {
        let guard = self.state.clone().lock_owned().await;
        let staged = guard.clone();
        Ok(Box::new(MemoryTransaction { guard, staged }))
    }
}

struct MemoryTransaction {
    guard: OwnedMutexGuard<MemoryState>,
    staged: MemoryState,
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn lock_order(&mut self, id: Uuid) -> Result<Option<Order>, StoreError> {
        Ok(self.staged.orders.get(&id).cloned())
    }

    async fn lock_fragment(&mut self, id: Uuid) -> Result<Option<VendorOrderFragment>, StoreError> {
        Ok(self.staged.fragments.get(&id).cloned())
    }

    async fn fragments_for_order(
        &mut self,
        order_id: Uuid,
    ) -> Result<Vec<VendorOrderFragment>, StoreError> {
        Ok(self.staged.fragments_for_order(order_id))
    }

    async fn insert_order(&mut self, order: &Order) -> Result<(), StoreError> {
        if self.staged.orders.contains_key(&order.id) {
            return Err(StoreError::Constraint(format!("duplicate order id {}", order.id)));
        }
        self.staged.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn insert_fragment(&mut self, fragment: &VendorOrderFragment) -> Result<(), StoreError> {
        if !self.staged.orders.contains_key(&fragment.order_id) {
            return Err(StoreError::Constraint(format!(
                "vendor order references missing order {}",
                fragment.order_id
            )));
        }
        let duplicate = self
            .staged
            .fragments
            .values()
            .any(|f| f.order_id == fragment.order_id && f.vendor_id == fragment.vendor_id);
        if duplicate || self.staged.fragments.contains_key(&fragment.id) {
            return Err(StoreError::Constraint(format!(
                "duplicate vendor order for order {} and vendor {}",
                fragment.order_id, fragment.vendor_id
            )));
        }
        self.staged.fragments.insert(fragment.id, fragment.clone());
        Ok(())
    }

    async fn update_order(&mut self, order: &Order) -> Result<(), StoreError> {
        match self.staged.orders.get_mut(&order.id) {
            Some(existing) => {
                existing.status = order.status;
                existing.updated_at = order.updated_at;
                Ok(())
            }
            None => Err(StoreError::Constraint(format!("order {} does not exist", order.id))),
        }
    }

    async fn update_fragment(&mut self, fragment: &VendorOrderFragment) -> Result<(), StoreError> {
        match self.staged.fragments.get_mut(&fragment.id) {
            Some(existing) => {
                existing.status = fragment.status;
                existing.tracking_number = fragment.tracking_number.clone();
                existing.updated_at = fragment.updated_at;
                Ok(())
            }
            None => Err(StoreError::Constraint(format!(
                "vendor order {} does not exist",
                fragment.id
            ))),
        }
    }

    async fn delete_order(&mut self, id: Uuid) -> Result<u64, StoreError> {
        let before = self.staged.fragments.len();
        self.staged.fragments.retain(|_, f| f.order_id != id);
        let removed = (before - self.staged.fragments.len()) as u64;
        self.staged.orders.remove(&id);
        Ok(removed)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let MemoryTransaction { mut guard, staged } = *self;
        *guard = staged;
        Ok(())
    }
}

// ============================================================================
// In-Memory Product Catalog
// ============================================================================

#[derive(Debug, Clone)]
pub struct CatalogProduct {
    pub vendor_id: String,
    pub stock: i32,
    pub active: bool,
}

#[derive(Clone, Default)]
pub struct MemoryCatalog {
    products: Arc<std::sync::RwLock<Vec<CatalogProduct>>>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_product(&self, vendor_id: impl Into<String>, stock: i32, active: bool) {
        let product = CatalogProduct {
            vendor_id: vendor_id.into(),
            stock,
            active,
        };
        match self.products.write() {
            Ok(mut products) => products.push(product),
            Err(poisoned) => poisoned.into_inner().push(product),
        }
    }

    fn count(&self, filter: impl Fn(&CatalogProduct) -> bool) -> u64 {
        let products = match self.products.read() {
            Ok(products) => products,
            Err(poisoned) => poisoned.into_inner(),
        };
        products.iter().filter(|p| filter(p)).count() as u64
    }
}

#[async_trait]
impl ProductCatalog for MemoryCatalog {
    async fn count_active_products(&self, vendor_id: &str) -> Result<u64, StoreError> {
        Ok(self.count(|p| p.vendor_id == vendor_id && p.active))
    }

    async fn count_low_stock_products(
        &self,
        vendor_id: &str,
        threshold: i32,
    ) -> Result<u64, StoreError> {
        Ok(self.count(|p| p.vendor_id == vendor_id && p.active && p.stock <= threshold))
    }

    async fn has_products(&self, vendor_id: &str) -> Result<bool, StoreError> {
        Ok(self.count(|p| p.vendor_id == vendor_id) > 0)
    }
}
