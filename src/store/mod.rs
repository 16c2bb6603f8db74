// ============================================================================
// Order Persistence - store contracts
// ============================================================================
//
// Reads go straight to the store. Every write goes through a
// `StoreTransaction`: nothing is visible until `commit`, and dropping an
// uncommitted transaction discards all of its writes.
//
// Implementations:
// - postgres: sqlx over PgPool (production)
// - memory:   process-local state (tests, local runs)
//
// ============================================================================

mod memory;
mod postgres;

use async_trait::async_trait;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::order::{Order, VendorOrderFragment};
use crate::utils::IsTransient;

pub use memory::{MemoryCatalog, MemoryStore};
pub use postgres::{migrate, PgCatalog, PgStore};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database unavailable: {0}")]
    Unavailable(String),

    #[error("constraint violated: {0}")]
    Constraint(String),

    #[error("corrupt row: {0}")]
    Corrupt(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.constraint().is_some() => {
                StoreError::Constraint(db.message().to_string())
            }
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                StoreError::Corrupt(err.to_string())
            }
            _ => StoreError::Unavailable(err.to_string()),
        }
    }
}

impl IsTransient for StoreError {
    fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

/// Per-vendor rollup over vendor order fragments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VendorOrderSummary {
    pub fragment_count: u64,
    pub pending_count: u64,
    pub delivered_total: Decimal,
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// All orders, newest first.
    async fn list_orders(&self) -> Result<Vec<Order>, StoreError>;

    /// Orders of one buyer, newest first.
    async fn list_orders_by_buyer(&self, buyer_id: &str) -> Result<Vec<Order>, StoreError>;

    async fn get_order(&self, id: Uuid) -> Result<Option<Order>, StoreError>;
}

#[async_trait]
pub trait VendorOrderStore: Send + Sync {
    /// Fragments of one vendor, newest first.
    async fn list_fragments_by_vendor(
        &self,
        vendor_id: &str,
    ) -> Result<Vec<VendorOrderFragment>, StoreError>;

    async fn list_fragments_by_order(
        &self,
        order_id: Uuid,
    ) -> Result<Vec<VendorOrderFragment>, StoreError>;

    async fn get_fragment(&self, id: Uuid) -> Result<Option<VendorOrderFragment>, StoreError>;

    async fn summarize_vendor(&self, vendor_id: &str) -> Result<VendorOrderSummary, StoreError>;
}

/// Unit of work spanning orders and vendor order fragments.
#[async_trait]
pub trait StoreTransaction: Send {
    /// Load an order and hold it against concurrent writers until commit.
    async fn lock_order(&mut self, id: Uuid) -> Result<Option<Order>, StoreError>;

    async fn lock_fragment(&mut self, id: Uuid) -> Result<Option<VendorOrderFragment>, StoreError>;

    async fn fragments_for_order(
        &mut self,
        order_id: Uuid,
    ) -> Result<Vec<VendorOrderFragment>, StoreError>;

    async fn insert_order(&mut self, order: &Order) -> Result<(), StoreError>;

    async fn insert_fragment(&mut self, fragment: &VendorOrderFragment) -> Result<(), StoreError>;

    async fn update_order(&mut self, order: &Order) -> Result<(), StoreError>;

    async fn update_fragment(&mut self, fragment: &VendorOrderFragment) -> Result<(), StoreError>;

    /// Delete an order and all of its fragments. Returns the fragment count.
    async fn delete_order(&mut self, id: Uuid) -> Result<u64, StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}

#[async_trait]
pub trait Transactional: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError>;
}

/// Everything the lifecycle manager needs from persistence.
pub trait Storage: OrderStore + VendorOrderStore + Transactional {}

impl<T> Storage for T where T: OrderStore + VendorOrderStore + Transactional {}

/// Read contract of the product catalog collaborator.
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    async fn count_active_products(&self, vendor_id: &str) -> Result<u64, StoreError>;

    /// Active products whose stock is at or below `threshold`.
    async fn count_low_stock_products(
        &self,
        vendor_id: &str,
        threshold: i32,
    ) -> Result<u64, StoreError>;

    /// Whether the vendor has any product at all, active or not.
    async fn has_products(&self, vendor_id: &str) -> Result<bool, StoreError>;
}
