use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::{
    OrderStore, ProductCatalog, StoreError, StoreTransaction, Transactional, VendorOrderStore,
    VendorOrderSummary,
};
use crate::domain::order::{Order, OrderStatus, VendorOrderFragment};

// ============================================================================
// PostgreSQL Store
// ============================================================================
//
// Tables (see migrations/):
// - orders
// - vendor_orders  (order_id -> orders.id ON DELETE CASCADE,
//                   UNIQUE (order_id, vendor_id))
//
// ============================================================================

const ORDER_COLUMNS: &str = "id, buyer_id, status, created_at, updated_at";
const FRAGMENT_COLUMNS: &str =
    "id, order_id, vendor_id, status, total_amount, tracking_number, created_at, updated_at";

#[derive(FromRow)]
struct OrderRow {
    id: Uuid,
    buyer_id: String,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = StoreError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        Ok(Order {
            id: row.id,
            buyer_id: row.buyer_id,
            status: parse_status(&row.status)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct FragmentRow {
    id: Uuid,
    order_id: Uuid,
    vendor_id: String,
    status: String,
    total_amount: Decimal,
    tracking_number: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<FragmentRow> for VendorOrderFragment {
    type Error = StoreError;

    fn try_from(row: FragmentRow) -> Result<Self, Self::Error> {
        Ok(VendorOrderFragment {
            id: row.id,
            order_id: row.order_id,
            vendor_id: row.vendor_id,
            status: parse_status(&row.status)?,
            total_amount: row.total_amount,
            tracking_number: row.tracking_number,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn parse_status(raw: &str) -> Result<OrderStatus, StoreError> {
    raw.parse()
        .map_err(|e| StoreError::Corrupt(format!("{}", e)))
}

fn into_orders(rows: Vec<OrderRow>) -> Result<Vec<Order>, StoreError> {
    rows.into_iter().map(Order::try_from).collect()
}

fn into_fragments(rows: Vec<FragmentRow>) -> Result<Vec<VendorOrderFragment>, StoreError> {
    rows.into_iter().map(VendorOrderFragment::try_from).collect()
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrderStore for PgStore {
    async fn list_orders(&self) -> Result<Vec<Order>, StoreError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        into_orders(rows)
    }

    async fn list_orders_by_buyer(&self, buyer_id: &str) -> Result<Vec<Order>, StoreError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE buyer_id = $1
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(buyer_id)
        .fetch_all(&self.pool)
        .await?;

        into_orders(rows)
    }

    async fn get_order(&self, id: Uuid) -> Result<Option<Order>, StoreError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Order::try_from).transpose()
    }
}

#[async_trait]
impl VendorOrderStore for PgStore {
    async fn list_fragments_by_vendor(
        &self,
        vendor_id: &str,
    ) -> Result<Vec<VendorOrderFragment>, StoreError> {
        let rows = sqlx::query_as::<_, FragmentRow>(&format!(
            "SELECT {FRAGMENT_COLUMNS} FROM vendor_orders WHERE vendor_id = $1
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(vendor_id)
        .fetch_all(&self.pool)
        .await?;

        into_fragments(rows)
    }

    async fn list_fragments_by_order(
        &self,
        order_id: Uuid,
    ) -> Result<Vec<VendorOrderFragment>, StoreError> {
        let rows = sqlx::query_as::<_, FragmentRow>(&format!(
            "SELECT {FRAGMENT_COLUMNS} FROM vendor_orders WHERE order_id = $1
             ORDER BY created_at ASC, id ASC"
        ))
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        into_fragments(rows)
    }

    async fn get_fragment(&self, id: Uuid) -> Result<Option<VendorOrderFragment>, StoreError> {
        let row = sqlx::query_as::<_, FragmentRow>(&format!(
            "SELECT {FRAGMENT_COLUMNS} FROM vendor_orders WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(VendorOrderFragment::try_from).transpose()
    }

    async fn summarize_vendor(&self, vendor_id: &str) -> Result<VendorOrderSummary, StoreError> {
        let (fragment_count, pending_count, delivered_total): (i64, i64, Decimal) =
            sqlx::query_as(
                "SELECT
                    COUNT(*)::bigint,
                    COUNT(*) FILTER (WHERE status IN ('CREATED', 'CONFIRMED', 'SHIPPED'))::bigint,
                    COALESCE(SUM(total_amount) FILTER (WHERE status = 'DELIVERED'), 0)
                 FROM vendor_orders
                 WHERE vendor_id = $1",
            )
            .bind(vendor_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(VendorOrderSummary {
            fragment_count: fragment_count.max(0) as u64,
            pending_count: pending_count.max(0) as u64,
            delivered_total,
        })
    }
}

#[async_trait]
impl Transactional for PgStore {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTransaction { tx }))
    }
}

/// Wraps a sqlx transaction; sqlx rolls back on drop if not committed.
struct PgTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTransaction for PgTransaction {
    async fn lock_order(&mut self, id: Uuid) -> Result<Option<Order>, StoreError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(Order::try_from).transpose()
    }

    async fn lock_fragment(&mut self, id: Uuid) -> Result<Option<VendorOrderFragment>, StoreError> {
        let row = sqlx::query_as::<_, FragmentRow>(&format!(
            "SELECT {FRAGMENT_COLUMNS} FROM vendor_orders WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(VendorOrderFragment::try_from).transpose()
    }

    async fn fragments_for_order(
        &mut self,
        order_id: Uuid,
    ) -> Result<Vec<VendorOrderFragment>, StoreError> {
        let rows = sqlx::query_as::<_, FragmentRow>(&format!(
            "SELECT {FRAGMENT_COLUMNS} FROM vendor_orders WHERE order_id = $1
             ORDER BY created_at ASC, id ASC
             FOR UPDATE"
        ))
        .bind(order_id)
        .fetch_all(&mut *self.tx)
        .await?;

        into_fragments(rows)
    }

    async fn insert_order(&mut self, order: &Order) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO orders (id, buyer_id, status, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(order.id)
        .bind(&order.buyer_id)
        .bind(order.status.as_str())
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn insert_fragment(&mut self, fragment: &VendorOrderFragment) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO vendor_orders (
                id, order_id, vendor_id, status, total_amount, tracking_number,
                created_at, updated_at
             ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(fragment.id)
        .bind(fragment.order_id)
        .bind(&fragment.vendor_id)
        .bind(fragment.status.as_str())
        .bind(fragment.total_amount)
        .bind(&fragment.tracking_number)
        .bind(fragment.created_at)
        .bind(fragment.updated_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn update_order(&mut self, order: &Order) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE orders SET status = $2, updated_at = $3 WHERE id = $1")
            .bind(order.id)
            .bind(order.status.as_str())
            .bind(order.updated_at)
            .execute(&mut *self.tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Constraint(format!("order {} does not exist", order.id)));
        }
        Ok(())
    }

    async fn update_fragment(&mut self, fragment: &VendorOrderFragment) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE vendor_orders
             SET status = $2, tracking_number = $3, updated_at = $4
             WHERE id = $1",
        )
        .bind(fragment.id)
        .bind(fragment.status.as_str())
        .bind(&fragment.tracking_number)
        .bind(fragment.updated_at)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Constraint(format!(
                "vendor order {} does not exist",
                fragment.id
            )));
        }
        Ok(())
    }

    async fn delete_order(&mut self, id: Uuid) -> Result<u64, StoreError> {
        let fragments = sqlx::query("DELETE FROM vendor_orders WHERE order_id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await?
            .rows_affected();

        sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;

        Ok(fragments)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }
}

// ============================================================================
// PostgreSQL Product Catalog
// ============================================================================

#[derive(Clone)]
pub struct PgCatalog {
    pool: PgPool,
}

impl PgCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProductCatalog for PgCatalog {
    async fn count_active_products(&self, vendor_id: &str) -> Result<u64, StoreError> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*)::bigint FROM products WHERE vendor_id = $1 AND active",
        )
        .bind(vendor_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count.max(0) as u64)
    }

    async fn count_low_stock_products(
        &self,
        vendor_id: &str,
        threshold: i32,
    ) -> Result<u64, StoreError> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*)::bigint FROM products
             WHERE vendor_id = $1 AND active AND stock <= $2",
        )
        .bind(vendor_id)
        .bind(threshold)
        .fetch_one(&self.pool)
        .await?;

        Ok(count.max(0) as u64)
    }

    async fn has_products(&self, vendor_id: &str) -> Result<bool, StoreError> {
        let (exists,): (bool,) =
            sqlx::query_as("SELECT EXISTS (SELECT 1 FROM products WHERE vendor_id = $1)")
                .bind(vendor_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(exists)
    }
}

/// Apply the embedded migrations.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

// ============================================================================
// Integration Tests (require a live PostgreSQL instance)
// ============================================================================
