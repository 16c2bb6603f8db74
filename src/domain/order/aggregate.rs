use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::OrderError;
use super::events::CascadeException;
use super::value_objects::{LineItem, OrderStatus};

/// Decimal places stored for money (`NUMERIC(12, 2)`)
pub const MONEY_SCALE: u32 = 2;

/// Exclusive upper bound for a vendor order total, 10^10
fn max_vendor_total() -> Decimal {
    Decimal::from(10_000_000_000_i64)
}

// ============================================================================
// Order Aggregate - Domain Logic
// ============================================================================
//
// Snapshots are immutable values: every state change produces a new
// snapshot which the command handler persists. Nothing here touches storage.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,
    pub buyer_id: String,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn place(buyer_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::now_v7(),
            buyer_id: buyer_id.into(),
            status: OrderStatus::Created,
            created_at: now,
            updated_at: now,
        }
    }

    /// Produce the snapshot after moving to `target`.
    pub fn transition(&self, target: OrderStatus, now: DateTime<Utc>) -> Result<Self, OrderError> {
        if !self.status.can_transition_to(target) {
            return Err(OrderError::IllegalTransition {
                from: self.status,
                to: target,
            });
        }

        Ok(Self {
            status: target,
            updated_at: now,
            ..self.clone()
        })
    }
}

/// The part of an order fulfilled by a single vendor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorOrderFragment {
    pub id: Uuid,
    pub order_id: Uuid,
    pub vendor_id: String,
    pub status: OrderStatus,
    pub total_amount: Decimal,
    pub tracking_number: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl VendorOrderFragment {
    fn open(order: &Order, vendor_id: String, total_amount: Decimal) -> Self {
        Self {
            id: Uuid::now_v7(),
            order_id: order.id,
            vendor_id,
            status: OrderStatus::Created,
            total_amount,
            tracking_number: None,
            created_at: order.created_at,
            updated_at: order.created_at,
        }
    }

    /// Vendor-driven transition, bounded by the parent order's status.
    pub fn transition(
        &self,
        target: OrderStatus,
        parent: OrderStatus,
        tracking_number: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Self, OrderError> {
        if !self.status.can_transition_to(target) {
            return Err(OrderError::IllegalTransition {
                from: self.status,
                to: target,
            });
        }
        if target.is_ahead_of(parent) {
            return Err(OrderError::AheadOfParent { parent, to: target });
        }

        Ok(Self {
            status: target,
            tracking_number: tracking_number.or_else(|| self.tracking_number.clone()),
            updated_at: now,
            ..self.clone()
        })
    }
}

/// Validate line items and derive the order plus one fragment per vendor.
///
/// Fragments follow the order in which each vendor first appears.
pub fn plan_order(
    buyer_id: &str,
    items: &[LineItem],
    now: DateTime<Utc>,
) -> Result<(Order, Vec<VendorOrderFragment>), OrderError> {
    if items.is_empty() {
        return Err(OrderError::EmptyOrder);
    }
    if buyer_id.trim().is_empty() {
        return Err(OrderError::InvalidLineItem("buyer id is empty".to_string()));
    }

    let mut totals: Vec<(String, Decimal)> = Vec::new();
    for item in items {
        if item.vendor_id.trim().is_empty() {
            return Err(OrderError::InvalidLineItem("vendor id is empty".to_string()));
        }
        if item.line_total < Decimal::ZERO {
            return Err(OrderError::InvalidLineItem(format!(
                "negative line total {} for vendor {}",
                item.line_total, item.vendor_id
            )));
        }
        if item.line_total.normalize().scale() > MONEY_SCALE {
            return Err(OrderError::InvalidLineItem(format!(
                "line total {} for vendor {} has more than {} decimal places",
                item.line_total, item.vendor_id, MONEY_SCALE
            )));
        }

        let index = match totals.iter().position(|(vendor, _)| *vendor == item.vendor_id) {
            Some(index) => index,
            None => {
                totals.push((item.vendor_id.clone(), Decimal::ZERO));
                totals.len() - 1
            }
        };
        let total = &mut totals[index].1;
        *total = total
            .checked_add(item.line_total)
            .filter(|sum| *sum < max_vendor_total())
            .ok_or_else(|| {
                OrderError::InvalidLineItem(format!(
                    "total for vendor {} exceeds {}",
                    item.vendor_id,
                    max_vendor_total()
                ))
            })?;
    }

    let order = Order::place(buyer_id, now);
    let fragments = totals
        .into_iter()
        .map(|(vendor_id, total)| VendorOrderFragment::open(&order, vendor_id, total))
        .collect();

    Ok((order, fragments))
}

/// Fragments to rewrite when an order is cancelled.
///
/// Every non-terminal fragment is cancelled. Delivered fragments are kept
/// as they are and reported back; already cancelled ones are skipped.
pub fn plan_cancellation(
    fragments: &[VendorOrderFragment],
    now: DateTime<Utc>,
) -> (Vec<VendorOrderFragment>, Vec<CascadeException>) {
    let mut cancelled = Vec::new();
    let mut exceptions = Vec::new();

    for fragment in fragments {
        match fragment.status {
            OrderStatus::Cancelled => {}
            OrderStatus::Delivered => exceptions.push(CascadeException {
                fragment_id: fragment.id,
                vendor_id: fragment.vendor_id.clone(),
                status: fragment.status,
                reason: "vendor order already delivered".to_string(),
            }),
            _ => cancelled.push(VendorOrderFragment {
                status: OrderStatus::Cancelled,
                updated_at: now,
                ..fragment.clone()
            }),
        }
    }

    (cancelled, exceptions)
}

// ============================================================================
// Unit Tests
// ============================================================================
