use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Order Value Objects
// ============================================================================

/// One priced line of an incoming order, attributed to a single vendor.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub vendor_id: String,
    pub line_total: Decimal,
}

impl LineItem {
    pub fn new(vendor_id: impl Into<String>, line_total: Decimal) -> Self {
        Self {
            vendor_id: vendor_id.into(),
            line_total,
        }
    }
}

/// Lifecycle status shared by orders and their vendor fragments.
///
/// ```text
/// CREATED -> CONFIRMED -> SHIPPED -> DELIVERED
///    |           |
///    +-----------+--> CANCELLED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Created,
    Confirmed,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 5] = [
        OrderStatus::Created,
        OrderStatus::Confirmed,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Created => "CREATED",
            OrderStatus::Confirmed => "CONFIRMED",
            OrderStatus::Shipped => "SHIPPED",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }

    /// Position on the forward path. `None` for the cancelled branch.
    pub fn progress(&self) -> Option<u8> {
        match self {
            OrderStatus::Created => Some(0),
            OrderStatus::Confirmed => Some(1),
            OrderStatus::Shipped => Some(2),
            OrderStatus::Delivered => Some(3),
            OrderStatus::Cancelled => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// Whether `target` is directly reachable from `self`.
    pub fn can_transition_to(&self, target: OrderStatus) -> bool {
        use OrderStatus::*;

        matches!(
            (self, target),
            (Created, Confirmed)
                | (Confirmed, Shipped)
                | (Shipped, Delivered)
                | (Created, Cancelled)
                | (Confirmed, Cancelled)
        )
    }

    /// A fragment status may never be strictly ahead of its parent order.
    ///
    /// Cancellation is orthogonal to progress: a fragment may be cancelled
    /// on its own, but once the parent is cancelled no forward status is
    /// allowed for the fragment.
    pub fn is_ahead_of(&self, parent: OrderStatus) -> bool {
        match (self.progress(), parent.progress()) {
            (Some(own), Some(parent)) => own > parent,
            (Some(own), None) => own > 0,
            (None, _) => false,
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Unknown order status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for OrderStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase();
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == normalized)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
