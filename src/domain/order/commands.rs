use uuid::Uuid;

use super::value_objects::{LineItem, OrderStatus};

// ============================================================================
// Order Commands - Represent caller intent
// ============================================================================

#[derive(Debug, Clone)]
pub struct PlaceOrder {
    pub buyer_id: String,
    pub items: Vec<LineItem>,
}

#[derive(Debug, Clone)]
pub struct TransitionOrder {
    pub order_id: Uuid,
    pub target: OrderStatus,
}

#[derive(Debug, Clone)]
pub struct TransitionFragment {
    pub vendor_id: String,
    pub fragment_id: Uuid,
    pub target: OrderStatus,
    pub tracking_number: Option<String>,
}
