use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::aggregate::{Order, VendorOrderFragment};
use super::value_objects::OrderStatus;

// ============================================================================
// Order Outcomes - what a successful command produced
// ============================================================================

/// An order together with its vendor orders
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct OrderSnapshot {
    pub order: Order,
    pub fragments: Vec<VendorOrderFragment>,
}

/// Order Transitioned - new order snapshot plus any cascaded fragments
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct OrderTransitioned {
    pub order: Order,
    pub fragments: Vec<VendorOrderFragment>,
    pub exceptions: Vec<CascadeException>,
}

/// A fragment the cancellation cascade could not move
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CascadeException {
    pub fragment_id: Uuid,
    pub vendor_id: String,
    pub status: OrderStatus,
    pub reason: String,
}

/// Order Deleted
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderDeleted {
    pub order_id: Uuid,
    pub fragments_removed: u64,
}
