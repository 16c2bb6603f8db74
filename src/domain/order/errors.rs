use uuid::Uuid;

use super::value_objects::OrderStatus;
use crate::store::StoreError;
use crate::utils::IsTransient;

// ============================================================================
// Order Business Rule Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("Order must contain at least one line item")]
    EmptyOrder,

    #[error("Invalid line item: {0}")]
    InvalidLineItem(String),

    #[error("Order not found: {0}")]
    OrderNotFound(Uuid),

    #[error("Vendor order {fragment_id} not found for vendor {vendor_id}")]
    FragmentNotFound { vendor_id: String, fragment_id: Uuid },

    #[error("Vendor not found: {0}")]
    VendorNotFound(String),

    #[error("Illegal status transition: {from} -> {to}")]
    IllegalTransition { from: OrderStatus, to: OrderStatus },

    #[error("Vendor order cannot move to {to} while its order is {parent}")]
    AheadOfParent { parent: OrderStatus, to: OrderStatus },

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

impl OrderError {
    /// Stable kind label used for metrics and API error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            OrderError::EmptyOrder => "EmptyOrder",
            OrderError::InvalidLineItem(_) => "InvalidRequest",
            OrderError::OrderNotFound(_)
            | OrderError::FragmentNotFound { .. }
            | OrderError::VendorNotFound(_) => "NotFound",
            OrderError::IllegalTransition { .. } | OrderError::AheadOfParent { .. } => {
                "IllegalTransition"
            }
            OrderError::Storage(e) if e.is_transient() => "StorageUnavailable",
            OrderError::Storage(_) => "StorageFailure",
        }
    }
}

impl IsTransient for OrderError {
    fn is_transient(&self) -> bool {
        match self {
            OrderError::Storage(e) => e.is_transient(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_storage_failures_are_transient() {
        let storage = OrderError::from(StoreError::Unavailable("connection reset".into()));
        assert!(storage.is_transient());

        assert_eq!(storage.kind(), "StorageUnavailable");

        for store_error in [
            StoreError::Constraint("duplicate key value violates unique constraint".into()),
            StoreError::Corrupt("unknown status SHIPPING".into()),
        ] {
            let error = OrderError::from(store_error);
            assert!(!error.is_transient(), "{:?}", error);
            assert_eq!(error.kind(), "StorageFailure");
        }

        assert!(!OrderError::EmptyOrder.is_transient());
        assert!(!OrderError::OrderNotFound(Uuid::nil()).is_transient());
        assert!(!OrderError::IllegalTransition {
            from: OrderStatus::Created,
            to: OrderStatus::Shipped,
        }
        .is_transient());
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(OrderError::EmptyOrder.kind(), "EmptyOrder");
        assert_eq!(
            OrderError::AheadOfParent {
                parent: OrderStatus::Created,
                to: OrderStatus::Confirmed,
            }
            .kind(),
            "IllegalTransition"
        );
        assert_eq!(OrderError::VendorNotFound("V9".into()).kind(), "NotFound");
    }
}
