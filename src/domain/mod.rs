// ============================================================================
// Domain Layer - Business Logic
// ============================================================================
//
// Each area has its own subdirectory:
// - order:  order lifecycle, vendor fan-out and cancellation cascade
// - vendor: read-only vendor dashboard statistics
//
// Storage is reached only through the traits in `crate::store`.
//
// ============================================================================

pub mod order;
pub mod vendor;
