// ============================================================================
// Order Domain - Order lifecycle and vendor fan-out
// ============================================================================
//
// This module contains ALL Order-specific code:
// - Value objects (LineItem, OrderStatus)
// - Outcomes (OrderSnapshot, OrderTransitioned, OrderDeleted)
// - Commands (PlaceOrder, TransitionOrder, TransitionFragment)
// - Errors (OrderError enum)
// - Aggregate (Order, VendorOrderFragment and planning functions)
// - Command Handler (OrderLifecycleManager)
//
// ============================================================================

pub mod value_objects;
pub mod events;
pub mod commands;
pub mod errors;
pub mod aggregate;
pub mod command_handler;

// Re-export for convenience
pub use value_objects::*;
pub use events::*;
pub use commands::*;
pub use errors::*;
pub use aggregate::*;
pub use command_handler::*;
