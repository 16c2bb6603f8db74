// Private module declaration
mod server;

use prometheus::{IntCounter, IntCounterVec, Opts, Registry};

// Re-export for public API
pub use server::start_metrics_server;

// ============================================================================
// Metrics Module - Prometheus metrics for observability
// ============================================================================
//
// Provides metrics for:
// - Order creation and vendor fan-out
// - Order and vendor order status transitions
// - Lifecycle failures by error kind
// - Authentication gate decisions
//
// All metrics are registered with Prometheus and can be scraped via /metrics
// ============================================================================

/// Central metrics registry for the service
pub struct Metrics {
    registry: Registry,

    // Order Metrics
    pub orders_created: IntCounter,
    pub fragments_created: IntCounter,
    pub order_transitions: IntCounterVec,
    pub fragment_transitions: IntCounterVec,
    pub lifecycle_failures: IntCounterVec,

    // Gate Metrics
    pub auth_decisions: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let orders_created = IntCounter::new("orders_created_total", "Total orders created")?;
        registry.register(Box::new(orders_created.clone()))?;

        let fragments_created = IntCounter::new(
            "vendor_fragments_created_total",
            "Total vendor orders created by order fan-out",
        )?;
        registry.register(Box::new(fragments_created.clone()))?;

        let order_transitions = IntCounterVec::new(
            Opts::new("order_transitions_total", "Order status transitions"),
            &["from", "to"],
        )?;
        registry.register(Box::new(order_transitions.clone()))?;

        let fragment_transitions = IntCounterVec::new(
            Opts::new("fragment_transitions_total", "Vendor order status transitions"),
            &["from", "to"],
        )?;
        registry.register(Box::new(fragment_transitions.clone()))?;

        let lifecycle_failures = IntCounterVec::new(
            Opts::new("lifecycle_failures_total", "Rejected or failed lifecycle operations"),
            &["kind"],
        )?;
        registry.register(Box::new(lifecycle_failures.clone()))?;

        let auth_decisions = IntCounterVec::new(
            Opts::new("auth_decisions_total", "Authentication gate decisions"),
            &["outcome"],
        )?;
        registry.register(Box::new(auth_decisions.clone()))?;

        Ok(Self {
            registry,
            orders_created,
            fragments_created,
            order_transitions,
            fragment_transitions,
            lifecycle_failures,
            auth_decisions,
        })
    }

    /// Get the Prometheus registry for exposing metrics via HTTP
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Helper to record a created order and its fan-out
    pub fn record_order_created(&self, fragment_count: usize) {
        self.orders_created.inc();
        self.fragments_created.inc_by(fragment_count as u64);
    }

    /// Helper to record an order status transition
    pub fn record_order_transition(&self, from: &str, to: &str) {
        self.order_transitions.with_label_values(&[from, to]).inc();
    }

    /// Helper to record a vendor order status transition
    pub fn record_fragment_transition(&self, from: &str, to: &str) {
        self.fragment_transitions.with_label_values(&[from, to]).inc();
    }

    /// Helper to record a failed lifecycle operation
    pub fn record_lifecycle_failure(&self, kind: &str) {
        self.lifecycle_failures.with_label_values(&[kind]).inc();
    }

    /// Helper to record a gate decision (admitted, public, unauthenticated, forbidden)
    pub fn record_auth_decision(&self, outcome: &str) {
        self.auth_decisions.with_label_values(&[outcome]).inc();
    }
}
