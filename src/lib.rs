// ============================================================================
// Marketplace Orders Service
// ============================================================================
//
// Layout:
// - auth/    - bearer token verification, access policy, request gate
// - domain/  - order lifecycle state machine and vendor statistics
// - store/   - persistence contracts with PostgreSQL and in-memory backends
// - api/     - actix-web routes and error mapping
// - metrics/ - Prometheus registry and scrape endpoint
// - config   - environment configuration
// - utils/   - start-up retry with exponential backoff
//
// ============================================================================

pub mod api;
pub mod auth;
pub mod config;
pub mod domain;
pub mod metrics;
pub mod store;
pub mod utils;
