//! Bearer-token authentication and route access control.
//!
//! - `token`: HS256 compact token signing and verification
//! - `policy`: method + path pattern rules
//! - `gate`: request admission, wired as actix-web middleware

mod gate;
mod identity;
mod policy;
mod token;

pub use gate::{authenticate, extract_bearer, AuthError, AuthGate};
pub use identity::{AuthenticatedIdentity, Role, UnknownRole};
pub use policy::{default_rules, Access, AccessPolicy, AccessRule, ResolvedAccess};
pub use token::{Claims, TokenError, TokenVerifier};
