use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Role carried in the token's `role` claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Buyer,
    Vendor,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Buyer => "BUYER",
            Role::Vendor => "VENDOR",
            Role::Admin => "ADMIN",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    /// Case-insensitive. PROVIDER is accepted for VENDOR, USER and CUSTOMER for BUYER.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BUYER" | "USER" | "CUSTOMER" => Ok(Role::Buyer),
            "VENDOR" | "PROVIDER" => Ok(Role::Vendor),
            "ADMIN" => Ok(Role::Admin),
            _ => Err(UnknownRole(s.to_string())),
        }
    }
}

/// Verified caller, inserted into request extensions by the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedIdentity {
    pub subject: String,
    pub role: Role,
    /// Unix seconds
    pub expires_at: i64,
}

impl AuthenticatedIdentity {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}
