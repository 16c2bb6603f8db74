use std::env;
use std::net::SocketAddr;

// ============================================================================
// Configuration - environment variables
// ============================================================================
//
// DATABASE_URL              required
// JWT_SECRET                required, at least 32 bytes
// JWT_LEEWAY_SECS           default 0
// HTTP_ADDR                 default 0.0.0.0:8080
// METRICS_PORT              default 9090
// DB_MAX_CONNECTIONS        default 10
// CRITICAL_STOCK_THRESHOLD  default 5
//
// ============================================================================

pub const MIN_SECRET_LEN: usize = 32;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} not set")]
    Missing(&'static str),

    #[error("Invalid {key} value '{value}': {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_leeway_secs: u64,
    pub http_addr: SocketAddr,
    pub metrics_port: u16,
    pub db_max_connections: u32,
    pub critical_stock_threshold: i32,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("database_url", &"<redacted>")
            .field("jwt_secret", &"<redacted>")
            .field("jwt_leeway_secs", &self.jwt_leeway_secs)
            .field("http_addr", &self.http_addr)
            .field("metrics_port", &self.metrics_port)
            .field("db_max_connections", &self.db_max_connections)
            .field("critical_stock_threshold", &self.critical_stock_threshold)
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from the process environment.
    ///
    /// A `.env` file is loaded first when present.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |key: &'static str| {
            lookup(key)
                .filter(|value| !value.trim().is_empty())
                .ok_or(ConfigError::Missing(key))
        };

        let jwt_secret = required("JWT_SECRET")?;
        if jwt_secret.len() < MIN_SECRET_LEN {
            return Err(ConfigError::Invalid {
                key: "JWT_SECRET",
                value: "<redacted>".to_string(),
                reason: format!("must be at least {} bytes", MIN_SECRET_LEN),
            });
        }

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            jwt_secret,
            jwt_leeway_secs: parse_or_default(&lookup, "JWT_LEEWAY_SECS", 0)?,
            http_addr: parse_or_default(&lookup, "HTTP_ADDR", SocketAddr::from(([0, 0, 0, 0], 8080)))?,
            metrics_port: parse_or_default(&lookup, "METRICS_PORT", 9090)?,
            db_max_connections: positive(parse_or_default(&lookup, "DB_MAX_CONNECTIONS", 10)?, "DB_MAX_CONNECTIONS")?,
            critical_stock_threshold: parse_or_default(&lookup, "CRITICAL_STOCK_THRESHOLD", 5)?,
        })
    }
}

fn parse_or_default<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(value) if !value.trim().is_empty() => {
            value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
                key,
                reason: e.to_string(),
                value,
            })
        }
        _ => Ok(default),
    }
}

fn positive(value: u32, key: &'static str) -> Result<u32, ConfigError> {
    if value == 0 {
        return Err(ConfigError::Invalid {
            key,
            value: value.to_string(),
            reason: "must be greater than 0".to_string(),
        });
    }
    Ok(value)
}
