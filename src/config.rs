/// Configuration management for Tasklane
use crate::error::{ApiError, ApiResult};
use serde::{Deserialize, Serialize};
use std::env;

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub service: ServiceConfig,
    pub database: DatabaseConfig,
    pub authentication: AuthConfig,
    pub pagination: PaginationConfig,
    pub logging: LoggingConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub hostname: String,
    pub port: u16,
}

/// Database connection pool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Example: "sqlite://./data/tasklane.sqlite"
    pub url: String,
    pub max_connections: u32,
    /// Maximum lifetime of a connection in seconds
    pub max_lifetime: u64,
    /// Idle timeout for connections in seconds
    pub idle_timeout: u64,
}

/// Token signing and password hashing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    /// Issuer claim stamped on every token
    pub issuer: String,
    /// Access token lifetime in minutes
    pub access_exp_minutes: i64,
    /// Refresh token lifetime in hours
    pub refresh_exp_hours: i64,
    /// Argon2 time cost
    pub hash_cost: u32,
}

/// Listing and bulk insert configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationConfig {
    /// Rows per page
    pub limit: i64,
    /// Rows per INSERT statement once a batch is chunked
    pub batch_size: usize,
    /// Batches at least this large are inserted in chunks
    pub limit_insert: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directives, `RUST_LOG` syntax
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> ApiResult<Self> {
        dotenv::dotenv().ok();

        let hostname = env::var("TASKLANE_HOSTNAME").unwrap_or_else(|_| "localhost".to_string());
        let port = env::var("TASKLANE_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .map_err(|_| ApiError::Config("Invalid port number".to_string()))?;

        let url = env::var("TASKLANE_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./data/tasklane.sqlite".to_string());
        let max_connections = env::var("TASKLANE_DB_MAX_CONNECTIONS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(100);
        let max_lifetime = env::var("TASKLANE_DB_MAX_LIFETIME_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(1800); // 30 minutes
        let idle_timeout = env::var("TASKLANE_DB_IDLE_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(300); // 5 minutes

        let jwt_secret = env::var("TASKLANE_JWT_SECRET")
            .map_err(|_| ApiError::Config("JWT secret required".to_string()))?;
        let issuer = env::var("TASKLANE_JWT_ISSUER").unwrap_or_else(|_| "tasklane".to_string());
        let access_exp_minutes: i64 = env::var("TASKLANE_JWT_EXP_MINUTES")
            .unwrap_or_else(|_| "15".to_string())
            .parse()
            .map_err(|_| ApiError::Config("Invalid token expiry".to_string()))?;
        // Falls back to the minute value read as hours
        let refresh_exp_hours = match env::var("TASKLANE_REFRESH_EXP_HOURS") {
            Ok(v) => v
                .parse()
                .map_err(|_| ApiError::Config("Invalid refresh token expiry".to_string()))?,
            Err(_) => access_exp_minutes,
        };
        let hash_cost = env::var("TASKLANE_PASSWORD_HASH_COST")
            .unwrap_or_else(|_| "2".to_string())
            .parse()
            .map_err(|_| ApiError::Config("Invalid password hash cost".to_string()))?;

        let limit = env::var("TASKLANE_PAGE_LIMIT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(10);
        let batch_size = env::var("TASKLANE_BATCH_SIZE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(100);
        let limit_insert = env::var("TASKLANE_LIMIT_INSERT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(100);

        let log_level = env::var("RUST_LOG")
            .unwrap_or_else(|_| "tasklane=debug,tower_http=debug".to_string());
        let log_json = env::var("TASKLANE_LOG_JSON")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        Ok(ServerConfig {
            service: ServiceConfig { hostname, port },
            database: DatabaseConfig {
                url,
                max_connections,
                max_lifetime,
                idle_timeout,
            },
            authentication: AuthConfig {
                jwt_secret,
                issuer,
                access_exp_minutes,
                refresh_exp_hours,
                hash_cost,
            },
            pagination: PaginationConfig {
                limit,
                batch_size,
                limit_insert,
            },
            logging: LoggingConfig {
                level: log_level,
                json: log_json,
            },
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> ApiResult<()> {
        if self.service.hostname.is_empty() {
            return Err(ApiError::Config("Hostname cannot be empty".to_string()));
        }

        if self.authentication.jwt_secret.len() < 32 {
            return Err(ApiError::Config(
                "JWT secret must be at least 32 characters".to_string(),
            ));
        }

        if self.authentication.access_exp_minutes <= 0 || self.authentication.refresh_exp_hours <= 0 {
            return Err(ApiError::Config(
                "Token lifetimes must be positive".to_string(),
            ));
        }

        if self.authentication.hash_cost == 0 {
            return Err(ApiError::Config(
                "Password hash cost must be at least 1".to_string(),
            ));
        }

        if self.pagination.limit <= 0 || self.pagination.batch_size == 0 {
            return Err(ApiError::Config(
                "Page limit and batch size must be positive".to_string(),
            ));
        }

        if self.database.max_connections == 0 {
            return Err(ApiError::Config(
                "Database pool needs at least one connection".to_string(),
            ));
        }

        Ok(())
    }
}
