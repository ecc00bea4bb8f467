//! Configuration system for campusfin.
//!
//! Configuration is loaded from multiple sources with the following precedence:
//! 1. Environment variables (highest priority)
//! 2. `config.toml` file
//! 3. Default values (lowest priority)
//!
//! # Environment Variables
//!
//! - `CAMPUSFIN_SERVER_HOST` - Server bind address
//! - `CAMPUSFIN_SERVER_PORT` - Server port
//! - `CAMPUSFIN_DATABASE_TYPE` - "sqlite" or "postgres"
//! - `CAMPUSFIN_DATABASE_URL` - Database connection URL
//! - `CAMPUSFIN_JWT_SECRET` - JWT secret key for signing/validation
//! - `CAMPUSFIN_JWT_ISSUER` - JWT issuer claim
//! - `CAMPUSFIN_JWT_AUDIENCE` - JWT audience claim
//! - `CAMPUSFIN_TOKEN_EXPIRATION_SECS` - Token expiration time in seconds
//! - `CAMPUSFIN_DOCUMENT_DIR` - Directory for rendered invoice PDFs
//! - `CAMPUSFIN_PUBLIC_BASE_URL` - Base URL under which documents are served
//! - `CAMPUSFIN_JOBS_ENABLED` - Enable the background job scheduler
//! - `CAMPUSFIN_EXPIRY_CRON` - Cron expression for the enrollment expiry sweep
//! - `CAMPUSFIN_LOG_LEVEL` - Log level (trace, debug, info, warn, error)

use config::Config;
use serde::Deserialize;
use std::env;
use std::sync::OnceLock;

use crate::errors::{ServiceError, ServiceResult};

/// Global configuration singleton.
static CONFIG: OnceLock<CampusfinConfig> = OnceLock::new();

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CampusfinConfig {
    /// Server configuration
    pub server: ServerConfig,
    /// Database configuration
    pub database: DatabaseConfig,
    /// JWT authentication configuration
    pub auth: AuthConfig,
    /// Document storage configuration
    pub storage: StorageConfig,
    /// Background job configuration
    pub jobs: JobsConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3007,
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database type: "sqlite" or "postgres"
    pub db_type: String,
    /// SQLite connection URL
    pub sqlite_url: String,
    /// PostgreSQL connection URL
    pub postgres_url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            db_type: "sqlite".to_string(),
            sqlite_url: "sqlite://campusfin.db".to_string(),
            postgres_url: "postgres://localhost/campusfin".to_string(),
        }
    }
}

/// JWT authentication configuration.
///
/// Every route is role-gated, so a non-empty secret is required at startup.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// JWT secret key (use `env:VAR_NAME` to read from environment)
    pub jwt_secret: String,
    /// JWT issuer claim (iss)
    pub jwt_issuer: String,
    /// JWT audience claim (aud)
    pub jwt_audience: String,
    /// Token expiration time in seconds (default: 1 hour)
    pub token_expiration_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            jwt_issuer: "campusfin".to_string(),
            jwt_audience: "campusfin-api".to_string(),
            token_expiration_secs: 3600,
        }
    }
}

/// Document storage configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory where rendered invoice PDFs are written
    pub document_dir: String,
    /// Public base URL under which stored documents are reachable
    pub public_base_url: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            document_dir: "documents".to_string(),
            public_base_url: "http://127.0.0.1:3007/documents".to_string(),
        }
    }
}

/// Background job configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct JobsConfig {
    /// Whether the job scheduler runs at all
    pub enabled: bool,
    /// Cron expression for the enrollment expiry sweep (default: daily at midnight)
    pub enrollment_expiry_cron: String,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            enrollment_expiry_cron: "0 0 0 * * *".to_string(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl CampusfinConfig {
    /// Load configuration from file and environment.
    ///
    /// Configuration is loaded in this order (later sources override earlier):
    /// 1. Default values
    /// 2. `config.toml` file (optional)
    /// 3. Environment variables
    fn load() -> ServiceResult<Self> {
        let builder = Config::builder()
            // Start with defaults
            .set_default("server.host", "127.0.0.1")
            .map_err(|e| ServiceError::ConfigError(e.to_string()))?
            .set_default("server.port", 3007)
            .map_err(|e| ServiceError::ConfigError(e.to_string()))?
            .set_default("database.db_type", "sqlite")
            .map_err(|e| ServiceError::ConfigError(e.to_string()))?
            .set_default("database.sqlite_url", "sqlite://campusfin.db")
            .map_err(|e| ServiceError::ConfigError(e.to_string()))?
            .set_default("database.postgres_url", "postgres://localhost/campusfin")
            .map_err(|e| ServiceError::ConfigError(e.to_string()))?
            .set_default("auth.jwt_secret", "")
            .map_err(|e| ServiceError::ConfigError(e.to_string()))?
            .set_default("auth.jwt_issuer", "campusfin")
            .map_err(|e| ServiceError::ConfigError(e.to_string()))?
            .set_default("auth.jwt_audience", "campusfin-api")
            .map_err(|e| ServiceError::ConfigError(e.to_string()))?
            .set_default("auth.token_expiration_secs", 3600)
            .map_err(|e| ServiceError::ConfigError(e.to_string()))?
            .set_default("storage.document_dir", "documents")
            .map_err(|e| ServiceError::ConfigError(e.to_string()))?
            .set_default(
                "storage.public_base_url",
                "http://127.0.0.1:3007/documents",
            )
            .map_err(|e| ServiceError::ConfigError(e.to_string()))?
            .set_default("jobs.enabled", true)
            .map_err(|e| ServiceError::ConfigError(e.to_string()))?
            .set_default("jobs.enrollment_expiry_cron", "0 0 0 * * *")
            .map_err(|e| ServiceError::ConfigError(e.to_string()))?
            .set_default("logging.level", "info")
            .map_err(|e| ServiceError::ConfigError(e.to_string()))?
            // Load from config.toml (optional)
            .add_source(config::File::with_name("config").required(false))
            // Override with environment variables
            .set_override_option("server.host", env::var("CAMPUSFIN_SERVER_HOST").ok())
            .map_err(|e| ServiceError::ConfigError(e.to_string()))?
            .set_override_option(
                "server.port",
                env::var("CAMPUSFIN_SERVER_PORT")
                    .ok()
                    .and_then(|v| v.parse::<i64>().ok()),
            )
            .map_err(|e| ServiceError::ConfigError(e.to_string()))?
            .set_override_option("database.db_type", env::var("CAMPUSFIN_DATABASE_TYPE").ok())
            .map_err(|e| ServiceError::ConfigError(e.to_string()))?
            .set_override_option(
                "database.sqlite_url",
                env::var("CAMPUSFIN_DATABASE_URL")
                    .ok()
                    .filter(|url| url.starts_with("sqlite")),
            )
            .map_err(|e| ServiceError::ConfigError(e.to_string()))?
            .set_override_option(
                "database.postgres_url",
                env::var("CAMPUSFIN_DATABASE_URL")
                    .ok()
                    .filter(|url| url.starts_with("postgres")),
            )
            .map_err(|e| ServiceError::ConfigError(e.to_string()))?
            .set_override_option("auth.jwt_secret", env::var("CAMPUSFIN_JWT_SECRET").ok())
            .map_err(|e| ServiceError::ConfigError(e.to_string()))?
            .set_override_option("auth.jwt_issuer", env::var("CAMPUSFIN_JWT_ISSUER").ok())
            .map_err(|e| ServiceError::ConfigError(e.to_string()))?
            .set_override_option("auth.jwt_audience", env::var("CAMPUSFIN_JWT_AUDIENCE").ok())
            .map_err(|e| ServiceError::ConfigError(e.to_string()))?
            .set_override_option(
                "auth.token_expiration_secs",
                env::var("CAMPUSFIN_TOKEN_EXPIRATION_SECS")
                    .ok()
                    .and_then(|v| v.parse::<i64>().ok()),
            )
            .map_err(|e| ServiceError::ConfigError(e.to_string()))?
            .set_override_option(
                "storage.document_dir",
                env::var("CAMPUSFIN_DOCUMENT_DIR").ok(),
            )
            .map_err(|e| ServiceError::ConfigError(e.to_string()))?
            .set_override_option(
                "storage.public_base_url",
                env::var("CAMPUSFIN_PUBLIC_BASE_URL").ok(),
            )
            .map_err(|e| ServiceError::ConfigError(e.to_string()))?
            .set_override_option(
                "jobs.enabled",
                env::var("CAMPUSFIN_JOBS_ENABLED")
                    .ok()
                    .and_then(|v| v.parse::<bool>().ok()),
            )
            .map_err(|e| ServiceError::ConfigError(e.to_string()))?
            .set_override_option(
                "jobs.enrollment_expiry_cron",
                env::var("CAMPUSFIN_EXPIRY_CRON").ok(),
            )
            .map_err(|e| ServiceError::ConfigError(e.to_string()))?
            .set_override_option("logging.level", env::var("CAMPUSFIN_LOG_LEVEL").ok())
            .map_err(|e| ServiceError::ConfigError(e.to_string()))?;

        let settings = builder
            .build()
            .map_err(|e| ServiceError::ConfigError(format!("failed to build config: {e}")))?;

        settings
            .try_deserialize()
            .map_err(|e| ServiceError::ConfigError(format!("failed to deserialize config: {e}")))
    }

    /// Validate the configuration.
    pub fn validate(&self) -> ServiceResult<()> {
        if self.server.port == 0 {
            return Err(ServiceError::ConfigError(
                "server.port must be greater than 0".to_string(),
            ));
        }

        match self.database.db_type.as_str() {
            "sqlite" | "postgres" => {}
            other => {
                return Err(ServiceError::ConfigError(format!(
                    "database.db_type must be 'sqlite' or 'postgres', got '{other}'"
                )));
            }
        }

        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => {
                return Err(ServiceError::ConfigError(format!(
                    "logging.level must be one of: trace, debug, info, warn, error. Got '{other}'"
                )));
            }
        }

        if self.storage.document_dir.is_empty() {
            return Err(ServiceError::ConfigError(
                "storage.document_dir cannot be empty".to_string(),
            ));
        }

        if self.jobs.enabled && self.jobs.enrollment_expiry_cron.is_empty() {
            return Err(ServiceError::ConfigError(
                "jobs.enrollment_expiry_cron cannot be empty when jobs are enabled".to_string(),
            ));
        }

        Ok(())
    }
}

/// Get the global configuration.
///
/// This loads the configuration on first access and caches it.
/// Returns an error if configuration loading or validation fails.
pub fn get_config() -> ServiceResult<&'static CampusfinConfig> {
    // Check if already initialized
    if let Some(config) = CONFIG.get() {
        return Ok(config);
    }

    // Load and validate configuration
    let config = CampusfinConfig::load()?;
    config.validate()?;

    // Try to set it (ignore if another thread beat us)
    let _ = CONFIG.set(config.clone());

    // Return the stored config (either ours or another thread's)
    Ok(CONFIG.get().expect("config was just set"))
}

/// Initialize configuration explicitly.
///
/// Call this early in your application to catch configuration errors.
/// Returns the validated configuration.
pub fn init_config() -> ServiceResult<&'static CampusfinConfig> {
    get_config()
}
