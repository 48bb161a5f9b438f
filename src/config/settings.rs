//! Application settings and configuration structures.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::time::Duration;

use crate::application::services::MessageStoreConfig;

/// Root configuration structure containing all application settings.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Server configuration (host, port)
    pub server: ServerSettings,

    /// Database configuration (PostgreSQL)
    pub database: DatabaseSettings,

    /// Token verification settings
    pub auth: AuthSettings,

    /// Snowflake ID generator settings
    pub snowflake: SnowflakeSettings,

    /// Message store and presence tuning
    pub chat: ChatSettings,

    /// WebSocket gateway configuration
    pub websocket: WebSocketSettings,

    /// CORS configuration
    pub cors: CorsSettings,

    /// Current environment (development, staging, production)
    pub environment: String,
}

/// Server binding configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    /// Host address to bind to (e.g., "0.0.0.0")
    pub host: String,

    /// Port number to listen on
    pub port: u16,
}

/// PostgreSQL database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    /// Database connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections to maintain
    pub min_connections: u32,

    /// Connection acquire timeout in seconds
    pub acquire_timeout: u64,
}

/// Token verification configuration. Tokens are issued by the platform's
/// auth service; this engine only verifies them.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthSettings {
    /// Shared secret for verifying platform-issued HS256 tokens
    pub jwt_secret: String,
}

/// Snowflake ID generator configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SnowflakeSettings {
    /// Machine/worker ID (0-31)
    pub machine_id: u16,
}

/// Message store and presence tuning.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatSettings {
    /// Maximum message body length in characters
    pub max_body_length: usize,

    /// History page size when the caller does not specify one
    pub default_page_size: i64,

    /// Hard cap on the history page size
    pub max_page_size: i64,

    /// Typing indicator lifetime without a fresh heartbeat
    pub typing_ttl_secs: u64,

    /// How long client message ids are remembered for deduplication
    pub dedup_retention_secs: u64,

    /// Retries of the append transaction before surfacing `Unavailable`
    pub append_retry_attempts: u32,

    /// Base backoff between append retries in milliseconds
    pub append_retry_backoff_ms: u64,
}

impl ChatSettings {
    /// Message store view of these settings.
    pub fn store_config(&self) -> MessageStoreConfig {
        MessageStoreConfig {
            max_body_length: self.max_body_length,
            default_page_size: self.default_page_size,
            max_page_size: self.max_page_size,
            dedup_retention: Duration::from_secs(self.dedup_retention_secs),
            append_retry_attempts: self.append_retry_attempts,
            append_retry_backoff: Duration::from_millis(self.append_retry_backoff_ms),
        }
    }
}

/// WebSocket gateway configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct WebSocketSettings {
    /// Maximum inbound message size in bytes
    /// Protects against DoS via oversized frames
    pub max_message_size: usize,

    /// Bounded outbound queue per session; overflow closes the session
    pub outbound_queue_size: usize,

    /// Window for the first (auth) frame in seconds
    pub auth_timeout_secs: u64,

    /// Idle window in seconds; no inbound frame closes the session
    pub idle_timeout_secs: u64,
}

/// CORS configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CorsSettings {
    /// Allowed origins (comma-separated in env)
    pub allowed_origins: Vec<String>,
}

/// Minimum required length for the JWT secret (256 bits = 32 bytes)
pub const MIN_JWT_SECRET_LENGTH: usize = 32;

impl Settings {
    /// Load settings from environment variables and configuration files.
    ///
    /// The loading order is:
    /// 1. config/default.toml (base configuration)
    /// 2. config/{RUN_ENV}.toml (environment-specific overrides)
    /// 3. Environment variables (highest priority)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if configuration cannot be loaded or parsed,
    /// or if the JWT secret is too short.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        // Determine the running environment
        let environment = std::env::var("RUN_ENV").unwrap_or_else(|_| "development".into());

        Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("database.acquire_timeout", 30)?
            .set_default("snowflake.machine_id", 1)?
            .set_default("chat.max_body_length", 4000_i64)?
            .set_default("chat.default_page_size", 50_i64)?
            .set_default("chat.max_page_size", 100_i64)?
            .set_default("chat.typing_ttl_secs", 10_i64)?
            .set_default("chat.dedup_retention_secs", 300_i64)?
            .set_default("chat.append_retry_attempts", 3_i64)?
            .set_default("chat.append_retry_backoff_ms", 50_i64)?
            .set_default("websocket.max_message_size", 65536_i64)? // 64KB
            .set_default("websocket.outbound_queue_size", 256_i64)?
            .set_default("websocket.auth_timeout_secs", 30_i64)?
            .set_default("websocket.idle_timeout_secs", 300_i64)?
            .set_default("cors.allowed_origins", vec!["http://localhost:3000"])?
            // Load from config files
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Load from environment variables
            // APP__SERVER__PORT=3000 -> server.port = 3000
            .add_source(
                Environment::default()
                    .prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            // Map simple environment variables
            .set_override_option("server.host", std::env::var("SERVER_HOST").ok())?
            .set_override_option("server.port", std::env::var("SERVER_PORT").ok())?
            .set_override_option("database.url", std::env::var("DATABASE_URL").ok())?
            .set_override_option("auth.jwt_secret", std::env::var("JWT_SECRET").ok())?
            .set_override_option(
                "snowflake.machine_id",
                std::env::var("SNOWFLAKE_MACHINE_ID").ok(),
            )?
            .build()?
            .try_deserialize()
            .and_then(|settings: Self| {
                // Verification shares the platform secret; a short one is a
                // deployment mistake.
                if settings.auth.jwt_secret.len() < MIN_JWT_SECRET_LENGTH {
                    return Err(ConfigError::Message(format!(
                        "JWT secret must be at least {} characters. Current length: {}",
                        MIN_JWT_SECRET_LENGTH,
                        settings.auth.jwt_secret.len()
                    )));
                }
                Ok(settings)
            })
    }

    /// Get the full server address as a string.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl ServerSettings {
    /// Get the socket address for binding.
    pub fn socket_addr(&self) -> std::net::SocketAddr {
        format!("{}:{}", self.host, self.port)
            .parse()
            .expect("Invalid server address configuration")
    }
}
