use viewguard_core::config::{
    PresenceConfig, DEFAULT_ANONYMOUS_NAME, DEFAULT_GUARD, DEFAULT_POLL_INTERVAL_SECS,
    DEFAULT_TAKE_CONTROL_ROLES,
};

use crate::auth::jwt::JwtConfig;

/// Default period of the store sweep in seconds.
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 300;

/// Which shared store holds the presence sets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    /// In-process store; only valid for a single API instance.
    Memory,
    /// Postgres table shared by every API instance.
    Postgres { database_url: String },
}

/// Server configuration loaded from environment variables.
///
/// All fields except the JWT secret have defaults suitable for local
/// development. In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// JWT token configuration.
    pub jwt: JwtConfig,
    /// Presence registry and lock policy.
    pub presence: PresenceConfig,
    pub store: StoreBackend,
    /// Period of the expired-value sweep in seconds (default: `300`).
    pub sweep_interval_secs: u64,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                        | Default                    |
    /// |--------------------------------|----------------------------|
    /// | `HOST`                         | `0.0.0.0`                  |
    /// | `PORT`                         | `3000`                     |
    /// | `CORS_ORIGINS`                 | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS`         | `30`                       |
    /// | `PRESENCE_POLL_INTERVAL_SECS`  | `10`                       |
    /// | `PRESENCE_LOCKABLE_TYPES`      | (none)                     |
    /// | `PRESENCE_TAKE_CONTROL_ROLES`  | `admin,editor`             |
    /// | `PRESENCE_DEFAULT_GUARD`       | `web`                      |
    /// | `PRESENCE_ANONYMOUS_NAME`      | `Guest`                    |
    /// | `PRESENCE_STORE`               | `memory`                   |
    /// | `DATABASE_URL`                 | required for `postgres`    |
    /// | `PRESENCE_SWEEP_INTERVAL_SECS` | `300`                      |
    ///
    /// # Panics
    ///
    /// Panics on unparsable or out-of-range values so misconfiguration fails
    /// fast at startup.
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins = parse_list(
            &std::env::var("CORS_ORIGINS").unwrap_or_else(|_| "http://localhost:5173".into()),
        );

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let jwt = JwtConfig::from_env();

        let presence = PresenceConfig {
            poll_interval_secs: std::env::var("PRESENCE_POLL_INTERVAL_SECS")
                .unwrap_or_else(|_| DEFAULT_POLL_INTERVAL_SECS.to_string())
                .parse()
                .expect("PRESENCE_POLL_INTERVAL_SECS must be a valid u64"),
            lockable_types: parse_list(
                &std::env::var("PRESENCE_LOCKABLE_TYPES").unwrap_or_default(),
            ),
            take_control_roles: parse_list(
                &std::env::var("PRESENCE_TAKE_CONTROL_ROLES")
                    .unwrap_or_else(|_| DEFAULT_TAKE_CONTROL_ROLES.join(",")),
            ),
            default_guard: std::env::var("PRESENCE_DEFAULT_GUARD")
                .unwrap_or_else(|_| DEFAULT_GUARD.into()),
            anonymous_name: std::env::var("PRESENCE_ANONYMOUS_NAME")
                .unwrap_or_else(|_| DEFAULT_ANONYMOUS_NAME.into()),
        };
        if let Err(msg) = presence.validate() {
            panic!("Invalid presence configuration: {msg}");
        }

        let store = parse_store_backend(
            &std::env::var("PRESENCE_STORE").unwrap_or_else(|_| "memory".into()),
            std::env::var("DATABASE_URL").ok(),
        )
        .unwrap_or_else(|msg| panic!("Invalid store configuration: {msg}"));

        let sweep_interval_secs: u64 = std::env::var("PRESENCE_SWEEP_INTERVAL_SECS")
            .unwrap_or_else(|_| DEFAULT_SWEEP_INTERVAL_SECS.to_string())
            .parse()
            .expect("PRESENCE_SWEEP_INTERVAL_SECS must be a valid u64");

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            jwt,
            presence,
            store,
            sweep_interval_secs,
        }
    }
}

/// Split a comma-separated list, trimming entries and dropping blanks.
pub fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Resolve the store backend from `PRESENCE_STORE` and `DATABASE_URL`.
pub fn parse_store_backend(kind: &str, database_url: Option<String>) -> Result<StoreBackend, String> {
    match kind.trim().to_ascii_lowercase().as_str() {
        "memory" => Ok(StoreBackend::Memory),
        "postgres" => database_url
            .filter(|url| !url.is_empty())
            .map(|database_url| StoreBackend::Postgres { database_url })
            .ok_or_else(|| "DATABASE_URL must be set when PRESENCE_STORE=postgres".to_string()),
        other => Err(format!(
            "PRESENCE_STORE must be 'memory' or 'postgres', got '{other}'"
        )),
    }
}
