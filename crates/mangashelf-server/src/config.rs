//! Server configuration from environment variables.

use std::env;
use std::str::FromStr;

use mangashelf_core::UserId;
use mangashelf_store::DEFAULT_LOW_BALANCE_THRESHOLD;

/// Which storage backend the server runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// PostgreSQL, configured through `DATABASE_URL`.
    Postgres,
    /// In-process tables; state is lost on restart.
    Memory,
}

impl FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "memory" => Ok(Self::Memory),
            other => Err(ConfigError::InvalidValue {
                name: "STORE_BACKEND".to_string(),
                reason: format!("expected 'postgres' or 'memory', got '{other}'"),
            }),
        }
    }
}

impl std::fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Postgres => "postgres",
            Self::Memory => "memory",
        })
    }
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Storage backend.
    pub store_backend: StoreBackend,
    /// Server port to listen on.
    pub port: u16,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
    /// CORS allowed origins (comma-separated or "*" for all).
    pub cors_allowed_origins: String,
    /// HS256 secret for bearer tokens.
    pub jwt_secret: String,
    /// Accept the `X-User-Id` header as identity.
    pub allow_dev_identity: bool,
    /// Users granted admin rights at startup.
    pub bootstrap_admins: Vec<UserId>,
    /// Balance below which purchases trigger a low-balance notification.
    pub low_balance_threshold: i64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            store_backend: StoreBackend::Postgres,
            port: 3000,
            log_level: "info".to_string(),
            cors_allowed_origins: "*".to_string(),
            jwt_secret: String::new(),
            allow_dev_identity: false,
            bootstrap_admins: Vec::new(),
            low_balance_threshold: DEFAULT_LOW_BALANCE_THRESHOLD,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Optional:
    /// - `STORE_BACKEND`: `postgres` or `memory` (default: postgres)
    /// - `PORT`: Server port (default: 3000)
    /// - `LOG_LEVEL`: Logging level (default: "info")
    /// - `CORS_ALLOWED_ORIGINS`: Allowed CORS origins (default: "*")
    /// - `JWT_SECRET`: Token secret, required unless dev identity is allowed
    /// - `ALLOW_DEV_IDENTITY`: Accept `X-User-Id` (default: false)
    /// - `BOOTSTRAP_ADMINS`: Comma-separated admin user ids
    /// - `LOW_BALANCE_THRESHOLD`: Coins (default: 10)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let store_backend = match lookup("STORE_BACKEND") {
            Some(value) => value.parse()?,
            None => defaults.store_backend,
        };

        let port = match lookup("PORT") {
            Some(value) => value.parse().map_err(|_| ConfigError::InvalidValue {
                name: "PORT".to_string(),
                reason: format!("'{value}' is not a port number"),
            })?,
            None => defaults.port,
        };

        let log_level = lookup("LOG_LEVEL").unwrap_or(defaults.log_level);
        let cors_allowed_origins =
            lookup("CORS_ALLOWED_ORIGINS").unwrap_or(defaults.cors_allowed_origins);

        let allow_dev_identity = lookup("ALLOW_DEV_IDENTITY")
            .map(|s| matches!(s.trim().to_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        let jwt_secret = lookup("JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() && !allow_dev_identity {
            return Err(ConfigError::MissingEnvVar("JWT_SECRET".to_string()));
        }

        let bootstrap_admins = lookup("BOOTSTRAP_ADMINS")
            .map(|s| {
                s.split(',')
                    .map(str::trim)
                    .filter(|id| !id.is_empty())
                    .map(UserId::from)
                    .collect()
            })
            .unwrap_or_default();

        let low_balance_threshold = match lookup("LOW_BALANCE_THRESHOLD") {
            Some(value) => value.parse().map_err(|_| ConfigError::InvalidValue {
                name: "LOW_BALANCE_THRESHOLD".to_string(),
                reason: format!("'{value}' is not a whole number of coins"),
            })?,
            None => defaults.low_balance_threshold,
        };

        Ok(Self {
            store_backend,
            port,
            log_level,
            cors_allowed_origins,
            jwt_secret,
            allow_dev_identity,
            bootstrap_admins,
            low_balance_threshold,
        })
    }

    /// Get the socket address for the server.
    pub fn socket_addr(&self) -> std::net::SocketAddr {
        std::net::SocketAddr::from(([0, 0, 0, 0], self.port))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    /// Invalid environment variable value.
    #[error("invalid value for environment variable {name}: {reason}")]
    InvalidValue { name: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_default_values() {
        let config = ServerConfig::from_lookup(lookup(&[("JWT_SECRET", "s3cret")])).unwrap();

        assert_eq!(config.store_backend, StoreBackend::Postgres);
        assert_eq!(config.port, 3000);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.cors_allowed_origins, "*");
        assert!(!config.allow_dev_identity);
        assert!(config.bootstrap_admins.is_empty());
        assert_eq!(config.low_balance_threshold, 10);
    }

    #[test]
    fn test_jwt_secret_required_without_dev_identity() {
        let result = ServerConfig::from_lookup(lookup(&[]));
        assert!(matches!(result, Err(ConfigError::MissingEnvVar(name)) if name == "JWT_SECRET"));

        let config =
            ServerConfig::from_lookup(lookup(&[("ALLOW_DEV_IDENTITY", "true")])).unwrap();
        assert!(config.allow_dev_identity);
    }

    #[test]
    fn test_parses_backend_and_admins() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("JWT_SECRET", "s3cret"),
            ("STORE_BACKEND", "Memory"),
            ("BOOTSTRAP_ADMINS", " alice, ,bob "),
            ("LOW_BALANCE_THRESHOLD", "25"),
        ]))
        .unwrap();

        assert_eq!(config.store_backend, StoreBackend::Memory);
        assert_eq!(
            config.bootstrap_admins,
            vec![UserId::from("alice"), UserId::from("bob")]
        );
        assert_eq!(config.low_balance_threshold, 25);
    }

    #[test]
    fn test_rejects_unknown_backend() {
        let result = ServerConfig::from_lookup(lookup(&[
            ("JWT_SECRET", "s3cret"),
            ("STORE_BACKEND", "sqlite"),
        ]));
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }
}
