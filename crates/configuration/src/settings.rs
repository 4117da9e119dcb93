use crate::error::ConfigError;
use crate::secret::Secret;
use serde::Deserialize;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

/// The root configuration structure for the entire application.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: ConnectionConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Checks the cross-field constraints serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.socket_addr()?;
        self.database.validate()
    }
}

/// Where the HTTP API listens.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|_| ConfigError::InvalidAddress(self.host.clone()))?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Everything needed to open and run the database pool.
/// Loaded once at startup and never mutated afterwards.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    /// The database (catalog) name, e.g. "adventureworks".
    pub database: String,
    pub user: String,
    pub password: Secret,
    /// Negotiate TLS with the server.
    pub encrypt: bool,
    /// Accept the server certificate without verifying it (self-signed dev servers).
    pub trust_server_certificate: bool,
    /// Upper bound for a single connection attempt.
    pub connect_timeout_ms: u64,
    /// Upper bound for a single statement round trip.
    pub request_timeout_ms: u64,
    pub health_check_timeout_ms: u64,
    /// How long shutdown waits for checked-out connections to come back.
    pub shutdown_timeout_ms: u64,
    pub pool: PoolConfig,
    pub retry: RetryConfig,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            database: "adventureworks".to_string(),
            user: "postgres".to_string(),
            password: Secret::default(),
            encrypt: false,
            trust_server_certificate: true,
            connect_timeout_ms: 30_000,
            request_timeout_ms: 60_000,
            health_check_timeout_ms: 5_000,
            shutdown_timeout_ms: 10_000,
            pool: PoolConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

impl ConnectionConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn health_check_timeout(&self) -> Duration {
        Duration::from_millis(self.health_check_timeout_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    /// Strips credentials out of a message before it is logged or returned to a client.
    pub fn redact(&self, text: &str) -> String {
        self.password.scrub(text)
    }

    /// `host:port/database`, safe to log.
    pub fn describe(&self) -> String {
        format!("{}:{}/{}", self.host, self.port, self.database)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::ValidationError("database.host must not be empty".into()));
        }
        if self.database.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "database.database must not be empty".into(),
            ));
        }
        if self.pool.max_connections == 0 {
            return Err(ConfigError::ValidationError(
                "database.pool.max_connections must be at least 1".into(),
            ));
        }
        if self.pool.min_connections > self.pool.max_connections {
            return Err(ConfigError::ValidationError(format!(
                "database.pool.min_connections ({}) exceeds max_connections ({})",
                self.pool.min_connections, self.pool.max_connections
            )));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "database.retry.max_attempts must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Bounds of the connection pool.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub min_connections: u32,
    pub max_connections: u32,
    /// Idle connections above `min_connections` are closed after this long.
    pub idle_timeout_ms: u64,
    /// How long a request waits for a free connection before failing.
    pub acquire_timeout_ms: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min_connections: 1,
            max_connections: 5,
            idle_timeout_ms: 30_000,
            acquire_timeout_ms: 60_000,
        }
    }
}

impl PoolConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }
}

/// Retry behaviour of the connect phase. Nothing else is ever retried.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    /// Fixed pause between two failed attempts.
    pub delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay_ms: 2_000,
        }
    }
}

impl RetryConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

/// Output format of the log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum LogFormat {
    #[default]
    Full,
    Compact,
    Pretty,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// An `EnvFilter` directive string. `RUST_LOG` wins when set.
    pub filter: String,
    pub format: LogFormat,
    /// When set, logs also go to a daily-rotated file in this directory.
    pub directory: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info,tower_http=debug".to_string(),
            format: LogFormat::default(),
            directory: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.database.retry.max_attempts, 3);
        assert_eq!(config.database.retry.delay(), Duration::from_secs(2));
        assert_eq!(config.database.pool.max_connections, 5);
        assert_eq!(config.server.socket_addr().unwrap().port(), 3000);
    }

    #[test]
    fn rejects_inverted_pool_bounds() {
        let mut config = ConnectionConfig::default();
        config.pool.min_connections = 6;
        assert!(matches!(config.validate(), Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn rejects_zero_attempts() {
        let mut config = ConnectionConfig::default();
        config.retry.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_unparseable_listen_host() {
        let server = ServerConfig {
            host: "not an ip".into(),
            port: 3000,
        };
        assert!(matches!(server.socket_addr(), Err(ConfigError::InvalidAddress(_))));
    }

    #[test]
    fn redact_and_debug_hide_the_password() {
        let config = ConnectionConfig {
            password: Secret::new("p4ss"),
            ..ConnectionConfig::default()
        };
        assert!(!format!("{config:?}").contains("p4ss"));
        assert_eq!(config.redact("auth failed for p4ss"), "auth failed for ***");
        assert_eq!(config.describe(), "localhost:5432/adventureworks");
    }
}
