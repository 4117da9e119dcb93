//! # Configuration
//!
//! Loads the application settings in three layers: built-in defaults, an
//! optional TOML file, then environment variables (`DB_SERVER`, `DB_PORT`, ...).
//! Also owns logging initialisation, since the log settings live here.

use crate::error::ConfigError;
use std::path::Path;

// Declare the modules that make up this crate.
pub mod error;
pub mod logging;
pub mod secret;
pub mod settings;

// Re-export the core types to provide a clean public API.
pub use logging::init_tracing;
pub use secret::Secret;
pub use settings::{
    Config, ConnectionConfig, LogFormat, LoggingConfig, PoolConfig, RetryConfig, ServerConfig,
};

/// Name of the settings file looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "config.toml";

/// Environment variable to configuration key.
pub const ENV_OVERRIDES: &[(&str, &str)] = &[
    ("HOST", "server.host"),
    ("PORT", "server.port"),
    ("DB_SERVER", "database.host"),
    ("DB_PORT", "database.port"),
    ("DB_NAME", "database.database"),
    ("DB_USER", "database.user"),
    ("DB_PASSWORD", "database.password"),
    ("DB_ENCRYPT", "database.encrypt"),
    ("DB_TRUST_SERVER_CERTIFICATE", "database.trust_server_certificate"),
    ("DB_CONNECT_TIMEOUT_MS", "database.connect_timeout_ms"),
    ("DB_REQUEST_TIMEOUT_MS", "database.request_timeout_ms"),
    ("DB_HEALTH_CHECK_TIMEOUT_MS", "database.health_check_timeout_ms"),
    ("DB_SHUTDOWN_TIMEOUT_MS", "database.shutdown_timeout_ms"),
    ("DB_POOL_MIN", "database.pool.min_connections"),
    ("DB_POOL_MAX", "database.pool.max_connections"),
    ("DB_POOL_IDLE_TIMEOUT_MS", "database.pool.idle_timeout_ms"),
    ("DB_POOL_ACQUIRE_TIMEOUT_MS", "database.pool.acquire_timeout_ms"),
    ("DB_CONNECT_MAX_ATTEMPTS", "database.retry.max_attempts"),
    ("DB_CONNECT_RETRY_DELAY_MS", "database.retry.delay_ms"),
    ("LOG_FILTER", "logging.filter"),
    ("LOG_FORMAT", "logging.format"),
    ("LOG_DIR", "logging.directory"),
];

/// Loads the application configuration.
///
/// When `path` is given the file must exist; otherwise `config.toml` in the
/// working directory is used if present. Environment variables override both.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    load_config_with(path, |name| std::env::var(name).ok())
}

/// Same as [`load_config`], with the environment supplied by `lookup`.
pub fn load_config_with<F>(path: Option<&Path>, lookup: F) -> Result<Config, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut builder = config::Config::builder();
    builder = match path {
        Some(path) => builder.add_source(config::File::from(path).required(true)),
        None => builder.add_source(config::File::with_name(DEFAULT_CONFIG_FILE).required(false)),
    };

    for (variable, key) in ENV_OVERRIDES {
        let value = lookup(variable).filter(|v| !v.is_empty());
        builder = builder.set_override_option(*key, value)?;
    }

    // Attempt to deserialize the entire configuration into our `Config` struct
    let config = builder.build()?.try_deserialize::<Config>()?;
    config.validate()?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn environment_overrides_defaults() {
        let config = load_config_with(
            None,
            env(&[
                ("DB_SERVER", "db.internal"),
                ("DB_PORT", "6543"),
                ("DB_PASSWORD", "s3cret"),
                ("DB_ENCRYPT", "true"),
                ("DB_POOL_MAX", "12"),
                ("PORT", "8080"),
            ]),
        )
        .unwrap();

        assert_eq!(config.database.host, "db.internal");
        assert_eq!(config.database.port, 6543);
        assert_eq!(config.database.password.expose(), "s3cret");
        assert!(config.database.encrypt);
        assert_eq!(config.database.pool.max_connections, 12);
        assert_eq!(config.database.pool.min_connections, 1);
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn file_values_sit_between_defaults_and_environment() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[database]
host = "from-file"
database = "sales"

[database.retry]
max_attempts = 5
"#
        )
        .unwrap();

        let config =
            load_config_with(Some(file.path()), env(&[("DB_SERVER", "from-env")])).unwrap();

        assert_eq!(config.database.host, "from-env");
        assert_eq!(config.database.database, "sales");
        assert_eq!(config.database.retry.max_attempts, 5);
        assert_eq!(config.database.retry.delay_ms, 2_000);
    }

    #[test]
    fn invalid_values_fail_validation() {
        let result = load_config_with(None, env(&[("DB_POOL_MIN", "9"), ("DB_POOL_MAX", "2")]));
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let result = load_config_with(Some(Path::new("/definitely/not/here.toml")), env(&[]));
        assert!(matches!(result, Err(ConfigError::LoadError(_))));
    }
}
