//! Server configuration.
//!
//! Values are layered, later sources winning:
//!
//! | Layer | Example |
//! |---|---|
//! | built-in defaults | `server.port = 4000` |
//! | YAML file (optional) | `server: { port: 8080 }` |
//! | environment | `LOADGRAPH_SERVER__PORT=9090` |
//!
//! ```ignore
//! let config = match path {
//!     Some(path) => ServerConfig::load(path)?,
//!     None => ServerConfig::from_env()?,
//! };
//! ```

use std::fmt;
use std::path::Path;

use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

/// Prefix of configuration environment variables.
pub const ENV_PREFIX: &str = "LOADGRAPH";

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub server: ServerSettings,
    pub storage: StorageSettings,
    pub loader: LoaderSettings,
    pub logging: LoggingSettings,
    pub metrics: MetricsSettings,
}

/// Listener settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Upper bound on producing one response.
    pub request_timeout_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 4000,
            request_timeout_secs: 30,
        }
    }
}

/// Storage implementation backing the server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Process-local tables, lost on restart.
    #[default]
    Memory,
    Sqlite,
}

impl StorageBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageBackend::Memory => "memory",
            StorageBackend::Sqlite => "sqlite",
        }
    }
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageSettings {
    pub backend: StorageBackend,
    /// Required for `sqlite`, e.g. `sqlite://loadgraph.db`.
    pub database_url: Option<String>,
    pub pool_size: u32,
    pub connection_timeout_secs: u64,
    /// Replace every row with the sample users and posts at startup.
    pub seed: bool,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            database_url: None,
            pool_size: 5,
            connection_timeout_secs: 5,
            seed: true,
        }
    }
}

/// Settings applied to the loaders of every resolution pass.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoaderSettings {
    /// Keys per bulk query. `0` dispatches each flush as one query.
    pub max_batch_size: usize,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// One of `trace`, `debug`, `info`, `warn`, `error`. `RUST_LOG` takes
    /// precedence when set.
    pub level: String,
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
        }
    }
}

/// Prometheus endpoint settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct MetricsSettings {
    pub enabled: bool,
    pub path: String,
}

impl Default for MetricsSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            path: "/metrics".into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    /// A source could not be read or did not deserialize.
    #[error("failed to load configuration: {0}")]
    Load(#[from] ConfigError),

    #[error("configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("invalid configuration: {message}")]
    Invalid { message: String },
}

fn invalid(message: impl Into<String>) -> ConfigLoadError {
    ConfigLoadError::Invalid {
        message: message.into(),
    }
}

impl ServerConfig {
    /// Reads `path` as YAML over the defaults, then applies `LOADGRAPH_*`
    /// environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigLoadError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ConfigLoadError::FileNotFound {
                path: path.display().to_string(),
            });
        }
        Self::build(Some(path))
    }

    /// Defaults plus `LOADGRAPH_*` environment overrides.
    pub fn from_env() -> Result<Self, ConfigLoadError> {
        Self::build(None)
    }

    fn build(path: Option<&Path>) -> Result<Self, ConfigLoadError> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Yaml));
        }

        let loaded: Self = builder.add_source(environment()).build()?.try_deserialize()?;
        loaded.validate()?;
        Ok(loaded)
    }

    /// Checks cross-field constraints that deserialization cannot express.
    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        if self.server.port == 0 {
            return Err(invalid("server.port must be non-zero"));
        }

        if self.server.request_timeout_secs == 0 {
            return Err(invalid("server.request_timeout_secs must be non-zero"));
        }

        let has_url = self
            .storage
            .database_url
            .as_deref()
            .is_some_and(|url| !url.trim().is_empty());
        if self.storage.backend == StorageBackend::Sqlite && !has_url {
            return Err(invalid("storage.database_url is required for the sqlite backend"));
        }

        if self.storage.pool_size == 0 {
            return Err(invalid("storage.pool_size must be at least 1"));
        }

        let level = self.logging.level.to_ascii_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            return Err(invalid(format!(
                "logging.level '{}' is not one of {}",
                self.logging.level,
                LOG_LEVELS.join(", ")
            )));
        }

        if self.metrics.enabled && !self.metrics.path.starts_with('/') {
            return Err(invalid(format!(
                "metrics.path '{}' must begin with '/'",
                self.metrics.path
            )));
        }

        Ok(())
    }
}

/// `LOADGRAPH_LOADER__MAX_BATCH_SIZE` maps to `loader.max_batch_size`.
fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use serial_test::serial;
    use tempfile::NamedTempFile;

    use super::*;

    fn yaml(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    /// Runs `f` with `vars` set, removing them afterwards.
    fn with_env<T>(vars: &[(&str, &str)], f: impl FnOnce() -> T) -> T {
        for (key, value) in vars {
            std::env::set_var(key, value);
        }
        let result = f();
        for (key, _) in vars {
            std::env::remove_var(key);
        }
        result
    }

    #[test]
    fn test_defaults_serve_seeded_memory_store() {
        let config = ServerConfig::default();

        config.validate().unwrap();
        assert_eq!(config.server.port, 4000);
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert!(config.storage.seed);
        assert_eq!(config.loader.max_batch_size, 0);
        assert_eq!(config.metrics.path, "/metrics");
    }

    #[test]
    #[serial]
    fn test_yaml_sections_override_defaults() {
        let file = yaml(
            "storage:\n  backend: sqlite\n  database_url: sqlite://data/loadgraph.db\n  seed: false\n\
             loader:\n  max_batch_size: 50\n\
             logging:\n  level: DEBUG\n  json: true\n",
        );

        let config = ServerConfig::load(file.path()).unwrap();

        assert_eq!(config.storage.backend, StorageBackend::Sqlite);
        assert_eq!(
            config.storage.database_url.as_deref(),
            Some("sqlite://data/loadgraph.db")
        );
        assert!(!config.storage.seed);
        assert_eq!(config.loader.max_batch_size, 50);
        assert!(config.logging.json);
        // Untouched sections keep their defaults.
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.storage.pool_size, 5);
    }

    #[test]
    #[serial]
    fn test_environment_wins_over_file() {
        let file = yaml("server:\n  port: 8080\n  request_timeout_secs: 10\n");

        let config = with_env(
            &[
                ("LOADGRAPH_SERVER__PORT", "9191"),
                ("LOADGRAPH_LOADER__MAX_BATCH_SIZE", "25"),
            ],
            || ServerConfig::load(file.path()),
        )
        .unwrap();

        assert_eq!(config.server.port, 9191);
        assert_eq!(config.server.request_timeout_secs, 10);
        assert_eq!(config.loader.max_batch_size, 25);
    }

    #[test]
    #[serial]
    fn test_from_env_selects_sqlite() {
        let config = with_env(
            &[
                ("LOADGRAPH_STORAGE__BACKEND", "sqlite"),
                ("LOADGRAPH_STORAGE__DATABASE_URL", "sqlite::memory:"),
            ],
            ServerConfig::from_env,
        )
        .unwrap();

        assert_eq!(config.storage.backend, StorageBackend::Sqlite);
        assert_eq!(config.storage.database_url.as_deref(), Some("sqlite::memory:"));
    }

    #[test]
    #[serial]
    fn test_unknown_backend_fails_to_deserialize() {
        let file = yaml("storage:\n  backend: postgres\n");

        let err = ServerConfig::load(file.path()).unwrap_err();

        assert!(matches!(err, ConfigLoadError::Load(_)));
    }

    #[test]
    fn test_sqlite_requires_database_url() {
        for url in [None, Some(""), Some("  ")] {
            let mut config = ServerConfig::default();
            config.storage.backend = StorageBackend::Sqlite;
            config.storage.database_url = url.map(str::to_string);

            let err = config.validate().unwrap_err();
            assert!(err.to_string().contains("database_url"), "for {url:?}");
        }
    }

    #[test]
    fn test_validation_names_offending_field() {
        let cases: [(fn(&mut ServerConfig), &str); 5] = [
            (|c| c.server.port = 0, "server.port"),
            (|c| c.server.request_timeout_secs = 0, "request_timeout_secs"),
            (|c| c.storage.pool_size = 0, "pool_size"),
            (|c| c.logging.level = "verbose".into(), "logging.level"),
            (|c| c.metrics.path = "metrics".into(), "metrics.path"),
        ];

        for (mutate, field) in cases {
            let mut config = ServerConfig::default();
            mutate(&mut config);

            let err = config.validate().unwrap_err();
            assert!(matches!(err, ConfigLoadError::Invalid { .. }));
            assert!(err.to_string().contains(field), "{err} should mention {field}");
        }
    }

    #[test]
    fn test_disabled_metrics_skip_path_check() {
        let mut config = ServerConfig::default();
        config.metrics.enabled = false;
        config.metrics.path = String::new();

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_or_malformed_file() {
        let err = ServerConfig::load("/nonexistent/loadgraph.yaml").unwrap_err();
        assert!(matches!(err, ConfigLoadError::FileNotFound { .. }));

        let file = yaml("server: [unclosed\n");
        let err = ServerConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigLoadError::Load(_)));
    }
}
