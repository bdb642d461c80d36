use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::recommender::{DEFAULT_KEY_PREFIX, DEFAULT_MAX_RESULTS, DEFAULT_TEMP_KEY_PREFIX};

pub const CONFIG_FILE_CANDIDATES: [&str; 2] = ["cobuy.toml", "config/cobuy.toml"];

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub store: StoreConfig,
    pub recommender: RecommenderConfig,
    pub logging: LoggingConfig,
}

/// SQLite database holding the product catalog.
#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

/// Ranked store holding the association lists.
#[derive(Clone, Debug)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub url: SecretString,
    pub key_prefix: String,
    pub temp_key_prefix: String,
    pub operation_timeout_ms: u64,
    pub connect_timeout_ms: u64,
}

#[derive(Clone, Debug)]
pub struct RecommenderConfig {
    pub max_results: usize,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    Memory,
    Redis,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub database_max_connections: Option<u32>,
    pub store_backend: Option<StoreBackend>,
    pub store_url: Option<String>,
    pub max_results: Option<usize>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://cobuy.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            store: StoreConfig {
                backend: StoreBackend::Memory,
                url: secret_value("redis://127.0.0.1:6379/0".to_string()),
                key_prefix: DEFAULT_KEY_PREFIX.to_string(),
                temp_key_prefix: DEFAULT_TEMP_KEY_PREFIX.to_string(),
                operation_timeout_ms: 2_000,
                connect_timeout_ms: 1_000,
            },
            recommender: RecommenderConfig { max_results: DEFAULT_MAX_RESULTS },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "redis" => Ok(Self::Redis),
            other => Err(ConfigError::Validation(format!(
                "unsupported store backend `{other}` (expected memory|redis)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from(CONFIG_FILE_CANDIDATES[0]));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(store) = patch.store {
            if let Some(backend) = store.backend {
                self.store.backend = backend;
            }
            if let Some(store_url_value) = store.url {
                self.store.url = secret_value(store_url_value);
            }
            if let Some(key_prefix) = store.key_prefix {
                self.store.key_prefix = key_prefix;
            }
            if let Some(temp_key_prefix) = store.temp_key_prefix {
                self.store.temp_key_prefix = temp_key_prefix;
            }
            if let Some(operation_timeout_ms) = store.operation_timeout_ms {
                self.store.operation_timeout_ms = operation_timeout_ms;
            }
            if let Some(connect_timeout_ms) = store.connect_timeout_ms {
                self.store.connect_timeout_ms = connect_timeout_ms;
            }
        }

        if let Some(recommender) = patch.recommender {
            if let Some(max_results) = recommender.max_results {
                self.recommender.max_results = max_results;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("COBUY_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("COBUY_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_u32("COBUY_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("COBUY_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("COBUY_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("COBUY_STORE_BACKEND") {
            self.store.backend = value.parse()?;
        }
        if let Some(value) = read_env("COBUY_STORE_URL") {
            self.store.url = secret_value(value);
        }
        if let Some(value) = read_env("COBUY_STORE_KEY_PREFIX") {
            self.store.key_prefix = value;
        }
        if let Some(value) = read_env("COBUY_STORE_TEMP_KEY_PREFIX") {
            self.store.temp_key_prefix = value;
        }
        if let Some(value) = read_env("COBUY_STORE_OPERATION_TIMEOUT_MS") {
            self.store.operation_timeout_ms =
                parse_u64("COBUY_STORE_OPERATION_TIMEOUT_MS", &value)?;
        }
        if let Some(value) = read_env("COBUY_STORE_CONNECT_TIMEOUT_MS") {
            self.store.connect_timeout_ms = parse_u64("COBUY_STORE_CONNECT_TIMEOUT_MS", &value)?;
        }

        if let Some(value) = read_env("COBUY_RECOMMENDER_MAX_RESULTS") {
            self.recommender.max_results = parse_usize("COBUY_RECOMMENDER_MAX_RESULTS", &value)?;
        }

        let log_level = read_env("COBUY_LOGGING_LEVEL").or_else(|| read_env("COBUY_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format = read_env("COBUY_LOGGING_FORMAT").or_else(|| read_env("COBUY_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(max_connections) = overrides.database_max_connections {
            self.database.max_connections = max_connections;
        }
        if let Some(backend) = overrides.store_backend {
            self.store.backend = backend;
        }
        if let Some(store_url) = overrides.store_url {
            self.store.url = secret_value(store_url);
        }
        if let Some(max_results) = overrides.max_results {
            self.recommender.max_results = max_results;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_store(&self.store)?;
        validate_recommender(&self.recommender)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

pub fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    CONFIG_FILE_CANDIDATES.into_iter().map(PathBuf::from).find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_store(store: &StoreConfig) -> Result<(), ConfigError> {
    if store.backend == StoreBackend::Redis {
        let url = store.url.expose_secret().trim();
        if !url.starts_with("redis://") && !url.starts_with("rediss://") {
            return Err(ConfigError::Validation(
                "store.url must start with redis:// or rediss:// when store.backend is redis"
                    .to_string(),
            ));
        }
    }

    validate_key_prefix("store.key_prefix", &store.key_prefix)?;
    validate_key_prefix("store.temp_key_prefix", &store.temp_key_prefix)?;
    if store.key_prefix == store.temp_key_prefix {
        return Err(ConfigError::Validation(
            "store.temp_key_prefix must differ from store.key_prefix".to_string(),
        ));
    }

    if store.operation_timeout_ms == 0 || store.operation_timeout_ms > 60_000 {
        return Err(ConfigError::Validation(
            "store.operation_timeout_ms must be in range 1..=60000".to_string(),
        ));
    }

    if store.connect_timeout_ms == 0 || store.connect_timeout_ms > 60_000 {
        return Err(ConfigError::Validation(
            "store.connect_timeout_ms must be in range 1..=60000".to_string(),
        ));
    }

    Ok(())
}

fn validate_key_prefix(field: &str, prefix: &str) -> Result<(), ConfigError> {
    let invalid = prefix.is_empty() || prefix.contains(':') || prefix.contains(char::is_whitespace);
    if invalid {
        return Err(ConfigError::Validation(format!(
            "{field} must be non-empty and contain no whitespace or `:`"
        )));
    }
    Ok(())
}

fn validate_recommender(recommender: &RecommenderConfig) -> Result<(), ConfigError> {
    if recommender.max_results == 0 || recommender.max_results > 100 {
        return Err(ConfigError::Validation(
            "recommender.max_results must be in range 1..=100".to_string(),
        ));
    }
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.parse::<usize>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    store: Option<StorePatch>,
    recommender: Option<RecommenderPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct StorePatch {
    backend: Option<StoreBackend>,
    url: Option<String>,
    key_prefix: Option<String>,
    temp_key_prefix: Option<String>,
    operation_timeout_ms: Option<u64>,
    connect_timeout_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct RecommenderPatch {
    max_results: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat, StoreBackend};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn defaults_are_valid_and_use_memory_store() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let config = AppConfig::load(LoadOptions::default())
            .map_err(|err| format!("config load failed: {err}"))?;

        ensure(config.store.backend == StoreBackend::Memory, "default backend should be memory")?;
        ensure(config.recommender.max_results == 6, "default max_results should be six")?;
        ensure(config.store.key_prefix == "product", "default key prefix should be product")?;
        ensure(
            matches!(config.logging.format, LogFormat::Compact),
            "default logging format should be compact",
        )
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_COBUY_REDIS_URL", "redis://:hunter2@cache:6379/3");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("cobuy.toml");
            fs::write(
                &path,
                r#"
[store]
backend = "redis"
url = "${TEST_COBUY_REDIS_URL}"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.store.backend == StoreBackend::Redis, "backend should come from file")?;
            ensure(
                config.store.url.expose_secret() == "redis://:hunter2@cache:6379/3",
                "store url should be interpolated from environment",
            )
        })();

        clear_vars(&["TEST_COBUY_REDIS_URL"]);
        result
    }

    #[test]
    fn logging_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("COBUY_LOG_LEVEL", "warn");
        env::set_var("COBUY_LOG_FORMAT", "json");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.logging.level == "warn", "warning log level should be set from env var")?;
            ensure(
                matches!(config.logging.format, LogFormat::Json),
                "json logging format should be set from env var",
            )
        })();

        clear_vars(&["COBUY_LOG_LEVEL", "COBUY_LOG_FORMAT"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("COBUY_DATABASE_URL", "sqlite://from-env.db");
        env::set_var("COBUY_RECOMMENDER_MAX_RESULTS", "8");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("cobuy.toml");
            fs::write(
                &path,
                r#"
[database]
url = "sqlite://from-file.db"

[recommender]
max_results = 4

[store]
key_prefix = "shop"

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    database_url: Some("sqlite://from-override.db".to_string()),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.database.url == "sqlite://from-override.db",
                "override database url should win",
            )?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(config.recommender.max_results == 8, "env max_results should win over file")?;
            ensure(config.store.key_prefix == "shop", "file key prefix should win over default")
        })();

        clear_vars(&["COBUY_DATABASE_URL", "COBUY_RECOMMENDER_MAX_RESULTS"]);
        result
    }

    #[test]
    fn redis_backend_requires_redis_url() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("COBUY_STORE_BACKEND", "redis");
        env::set_var("COBUY_STORE_URL", "http://cache:6379");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("store.url")
            );
            ensure(has_message, "validation failure should mention store.url")
        })();

        clear_vars(&["COBUY_STORE_BACKEND", "COBUY_STORE_URL"]);
        result
    }

    #[test]
    fn temp_prefix_must_not_shadow_association_prefix() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("COBUY_STORE_TEMP_KEY_PREFIX", "product");

        let result = (|| -> Result<(), String> {
            let failed = matches!(
                AppConfig::load(LoadOptions::default()),
                Err(ConfigError::Validation(ref message)) if message.contains("temp_key_prefix")
            );
            ensure(failed, "identical prefixes should be rejected")
        })();

        clear_vars(&["COBUY_STORE_TEMP_KEY_PREFIX"]);
        result
    }

    #[test]
    fn invalid_numeric_env_override_is_reported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("COBUY_STORE_OPERATION_TIMEOUT_MS", "soon");

        let result = (|| -> Result<(), String> {
            let failed = matches!(
                AppConfig::load(LoadOptions::default()),
                Err(ConfigError::InvalidEnvOverride { ref key, .. })
                    if key == "COBUY_STORE_OPERATION_TIMEOUT_MS"
            );
            ensure(failed, "non-numeric timeout should be rejected")
        })();

        clear_vars(&["COBUY_STORE_OPERATION_TIMEOUT_MS"]);
        result
    }

    #[test]
    fn store_url_is_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let config = AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                store_backend: Some(StoreBackend::Redis),
                store_url: Some("redis://:secret-value@cache:6379".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .map_err(|err| format!("config load failed: {err}"))?;
        let debug = format!("{config:?}");

        ensure(!debug.contains("secret-value"), "debug output should not contain store url")
    }
}
