use std::env;
use std::fs;
use std::path::Path;

use secrecy::ExposeSecret;
use toml::Value;

use cobuy_core::config::{resolve_config_path, AppConfig, LoadOptions};
use cobuy_store::redact_url;

struct Field<'a> {
    key_path: &'static str,
    env_keys: &'static [&'static str],
    value: &'a str,
}

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = resolve_config_path(None);
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let max_connections = config.database.max_connections.to_string();
    let timeout_secs = config.database.timeout_secs.to_string();
    let backend = format!("{:?}", config.store.backend).to_ascii_lowercase();
    let store_url = redact_url(config.store.url.expose_secret());
    let operation_timeout_ms = config.store.operation_timeout_ms.to_string();
    let connect_timeout_ms = config.store.connect_timeout_ms.to_string();
    let max_results = config.recommender.max_results.to_string();
    let log_format = format!("{:?}", config.logging.format).to_ascii_lowercase();

    let fields = [
        Field {
            key_path: "database.url",
            env_keys: &["COBUY_DATABASE_URL"],
            value: &config.database.url,
        },
        Field {
            key_path: "database.max_connections",
            env_keys: &["COBUY_DATABASE_MAX_CONNECTIONS"],
            value: &max_connections,
        },
        Field {
            key_path: "database.timeout_secs",
            env_keys: &["COBUY_DATABASE_TIMEOUT_SECS"],
            value: &timeout_secs,
        },
        Field { key_path: "store.backend", env_keys: &["COBUY_STORE_BACKEND"], value: &backend },
        Field { key_path: "store.url", env_keys: &["COBUY_STORE_URL"], value: &store_url },
        Field {
            key_path: "store.key_prefix",
            env_keys: &["COBUY_STORE_KEY_PREFIX"],
            value: &config.store.key_prefix,
        },
        Field {
            key_path: "store.temp_key_prefix",
            env_keys: &["COBUY_STORE_TEMP_KEY_PREFIX"],
            value: &config.store.temp_key_prefix,
        },
        Field {
            key_path: "store.operation_timeout_ms",
            env_keys: &["COBUY_STORE_OPERATION_TIMEOUT_MS"],
            value: &operation_timeout_ms,
        },
        Field {
            key_path: "store.connect_timeout_ms",
            env_keys: &["COBUY_STORE_CONNECT_TIMEOUT_MS"],
            value: &connect_timeout_ms,
        },
        Field {
            key_path: "recommender.max_results",
            env_keys: &["COBUY_RECOMMENDER_MAX_RESULTS"],
            value: &max_results,
        },
        Field {
            key_path: "logging.level",
            env_keys: &["COBUY_LOGGING_LEVEL", "COBUY_LOG_LEVEL"],
            value: &config.logging.level,
        },
        Field {
            key_path: "logging.format",
            env_keys: &["COBUY_LOGGING_FORMAT", "COBUY_LOG_FORMAT"],
            value: &log_format,
        },
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in &fields {
        let source = field_source(
            field.key_path,
            field.env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(field.key_path, field.value, source));
    }

    lines.join("\n")
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}
