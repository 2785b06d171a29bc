use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;
use tracing::warn;

pub const CONFIG_FILE: &str = "messenger.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub database_url: String,
    pub data_dir: PathBuf,
    pub blob_base_url: String,
    pub request_timeout_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_url: "sqlite://./data/messenger.db".into(),
            data_dir: PathBuf::from("./data"),
            blob_base_url: storage::DEFAULT_BLOB_BASE_URL.into(),
            request_timeout_ms: 15_000,
        }
    }
}

impl Settings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    database_url: Option<String>,
    data_dir: Option<PathBuf>,
    blob_base_url: Option<String>,
    request_timeout_ms: Option<u64>,
}

pub fn load_settings() -> Settings {
    load_settings_from(Path::new(CONFIG_FILE), |key| std::env::var(key).ok())
}

/// Defaults, then `config_path` if it parses, then environment variables.
/// `APP__*` wins over `MESSENGER_*`.
pub fn load_settings_from(config_path: &Path, env: impl Fn(&str) -> Option<String>) -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(config_path) {
        match toml::from_str::<FileSettings>(&raw) {
            Ok(file_cfg) => {
                if let Some(v) = file_cfg.database_url {
                    settings.database_url = v;
                }
                if let Some(v) = file_cfg.data_dir {
                    settings.data_dir = v;
                }
                if let Some(v) = file_cfg.blob_base_url {
                    settings.blob_base_url = v;
                }
                if let Some(v) = file_cfg.request_timeout_ms {
                    settings.request_timeout_ms = v;
                }
            }
            Err(err) => warn!(path = %config_path.display(), "ignoring unreadable config: {err}"),
        }
    }

    for key in ["MESSENGER_DATABASE_URL", "APP__DATABASE_URL"] {
        if let Some(v) = env(key) {
            settings.database_url = v;
        }
    }
    for key in ["MESSENGER_DATA_DIR", "APP__DATA_DIR"] {
        if let Some(v) = env(key) {
            settings.data_dir = PathBuf::from(v);
        }
    }
    for key in ["MESSENGER_BLOB_BASE_URL", "APP__BLOB_BASE_URL"] {
        if let Some(v) = env(key) {
            settings.blob_base_url = v;
        }
    }
    for key in ["MESSENGER_REQUEST_TIMEOUT_MS", "APP__REQUEST_TIMEOUT_MS"] {
        if let Some(v) = env(key) {
            match v.parse::<u64>() {
                Ok(parsed) => settings.request_timeout_ms = parsed,
                Err(_) => warn!(key, value = %v, "ignoring non-numeric timeout"),
            }
        }
    }

    settings.database_url = normalize_database_url(&settings.database_url);
    settings
}

pub fn normalize_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return Settings::default().database_url;
    }

    if raw_database_url.starts_with("sqlite::memory:") || raw_database_url.contains("://") {
        return raw_database_url.to_string();
    }

    if let Some(path) = raw_database_url.strip_prefix("sqlite:") {
        return format!("sqlite://{}", path.replace('\\', "/"));
    }

    format!("sqlite://{}", raw_database_url.replace('\\', "/"))
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
