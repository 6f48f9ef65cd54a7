use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root configuration for idlink.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub server: ServerConfig,
    pub line: LineConfig,
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Base URL used when building registration links shown to users.
    pub public_base_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            public_base_url: "http://localhost:3000".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct LineConfig {
    pub channel_secret: String,
    pub channel_access_token: String,
    /// Basic ID of the bot account (e.g. "@example"), used in chat deep-links.
    pub bot_basic_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoreConfig {
    /// Backend kind: "file" (default) or "firebase".
    pub backend: String,
    /// Firebase Realtime Database root URL, e.g. "https://<project>.firebaseio.com".
    pub database_url: String,
    /// Database secret or ID token appended as `?auth=`; empty means none.
    pub auth_token: String,
    /// Data directory for the file backend; empty means `~/.idlink/data`.
    pub data_dir: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: "file".to_string(),
            database_url: String::new(),
            auth_token: String::new(),
            data_dir: String::new(),
        }
    }
}

/// Get the default config file path.
pub fn get_config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".idlink")
        .join("config.json")
}

/// Get the idlink data directory.
pub fn get_data_dir() -> PathBuf {
    let path = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".idlink");
    std::fs::create_dir_all(&path).ok();
    path
}

/// Load configuration from file or fall back to defaults.
pub fn load_config(config_path: Option<&Path>) -> Config {
    let path = config_path
        .map(|p| p.to_path_buf())
        .unwrap_or_else(get_config_path);

    if path.exists() {
        match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<Config>(&content) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!("Failed to parse config from {}: {}", path.display(), e);
                    tracing::warn!("Using default configuration.");
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read config from {}: {}", path.display(), e);
                tracing::warn!("Using default configuration.");
            }
        }
    }

    Config::default()
}

/// Load configuration for deployment: full JSON from `IDLINK_CONFIG` if set,
/// otherwise the config file overlaid with individual environment variables.
pub fn load_config_from_env() -> Config {
    if let Ok(json) = std::env::var("IDLINK_CONFIG") {
        match serde_json::from_str::<Config>(&json) {
            Ok(config) => return config,
            Err(e) => {
                tracing::warn!("Failed to parse IDLINK_CONFIG: {}", e);
            }
        }
    }

    let mut cfg = load_config(None);

    if let Ok(v) = std::env::var("LINE_CHANNEL_SECRET") {
        cfg.line.channel_secret = v;
    }
    if let Ok(v) = std::env::var("LINE_CHANNEL_ACCESS_TOKEN") {
        cfg.line.channel_access_token = v;
    }
    if let Ok(v) = std::env::var("LINE_BOT_BASIC_ID") {
        cfg.line.bot_basic_id = v;
    }
    if let Ok(v) = std::env::var("FIREBASE_DATABASE_URL") {
        cfg.store.backend = "firebase".to_string();
        cfg.store.database_url = v;
    }
    if let Ok(v) = std::env::var("FIREBASE_AUTH_TOKEN") {
        cfg.store.auth_token = v;
    }
    if let Ok(v) = std::env::var("IDLINK_DATA_DIR") {
        cfg.store.data_dir = v;
    }
    if let Ok(v) = std::env::var("PUBLIC_BASE_URL") {
        cfg.server.public_base_url = v;
    }
    if let Ok(v) = std::env::var("PORT") {
        match v.parse() {
            Ok(port) => cfg.server.port = port,
            Err(_) => tracing::warn!("Ignoring non-numeric PORT: {}", v),
        }
    }

    cfg
}
