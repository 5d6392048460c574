use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GatewayConfig {
    pub server: ServerConfig,
    pub provider: ProvidersConfig,
    pub store: StoreConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub log_level: String,
}

#[derive(Debug, Default, Deserialize, Clone)]
#[serde(default)]
pub struct ProvidersConfig {
    pub local: LocalProviderConfig,
    pub ollama: OllamaProviderConfig,
}

/// Local ONNX provider settings. `enabled` controls the startup pre-load only;
/// the provider type stays loadable on demand either way.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LocalProviderConfig {
    pub enabled: bool,
    pub model: String,
    pub cache_dir: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct OllamaProviderConfig {
    pub enabled: bool,
    pub url: String,
    pub model: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StoreConfig {
    /// Backend kind: `default`/`sqlite` (embedded sqlite-vec) or `memory`.
    pub backend: String,
    pub db_path: String,
    pub collection: String,
    /// Model id used to synthesize embeddings when a caller supplies none.
    pub embedding: String,
    pub dimension: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            provider: ProvidersConfig::default(),
            store: StoreConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8000,
            log_level: "info".into(),
        }
    }
}

impl Default for LocalProviderConfig {
    fn default() -> Self {
        let cache_dir = default_vecgate_dir()
            .join("models")
            .to_string_lossy()
            .into_owned();
        Self {
            enabled: true,
            model: "all-MiniLM-L6-v2".into(),
            cache_dir,
        }
    }
}

impl Default for OllamaProviderConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: "http://127.0.0.1:11434".into(),
            model: "llama2".into(),
            timeout_secs: 30,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        let db_path = default_vecgate_dir()
            .join("documents.db")
            .to_string_lossy()
            .into_owned();
        Self {
            backend: "default".into(),
            db_path,
            collection: "default".into(),
            embedding: "default".into(),
            dimension: 384,
        }
    }
}

/// Returns `~/.vecgate/`
pub fn default_vecgate_dir() -> PathBuf {
    dirs::home_dir()
        .expect("home directory must exist")
        .join(".vecgate")
}

/// Returns the default config file path: `~/.vecgate/config.toml`
pub fn default_config_path() -> PathBuf {
    default_vecgate_dir().join("config.toml")
}

impl GatewayConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            GatewayConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides (VECGATE_DB, VECGATE_PORT,
    /// VECGATE_LOG_LEVEL, VECGATE_OLLAMA_URL).
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("VECGATE_DB") {
            self.store.db_path = val;
        }
        if let Ok(val) = std::env::var("VECGATE_PORT") {
            if let Ok(port) = val.parse() {
                self.server.port = port;
            }
        }
        if let Ok(val) = std::env::var("VECGATE_LOG_LEVEL") {
            self.server.log_level = val;
        }
        if let Ok(val) = std::env::var("VECGATE_OLLAMA_URL") {
            self.provider.ollama.url = val;
        }
    }

    /// Resolve the database path, expanding `~` if needed.
    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.store.db_path)
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        dirs::home_dir()
            .expect("home directory must exist")
            .join(rest)
    } else {
        PathBuf::from(path)
    }
}
