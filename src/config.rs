//! Configuration management for Memori
//!
//! Layered as defaults < config file (TOML or JSON5) < environment
//! variables. Read once at startup and never re-read.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

use crate::memory::{local, Backend};
use crate::{Error, Result};

/// HTTP (OpenAI-compatible) embedding provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpEmbeddingConfig {
    /// Base URL; `/embeddings` and `/models` are appended
    pub endpoint: String,
    /// Model name sent with each request
    pub model: String,
    /// Optional bearer token
    #[serde(skip_serializing)]
    pub api_key: Option<SecretString>,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// Retries for transient failures
    pub max_retries: u32,
}

impl Default for HttpEmbeddingConfig {
    fn default() -> Self {
        HttpEmbeddingConfig {
            endpoint: "http://localhost:1234/v1".to_string(),
            model: "text-embedding-nomic-embed-text-v1.5".to_string(),
            api_key: None,
            timeout_secs: 30,
            max_retries: 2,
        }
    }
}

/// Local (fastembed) embedding provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalEmbeddingConfig {
    /// Set to false to never load a model
    pub enabled: bool,
    /// fastembed model name
    pub model: String,
}

impl Default for LocalEmbeddingConfig {
    fn default() -> Self {
        LocalEmbeddingConfig {
            enabled: true,
            model: "all-MiniLM-L6-v2".to_string(),
        }
    }
}

/// Search and embedding settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Backend to use when its provider is available
    pub preferred_backend: Backend,
    pub http: HttpEmbeddingConfig,
    pub local: LocalEmbeddingConfig,
    /// Cache embeddings by content fingerprint
    pub cache_embeddings: bool,
    /// Cache entry lifetime
    pub cache_ttl_seconds: u64,
    /// Upper bound on cached vectors
    pub cache_max_entries: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig {
            preferred_backend: Backend::Http,
            http: HttpEmbeddingConfig::default(),
            local: LocalEmbeddingConfig::default(),
            cache_embeddings: true,
            cache_ttl_seconds: 3600,
            cache_max_entries: 10_000,
        }
    }
}

/// MCP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind: "0.0.0.0".to_string(),
            port: 4004,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level filter
    pub level: String,
    /// Log format (pretty, json)
    pub format: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            level: "info,memori=debug".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub search: SearchConfig,
    pub server: ServerConfig,
    pub log: LogConfig,
}

/// Default config file location: `<config_dir>/memori/config.toml`
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("memori").join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("memori.toml"))
}

impl Config {
    /// Load configuration with layered precedence.
    ///
    /// `path` (or `MEMORI_CONFIG`) must exist when given; the default
    /// location is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        let explicit = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var("MEMORI_CONFIG").ok().map(PathBuf::from));

        let mut config = match explicit {
            Some(path) => Self::from_file(&path)?,
            None => {
                let path = default_config_path();
                if path.exists() {
                    Self::from_file(&path)?
                } else {
                    Config::default()
                }
            }
        };

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a config file, picking the format by extension
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;

        let extension = path.extension().and_then(|ext| ext.to_str());
        match extension {
            Some("toml") => toml::from_str(&content)
                .map_err(|e| Error::Config(format!("Invalid TOML config: {}", e))),
            Some("json") | Some("json5") => json5::from_str(&content)
                .map_err(|e| Error::Config(format!("Invalid JSON config: {}", e))),
            _ => json5::from_str(&content)
                .or_else(|_| toml::from_str(&content))
                .map_err(|e| Error::Config(format!("Failed to parse config: {}", e))),
        }
    }

    /// Overlay `MEMORI_*`, `RUST_LOG` and `LOG_FORMAT` from the environment
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    /// Overlay settings from any variable lookup
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let search = &mut self.search;

        if let Some(v) = lookup("MEMORI_PREFERRED_BACKEND") {
            search.preferred_backend = v.parse()?;
        }
        if let Some(v) = lookup("MEMORI_HTTP_ENDPOINT") {
            search.http.endpoint = v;
        }
        if let Some(v) = lookup("MEMORI_HTTP_MODEL") {
            search.http.model = v;
        }
        if let Some(v) = lookup("MEMORI_HTTP_API_KEY") {
            search.http.api_key = Some(SecretString::from(v));
        }
        if let Some(v) = lookup("MEMORI_HTTP_TIMEOUT") {
            search.http.timeout_secs = parse_var("MEMORI_HTTP_TIMEOUT", &v)?;
        }
        if let Some(v) = lookup("MEMORI_LOCAL_MODEL") {
            search.local.model = v;
        }
        if let Some(v) = lookup("MEMORI_LOCAL_ENABLED") {
            search.local.enabled = parse_bool("MEMORI_LOCAL_ENABLED", &v)?;
        }
        if let Some(v) = lookup("MEMORI_CACHE_EMBEDDINGS") {
            search.cache_embeddings = parse_bool("MEMORI_CACHE_EMBEDDINGS", &v)?;
        }
        if let Some(v) = lookup("MEMORI_CACHE_TTL") {
            search.cache_ttl_seconds = parse_var("MEMORI_CACHE_TTL", &v)?;
        }
        if let Some(v) = lookup("MEMORI_CACHE_MAX_ENTRIES") {
            search.cache_max_entries = parse_var("MEMORI_CACHE_MAX_ENTRIES", &v)?;
        }
        if let Some(v) = lookup("MEMORI_BIND") {
            self.server.bind = v;
        }
        if let Some(v) = lookup("MEMORI_PORT") {
            self.server.port = parse_var("MEMORI_PORT", &v)?;
        }
        if let Some(v) = lookup("RUST_LOG") {
            self.log.level = v;
        }
        if let Some(v) = lookup("LOG_FORMAT") {
            self.log.format = v;
        }
        Ok(())
    }

    /// Validate that the configuration is usable
    pub fn validate(&self) -> Result<()> {
        Url::parse(&self.search.http.endpoint).map_err(|e| {
            Error::Config(format!(
                "Invalid embedding endpoint {}: {}",
                self.search.http.endpoint, e
            ))
        })?;
        if self.search.http.timeout_secs == 0 {
            return Err(Error::Config("http.timeout_secs must be greater than 0".to_string()));
        }
        local::parse_model(&self.search.local.model)?;
        if !matches!(self.log.format.as_str(), "pretty" | "json") {
            return Err(Error::Config(format!(
                "Invalid log format: {}. Valid options: pretty, json",
                self.log.format
            )));
        }
        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| Error::Config(format!("Invalid value for {}: {} ({})", name, value, e)))
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(Error::Config(format!("Invalid value for {}: {}", name, value))),
    }
}
