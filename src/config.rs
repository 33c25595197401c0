//! Configuration management for ollama-chat.
//!
//! Configuration is loaded from `~/.config/ollama-chat/config.toml`; the server
//! address can also come from `OLLAMA_HOST` or the command line.

use crate::protocol::{ChatOptions, OptionValue};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable naming the Ollama server.
pub const HOST_ENV: &str = "OLLAMA_HOST";
pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 11434;
pub const DEFAULT_MODEL: &str = "llama3:latest";
/// Generation on a cold model can take minutes.
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Normalize a host into a base URL with an explicit scheme and port.
///
/// `None` or a blank string means `localhost`. Applying this to its own
/// output returns the same URL.
pub fn resolve_host(host: Option<&str>) -> String {
    let host = host
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .unwrap_or(DEFAULT_HOST)
        .trim_end_matches('/');

    let mut url = if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("http://{}", host)
    };

    let authority = url.rsplit("//").next().unwrap_or_default();
    if !authority.contains(':') {
        url = format!("{}:{}", url, DEFAULT_PORT);
    }

    url
}

/// Resolved server address and request timeout. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    base_url: String,
    timeout: Duration,
}

impl Endpoint {
    /// Build an endpoint from a raw host, resolving scheme and port.
    pub fn new(host: Option<&str>, timeout: Duration) -> Self {
        Self {
            base_url: resolve_host(host),
            timeout,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Absolute URL for an API path such as `/api/tags`.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Model used when none is given on the command line.
    #[serde(default = "default_model")]
    pub model: String,
    /// Server address; `OLLAMA_HOST` takes precedence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Model options sent with every chat request.
    #[serde(default = "default_options")]
    pub options: ChatOptions,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: default_model(),
            host: None,
            timeout_secs: default_timeout_secs(),
            options: default_options(),
        }
    }
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_options() -> ChatOptions {
    let mut options = ChatOptions::new();
    options.insert("temperature".to_string(), OptionValue::Float(0.7));
    options.insert("num_ctx".to_string(), OptionValue::Int(2048));
    options
}

impl Config {
    /// Get the config directory path.
    pub fn config_dir() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|p| p.join("ollama-chat"))
            .context("Could not determine config directory")
    }

    /// Get the config file path.
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from file, using defaults if not found.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            Self::parse(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    fn parse(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Pick the host by precedence: explicit flag, `OLLAMA_HOST`, config file.
    pub fn host<'a>(&'a self, flag: Option<&'a str>, env: Option<&'a str>) -> Option<&'a str> {
        flag.or(env).or(self.host.as_deref())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
