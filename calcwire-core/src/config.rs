//! Configuration for calcwire processes.
//!
//! Maps directly to `calcwire.toml`. Every section and field is optional;
//! missing values fall back to the defaults below, which match the
//! command-line defaults of the three binaries.

use std::net::SocketAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::framer::DEFAULT_MAX_FRAME_LEN;

/// Top-level calcwire configuration, loadable from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CalcwireConfig {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,
    /// Compute server settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Caching proxy settings.
    #[serde(default)]
    pub proxy: ProxyConfig,
    /// Client settings.
    #[serde(default)]
    pub client: ClientConfig,
    /// Text-generation backend settings.
    #[serde(default)]
    pub llm: LlmConfig,
}

impl CalcwireConfig {
    /// Load configuration from a TOML string.
    ///
    /// # Errors
    /// Returns `CoreError::Config` if the TOML is invalid.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str).map_err(|e| CoreError::Config(e.to_string()))
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// General process settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

/// Compute server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Interface to bind.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to bind. `0` picks an ephemeral port.
    #[serde(default = "default_server_port")]
    pub port: u16,
    /// Capacity of the server-side result cache.
    #[serde(default = "default_server_cache")]
    pub cache_size: usize,
    /// Longest accepted request frame, delimiter excluded.
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,
}

impl ServerConfig {
    /// `host:port` string suitable for binding.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_server_port(),
            cache_size: default_server_cache(),
            max_frame_bytes: default_max_frame_bytes(),
        }
    }
}

/// Caching proxy settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Interface to listen on.
    #[serde(default = "default_host")]
    pub listen_host: String,
    /// Port to listen on.
    #[serde(default = "default_proxy_port")]
    pub listen_port: u16,
    /// Upstream compute server host.
    #[serde(default = "default_host")]
    pub server_host: String,
    /// Upstream compute server port.
    #[serde(default = "default_server_port")]
    pub server_port: u16,
    /// Capacity of the proxy-side envelope cache.
    #[serde(default = "default_proxy_cache")]
    pub cache_size: usize,
    /// Bound on one upstream exchange (connect, send, receive).
    #[serde(default = "default_5000")]
    pub upstream_timeout_ms: u64,
    /// Longest accepted request frame, delimiter excluded.
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,
}

impl ProxyConfig {
    /// `host:port` string suitable for binding.
    #[must_use]
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.listen_host, self.listen_port)
    }

    /// `host:port` string of the upstream server.
    #[must_use]
    pub fn upstream_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }

    /// Point the proxy at an already-resolved upstream address.
    pub fn set_upstream(&mut self, addr: SocketAddr) {
        self.server_host = addr.ip().to_string();
        self.server_port = addr.port();
    }

    /// Upstream timeout as a [`Duration`].
    #[must_use]
    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_millis(self.upstream_timeout_ms)
    }
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            listen_host: default_host(),
            listen_port: default_proxy_port(),
            server_host: default_host(),
            server_port: default_server_port(),
            cache_size: default_proxy_cache(),
            upstream_timeout_ms: default_5000(),
            max_frame_bytes: default_max_frame_bytes(),
        }
    }
}

/// Client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Target host (server or proxy).
    #[serde(default = "default_host")]
    pub host: String,
    /// Target port.
    #[serde(default = "default_server_port")]
    pub port: u16,
    /// Bound on one request/response exchange.
    #[serde(default = "default_5000")]
    pub timeout_ms: u64,
}

impl ClientConfig {
    /// `host:port` string of the target.
    #[must_use]
    pub fn target_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Exchange timeout as a [`Duration`].
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_server_port(),
            timeout_ms: default_5000(),
        }
    }
}

/// Text-generation backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Provider: "openai", "ollama", "none".
    #[serde(default = "default_openai")]
    pub provider: String,
    /// Provider base URL.
    #[serde(default = "default_openai_url")]
    pub base_url: String,
    /// Model name passed to the provider.
    #[serde(default = "default_model")]
    pub model: String,
    /// Environment variable holding the API key (OpenAI-compatible only).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// System prompt prepended to every generation.
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    /// Maximum tokens to generate.
    #[serde(default = "default_512")]
    pub max_tokens: u32,
    /// Sampling temperature.
    #[serde(default = "default_0_7")]
    pub temperature: f32,
    /// Per-request timeout.
    #[serde(default = "default_30000")]
    pub timeout_ms: u64,
    /// Retries after the first failed attempt.
    #[serde(default)]
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_openai(),
            base_url: default_openai_url(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            system_prompt: default_system_prompt(),
            max_tokens: default_512(),
            temperature: default_0_7(),
            timeout_ms: default_30000(),
            max_retries: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Serde default helpers
// ---------------------------------------------------------------------------

fn default_log_level() -> String { "info".to_string() }
fn default_host() -> String { "127.0.0.1".to_string() }
fn default_openai() -> String { "openai".to_string() }
fn default_openai_url() -> String { "https://api.openai.com".to_string() }
fn default_model() -> String { "gpt-4o-mini".to_string() }
fn default_api_key_env() -> String { "OPENAI_API_KEY".to_string() }
fn default_system_prompt() -> String { "You are a helpful and concise assistant.".to_string() }
fn default_server_port() -> u16 { 5555 }
fn default_proxy_port() -> u16 { 5554 }
fn default_server_cache() -> usize { 128 }
fn default_proxy_cache() -> usize { 256 }
fn default_max_frame_bytes() -> usize { DEFAULT_MAX_FRAME_LEN }
fn default_0_7() -> f32 { 0.7 }
fn default_512() -> u32 { 512 }
fn default_5000() -> u64 { 5000 }
fn default_30000() -> u64 { 30_000 }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_defaults() {
        let config = CalcwireConfig::from_toml("").expect("empty config parses");
        assert_eq!(config.server.port, 5555);
        assert_eq!(config.server.cache_size, 128);
        assert_eq!(config.proxy.listen_port, 5554);
        assert_eq!(config.proxy.cache_size, 256);
        assert_eq!(config.proxy.upstream_timeout_ms, 5000);
        assert_eq!(config.server.max_frame_bytes, 1 << 20);
        assert_eq!(config.proxy.max_frame_bytes, 1 << 20);
        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert_eq!(config.general.log_level, "info");
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = CalcwireConfig::from_toml(
            r#"
            [server]
            port = 6000

            [proxy]
            server_port = 6000
            cache_size = 8
            max_frame_bytes = 4096
            "#,
        )
        .expect("config parses");
        assert_eq!(config.server.port, 6000);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.proxy.upstream_addr(), "127.0.0.1:6000");
        assert_eq!(config.proxy.cache_size, 8);
        assert_eq!(config.proxy.max_frame_bytes, 4096);
        assert_eq!(config.server.max_frame_bytes, 1 << 20);
        assert_eq!(config.proxy.listen_addr(), "127.0.0.1:5554");
    }

    #[test]
    fn invalid_toml_is_config_error() {
        let err = CalcwireConfig::from_toml("[server]\nport = \"high\"").expect_err("port must be an integer");
        assert!(matches!(err, CoreError::Config(_)));
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("calcwire.toml");
        std::fs::write(&path, "[client]\ntimeout_ms = 250\n").expect("write config");
        let config = CalcwireConfig::from_file(&path).expect("config loads");
        assert_eq!(config.client.timeout(), Duration::from_millis(250));
    }

    #[test]
    fn set_upstream_overrides_host_and_port() {
        let mut proxy = ProxyConfig::default();
        proxy.set_upstream("10.0.0.7:7000".parse().expect("addr"));
        assert_eq!(proxy.upstream_addr(), "10.0.0.7:7000");
    }
}
