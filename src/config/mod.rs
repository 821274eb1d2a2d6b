//! Environment configuration.

pub mod error;

#[cfg(test)]
mod tests;

pub use error::ConfigError;

use crate::constants::{
    DEFAULT_CACHE_MAX_SIZE, DEFAULT_SIMILARITY_THRESHOLD, DEFAULT_TTL_SECONDS,
};
use std::env;
use std::net::IpAddr;
use std::path::PathBuf;

/// Process-wide configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP port the gateway listens on.
    pub port: u16,
    /// Address the gateway binds to.
    pub bind_addr: IpAddr,
    /// Directory holding `config.json`/`model.safetensors`/`tokenizer.json` for
    /// the real BERT-based encoder. When unset, the deterministic encoder is
    /// used instead.
    pub embedding_model_dir: Option<PathBuf>,
    /// Default `max_size` for the semantic cache.
    pub cache_max_size: usize,
    /// Default per-tenant TTL (seconds) for new tenants.
    pub default_ttl_seconds: u64,
    /// Default per-tenant similarity threshold for new tenants.
    pub default_similarity_threshold: f32,
    /// Base URL of the upstream LLM provider.
    pub upstream_url: String,
    /// Bearer token sent to the upstream provider, if it requires one.
    pub upstream_api_key: Option<String>,
    /// When `false`, admin-only destructive endpoints (`POST /cache/clear`)
    /// are reachable only with a matching confirmation token.
    pub production_mode: bool,
    /// Token required by `POST /cache/clear` outside production mode.
    pub admin_confirmation_token: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            bind_addr: IpAddr::V4(std::net::Ipv4Addr::new(127, 0, 0, 1)),
            embedding_model_dir: None,
            cache_max_size: DEFAULT_CACHE_MAX_SIZE,
            default_ttl_seconds: DEFAULT_TTL_SECONDS,
            default_similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            upstream_url: "https://api.openai.com/v1/chat/completions".to_string(),
            upstream_api_key: None,
            production_mode: true,
            admin_confirmation_token: None,
        }
    }
}

impl Config {
    const ENV_PORT: &'static str = "PROXYGATE_PORT";
    const ENV_BIND_ADDR: &'static str = "PROXYGATE_BIND_ADDR";
    const ENV_EMBEDDING_MODEL_DIR: &'static str = "PROXYGATE_EMBEDDING_MODEL_DIR";
    const ENV_CACHE_MAX_SIZE: &'static str = "PROXYGATE_CACHE_MAX_SIZE";
    const ENV_DEFAULT_TTL_SECONDS: &'static str = "PROXYGATE_DEFAULT_TTL_SECONDS";
    const ENV_DEFAULT_SIMILARITY_THRESHOLD: &'static str =
        "PROXYGATE_DEFAULT_SIMILARITY_THRESHOLD";
    const ENV_UPSTREAM_URL: &'static str = "PROXYGATE_UPSTREAM_URL";
    const ENV_UPSTREAM_API_KEY: &'static str = "PROXYGATE_UPSTREAM_API_KEY";
    const ENV_PRODUCTION_MODE: &'static str = "PROXYGATE_PRODUCTION_MODE";
    const ENV_ADMIN_CONFIRMATION_TOKEN: &'static str = "PROXYGATE_ADMIN_CONFIRMATION_TOKEN";

    /// Loads configuration from environment variables, falling back to
    /// [`Default`] for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let port = Self::parse_port_from_env(defaults.port)?;
        let bind_addr = Self::parse_bind_addr_from_env(defaults.bind_addr)?;
        let embedding_model_dir = Self::parse_optional_path_from_env(Self::ENV_EMBEDDING_MODEL_DIR);
        let cache_max_size =
            Self::parse_usize_from_env(Self::ENV_CACHE_MAX_SIZE, defaults.cache_max_size);
        let default_ttl_seconds =
            Self::parse_u64_from_env(Self::ENV_DEFAULT_TTL_SECONDS, defaults.default_ttl_seconds);
        let default_similarity_threshold = Self::parse_f32_from_env(
            Self::ENV_DEFAULT_SIMILARITY_THRESHOLD,
            defaults.default_similarity_threshold,
        );
        let upstream_url =
            Self::parse_string_from_env(Self::ENV_UPSTREAM_URL, defaults.upstream_url);
        let upstream_api_key = env::var(Self::ENV_UPSTREAM_API_KEY).ok();
        let production_mode =
            Self::parse_bool_from_env(Self::ENV_PRODUCTION_MODE, defaults.production_mode);
        let admin_confirmation_token = env::var(Self::ENV_ADMIN_CONFIRMATION_TOKEN).ok();

        Ok(Self {
            port,
            bind_addr,
            embedding_model_dir,
            cache_max_size,
            default_ttl_seconds,
            default_similarity_threshold,
            upstream_url,
            upstream_api_key,
            production_mode,
            admin_confirmation_token,
        })
    }

    /// Validates filesystem-backed fields.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(ref path) = self.embedding_model_dir {
            if !path.exists() {
                return Err(ConfigError::PathNotFound { path: path.clone() });
            }
            if !path.is_dir() {
                return Err(ConfigError::NotADirectory { path: path.clone() });
            }
        }

        Ok(())
    }

    /// Formats `bind_addr:port` for [`tokio::net::TcpListener::bind`].
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }

    fn parse_port_from_env(default: u16) -> Result<u16, ConfigError> {
        match env::var(Self::ENV_PORT) {
            Ok(value) => {
                let port: u16 = value.parse().map_err(|e| ConfigError::PortParseError {
                    value: value.clone(),
                    source: e,
                })?;

                if port == 0 {
                    return Err(ConfigError::InvalidPort { value });
                }

                Ok(port)
            }
            Err(_) => Ok(default),
        }
    }

    fn parse_bind_addr_from_env(default: IpAddr) -> Result<IpAddr, ConfigError> {
        match env::var(Self::ENV_BIND_ADDR) {
            Ok(value) => value
                .parse()
                .map_err(|e| ConfigError::InvalidBindAddr { value, source: e }),
            Err(_) => Ok(default),
        }
    }

    fn parse_optional_path_from_env(var_name: &str) -> Option<PathBuf> {
        env::var(var_name)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
    }

    fn parse_string_from_env(var_name: &str, default: String) -> String {
        env::var(var_name).unwrap_or(default)
    }

    fn parse_usize_from_env(var_name: &str, default: usize) -> usize {
        env::var(var_name)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    fn parse_u64_from_env(var_name: &str, default: u64) -> u64 {
        env::var(var_name)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    fn parse_f32_from_env(var_name: &str, default: f32) -> f32 {
        env::var(var_name)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    fn parse_bool_from_env(var_name: &str, default: bool) -> bool {
        env::var(var_name)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }
}
