//! Env-driven configuration for the gateway.
//!
//! Values are read from the process environment; `dotenv` is loaded on demand
//! by the binary. Provider credentials, the model identifiers, the Redis URL
//! and the access key are required; everything else has a default.
use std::env;
use std::net::{IpAddr, SocketAddr};

use crate::error::{AppError, AppResult};

pub const DEFAULT_REPLICATE_API_URL: &str = "https://api.replicate.com/v1";

#[derive(Clone)]
pub struct Config {
    pub replicate_api_token: String,
    pub replicate_api_url: String,
    pub replicate_model: String,
    pub replicate_model_version: String,
    pub redis_url: String,
    pub api_access_key: String,
    pub api_host: String,
    pub api_port: String,
    pub trigger_word: String,
    pub require_trigger_word: bool,
    pub list_max_results: usize,
}

impl Config {
    pub fn dotenv_load() {
        dotenv::dotenv().ok();
    }

    pub fn new() -> AppResult<Self> {
        Ok(Config {
            replicate_api_token: required("REPLICATE_API_TOKEN")?,
            replicate_api_url: env::var("REPLICATE_API_URL")
                .unwrap_or_else(|_| DEFAULT_REPLICATE_API_URL.to_string()),
            replicate_model: required("REPLICATE_MODEL")?,
            replicate_model_version: required("REPLICATE_MODEL_VERSION")?,
            redis_url: required("REDIS_URL")?,
            api_access_key: required("API_ACCESS_KEY")?,
            api_host: env::var("API_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            api_port: env::var("API_PORT").unwrap_or_else(|_| "8000".to_string()),
            trigger_word: env::var("TRIGGER_WORD").unwrap_or_else(|_| "TOK".to_string()),
            require_trigger_word: parse_flag(
                env::var("REQUIRE_TRIGGER_WORD").ok().as_deref(),
                true,
            ),
            list_max_results: env::var("LIST_MAX_RESULTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(500),
        })
    }

    /// Socket address to bind, falling back to 127.0.0.1:8000 on bad input.
    pub fn socket_address(&self) -> SocketAddr {
        let ip: IpAddr = self.api_host.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid API_HOST '{}', falling back to 127.0.0.1", self.api_host);
            IpAddr::from([127, 0, 0, 1])
        });
        let port: u16 = self.api_port.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid API_PORT '{}', falling back to 8000", self.api_port);
            8000
        });
        SocketAddr::new(ip, port)
    }

    pub fn log_summary(&self) {
        tracing::info!("REPLICATE_API_URL: {}", self.replicate_api_url);
        tracing::info!("REPLICATE_API_TOKEN: {}", mask(&self.replicate_api_token));
        tracing::info!("REPLICATE_MODEL: {}", self.replicate_model);
        tracing::info!("REPLICATE_MODEL_VERSION: {}", self.replicate_model_version);
        // Credentials sit before '@' in a Redis URL
        let redis_host = self.redis_url.rsplit('@').next().unwrap_or(&self.redis_url);
        tracing::info!("REDIS_URL: {}", redis_host);
        tracing::info!("API_ACCESS_KEY: {}", mask(&self.api_access_key));
        tracing::info!(
            "TRIGGER_WORD: {} (required: {})",
            self.trigger_word,
            self.require_trigger_word
        );
        tracing::info!("LIST_MAX_RESULTS: {}", self.list_max_results);
    }
}

fn required(name: &str) -> AppResult<String> {
    match env::var(name) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        Ok(_) => Err(AppError::Config(format!("{} is empty", name))),
        Err(_) => Err(AppError::Config(format!("{} is not set", name))),
    }
}

fn parse_flag(value: Option<&str>, default: bool) -> bool {
    match value.map(|v| v.trim().to_ascii_lowercase()) {
        Some(v) if v == "1" || v == "true" || v == "yes" => true,
        Some(v) if v == "0" || v == "false" || v == "no" => false,
        _ => default,
    }
}

fn mask(secret: &str) -> String {
    if secret.chars().count() <= 4 {
        "****".to_string()
    } else {
        format!("{}****", secret.chars().take(4).collect::<String>())
    }
}
