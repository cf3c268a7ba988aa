//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// The protected application requests are forwarded to.
    pub upstream: UpstreamConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Decision service settings.
    pub validation: ValidationConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Upstream application configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Application address (e.g., "127.0.0.1:3000").
    pub address: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:3000".to_string(),
        }
    }
}

/// Timeout configuration for the inbound side.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Decision service and descriptor settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Disable to run as a plain pass-through proxy.
    pub enabled: bool,

    /// Validation endpoint of the decision service.
    pub endpoint: String,

    /// Server-side authentication key. Overridden by `GATEWAY_SERVER_KEY`.
    pub server_key: String,

    /// Deployment region. Overridden by `GATEWAY_SERVER_REGION`.
    pub region: Option<String>,

    /// Deadline for the validation call in milliseconds.
    pub timeout_ms: u64,

    /// Timeout for fetching a rewrite target in milliseconds.
    pub rewrite_timeout_ms: u64,

    /// `User-Agent` sent to the decision service.
    pub user_agent: String,

    /// Module identifier reported in every descriptor.
    pub module_name: String,

    /// Name of this server reported in every descriptor.
    pub server_name: String,

    /// Cookie carrying the client identifier issued by the decision service.
    pub client_id_cookie: String,

    /// Wildcard cookie domain that browsers reject for this deployment's host.
    pub rejected_cookie_domain: String,

    /// Path extensions never sent for validation (case-insensitive).
    pub excluded_extensions: Vec<String>,
}

impl ValidationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn rewrite_timeout(&self) -> Duration {
        Duration::from_millis(self.rewrite_timeout_ms)
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: "https://api.decision.example.com/validate-request/".to_string(),
            server_key: String::new(),
            region: None,
            timeout_ms: 500,
            rewrite_timeout_ms: 2000,
            user_agent: "BotGateway".to_string(),
            module_name: "bot-gateway".to_string(),
            server_name: "bot-gateway".to_string(),
            client_id_cookie: "clientid".to_string(),
            rejected_cookie_domain: ".vercel.app".to_string(),
            excluded_extensions: default_excluded_extensions(),
        }
    }
}

fn default_excluded_extensions() -> Vec<String> {
    [
        "avi", "flv", "mka", "mkv", "mov", "mp4", "mpeg", "mpg", "mp3", "flac", "ogg", "ogm",
        "opus", "wav", "webm", "webp", "bmp", "gif", "ico", "jpeg", "jpg", "png", "svg", "svgz",
        "swf", "eot", "otf", "ttf", "woff", "woff2", "css", "less", "js", "map",
    ]
    .iter()
    .map(|ext| ext.to_string())
    .collect()
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level used when `RUST_LOG` is not set.
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
