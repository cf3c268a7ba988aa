//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Require credentials when the decision service is enabled
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;
use thiserror::Error;

use crate::config::schema::GatewayConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid listener address '{0}'")]
    ListenerAddress(String),

    #[error("invalid upstream address '{0}'")]
    UpstreamAddress(String),

    #[error("invalid metrics address '{0}'")]
    MetricsAddress(String),

    #[error("validation.server_key is required when validation is enabled")]
    MissingServerKey,

    #[error("validation endpoint '{0}' is not an absolute http(s) URL")]
    Endpoint(String),

    #[error("{0} must be greater than zero")]
    ZeroTimeout(&'static str),

    #[error("excluded extension list contains an empty entry")]
    EmptyExtension,
}

/// Check a parsed configuration for semantic errors.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::ListenerAddress(
            config.listener.bind_address.clone(),
        ));
    }

    if config.upstream.address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::UpstreamAddress(
            config.upstream.address.clone(),
        ));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("timeouts.request_secs"));
    }

    let validation = &config.validation;
    if validation.enabled {
        if validation.server_key.trim().is_empty() {
            errors.push(ValidationError::MissingServerKey);
        }

        let endpoint_ok = url::Url::parse(&validation.endpoint)
            .map(|u| matches!(u.scheme(), "http" | "https") && u.host().is_some())
            .unwrap_or(false);
        if !endpoint_ok {
            errors.push(ValidationError::Endpoint(validation.endpoint.clone()));
        }

        if validation.timeout_ms == 0 {
            errors.push(ValidationError::ZeroTimeout("validation.timeout_ms"));
        }
        if validation.rewrite_timeout_ms == 0 {
            errors.push(ValidationError::ZeroTimeout("validation.rewrite_timeout_ms"));
        }
    }

    if validation
        .excluded_extensions
        .iter()
        .any(|ext| ext.trim().trim_start_matches('.').is_empty())
    {
        errors.push(ValidationError::EmptyExtension);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
