//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Bind addresses parse, limits and sizes are positive
//! - At least one server is enabled
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Pure function: GatewayConfig → Result<(), Vec<ValidationError>>

use std::net::SocketAddr;

use crate::config::schema::GatewayConfig;

/// A single semantic problem, tagged with the offending key.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if !config.http.enabled && !config.rpc.enabled {
        errors.push(ValidationError::new("http.enabled", "at least one server must be enabled"));
    }

    if config.http.enabled {
        check_address(&mut errors, "http.bind_address", &config.http.bind_address);
        check_positive(&mut errors, "http.max_connections", config.http.max_connections);
        check_positive(&mut errors, "http.max_body_size", config.http.max_body_size);
        if config.http.request_timeout_secs == 0 {
            errors.push(ValidationError::new("http.request_timeout_secs", "must be greater than 0"));
        }
    }

    if config.rpc.enabled {
        check_address(&mut errors, "rpc.bind_address", &config.rpc.bind_address);
        check_positive(&mut errors, "rpc.max_connections", config.rpc.max_connections);
        check_positive(&mut errors, "rpc.max_frame_size", config.rpc.max_frame_size);
    }

    if config.observability.metrics_enabled {
        check_address(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_address(errors: &mut Vec<ValidationError>, field: &str, value: &str) {
    if let Err(e) = value.parse::<SocketAddr>() {
        errors.push(ValidationError::new(field, format!("invalid address {value:?}: {e}")));
    }
}

fn check_positive(errors: &mut Vec<ValidationError>, field: &str, value: usize) {
    if value == 0 {
        errors.push(ValidationError::new(field, "must be greater than 0"));
    }
}
