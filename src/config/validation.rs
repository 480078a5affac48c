use super::{AppConfig, ControlPlaneConfig, EnvoyGenerationConfig};
use anyhow::{bail, Result};

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Configuration validation errors with helpful messages
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid log level '{level}': expected one of {expected:?}")]
    InvalidLogLevel { level: String, expected: Vec<String> },

    #[error("{field} cannot be empty")]
    EmptyField { field: String },

    #[error("Invalid filter name '{name}' for {field}: {reason}")]
    InvalidFilterName {
        field: String,
        name: String,
        reason: String,
    },
}

/// Validates the entire application configuration
pub fn validate_config(config: &AppConfig) -> Result<()> {
    validate_control_plane_config(&config.control_plane)?;
    validate_envoy_config(&config.envoy_generation)?;
    Ok(())
}

fn validate_control_plane_config(control_plane: &ControlPlaneConfig) -> Result<()> {
    validate_log_level(&control_plane.logging.level)?;

    if control_plane.input.proxy_path.as_os_str().is_empty() {
        bail!(ValidationError::EmptyField {
            field: "control_plane.input.proxy_path".to_string(),
        });
    }
    if control_plane.input.snapshot_path.as_os_str().is_empty() {
        bail!(ValidationError::EmptyField {
            field: "control_plane.input.snapshot_path".to_string(),
        });
    }

    Ok(())
}

/// The level may carry `EnvFilter` directives after a comma; only the base level is checked
fn validate_log_level(level: &str) -> Result<()> {
    let base = level.split(',').next().unwrap_or_default().trim();
    if base.is_empty() {
        bail!(ValidationError::EmptyField {
            field: "control_plane.logging.level".to_string(),
        });
    }
    if !LOG_LEVELS.contains(&base.to_ascii_lowercase().as_str()) {
        bail!(ValidationError::InvalidLogLevel {
            level: level.to_string(),
            expected: LOG_LEVELS.iter().map(|l| l.to_string()).collect(),
        });
    }
    Ok(())
}

/// Validates Envoy generation configuration
fn validate_envoy_config(envoy: &EnvoyGenerationConfig) -> Result<()> {
    if envoy.http_filters.stat_prefix.is_empty() {
        bail!(ValidationError::EmptyField {
            field: "envoy_generation.http_filters.stat_prefix".to_string(),
        });
    }

    validate_filter_name(&envoy.http_filters.hcm_filter_name, "http_filters.hcm_filter_name")?;
    validate_filter_name(
        &envoy.http_filters.router_filter_name,
        "http_filters.router_filter_name",
    )?;
    validate_filter_name(&envoy.tls.transport_socket_name, "tls.transport_socket_name")?;

    Ok(())
}

/// Envoy extension names are dotted identifiers such as `envoy.filters.http.router`
fn validate_filter_name(name: &str, field: &str) -> Result<()> {
    if name.is_empty() {
        bail!(ValidationError::EmptyField {
            field: format!("envoy_generation.{field}"),
        });
    }

    for c in name.chars() {
        if !c.is_ascii_alphanumeric() && c != '.' && c != '_' {
            bail!(ValidationError::InvalidFilterName {
                field: field.to_string(),
                name: name.to_string(),
                reason: format!("contains invalid character '{c}'"),
            });
        }
    }

    if name.starts_with('.') || name.ends_with('.') {
        bail!(ValidationError::InvalidFilterName {
            field: field.to_string(),
            name: name.to_string(),
            reason: "cannot start or end with a dot".to_string(),
        });
    }

    Ok(())
}
