use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub mod validation;

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct AppConfig {
    pub control_plane: ControlPlaneConfig,
    pub envoy_generation: EnvoyGenerationConfig,
}

// Control plane configuration (for our Rust application)
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct ControlPlaneConfig {
    pub logging: LoggingConfig,
    pub input: InputConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Where the binary reads the proxy graph and snapshot from
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct InputConfig {
    pub proxy_path: PathBuf,
    pub snapshot_path: PathBuf,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            proxy_path: PathBuf::from("demos/proxy.yaml"),
            snapshot_path: PathBuf::from("demos/snapshot.yaml"),
        }
    }
}

// Envoy configuration generation (for generating Envoy configs)
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct EnvoyGenerationConfig {
    pub http_filters: HttpFiltersConfig,
    pub tls: TlsConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct HttpFiltersConfig {
    pub stat_prefix: String,
    pub router_filter_name: String,
    pub hcm_filter_name: String,
}

impl Default for HttpFiltersConfig {
    fn default() -> Self {
        Self {
            stat_prefix: "http".to_string(),
            router_filter_name: "envoy.filters.http.router".to_string(),
            hcm_filter_name: "envoy.filters.network.http_connection_manager".to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TlsConfig {
    pub transport_socket_name: String,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            transport_socket_name: "envoy.transport_sockets.tls".to_string(),
        }
    }
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from("config")
    }

    /// Load from the named file (extension optional) plus `GATEWAY__*` environment overrides
    pub fn load_from(name: &str) -> anyhow::Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(name))
            .add_source(config::Environment::with_prefix("GATEWAY").separator("__"))
            .build()?;

        let config: Self = settings.try_deserialize()?;

        // Validate the loaded configuration
        validation::validate_config(&config)?;

        Ok(config)
    }
}
