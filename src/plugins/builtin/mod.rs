//! Plugins registered by default, one per concern.

use std::sync::Arc;

use crate::config::EnvoyGenerationConfig;
use crate::security::SslConfigTranslator;

use super::Plugin;

pub mod hcm;
pub mod headers;
pub mod listener_options;
pub mod route_options;
pub mod router;
pub mod tcp;

pub use hcm::HcmSettingsPlugin;
pub use headers::HeaderManipulationPlugin;
pub use listener_options::ListenerOptionsPlugin;
pub use route_options::RouteOptionsPlugin;
pub use router::RouterPlugin;
pub use tcp::TcpProxyPlugin;

/// The built-in plugin set in registration order
pub fn default_plugins(
    config: &EnvoyGenerationConfig,
    ssl_translator: Arc<dyn SslConfigTranslator>,
) -> Vec<Arc<dyn Plugin>> {
    vec![
        Arc::new(ListenerOptionsPlugin),
        Arc::new(HcmSettingsPlugin),
        Arc::new(TcpProxyPlugin::new(
            ssl_translator,
            config.tls.transport_socket_name.clone(),
        )),
        Arc::new(HeaderManipulationPlugin),
        Arc::new(RouteOptionsPlugin),
        Arc::new(RouterPlugin::new(config.http_filters.router_filter_name.clone())),
    ]
}
