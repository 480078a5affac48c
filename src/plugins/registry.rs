use std::sync::Arc;
use tracing::info;

use super::{
    Capability, HttpConnectionManagerPlugin, HttpFilterPlugin, ListenerPlugin, Plugin,
    RouteActionPlugin, RoutePlugin, TcpFilterChainPlugin, VirtualHostPlugin,
    WeightedDestinationPlugin,
};

/// Ordered, read-only plugin lists keyed by hook point.
///
/// Built once at load time; translation passes share it by reference.
#[derive(Default)]
pub struct PluginRegistry {
    plugin_names: Vec<&'static str>,
    listener_plugins: Vec<Arc<dyn ListenerPlugin>>,
    http_filter_plugins: Vec<Arc<dyn HttpFilterPlugin>>,
    http_connection_manager_plugins: Vec<Arc<dyn HttpConnectionManagerPlugin>>,
    tcp_filter_chain_plugins: Vec<Arc<dyn TcpFilterChainPlugin>>,
    virtual_host_plugins: Vec<Arc<dyn VirtualHostPlugin>>,
    route_plugins: Vec<Arc<dyn RoutePlugin>>,
    route_action_plugins: Vec<Arc<dyn RouteActionPlugin>>,
    weighted_destination_plugins: Vec<Arc<dyn WeightedDestinationPlugin>>,
}

impl PluginRegistry {
    /// Register plugins in order; hooks run in registration order
    pub fn new(plugins: Vec<Arc<dyn Plugin>>) -> Self {
        let mut registry = Self::default();
        for plugin in plugins {
            registry.register(plugin);
        }
        info!(
            "🔧 Plugin registry ready with {} plugins: {:?}",
            registry.plugin_names.len(),
            registry.plugin_names
        );
        registry
    }

    fn register(&mut self, plugin: Arc<dyn Plugin>) {
        self.plugin_names.push(plugin.name());
        for capability in plugin.capabilities() {
            match capability {
                Capability::Listener(p) => self.listener_plugins.push(p),
                Capability::HttpFilter(p) => self.http_filter_plugins.push(p),
                Capability::HttpConnectionManager(p) => self.http_connection_manager_plugins.push(p),
                Capability::TcpFilterChain(p) => self.tcp_filter_chain_plugins.push(p),
                Capability::VirtualHost(p) => self.virtual_host_plugins.push(p),
                Capability::Route(p) => self.route_plugins.push(p),
                Capability::RouteAction(p) => self.route_action_plugins.push(p),
                Capability::WeightedDestination(p) => self.weighted_destination_plugins.push(p),
            }
        }
    }

    pub fn plugin_names(&self) -> &[&'static str] {
        &self.plugin_names
    }

    pub fn listener_plugins(&self) -> &[Arc<dyn ListenerPlugin>] {
        &self.listener_plugins
    }

    pub fn http_filter_plugins(&self) -> &[Arc<dyn HttpFilterPlugin>] {
        &self.http_filter_plugins
    }

    pub fn http_connection_manager_plugins(&self) -> &[Arc<dyn HttpConnectionManagerPlugin>] {
        &self.http_connection_manager_plugins
    }

    pub fn tcp_filter_chain_plugins(&self) -> &[Arc<dyn TcpFilterChainPlugin>] {
        &self.tcp_filter_chain_plugins
    }

    pub fn virtual_host_plugins(&self) -> &[Arc<dyn VirtualHostPlugin>] {
        &self.virtual_host_plugins
    }

    pub fn route_plugins(&self) -> &[Arc<dyn RoutePlugin>] {
        &self.route_plugins
    }

    pub fn route_action_plugins(&self) -> &[Arc<dyn RouteActionPlugin>] {
        &self.route_action_plugins
    }

    pub fn weighted_destination_plugins(&self) -> &[Arc<dyn WeightedDestinationPlugin>] {
        &self.weighted_destination_plugins
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::{Params, RouteParams};
    use crate::storage::models::{Listener, WeightedDestination};
    use crate::xds::conversion::ConversionError;
    use envoy_types::pb::envoy::config::listener::v3::Listener as EnvoyListener;
    use envoy_types::pb::envoy::config::route::v3::weighted_cluster::ClusterWeight;

    struct Both;

    impl Plugin for Both {
        fn name(&self) -> &'static str {
            "both"
        }

        fn capabilities(self: Arc<Self>) -> Vec<Capability> {
            vec![
                Capability::Listener(self.clone()),
                Capability::WeightedDestination(self),
            ]
        }
    }

    impl ListenerPlugin for Both {
        fn process_listener(
            &self,
            _params: &Params,
            _listener: &Listener,
            _out: &mut EnvoyListener,
        ) -> Result<(), ConversionError> {
            Ok(())
        }
    }

    impl WeightedDestinationPlugin for Both {
        fn process_weighted_destination(
            &self,
            _params: &RouteParams,
            _destination: &WeightedDestination,
            _out: &mut ClusterWeight,
        ) -> Result<(), ConversionError> {
            Ok(())
        }
    }

    struct Nothing;

    impl Plugin for Nothing {
        fn name(&self) -> &'static str {
            "nothing"
        }

        fn capabilities(self: Arc<Self>) -> Vec<Capability> {
            vec![]
        }
    }

    #[test]
    fn test_capabilities_are_sorted_into_hook_lists() {
        let registry = PluginRegistry::new(vec![Arc::new(Nothing), Arc::new(Both)]);

        assert_eq!(registry.plugin_names(), &["nothing", "both"]);
        assert_eq!(registry.listener_plugins().len(), 1);
        assert_eq!(registry.weighted_destination_plugins().len(), 1);
        assert!(registry.route_plugins().is_empty());
        assert!(registry.http_filter_plugins().is_empty());
        assert_eq!(registry.listener_plugins()[0].name(), "both");
    }
}
