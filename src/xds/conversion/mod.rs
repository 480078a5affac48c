//! Translation of a proxy's listener graph into Envoy listeners and route configurations.

pub mod destinations;
pub mod errors;
pub mod filter_chains;
pub mod listeners;
pub mod matchers;
pub mod network_filters;
pub mod routes;
pub mod subsystem;
pub mod utils;

pub use errors::ConversionError;

use envoy_types::pb::envoy::config::listener::v3::Listener as EnvoyListener;
use envoy_types::pb::envoy::config::route::v3::RouteConfiguration;
use envoy_types::pb::google::protobuf::Any;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::EnvoyGenerationConfig;
use crate::plugins::builtin::default_plugins;
use crate::plugins::{Params, Plugin, PluginRegistry};
use crate::security::tls::{DefaultSslConfigTranslator, SslConfigTranslator};
use crate::storage::models::{
    Action, Destination, HttpListener, ListenerType, MatchedListenerType, Proxy, ResourceRef,
    TcpDestination, TcpListener, UpstreamGroup,
};
use crate::storage::Snapshot;
use crate::validation::{make_report, ProxyReport, UpstreamGroupErrorType, UpstreamGroupReport};
use destinations::check_single_destination;
use subsystem::ListenerSubsystemTranslatorFactory;
use utils::{to_any, LISTENER_TYPE_URL, ROUTE_CONFIGURATION_TYPE_URL};

/// Wire resources produced for one proxy, in declaration order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TranslatedProxy {
    pub listeners: Vec<EnvoyListener>,
    pub route_configurations: Vec<RouteConfiguration>,
}

impl TranslatedProxy {
    /// Pack the resources of one xDS type into `Any` messages
    pub fn resources_by_type(&self, type_url: &str) -> Result<Vec<Any>, ConversionError> {
        match type_url {
            LISTENER_TYPE_URL => self
                .listeners
                .iter()
                .map(|listener| to_any(listener, LISTENER_TYPE_URL, "Listener"))
                .collect(),
            ROUTE_CONFIGURATION_TYPE_URL => self
                .route_configurations
                .iter()
                .map(|route_config| {
                    to_any(route_config, ROUTE_CONFIGURATION_TYPE_URL, "RouteConfiguration")
                })
                .collect(),
            _ => Ok(Vec::new()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProxyTranslation {
    pub resources: TranslatedProxy,
    pub report: ProxyReport,
}

/// Runs translation passes for whole proxies with a fixed plugin set
pub struct ProxyTranslator {
    plugins: PluginRegistry,
    ssl_translator: Arc<dyn SslConfigTranslator>,
    config: EnvoyGenerationConfig,
}

impl ProxyTranslator {
    /// Translator with the built-in plugins
    pub fn new(config: EnvoyGenerationConfig) -> Self {
        let ssl_translator: Arc<dyn SslConfigTranslator> = Arc::new(DefaultSslConfigTranslator);
        let plugins = default_plugins(&config, ssl_translator.clone());
        Self::with_plugins(config, ssl_translator, plugins)
    }

    pub fn with_plugins(
        config: EnvoyGenerationConfig,
        ssl_translator: Arc<dyn SslConfigTranslator>,
        plugins: Vec<Arc<dyn Plugin>>,
    ) -> Self {
        Self {
            plugins: PluginRegistry::new(plugins),
            ssl_translator,
            config,
        }
    }

    pub fn plugins(&self) -> &PluginRegistry {
        &self.plugins
    }

    /// Translate every listener of `proxy` against `snapshot`.
    ///
    /// Never fails: every problem found lands in the returned report.
    pub fn translate(&self, proxy: &Proxy, snapshot: &Snapshot) -> ProxyTranslation {
        let mut report = make_report(proxy);
        let mut resources = TranslatedProxy::default();
        let params = Params { snapshot };

        let factory = ListenerSubsystemTranslatorFactory {
            plugins: &self.plugins,
            ssl_translator: self.ssl_translator.as_ref(),
            config: &self.config,
        };

        for (listener, listener_report) in proxy.listeners.iter().zip(report.listener_reports.iter_mut()) {
            let (listener_translator, route_translator) =
                factory.get_translators(proxy, listener, listener_report);

            if let Some(envoy_listener) = listener_translator.compute_listener(&params, listener_report) {
                if envoy_listener.filter_chains.is_empty() {
                    warn!(
                        listener = %listener.name,
                        "⚠️  Listener produced no filter chains, not serving it"
                    );
                } else {
                    resources.listeners.push(envoy_listener);
                }
            }
            resources
                .route_configurations
                .extend(route_translator.compute_route_configuration(&params, listener_report));
        }

        report.upstream_group_reports = validate_upstream_groups(proxy, snapshot);

        info!(
            "📋 Translated proxy {}: {} listeners, {} route configurations (errors: {}, warnings: {})",
            proxy.metadata,
            resources.listeners.len(),
            resources.route_configurations.len(),
            report.has_errors(),
            report.has_warnings()
        );

        ProxyTranslation { resources, report }
    }
}

/// Check every upstream group the proxy references that exists in the snapshot.
///
/// Groups that do not exist are already reported on the routes that name them.
pub fn validate_upstream_groups(proxy: &Proxy, snapshot: &Snapshot) -> Vec<UpstreamGroupReport> {
    referenced_upstream_groups(proxy)
        .into_iter()
        .filter_map(|group_ref| snapshot.find_upstream_group(&group_ref).ok())
        .map(|group| validate_upstream_group(group, snapshot))
        .collect()
}

fn validate_upstream_group(group: &UpstreamGroup, snapshot: &Snapshot) -> UpstreamGroupReport {
    let mut report = UpstreamGroupReport::new(group.metadata.clone());
    if group.destinations.is_empty() {
        report.add_error(
            UpstreamGroupErrorType::NoDestinationSpecified,
            ConversionError::NoDestinationSpecified.to_string(),
        );
    }
    for weighted in &group.destinations {
        match check_single_destination(snapshot, &weighted.destination) {
            Ok(()) => {}
            Err(e @ ConversionError::UpstreamNotFound { .. }) => {
                report.add_error(UpstreamGroupErrorType::UpstreamNotFound, e.to_string())
            }
            Err(e) => report.add_error(UpstreamGroupErrorType::SubsetsMisconfigured, e.to_string()),
        }
    }
    report
}

fn referenced_upstream_groups(proxy: &Proxy) -> BTreeSet<ResourceRef> {
    let mut groups = BTreeSet::new();
    for listener in &proxy.listeners {
        match &listener.listener_type {
            Some(ListenerType::Http(http)) => collect_http_groups(http, &mut groups),
            Some(ListenerType::Tcp(tcp)) => collect_tcp_groups(tcp, &mut groups),
            Some(ListenerType::Hybrid(hybrid)) => {
                for matched in &hybrid.matched_listeners {
                    match &matched.listener_type {
                        MatchedListenerType::Http(http) => collect_http_groups(http, &mut groups),
                        MatchedListenerType::Tcp(tcp) => collect_tcp_groups(tcp, &mut groups),
                    }
                }
            }
            Some(ListenerType::Aggregate(aggregate)) => {
                let routes = aggregate
                    .http_resources
                    .virtual_hosts
                    .values()
                    .flat_map(|vhost| &vhost.routes);
                for route in routes {
                    if let Action::RouteAction(action) = &route.action {
                        if let Destination::UpstreamGroup(group) = &action.destination {
                            groups.insert(group.clone());
                        }
                    }
                }
            }
            None => {}
        }
    }
    groups
}

fn collect_http_groups(http: &HttpListener, groups: &mut BTreeSet<ResourceRef>) {
    for route in http.virtual_hosts.iter().flat_map(|vhost| &vhost.routes) {
        if let Action::RouteAction(action) = &route.action {
            if let Destination::UpstreamGroup(group) = &action.destination {
                groups.insert(group.clone());
            }
        }
    }
}

fn collect_tcp_groups(tcp: &TcpListener, groups: &mut BTreeSet<ResourceRef>) {
    for host in &tcp.tcp_hosts {
        if let TcpDestination::UpstreamGroup(group) = &host.destination {
            groups.insert(group.clone());
        }
    }
}
