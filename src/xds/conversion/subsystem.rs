//! Picks the listener and route configuration translators for one listener.

use std::borrow::Cow;
use tracing::{debug, error, warn};

use super::filter_chains::{
    FilterChainTranslator, HttpFilterChainTranslator, MultiFilterChainTranslator,
    TcpFilterChainTranslator,
};
use super::listeners::{ListenerSubsystemTranslator, ListenerTranslator, NoOpListenerTranslator};
use super::network_filters::HttpNetworkFilterBuilder;
use super::routes::{
    EmptyRouteConfigurationTranslator, HttpRouteConfigurationTranslator,
    MultiRouteConfigurationTranslator, RouteConfigurationTranslator,
};
use super::utils::{matched_route_config_name, route_config_name};
use crate::config::EnvoyGenerationConfig;
use crate::plugins::PluginRegistry;
use crate::security::tls::SslConfigTranslator;
use crate::storage::models::{
    AggregateListener, CidrRange, HttpListener, HybridListener, Listener, ListenerType,
    MatchedListenerType, Proxy, SslConfig, TcpListener,
};
use crate::validation::{ListenerReport, ListenerTypeReport, MatchedListenerReport, SegmentPath};

pub type TranslatorPair<'a> = (
    Box<dyn ListenerTranslator + 'a>,
    Box<dyn RouteConfigurationTranslator + 'a>,
);

/// A pair of translators that produce nothing
pub fn no_op_translators<'a>() -> TranslatorPair<'a> {
    (
        Box::new(NoOpListenerTranslator),
        Box::new(EmptyRouteConfigurationTranslator),
    )
}

pub struct ListenerSubsystemTranslatorFactory<'a> {
    pub plugins: &'a PluginRegistry,
    pub ssl_translator: &'a dyn SslConfigTranslator,
    pub config: &'a EnvoyGenerationConfig,
}

/// Everything one HTTP segment needs besides the segment itself
struct HttpSegment<'a> {
    listener: Cow<'a, HttpListener>,
    route_config_name: String,
    ssl_configurations: Vec<SslConfig>,
    default_ssl_config: Option<SslConfig>,
    source_prefix_ranges: Vec<CidrRange>,
    require_tls: bool,
    missing_virtual_hosts: Vec<String>,
    path: SegmentPath,
}

type SegmentTranslators<'a> = (
    Box<dyn FilterChainTranslator + 'a>,
    Box<dyn RouteConfigurationTranslator + 'a>,
);

impl<'a> ListenerSubsystemTranslatorFactory<'a> {
    /// Translators for `listener`.
    ///
    /// `report` must have the shape `make_listener_report` gives the listener;
    /// on any mismatch the affected subtree translates to nothing.
    pub fn get_translators(
        &self,
        proxy: &'a Proxy,
        listener: &'a Listener,
        report: &ListenerReport,
    ) -> TranslatorPair<'a> {
        let Some(listener_type) = &listener.listener_type else {
            error!(listener = %listener.name, "listener has no listener type, skipping");
            return no_op_translators();
        };

        let (filter_chain_translator, route_translator): SegmentTranslators<'a> =
            match (listener_type, &report.listener_type) {
                (ListenerType::Http(http), ListenerTypeReport::Http(_)) => {
                    self.http_translators(proxy, listener, http)
                }
                (ListenerType::Tcp(tcp), ListenerTypeReport::Tcp(_)) => (
                    self.tcp_filter_chain_translator(listener, tcp, &[], SegmentPath::Root),
                    Box::new(EmptyRouteConfigurationTranslator),
                ),
                (ListenerType::Hybrid(hybrid), ListenerTypeReport::Hybrid(hybrid_report)) => {
                    if hybrid.matched_listeners.len() != hybrid_report.matched_listener_reports.len() {
                        error!(
                            listener = %listener.name,
                            matched_listeners = hybrid.matched_listeners.len(),
                            reports = hybrid_report.matched_listener_reports.len(),
                            "hybrid listener report is misaligned"
                        );
                        return no_op_translators();
                    }
                    self.hybrid_translators(proxy, listener, hybrid, &hybrid_report.matched_listener_reports)
                }
                (ListenerType::Aggregate(aggregate), ListenerTypeReport::Aggregate(aggregate_report)) => {
                    if aggregate.http_filter_chains.len() != aggregate_report.http_listener_reports.len() {
                        error!(
                            listener = %listener.name,
                            filter_chains = aggregate.http_filter_chains.len(),
                            reports = aggregate_report.http_listener_reports.len(),
                            "aggregate listener report is misaligned"
                        );
                        return no_op_translators();
                    }
                    self.aggregate_translators(proxy, listener, aggregate)
                }
                (listener_type, report_type) => {
                    error!(
                        listener = %listener.name,
                        listener_type = listener_type.kind(),
                        report_type = report_type.kind(),
                        "listener report does not match listener type"
                    );
                    return no_op_translators();
                }
            };

        debug!(listener = %listener.name, listener_type = listener_type.kind(), "selected translators");

        (
            Box::new(ListenerSubsystemTranslator {
                plugins: self.plugins,
                listener,
                filter_chain_translator,
            }),
            route_translator,
        )
    }

    fn http_translators(
        &self,
        proxy: &'a Proxy,
        listener: &'a Listener,
        http: &'a HttpListener,
    ) -> SegmentTranslators<'a> {
        self.http_segment_translators(
            proxy,
            listener,
            HttpSegment {
                listener: Cow::Borrowed(http),
                route_config_name: route_config_name(listener),
                ssl_configurations: listener.ssl_configurations.clone(),
                default_ssl_config: None,
                source_prefix_ranges: Vec::new(),
                require_tls: !listener.ssl_configurations.is_empty(),
                missing_virtual_hosts: Vec::new(),
                path: SegmentPath::Root,
            },
        )
    }

    fn hybrid_translators(
        &self,
        proxy: &'a Proxy,
        listener: &'a Listener,
        hybrid: &'a HybridListener,
        reports: &[MatchedListenerReport],
    ) -> SegmentTranslators<'a> {
        let mut filter_chain_translators: Vec<Box<dyn FilterChainTranslator + 'a>> = Vec::new();
        let mut route_translators: Vec<Box<dyn RouteConfigurationTranslator + 'a>> = Vec::new();

        for (i, (matched, matched_report)) in hybrid.matched_listeners.iter().zip(reports).enumerate() {
            let path = SegmentPath::Matched(i);
            let matcher = matched.matcher.as_ref();
            let source_prefix_ranges = matcher
                .map(|m| m.source_prefix_ranges.as_slice())
                .unwrap_or_default();

            match (&matched.listener_type, matched_report) {
                (MatchedListenerType::Http(http), MatchedListenerReport::Http(_)) => {
                    let default_ssl_config = matcher.and_then(|m| m.ssl_config.clone());
                    let require_tls = !matched.ssl_configurations.is_empty();
                    let (chains, routes) = self.http_segment_translators(
                        proxy,
                        listener,
                        HttpSegment {
                            listener: Cow::Borrowed(http),
                            route_config_name: matched_route_config_name(listener, matcher),
                            ssl_configurations: matched.ssl_configurations.clone(),
                            default_ssl_config,
                            source_prefix_ranges: source_prefix_ranges.to_vec(),
                            require_tls,
                            missing_virtual_hosts: Vec::new(),
                            path,
                        },
                    );
                    filter_chain_translators.push(chains);
                    route_translators.push(routes);
                }
                (MatchedListenerType::Tcp(tcp), MatchedListenerReport::Tcp(_)) => {
                    filter_chain_translators.push(self.tcp_filter_chain_translator(
                        listener,
                        tcp,
                        source_prefix_ranges,
                        path,
                    ));
                }
                _ => {
                    error!(
                        listener = %listener.name,
                        segment = i,
                        "matched listener report does not match its listener type, skipping segment"
                    );
                }
            }
        }

        (
            Box::new(MultiFilterChainTranslator {
                translators: filter_chain_translators,
            }),
            Box::new(MultiRouteConfigurationTranslator {
                translators: route_translators,
            }),
        )
    }

    fn aggregate_translators(
        &self,
        proxy: &'a Proxy,
        listener: &'a Listener,
        aggregate: &'a AggregateListener,
    ) -> SegmentTranslators<'a> {
        let mut filter_chain_translators: Vec<Box<dyn FilterChainTranslator + 'a>> = Vec::new();
        let mut route_translators: Vec<Box<dyn RouteConfigurationTranslator + 'a>> = Vec::new();

        for (i, chain) in aggregate.http_filter_chains.iter().enumerate() {
            let (http, missing) = aggregate.resolve_http_listener(chain);
            for missing_ref in &missing {
                warn!(
                    listener = %listener.name,
                    filter_chain = i,
                    virtual_host = %missing_ref,
                    "aggregate filter chain references an unknown virtual host"
                );
            }

            let matcher = chain.matcher.as_ref();
            let ssl_config = matcher.and_then(|m| m.ssl_config.clone());
            let (chains, routes) = self.http_segment_translators(
                proxy,
                listener,
                HttpSegment {
                    listener: Cow::Owned(http),
                    route_config_name: matched_route_config_name(listener, matcher),
                    require_tls: ssl_config.is_some(),
                    ssl_configurations: ssl_config.into_iter().collect(),
                    default_ssl_config: None,
                    source_prefix_ranges: matcher
                        .map(|m| m.source_prefix_ranges.clone())
                        .unwrap_or_default(),
                    missing_virtual_hosts: missing,
                    path: SegmentPath::Aggregate(i),
                },
            );
            filter_chain_translators.push(chains);
            route_translators.push(routes);
        }

        (
            Box::new(MultiFilterChainTranslator {
                translators: filter_chain_translators,
            }),
            Box::new(MultiRouteConfigurationTranslator {
                translators: route_translators,
            }),
        )
    }

    fn http_segment_translators(
        &self,
        proxy: &'a Proxy,
        listener: &'a Listener,
        segment: HttpSegment<'a>,
    ) -> SegmentTranslators<'a> {
        let network_filter_translator = HttpNetworkFilterBuilder {
            plugins: self.plugins,
            config: &self.config.http_filters,
            parent: listener,
            listener: segment.listener.clone(),
            route_config_name: segment.route_config_name.clone(),
            path: segment.path,
        };

        let filter_chain_translator = HttpFilterChainTranslator {
            network_filter_translator: Box::new(network_filter_translator),
            ssl_translator: self.ssl_translator,
            parent: listener,
            ssl_configurations: segment.ssl_configurations,
            default_ssl_config: segment.default_ssl_config,
            source_prefix_ranges: segment.source_prefix_ranges,
            transport_socket_name: &self.config.tls.transport_socket_name,
        };

        let route_translator = HttpRouteConfigurationTranslator {
            plugins: self.plugins,
            proxy,
            parent: listener,
            listener: segment.listener,
            route_config_name: segment.route_config_name,
            require_tls: segment.require_tls,
            path: segment.path,
            missing_virtual_hosts: segment.missing_virtual_hosts,
        };

        (Box::new(filter_chain_translator), Box::new(route_translator))
    }

    fn tcp_filter_chain_translator(
        &self,
        listener: &'a Listener,
        tcp: &'a TcpListener,
        source_prefix_ranges: &'a [CidrRange],
        path: SegmentPath,
    ) -> Box<dyn FilterChainTranslator + 'a> {
        Box::new(TcpFilterChainTranslator {
            plugins: self.plugins.tcp_filter_chain_plugins(),
            parent: listener,
            listener: tcp,
            source_prefix_ranges,
            path,
        })
    }
}
