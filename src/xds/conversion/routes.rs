//! Route configuration translators.
//!
//! Only HTTP segments produce a route configuration. Hybrid and aggregate
//! listeners concatenate the configurations of their HTTP segments.

use envoy_types::pb::envoy::config::route::v3::{
    virtual_host::TlsRequirementType, Route as EnvoyRoute, RouteConfiguration,
    VirtualHost as EnvoyVirtualHost,
};
use envoy_types::pb::google::protobuf::UInt32Value;
use std::borrow::Cow;
use std::collections::BTreeMap;
use tracing::{debug, error};

use super::destinations::{convert_action, record_plugin_error};
use super::errors::ConversionError;
use super::matchers::{convert_matcher, default_matcher};
use super::utils::sanitize_for_envoy;
use crate::plugins::{
    Params, PluginRegistry, RouteActionParams, RouteParams, VirtualHostParams,
};
use crate::storage::models::{HttpListener, Listener, Proxy, Route, VirtualHost};
use crate::validation::{
    check_http_alignment, HttpListenerErrorType, HttpListenerReport, ListenerReport, RouteErrorType,
    RouteReport, SegmentPath, VirtualHostErrorType, VirtualHostReport, WarningType,
};

pub const WILDCARD_DOMAIN: &str = "*";

pub trait RouteConfigurationTranslator {
    fn compute_route_configuration(
        &self,
        params: &Params,
        report: &mut ListenerReport,
    ) -> Vec<RouteConfiguration>;
}

/// Produces nothing; used for TCP segments and untranslatable listeners
pub struct EmptyRouteConfigurationTranslator;

impl RouteConfigurationTranslator for EmptyRouteConfigurationTranslator {
    fn compute_route_configuration(
        &self,
        _params: &Params,
        _report: &mut ListenerReport,
    ) -> Vec<RouteConfiguration> {
        Vec::new()
    }
}

pub struct MultiRouteConfigurationTranslator<'a> {
    pub translators: Vec<Box<dyn RouteConfigurationTranslator + 'a>>,
}

impl RouteConfigurationTranslator for MultiRouteConfigurationTranslator<'_> {
    fn compute_route_configuration(
        &self,
        params: &Params,
        report: &mut ListenerReport,
    ) -> Vec<RouteConfiguration> {
        self.translators
            .iter()
            .flat_map(|translator| translator.compute_route_configuration(params, report))
            .collect()
    }
}

pub struct HttpRouteConfigurationTranslator<'a> {
    pub plugins: &'a PluginRegistry,
    pub proxy: &'a Proxy,
    pub parent: &'a Listener,
    pub listener: Cow<'a, HttpListener>,
    pub route_config_name: String,
    pub require_tls: bool,
    pub path: SegmentPath,
    /// Aggregate virtual host references that did not resolve
    pub missing_virtual_hosts: Vec<String>,
}

impl RouteConfigurationTranslator for HttpRouteConfigurationTranslator<'_> {
    fn compute_route_configuration(
        &self,
        params: &Params,
        report: &mut ListenerReport,
    ) -> Vec<RouteConfiguration> {
        let Some(http_report) = report.http_report_mut(self.path) else {
            error!(
                listener = %self.parent.name,
                path = ?self.path,
                "listener report does not have an http report for this segment"
            );
            return Vec::new();
        };
        if let Err(reason) = check_http_alignment(&self.listener, http_report) {
            error!(listener = %self.parent.name, path = ?self.path, "http report misaligned: {}", reason);
            return Vec::new();
        }

        for missing in &self.missing_virtual_hosts {
            http_report.add_error(
                HttpListenerErrorType::ProcessingError,
                format!("virtual host {} not found", missing),
            );
        }

        vec![self.compute_route_config(params, http_report)]
    }
}

impl<'a> HttpRouteConfigurationTranslator<'a> {
    fn compute_route_config(&self, params: &Params, report: &mut HttpListenerReport) -> RouteConfiguration {
        validate_virtual_host_domains(&self.listener.virtual_hosts, &mut report.virtual_host_reports);

        let virtual_host_params = VirtualHostParams {
            params: *params,
            proxy: self.proxy,
            listener: self.parent,
            http_listener: &self.listener,
        };

        let virtual_hosts = self
            .listener
            .virtual_hosts
            .iter()
            .zip(report.virtual_host_reports.iter_mut())
            .map(|(virtual_host, vhost_report)| {
                self.compute_virtual_host(&virtual_host_params, virtual_host, vhost_report)
            })
            .collect();

        let max_direct_response_body_size_bytes = self
            .parent
            .route_options
            .as_ref()
            .and_then(|options| options.max_direct_response_body_size_bytes)
            .map(|value| UInt32Value { value });

        debug!(route_config = %self.route_config_name, "built route configuration");

        RouteConfiguration {
            name: self.route_config_name.clone(),
            virtual_hosts,
            max_direct_response_body_size_bytes,
            ..Default::default()
        }
    }

    fn compute_virtual_host(
        &self,
        params: &VirtualHostParams,
        virtual_host: &VirtualHost,
        report: &mut VirtualHostReport,
    ) -> EnvoyVirtualHost {
        // Plugins and route names see the sanitized copy, never the input.
        let mut virtual_host = virtual_host.clone();
        virtual_host.name = sanitize_for_envoy(&virtual_host.name, "virtual host");

        let route_params = RouteParams {
            virtual_host_params: *params,
            virtual_host: &virtual_host,
        };

        let mut routes = Vec::new();
        for (i, (route, route_report)) in virtual_host
            .routes
            .iter()
            .zip(report.route_reports.iter_mut())
            .enumerate()
        {
            routes.extend(self.compute_routes(&route_params, i, route, route_report));
        }

        let mut out = EnvoyVirtualHost {
            name: virtual_host.name.clone(),
            domains: output_domains(&virtual_host.domains),
            routes,
            require_tls: if self.require_tls {
                TlsRequirementType::All as i32
            } else {
                TlsRequirementType::None as i32
            },
            ..Default::default()
        };

        for plugin in self.plugins.virtual_host_plugins() {
            if let Err(e) = plugin.process_virtual_host(params, &virtual_host, &mut out) {
                let reason = format!("invalid virtual host [{}]: {}: {}", virtual_host.name, plugin.name(), e);
                if e.is_destination_not_found() {
                    report.add_warning(WarningType::InvalidDestinationWarning, reason);
                } else if e.is_warning() {
                    report.add_warning(WarningType::ProcessingWarning, reason);
                } else {
                    report.add_error(VirtualHostErrorType::ProcessingError, reason);
                }
            }
        }

        out
    }

    /// One generated route per matcher, or a single catch-all when there are none
    fn compute_routes(
        &self,
        params: &RouteParams,
        route_index: usize,
        route: &Route,
        report: &mut RouteReport,
    ) -> Vec<EnvoyRoute> {
        let action_params = RouteActionParams {
            route_params: *params,
            route,
        };
        let action = convert_action(self.plugins, &action_params, report);

        let matchers = if route.matchers.is_empty() {
            vec![default_matcher()]
        } else {
            route.matchers.clone()
        };

        let mut plugin_failures: Vec<(String, ConversionError)> = Vec::new();
        let mut out_routes = Vec::with_capacity(matchers.len());

        for (j, matcher) in matchers.iter().enumerate() {
            let (route_match, matcher_errors) = convert_matcher(matcher);
            for e in matcher_errors {
                report.add_error(
                    RouteErrorType::InvalidMatcherError,
                    format!("{}, matcher {}: {}", route_display_name(route, route_index), j, e),
                );
            }

            let mut out = EnvoyRoute {
                name: generated_route_name(&params.virtual_host.name, route_index, &route.name, j),
                r#match: Some(route_match),
                action: Some(action.clone()),
                ..Default::default()
            };

            for plugin in self.plugins.route_plugins() {
                if let Err(e) = plugin.process_route(params, route, &mut out) {
                    // Every matcher sees the same route, so report each failure once.
                    let failure = (plugin.name().to_string(), e);
                    if !plugin_failures.contains(&failure) {
                        plugin_failures.push(failure);
                    }
                }
            }

            out_routes.push(out);
        }

        for (plugin, e) in &plugin_failures {
            record_plugin_error(report, plugin, e);
        }

        out_routes
    }
}

/// `{vhost}-route-{i}[-{name}]-matcher-{j}`, stable across passes
pub fn generated_route_name(
    virtual_host_name: &str,
    route_index: usize,
    route_name: &str,
    matcher_index: usize,
) -> String {
    if route_name.is_empty() {
        format!("{}-route-{}-matcher-{}", virtual_host_name, route_index, matcher_index)
    } else {
        format!(
            "{}-route-{}-{}-matcher-{}",
            virtual_host_name, route_index, route_name, matcher_index
        )
    }
}

fn route_display_name(route: &Route, route_index: usize) -> String {
    if route.name.is_empty() {
        format!("route {}", route_index)
    } else {
        format!("route {}", route.name)
    }
}

fn output_domains(domains: &[String]) -> Vec<String> {
    if domains.is_empty() {
        return vec![WILDCARD_DOMAIN.to_string()];
    }
    let mut out: Vec<String> = Vec::with_capacity(domains.len());
    for domain in domains {
        let domain = if domain.is_empty() { WILDCARD_DOMAIN } else { domain.as_str() };
        if !out.iter().any(|d| d == domain) {
            out.push(domain.to_string());
        }
    }
    out
}

/// Flag empty domains and every virtual host that claims a domain another one also claims.
///
/// A virtual host without domains claims `*`, and an empty domain string is
/// folded into `*` after being reported.
pub fn validate_virtual_host_domains(
    virtual_hosts: &[VirtualHost],
    reports: &mut [VirtualHostReport],
) {
    let mut claimants: BTreeMap<&str, Vec<usize>> = BTreeMap::new();

    for (i, virtual_host) in virtual_hosts.iter().enumerate() {
        let mut domains: Vec<&str> = virtual_host.domains.iter().map(String::as_str).collect();
        if domains.is_empty() {
            domains.push(WILDCARD_DOMAIN);
        }

        for domain in domains {
            let domain = if domain.is_empty() {
                if let Some(report) = reports.get_mut(i) {
                    report.add_error(
                        VirtualHostErrorType::EmptyDomainError,
                        format!(
                            "virtual host {} has an empty domain; it will be treated as {}",
                            virtual_host.name, WILDCARD_DOMAIN
                        ),
                    );
                }
                WILDCARD_DOMAIN
            } else {
                domain
            };

            let indices = claimants.entry(domain).or_default();
            if !indices.contains(&i) {
                indices.push(i);
            }
        }
    }

    for (domain, indices) in claimants {
        if indices.len() < 2 {
            continue;
        }
        let names: Vec<&str> = indices.iter().map(|&i| virtual_hosts[i].name.as_str()).collect();
        for &i in &indices {
            if let Some(report) = reports.get_mut(i) {
                report.add_error(
                    VirtualHostErrorType::DomainsNotUniqueError,
                    format!(
                        "domain {} is shared by the following virtual hosts: [{}]",
                        domain,
                        names.join(", ")
                    ),
                );
            }
        }
    }
}
