use envoy_types::pb::envoy::config::core::v3::{
    config_source::ConfigSourceSpecifier, AggregatedConfigSource, ApiVersion, ConfigSource,
};
use envoy_types::pb::envoy::config::listener::v3::{filter::ConfigType, Filter};
use envoy_types::pb::envoy::extensions::filters::network::http_connection_manager::v3::{
    http_connection_manager::RouteSpecifier, HttpConnectionManager, Rds,
};
use std::borrow::Cow;
use tracing::{debug, error};

use super::utils::{to_any, HTTP_CONNECTION_MANAGER_TYPE_URL};
use crate::config::HttpFiltersConfig;
use crate::plugins::{Params, PluginRegistry, StagedHttpFilter};
use crate::storage::models::{HttpListener, Listener};
use crate::validation::{HttpListenerErrorType, HttpListenerReport, ListenerReport, SegmentPath};

/// Builds the network filter stack of one HTTP segment
pub trait NetworkFilterTranslator {
    fn compute_network_filters(&self, params: &Params, report: &mut ListenerReport) -> Vec<Filter>;
}

/// HTTP filters from plugins, wrapped in a connection manager that reads its
/// routes over RDS under `route_config_name`
pub struct HttpNetworkFilterBuilder<'a> {
    pub plugins: &'a PluginRegistry,
    pub config: &'a HttpFiltersConfig,
    pub parent: &'a Listener,
    pub listener: Cow<'a, HttpListener>,
    pub route_config_name: String,
    pub path: SegmentPath,
}

impl HttpNetworkFilterBuilder<'_> {
    fn compute_http_connection_manager(
        &self,
        params: &Params,
        report: &mut HttpListenerReport,
    ) -> HttpConnectionManager {
        let mut staged: Vec<StagedHttpFilter> = Vec::new();
        for plugin in self.plugins.http_filter_plugins() {
            match plugin.http_filters(params, &self.listener) {
                Ok(filters) => staged.extend(filters),
                Err(e) => report.add_error(
                    HttpListenerErrorType::ProcessingError,
                    format!("{}: {}", plugin.name(), e),
                ),
            }
        }
        // Stable, so filters of one stage keep plugin registration order.
        staged.sort_by_key(|f| f.stage);

        let stat_prefix = if self.listener.stat_prefix.is_empty() {
            self.config.stat_prefix.clone()
        } else {
            self.listener.stat_prefix.clone()
        };

        let mut hcm = HttpConnectionManager {
            stat_prefix,
            route_specifier: Some(RouteSpecifier::Rds(Rds {
                config_source: Some(ConfigSource {
                    config_source_specifier: Some(ConfigSourceSpecifier::Ads(
                        AggregatedConfigSource::default(),
                    )),
                    resource_api_version: ApiVersion::V3 as i32,
                    ..Default::default()
                }),
                route_config_name: self.route_config_name.clone(),
                ..Default::default()
            })),
            http_filters: staged.into_iter().map(|f| f.filter).collect(),
            ..Default::default()
        };

        for plugin in self.plugins.http_connection_manager_plugins() {
            if let Err(e) =
                plugin.process_hcm_network_filter(params, self.parent, &self.listener, &mut hcm)
            {
                report.add_error(
                    HttpListenerErrorType::ProcessingError,
                    format!("{}: {}", plugin.name(), e),
                );
            }
        }

        hcm
    }
}

impl NetworkFilterTranslator for HttpNetworkFilterBuilder<'_> {
    fn compute_network_filters(&self, params: &Params, report: &mut ListenerReport) -> Vec<Filter> {
        let Some(http_report) = report.http_report_mut(self.path) else {
            error!(
                listener = %self.parent.name,
                path = ?self.path,
                "listener report does not have an http report for this segment"
            );
            return Vec::new();
        };

        let hcm = self.compute_http_connection_manager(params, http_report);
        let typed_config = match to_any(&hcm, HTTP_CONNECTION_MANAGER_TYPE_URL, "HttpConnectionManager") {
            Ok(any) => any,
            Err(e) => {
                http_report.add_error(HttpListenerErrorType::ProcessingError, e.to_string());
                return Vec::new();
            }
        };

        debug!(
            listener = %self.parent.name,
            route_config = %self.route_config_name,
            http_filters = hcm.http_filters.len(),
            "built http connection manager"
        );

        vec![Filter {
            name: self.config.hcm_filter_name.clone(),
            config_type: Some(ConfigType::TypedConfig(typed_config)),
        }]
    }
}
