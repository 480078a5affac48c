use envoy_types::pb::envoy::config::listener::v3::{
    filter::ConfigType as FilterConfigType, Filter, FilterChain, FilterChainMatch,
};
use envoy_types::pb::envoy::extensions::filters::network::tcp_proxy::v3::{
    tcp_proxy::{weighted_cluster::ClusterWeight, ClusterSpecifier, WeightedCluster},
    TcpProxy,
};
use std::sync::Arc;
use tracing::debug;

use crate::plugins::{Capability, Params, Plugin, TcpFilterChainPlugin};
use crate::security::SslConfigTranslator;
use crate::security::tls::downstream_transport_socket;
use crate::storage::models::{Listener, TcpDestination, TcpHost, TcpListener, WeightedDestination};
use crate::xds::conversion::utils::{to_any, upstream_to_cluster_name, TCP_PROXY_TYPE_URL};
use crate::xds::conversion::ConversionError;

pub const TCP_PROXY_FILTER_NAME: &str = "envoy.filters.network.tcp_proxy";

/// Builds one `tcp_proxy` filter chain per TCP host
pub struct TcpProxyPlugin {
    ssl_translator: Arc<dyn SslConfigTranslator>,
    transport_socket_name: String,
}

impl TcpProxyPlugin {
    pub fn new(ssl_translator: Arc<dyn SslConfigTranslator>, transport_socket_name: String) -> Self {
        Self {
            ssl_translator,
            transport_socket_name,
        }
    }

    fn cluster_specifier(
        &self,
        params: &Params,
        destination: &TcpDestination,
    ) -> Result<ClusterSpecifier, ConversionError> {
        match destination {
            TcpDestination::Single(single) => Ok(ClusterSpecifier::Cluster(
                upstream_to_cluster_name(&single.upstream),
            )),
            TcpDestination::Multi(multi) => weighted_clusters(&multi.destinations),
            TcpDestination::UpstreamGroup(group_ref) => {
                let group = params.snapshot.find_upstream_group(group_ref).map_err(|_| {
                    ConversionError::UpstreamGroupNotFound {
                        upstream_group: group_ref.to_string(),
                    }
                })?;
                weighted_clusters(&group.destinations)
            }
        }
    }

    fn filter_chain(
        &self,
        params: &Params,
        listener: &TcpListener,
        host: &TcpHost,
    ) -> Result<FilterChain, ConversionError> {
        let stat_prefix = if listener.stat_prefix.is_empty() {
            host.name.clone()
        } else {
            listener.stat_prefix.clone()
        };
        let tcp_proxy = TcpProxy {
            stat_prefix,
            cluster_specifier: Some(self.cluster_specifier(params, &host.destination)?),
            ..Default::default()
        };

        let mut chain = FilterChain {
            name: host.name.clone(),
            filters: vec![Filter {
                name: TCP_PROXY_FILTER_NAME.to_string(),
                config_type: Some(FilterConfigType::TypedConfig(to_any(
                    &tcp_proxy,
                    TCP_PROXY_TYPE_URL,
                    "TcpProxy",
                )?)),
            }],
            ..Default::default()
        };

        if let Some(ssl_config) = &host.ssl_config {
            let context = self
                .ssl_translator
                .resolve_downstream_ssl_config(params.snapshot, ssl_config)
                .map_err(|e| ConversionError::SslConfig {
                    reason: format!("tcp host {}: {}", host.name, e),
                })?;
            chain.transport_socket = Some(downstream_transport_socket(
                &context,
                &self.transport_socket_name,
            )?);
            if !ssl_config.sni_domains.is_empty() {
                chain.filter_chain_match = Some(FilterChainMatch {
                    server_names: ssl_config.sni_domains.clone(),
                    ..Default::default()
                });
            }
        }

        Ok(chain)
    }
}

fn weighted_clusters(destinations: &[WeightedDestination]) -> Result<ClusterSpecifier, ConversionError> {
    if destinations.is_empty() {
        return Err(ConversionError::NoDestinationSpecified);
    }
    Ok(ClusterSpecifier::WeightedClusters(WeightedCluster {
        clusters: destinations
            .iter()
            .map(|weighted| ClusterWeight {
                name: upstream_to_cluster_name(&weighted.destination.upstream),
                weight: weighted.weight,
                ..Default::default()
            })
            .collect(),
        ..Default::default()
    }))
}

impl Plugin for TcpProxyPlugin {
    fn name(&self) -> &'static str {
        "tcp_proxy"
    }

    fn capabilities(self: Arc<Self>) -> Vec<Capability> {
        vec![Capability::TcpFilterChain(self)]
    }
}

impl TcpFilterChainPlugin for TcpProxyPlugin {
    fn create_tcp_filter_chains(
        &self,
        params: &Params,
        parent: &Listener,
        listener: &TcpListener,
    ) -> Result<Vec<FilterChain>, ConversionError> {
        let chains = listener
            .tcp_hosts
            .iter()
            .map(|host| self.filter_chain(params, listener, host))
            .collect::<Result<Vec<_>, _>>()?;
        debug!(listener = %parent.name, chains = chains.len(), "built tcp filter chains");
        Ok(chains)
    }
}
