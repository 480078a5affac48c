use envoy_types::pb::envoy::config::core::v3::CidrRange as EnvoyCidrRange;
use envoy_types::pb::envoy::config::listener::v3::{FilterChain, FilterChainMatch};
use envoy_types::pb::google::protobuf::{Duration, UInt32Value};
use std::sync::Arc;
use tracing::{debug, error};

use super::network_filters::NetworkFilterTranslator;
use crate::plugins::{Params, TcpFilterChainPlugin};
use crate::security::tls::{consolidate_and_merge, downstream_transport_socket, SslConfigTranslator};
use crate::storage::models::{CidrRange, Listener, SslConfig, TcpListener};
use crate::validation::{ListenerErrorType, ListenerReport, SegmentPath, TcpListenerErrorType};

pub trait FilterChainTranslator {
    fn compute_filter_chains(&self, params: &Params, report: &mut ListenerReport) -> Vec<FilterChain>;
}

/// Chains for a TCP segment, produced entirely by TCP filter chain plugins
pub struct TcpFilterChainTranslator<'a> {
    pub plugins: &'a [Arc<dyn TcpFilterChainPlugin>],
    pub parent: &'a Listener,
    pub listener: &'a TcpListener,
    /// Only set for segments of hybrid listeners
    pub source_prefix_ranges: &'a [CidrRange],
    pub path: SegmentPath,
}

impl FilterChainTranslator for TcpFilterChainTranslator<'_> {
    fn compute_filter_chains(&self, params: &Params, report: &mut ListenerReport) -> Vec<FilterChain> {
        let Some(tcp_report) = report.tcp_report_mut(self.path) else {
            error!(
                listener = %self.parent.name,
                path = ?self.path,
                "listener report does not have a tcp report for this segment"
            );
            return Vec::new();
        };

        let mut chains = Vec::new();
        for plugin in self.plugins {
            match plugin.create_tcp_filter_chains(params, self.parent, self.listener) {
                Ok(produced) => chains.extend(produced),
                Err(e) => tcp_report.add_error(
                    TcpListenerErrorType::ProcessingError,
                    format!("listener {}: {}", self.parent.name, e),
                ),
            }
        }

        apply_source_prefix_ranges(&mut chains, self.source_prefix_ranges);
        chains
    }
}

/// Chains for an HTTP segment: one per resolved TLS config, or one plaintext chain
pub struct HttpFilterChainTranslator<'a> {
    pub network_filter_translator: Box<dyn NetworkFilterTranslator + 'a>,
    pub ssl_translator: &'a dyn SslConfigTranslator,
    pub parent: &'a Listener,
    pub ssl_configurations: Vec<SslConfig>,
    /// Fills unset fields of every config in `ssl_configurations`
    pub default_ssl_config: Option<SslConfig>,
    pub source_prefix_ranges: Vec<CidrRange>,
    pub transport_socket_name: &'a str,
}

impl HttpFilterChainTranslator<'_> {
    fn merged_ssl_configurations(&self) -> Vec<SslConfig> {
        // The default only fills in fields; it never adds a chain of its own.
        consolidate_and_merge(&self.ssl_configurations, self.default_ssl_config.as_ref())
    }
}

impl FilterChainTranslator for HttpFilterChainTranslator<'_> {
    fn compute_filter_chains(&self, params: &Params, report: &mut ListenerReport) -> Vec<FilterChain> {
        let filters = self.network_filter_translator.compute_network_filters(params, report);
        if filters.is_empty() {
            return Vec::new();
        }

        let ssl_configurations = self.merged_ssl_configurations();
        let mut chains = Vec::with_capacity(ssl_configurations.len().max(1));

        if ssl_configurations.is_empty() {
            chains.push(FilterChain {
                filters,
                ..Default::default()
            });
        } else {
            for ssl_config in &ssl_configurations {
                let context = match self
                    .ssl_translator
                    .resolve_downstream_ssl_config(params.snapshot, ssl_config)
                {
                    Ok(context) => context,
                    Err(e) => {
                        report.add_error(ListenerErrorType::SslConfigError, e.to_string());
                        continue;
                    }
                };
                let transport_socket =
                    match downstream_transport_socket(&context, self.transport_socket_name) {
                        Ok(socket) => socket,
                        Err(e) => {
                            report.add_error(ListenerErrorType::SslConfigError, e.to_string());
                            continue;
                        }
                    };

                chains.push(FilterChain {
                    // Each chain owns its filters.
                    filters: filters.clone(),
                    filter_chain_match: (!ssl_config.sni_domains.is_empty()).then(|| {
                        FilterChainMatch {
                            server_names: ssl_config.sni_domains.clone(),
                            ..Default::default()
                        }
                    }),
                    transport_socket: Some(transport_socket),
                    transport_socket_connect_timeout: ssl_config
                        .transport_socket_connect_timeout_ms
                        .map(duration_from_millis),
                    ..Default::default()
                });
            }
        }

        apply_source_prefix_ranges(&mut chains, &self.source_prefix_ranges);
        debug!(listener = %self.parent.name, chains = chains.len(), "built http filter chains");
        chains
    }
}

/// Concatenates the chains of its children in order
pub struct MultiFilterChainTranslator<'a> {
    pub translators: Vec<Box<dyn FilterChainTranslator + 'a>>,
}

impl FilterChainTranslator for MultiFilterChainTranslator<'_> {
    fn compute_filter_chains(&self, params: &Params, report: &mut ListenerReport) -> Vec<FilterChain> {
        self.translators
            .iter()
            .flat_map(|translator| translator.compute_filter_chains(params, report))
            .collect()
    }
}

fn apply_source_prefix_ranges(chains: &mut [FilterChain], ranges: &[CidrRange]) {
    if ranges.is_empty() {
        return;
    }
    let converted: Vec<EnvoyCidrRange> = ranges
        .iter()
        .map(|range| EnvoyCidrRange {
            address_prefix: range.address_prefix.clone(),
            prefix_len: Some(UInt32Value {
                value: range.prefix_len,
            }),
        })
        .collect();
    for chain in chains {
        chain
            .filter_chain_match
            .get_or_insert_with(FilterChainMatch::default)
            .source_prefix_ranges = converted.clone();
    }
}

fn duration_from_millis(millis: u64) -> Duration {
    Duration {
        seconds: i64::try_from(millis / 1000).unwrap_or(i64::MAX),
        nanos: ((millis % 1000) * 1_000_000) as i32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_prefix_ranges_create_match() {
        let mut chains = vec![
            FilterChain::default(),
            FilterChain {
                filter_chain_match: Some(FilterChainMatch {
                    server_names: vec!["a.com".to_string()],
                    ..Default::default()
                }),
                ..Default::default()
            },
        ];
        let ranges = vec![CidrRange {
            address_prefix: "10.0.0.0".to_string(),
            prefix_len: 8,
        }];

        apply_source_prefix_ranges(&mut chains, &ranges);
        for chain in &chains {
            let chain_match = chain.filter_chain_match.as_ref().unwrap();
            assert_eq!(chain_match.source_prefix_ranges.len(), 1);
            assert_eq!(chain_match.source_prefix_ranges[0].address_prefix, "10.0.0.0");
        }
        assert_eq!(
            chains[1].filter_chain_match.as_ref().unwrap().server_names,
            vec!["a.com".to_string()]
        );
    }

    #[test]
    fn test_no_ranges_leave_chains_untouched() {
        let mut chains = vec![FilterChain::default()];
        apply_source_prefix_ranges(&mut chains, &[]);
        assert!(chains[0].filter_chain_match.is_none());
    }

    #[test]
    fn test_duration_from_millis() {
        assert_eq!(
            duration_from_millis(2500),
            Duration {
                seconds: 2,
                nanos: 500_000_000
            }
        );
    }

    #[test]
    fn test_duration_from_millis_does_not_wrap() {
        let duration = duration_from_millis(u64::MAX);
        assert_eq!(duration.seconds, 18_446_744_073_709_551);
        assert_eq!(duration.nanos, 615_000_000);
    }
}
