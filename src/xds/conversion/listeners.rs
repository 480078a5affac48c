use envoy_types::pb::envoy::config::core::v3::{
    address::Address as AddressType, socket_address::PortSpecifier, socket_address::Protocol,
    Address, SocketAddress,
};
use envoy_types::pb::envoy::config::listener::v3::{FilterChain, Listener as EnvoyListener};
use tracing::debug;

use super::filter_chains::FilterChainTranslator;
use crate::plugins::{Params, PluginRegistry};
use crate::storage::models::Listener;
use crate::validation::{ListenerErrorType, ListenerReport};

pub trait ListenerTranslator {
    /// `None` when there is nothing to serve for this listener
    fn compute_listener(&self, params: &Params, report: &mut ListenerReport) -> Option<EnvoyListener>;
}

/// Assembles the wire listener from its filter chains and listener plugins
pub struct ListenerSubsystemTranslator<'a> {
    pub plugins: &'a PluginRegistry,
    pub listener: &'a Listener,
    pub filter_chain_translator: Box<dyn FilterChainTranslator + 'a>,
}

impl ListenerTranslator for ListenerSubsystemTranslator<'_> {
    fn compute_listener(&self, params: &Params, report: &mut ListenerReport) -> Option<EnvoyListener> {
        let filter_chains = self.filter_chain_translator.compute_filter_chains(params, report);
        check_filter_chain_consistency(&filter_chains, report);

        let mut out = EnvoyListener {
            name: self.listener.name.clone(),
            address: Some(socket_address(&self.listener.bind_address, self.listener.bind_port)),
            filter_chains,
            ..Default::default()
        };

        for plugin in self.plugins.listener_plugins() {
            if let Err(e) = plugin.process_listener(params, self.listener, &mut out) {
                report.add_error(
                    ListenerErrorType::ProcessingError,
                    format!("{}: {}", plugin.name(), e),
                );
            }
        }

        debug!(
            listener = %self.listener.name,
            filter_chains = out.filter_chains.len(),
            "built listener"
        );
        Some(out)
    }
}

/// Stands in for listeners that cannot be translated
pub struct NoOpListenerTranslator;

impl ListenerTranslator for NoOpListenerTranslator {
    fn compute_listener(&self, _params: &Params, _report: &mut ListenerReport) -> Option<EnvoyListener> {
        None
    }
}

/// Envoy rejects a listener where two chains share a match
fn check_filter_chain_consistency(chains: &[FilterChain], report: &mut ListenerReport) {
    for (i, chain) in chains.iter().enumerate() {
        for other in &chains[..i] {
            if chain.filter_chain_match == other.filter_chain_match {
                report.add_error(
                    ListenerErrorType::SslConfigError,
                    format!(
                        "Tried to apply multiple filter chains with the same FilterChainMatch {:?}. \
                         This is usually caused by overlapping sniDomains or multiple empty sniDomains in virtual services",
                        chain.filter_chain_match
                    ),
                );
                break;
            }
        }
    }
}

fn socket_address(address: &str, port: u32) -> Address {
    Address {
        address: Some(AddressType::SocketAddress(SocketAddress {
            protocol: Protocol::Tcp as i32,
            address: address.to_string(),
            port_specifier: Some(PortSpecifier::PortValue(port)),
            ipv4_compat: address == "::",
            ..Default::default()
        })),
    }
}
