//! Plugin hook points for the listener subsystem.
//!
//! A plugin declares the hooks it participates in through [`Plugin::capabilities`]
//! when it is registered. The registry sorts those capabilities into ordered
//! per-hook lists, and translators only ever see the typed lists.

use envoy_types::pb::envoy::config::listener::v3::{FilterChain, Listener as EnvoyListener};
use envoy_types::pb::envoy::config::route::v3::{
    weighted_cluster::ClusterWeight, Route as EnvoyRoute, RouteAction as EnvoyRouteAction,
    VirtualHost as EnvoyVirtualHost,
};
use envoy_types::pb::envoy::extensions::filters::network::http_connection_manager::v3::{
    HttpConnectionManager, HttpFilter,
};
use std::sync::Arc;

use crate::storage::models::{
    HttpListener, Listener, Proxy, Route, RouteAction, TcpListener, VirtualHost,
    WeightedDestination,
};
use crate::storage::Snapshot;
use crate::xds::conversion::ConversionError;

pub mod builtin;
pub mod registry;

pub use registry::PluginRegistry;

/// Inputs shared by every hook of one translation pass
#[derive(Debug, Clone, Copy)]
pub struct Params<'a> {
    pub snapshot: &'a Snapshot,
}

#[derive(Debug, Clone, Copy)]
pub struct VirtualHostParams<'a> {
    pub params: Params<'a>,
    pub proxy: &'a Proxy,
    pub listener: &'a Listener,
    pub http_listener: &'a HttpListener,
}

#[derive(Debug, Clone, Copy)]
pub struct RouteParams<'a> {
    pub virtual_host_params: VirtualHostParams<'a>,
    pub virtual_host: &'a VirtualHost,
}

impl<'a> RouteParams<'a> {
    pub fn snapshot(&self) -> &'a Snapshot {
        self.virtual_host_params.params.snapshot
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RouteActionParams<'a> {
    pub route_params: RouteParams<'a>,
    pub route: &'a Route,
}

/// Where an HTTP filter sits in the connection manager's filter list
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FilterStage {
    Fault,
    Cors,
    AuthN,
    AuthZ,
    RateLimit,
    Accepted,
    Route,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StagedHttpFilter {
    pub stage: FilterStage,
    pub filter: HttpFilter,
}

pub trait Plugin: Send + Sync {
    fn name(&self) -> &'static str;

    /// The hooks this plugin runs at
    fn capabilities(self: Arc<Self>) -> Vec<Capability>;
}

#[derive(Clone)]
pub enum Capability {
    Listener(Arc<dyn ListenerPlugin>),
    HttpFilter(Arc<dyn HttpFilterPlugin>),
    HttpConnectionManager(Arc<dyn HttpConnectionManagerPlugin>),
    TcpFilterChain(Arc<dyn TcpFilterChainPlugin>),
    VirtualHost(Arc<dyn VirtualHostPlugin>),
    Route(Arc<dyn RoutePlugin>),
    RouteAction(Arc<dyn RouteActionPlugin>),
    WeightedDestination(Arc<dyn WeightedDestinationPlugin>),
}

pub trait ListenerPlugin: Plugin {
    fn process_listener(
        &self,
        params: &Params,
        listener: &Listener,
        out: &mut EnvoyListener,
    ) -> Result<(), ConversionError>;
}

pub trait HttpFilterPlugin: Plugin {
    fn http_filters(
        &self,
        params: &Params,
        listener: &HttpListener,
    ) -> Result<Vec<StagedHttpFilter>, ConversionError>;
}

pub trait HttpConnectionManagerPlugin: Plugin {
    fn process_hcm_network_filter(
        &self,
        params: &Params,
        parent: &Listener,
        listener: &HttpListener,
        out: &mut HttpConnectionManager,
    ) -> Result<(), ConversionError>;
}

pub trait TcpFilterChainPlugin: Plugin {
    fn create_tcp_filter_chains(
        &self,
        params: &Params,
        parent: &Listener,
        listener: &TcpListener,
    ) -> Result<Vec<FilterChain>, ConversionError>;
}

pub trait VirtualHostPlugin: Plugin {
    fn process_virtual_host(
        &self,
        params: &VirtualHostParams,
        virtual_host: &VirtualHost,
        out: &mut EnvoyVirtualHost,
    ) -> Result<(), ConversionError>;
}

/// Runs for every generated route, whatever its action
pub trait RoutePlugin: Plugin {
    fn process_route(
        &self,
        params: &RouteParams,
        route: &Route,
        out: &mut EnvoyRoute,
    ) -> Result<(), ConversionError>;
}

pub trait RouteActionPlugin: Plugin {
    fn process_route_action(
        &self,
        params: &RouteActionParams,
        action: &RouteAction,
        out: &mut EnvoyRouteAction,
    ) -> Result<(), ConversionError>;
}

pub trait WeightedDestinationPlugin: Plugin {
    fn process_weighted_destination(
        &self,
        params: &RouteParams,
        destination: &WeightedDestination,
        out: &mut ClusterWeight,
    ) -> Result<(), ConversionError>;
}
