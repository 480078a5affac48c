use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Namespaced reference to a resource held in the snapshot
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceRef {
    pub name: String,
    #[serde(default)]
    pub namespace: String,
}

impl ResourceRef {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
        }
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.namespace, self.name)
    }
}

/// The routing graph for one data-plane proxy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Proxy {
    pub metadata: ResourceRef,
    #[serde(default)]
    pub listeners: Vec<Listener>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listener {
    pub name: String,
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    pub bind_port: u32,
    #[serde(default)]
    pub ssl_configurations: Vec<SslConfig>,
    #[serde(default)]
    pub options: Option<ListenerOptions>,
    #[serde(default)]
    pub route_options: Option<RouteConfigurationOptions>,
    /// `None` when the resource was written without a listener type
    #[serde(default)]
    pub listener_type: Option<ListenerType>,
}

fn default_bind_address() -> String {
    "::".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListenerType {
    Http(HttpListener),
    Tcp(TcpListener),
    Hybrid(HybridListener),
    Aggregate(AggregateListener),
}

impl ListenerType {
    pub fn kind(&self) -> &'static str {
        match self {
            ListenerType::Http(_) => "http",
            ListenerType::Tcp(_) => "tcp",
            ListenerType::Hybrid(_) => "hybrid",
            ListenerType::Aggregate(_) => "aggregate",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListenerOptions {
    #[serde(default)]
    pub per_connection_buffer_limit_bytes: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteConfigurationOptions {
    #[serde(default)]
    pub max_direct_response_body_size_bytes: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HttpListener {
    #[serde(default)]
    pub virtual_hosts: Vec<VirtualHost>,
    #[serde(default)]
    pub options: Option<HttpListenerOptions>,
    #[serde(default)]
    pub stat_prefix: String,
}

/// Settings applied to the HTTP connection manager
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HttpListenerOptions {
    #[serde(default)]
    pub use_remote_address: Option<bool>,
    #[serde(default)]
    pub xff_num_trusted_hops: Option<u32>,
    #[serde(default)]
    pub server_name: Option<String>,
    #[serde(default)]
    pub generate_request_id: Option<bool>,
    #[serde(default)]
    pub skip_xff_append: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TcpListener {
    #[serde(default)]
    pub tcp_hosts: Vec<TcpHost>,
    #[serde(default)]
    pub stat_prefix: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TcpHost {
    pub name: String,
    #[serde(default)]
    pub ssl_config: Option<SslConfig>,
    pub destination: TcpDestination,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TcpDestination {
    Single(SingleDestination),
    Multi(MultiDestination),
    UpstreamGroup(ResourceRef),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HybridListener {
    #[serde(default)]
    pub matched_listeners: Vec<MatchedListener>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchedListener {
    #[serde(default)]
    pub matcher: Option<ListenerMatcher>,
    #[serde(default)]
    pub ssl_configurations: Vec<SslConfig>,
    pub listener_type: MatchedListenerType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchedListenerType {
    Http(HttpListener),
    Tcp(TcpListener),
}

/// Filter-chain selection criteria for one segment of a hybrid or aggregate listener
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListenerMatcher {
    #[serde(default)]
    pub ssl_config: Option<SslConfig>,
    #[serde(default)]
    pub source_prefix_ranges: Vec<CidrRange>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CidrRange {
    pub address_prefix: String,
    pub prefix_len: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateListener {
    #[serde(default)]
    pub http_resources: HttpResources,
    #[serde(default)]
    pub http_filter_chains: Vec<HttpFilterChain>,
}

/// Virtual hosts and connection-manager options shared by the chains of an aggregate listener
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HttpResources {
    #[serde(default)]
    pub virtual_hosts: BTreeMap<String, VirtualHost>,
    #[serde(default)]
    pub http_options: BTreeMap<String, HttpListenerOptions>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HttpFilterChain {
    #[serde(default)]
    pub matcher: Option<ListenerMatcher>,
    #[serde(default)]
    pub virtual_host_refs: Vec<String>,
    #[serde(default)]
    pub http_options_ref: String,
}

impl AggregateListener {
    /// Build the HTTP segment described by one filter chain.
    ///
    /// Every referenced virtual host is cloned out of the shared map, so two
    /// chains naming the same key never share an instance. References that do
    /// not resolve are returned alongside the segment instead of being included.
    pub fn resolve_http_listener(&self, chain: &HttpFilterChain) -> (HttpListener, Vec<String>) {
        let mut missing = Vec::new();
        let mut virtual_hosts = Vec::with_capacity(chain.virtual_host_refs.len());
        for vhost_ref in &chain.virtual_host_refs {
            match self.http_resources.virtual_hosts.get(vhost_ref) {
                Some(vhost) => virtual_hosts.push(vhost.clone()),
                None => missing.push(vhost_ref.clone()),
            }
        }

        let listener = HttpListener {
            virtual_hosts,
            options: self.http_resources.http_options.get(&chain.http_options_ref).cloned(),
            stat_prefix: String::new(),
        };
        (listener, missing)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VirtualHost {
    pub name: String,
    #[serde(default)]
    pub domains: Vec<String>,
    #[serde(default)]
    pub routes: Vec<Route>,
    #[serde(default)]
    pub options: Option<VirtualHostOptions>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VirtualHostOptions {
    #[serde(default)]
    pub header_manipulation: Option<HeaderManipulation>,
}

/// Headers added to or removed from requests and responses
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HeaderManipulation {
    #[serde(default)]
    pub request_headers_to_add: Vec<HeaderValueOption>,
    #[serde(default)]
    pub request_headers_to_remove: Vec<String>,
    #[serde(default)]
    pub response_headers_to_add: Vec<HeaderValueOption>,
    #[serde(default)]
    pub response_headers_to_remove: Vec<String>,
}

impl HeaderManipulation {
    pub fn is_empty(&self) -> bool {
        self.request_headers_to_add.is_empty()
            && self.request_headers_to_remove.is_empty()
            && self.response_headers_to_add.is_empty()
            && self.response_headers_to_remove.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeaderValueOption {
    pub key: String,
    pub value: String,
    #[serde(default = "default_append")]
    pub append: bool,
}

fn default_append() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub matchers: Vec<Matcher>,
    pub action: Action,
    #[serde(default)]
    pub options: Option<RouteOptions>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteOptions {
    #[serde(default)]
    pub prefix_rewrite: Option<String>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub host_rewrite: Option<String>,
    #[serde(default)]
    pub header_manipulation: Option<HeaderManipulation>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Matcher {
    #[serde(default)]
    pub path_specifier: Option<PathSpecifier>,
    #[serde(default)]
    pub headers: Vec<HeaderMatcher>,
    #[serde(default)]
    pub query_parameters: Vec<QueryParameterMatcher>,
    #[serde(default)]
    pub methods: Vec<String>,
    #[serde(default)]
    pub case_sensitive: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathSpecifier {
    Prefix(String),
    Exact(String),
    Regex(String),
}

/// An empty `value` matches on presence of the header alone
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderMatcher {
    pub name: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub regex: bool,
    #[serde(default)]
    pub invert_match: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryParameterMatcher {
    pub name: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub regex: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    RouteAction(RouteAction),
    DirectResponseAction(DirectResponseAction),
    RedirectAction(RedirectAction),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteAction {
    pub destination: Destination,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Destination {
    Single(SingleDestination),
    Multi(MultiDestination),
    UpstreamGroup(ResourceRef),
    /// Cluster name is read from this request header by the data plane
    ClusterHeader(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SingleDestination {
    pub upstream: ResourceRef,
    #[serde(default)]
    pub subset: Option<Subset>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subset {
    #[serde(default)]
    pub values: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MultiDestination {
    #[serde(default)]
    pub destinations: Vec<WeightedDestination>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedDestination {
    pub destination: SingleDestination,
    #[serde(default)]
    pub weight: u32,
    #[serde(default)]
    pub options: Option<WeightedDestinationOptions>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeightedDestinationOptions {
    #[serde(default)]
    pub header_manipulation: Option<HeaderManipulation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectResponseAction {
    pub status: u32,
    #[serde(default)]
    pub body: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedirectAction {
    #[serde(default)]
    pub host_redirect: String,
    #[serde(default)]
    pub path_rewrite: Option<RedirectPathRewrite>,
    #[serde(default)]
    pub response_code: RedirectResponseCode,
    #[serde(default)]
    pub https_redirect: bool,
    #[serde(default)]
    pub strip_query: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedirectPathRewrite {
    PathRedirect(String),
    PrefixRewrite(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RedirectResponseCode {
    #[default]
    MovedPermanently,
    Found,
    SeeOther,
    TemporaryRedirect,
    PermanentRedirect,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Upstream {
    pub metadata: ResourceRef,
    #[serde(default)]
    pub subset_spec: Option<SubsetSpec>,
}

/// Label-key selectors an upstream partitions its endpoints by
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubsetSpec {
    #[serde(default)]
    pub selectors: Vec<Selector>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Selector {
    #[serde(default)]
    pub keys: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpstreamGroup {
    pub metadata: ResourceRef,
    #[serde(default)]
    pub destinations: Vec<WeightedDestination>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Secret {
    pub metadata: ResourceRef,
    pub tls: TlsSecret,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TlsSecret {
    #[serde(default)]
    pub cert_chain: String,
    #[serde(default)]
    pub private_key: String,
    #[serde(default)]
    pub root_ca: String,
}

/// Downstream TLS settings for a listener or segment
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SslConfig {
    #[serde(default)]
    pub ssl_secrets: Option<SslSecrets>,
    #[serde(default)]
    pub sni_domains: Vec<String>,
    #[serde(default)]
    pub verify_subject_alt_name: Vec<String>,
    #[serde(default)]
    pub parameters: Option<SslParameters>,
    #[serde(default)]
    pub alpn_protocols: Vec<String>,
    #[serde(default)]
    pub one_way_tls: Option<bool>,
    #[serde(default)]
    pub disable_tls_session_resumption: Option<bool>,
    #[serde(default)]
    pub transport_socket_connect_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SslSecrets {
    SecretRef(ResourceRef),
    SslFiles(SslFiles),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SslFiles {
    #[serde(default)]
    pub tls_cert: String,
    #[serde(default)]
    pub tls_key: String,
    #[serde(default)]
    pub root_ca: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SslParameters {
    #[serde(default)]
    pub minimum_protocol_version: Option<String>,
    #[serde(default)]
    pub maximum_protocol_version: Option<String>,
    #[serde(default)]
    pub cipher_suites: Vec<String>,
    #[serde(default)]
    pub ecdh_curves: Vec<String>,
}
