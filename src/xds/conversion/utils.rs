use super::errors::ConversionError;
use crate::storage::models::{Listener, ListenerMatcher, ResourceRef};
use envoy_types::pb::google::protobuf::Any;
use lazy_static::lazy_static;
use prost::Message;
use regex::Regex;
use sha2::{Digest, Sha256};
use tracing::warn;

pub const LISTENER_TYPE_URL: &str = "type.googleapis.com/envoy.config.listener.v3.Listener";
pub const ROUTE_CONFIGURATION_TYPE_URL: &str =
    "type.googleapis.com/envoy.config.route.v3.RouteConfiguration";
pub const HTTP_CONNECTION_MANAGER_TYPE_URL: &str =
    "type.googleapis.com/envoy.extensions.filters.network.http_connection_manager.v3.HttpConnectionManager";
pub const ROUTER_TYPE_URL: &str = "type.googleapis.com/envoy.extensions.filters.http.router.v3.Router";
pub const TCP_PROXY_TYPE_URL: &str =
    "type.googleapis.com/envoy.extensions.filters.network.tcp_proxy.v3.TcpProxy";
pub const DOWNSTREAM_TLS_CONTEXT_TYPE_URL: &str =
    "type.googleapis.com/envoy.extensions.transport_sockets.tls.v3.DownstreamTlsContext";

/// Metadata filter namespace the load balancer reads subset selectors from
pub const SUBSET_METADATA_NAMESPACE: &str = "envoy.lb";

lazy_static! {
    /// Characters Envoy accepts in virtual host and route names
    static ref UNSAFE_NAME_CHARS: Regex = Regex::new(r"[^a-zA-Z0-9_.*-]").unwrap();
}

/// Route configuration name for a listener that is not split into matched segments
pub fn route_config_name(listener: &Listener) -> String {
    format!("{}-routes", listener.name)
}

/// Route configuration name for one matched segment of a hybrid or aggregate listener.
///
/// The suffix is derived from the matcher contents, so it stays stable across
/// passes as long as the matcher does not change.
pub fn matched_route_config_name(listener: &Listener, matcher: Option<&ListenerMatcher>) -> String {
    format!("{}_{}", listener.name, matcher_identity(matcher))
}

pub fn matcher_identity(matcher: Option<&ListenerMatcher>) -> String {
    let default_matcher = ListenerMatcher::default();
    let matcher = matcher.unwrap_or(&default_matcher);
    // Serializing a plain data struct cannot fail; fall back to Debug if it ever does.
    let canonical = serde_json::to_vec(matcher)
        .unwrap_or_else(|_| format!("{:?}", matcher).into_bytes());
    let digest = Sha256::digest(&canonical);
    hex::encode(&digest[..8])
}

pub fn upstream_to_cluster_name(upstream: &ResourceRef) -> String {
    format!("{}_{}", upstream.namespace, upstream.name)
}

/// Replace characters Envoy rejects in resource names
pub fn sanitize_for_envoy(name: &str, kind: &str) -> String {
    if !UNSAFE_NAME_CHARS.is_match(name) {
        return name.to_string();
    }
    let sanitized = UNSAFE_NAME_CHARS.replace_all(name, "_").into_owned();
    warn!("⚠️  Sanitized {} name '{}' to '{}'", kind, name, sanitized);
    sanitized
}

/// Encode a message into an `Any` with the given type URL
pub fn to_any<M: Message>(message: &M, type_url: &str, resource_type: &str) -> Result<Any, ConversionError> {
    let mut buf = Vec::new();
    message
        .encode(&mut buf)
        .map_err(|e| ConversionError::encoding(resource_type, e))?;
    Ok(Any {
        type_url: type_url.to_string(),
        value: buf,
    })
}
