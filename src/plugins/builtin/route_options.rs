use envoy_types::pb::envoy::config::route::v3::{
    route_action::HostRewriteSpecifier, RouteAction as EnvoyRouteAction,
};
use envoy_types::pb::google::protobuf::Duration;
use std::sync::Arc;

use crate::plugins::{Capability, Plugin, RouteActionParams, RouteActionPlugin};
use crate::storage::models::RouteAction;
use crate::xds::conversion::ConversionError;

/// Applies per-route `RouteOptions` to forwarding actions
pub struct RouteOptionsPlugin;

impl Plugin for RouteOptionsPlugin {
    fn name(&self) -> &'static str {
        "route_options"
    }

    fn capabilities(self: Arc<Self>) -> Vec<Capability> {
        vec![Capability::RouteAction(self)]
    }
}

impl RouteActionPlugin for RouteOptionsPlugin {
    fn process_route_action(
        &self,
        params: &RouteActionParams,
        _action: &RouteAction,
        out: &mut EnvoyRouteAction,
    ) -> Result<(), ConversionError> {
        let Some(options) = &params.route.options else {
            return Ok(());
        };

        if let Some(prefix_rewrite) = &options.prefix_rewrite {
            if !prefix_rewrite.is_empty() && !prefix_rewrite.starts_with('/') {
                return Err(ConversionError::ValidationFailed {
                    reason: format!("prefix_rewrite '{}' must start with '/'", prefix_rewrite),
                });
            }
            out.prefix_rewrite = prefix_rewrite.clone();
        }

        if let Some(timeout_ms) = options.timeout_ms {
            out.timeout = Some(Duration {
                seconds: (timeout_ms / 1000) as i64,
                nanos: ((timeout_ms % 1000) * 1_000_000) as i32,
            });
        }

        if let Some(host) = &options.host_rewrite {
            out.host_rewrite_specifier = Some(HostRewriteSpecifier::HostRewriteLiteral(host.clone()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::{Params, RouteParams, VirtualHostParams};
    use crate::storage::models::{
        Action, Destination, HttpListener, Listener, Proxy, ResourceRef, Route, RouteOptions,
        SingleDestination, VirtualHost,
    };
    use crate::storage::Snapshot;

    fn run(options: RouteOptions) -> Result<EnvoyRouteAction, ConversionError> {
        let snapshot = Snapshot::default();
        let proxy = Proxy {
            metadata: ResourceRef::new("default", "proxy"),
            listeners: vec![],
        };
        let listener = Listener {
            name: "gateway".to_string(),
            bind_address: "::".to_string(),
            bind_port: 8080,
            ssl_configurations: vec![],
            options: None,
            route_options: None,
            listener_type: None,
        };
        let http_listener = HttpListener::default();
        let virtual_host = VirtualHost::default();
        let action = RouteAction {
            destination: Destination::Single(SingleDestination {
                upstream: ResourceRef::new("default", "web"),
                subset: None,
            }),
        };
        let route = Route {
            name: "r".to_string(),
            matchers: vec![],
            action: Action::RouteAction(action.clone()),
            options: Some(options),
        };
        let params = RouteActionParams {
            route_params: RouteParams {
                virtual_host_params: VirtualHostParams {
                    params: Params { snapshot: &snapshot },
                    proxy: &proxy,
                    listener: &listener,
                    http_listener: &http_listener,
                },
                virtual_host: &virtual_host,
            },
            route: &route,
        };

        let mut out = EnvoyRouteAction::default();
        RouteOptionsPlugin.process_route_action(&params, &action, &mut out)?;
        Ok(out)
    }

    #[test]
    fn test_applies_rewrite_timeout_and_host() {
        let out = run(RouteOptions {
            prefix_rewrite: Some("/api".to_string()),
            timeout_ms: Some(2250),
            host_rewrite: Some("internal.local".to_string()),
            header_manipulation: None,
        })
        .unwrap();

        assert_eq!(out.prefix_rewrite, "/api");
        assert_eq!(out.timeout, Some(Duration { seconds: 2, nanos: 250_000_000 }));
        assert_eq!(
            out.host_rewrite_specifier,
            Some(HostRewriteSpecifier::HostRewriteLiteral("internal.local".to_string()))
        );
    }

    #[test]
    fn test_relative_prefix_rewrite_is_rejected() {
        let err = run(RouteOptions {
            prefix_rewrite: Some("api".to_string()),
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, ConversionError::ValidationFailed { .. }));
        assert!(!err.is_warning());
    }
}
