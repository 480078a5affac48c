//! Route action resolution: cluster specifiers, subsets and weighted destinations.

use envoy_types::pb::envoy::config::core::v3::{data_source::Specifier, DataSource, Metadata};
use envoy_types::pb::envoy::config::route::v3::{
    redirect_action::{self, PathRewriteSpecifier, SchemeRewriteSpecifier},
    route::Action as EnvoyAction,
    route_action::ClusterSpecifier,
    weighted_cluster::ClusterWeight,
    DirectResponseAction as EnvoyDirectResponseAction, RedirectAction as EnvoyRedirectAction,
    RouteAction as EnvoyRouteAction, WeightedCluster,
};
use envoy_types::pb::google::protobuf::{value::Kind, Struct, UInt32Value, Value};
use std::collections::BTreeSet;
use tracing::debug;

use super::errors::ConversionError;
use super::utils::{upstream_to_cluster_name, SUBSET_METADATA_NAMESPACE};
use crate::plugins::{PluginRegistry, RouteActionParams, RouteParams};
use crate::storage::models::{
    Action, DirectResponseAction, Destination, RedirectAction, RedirectPathRewrite,
    RedirectResponseCode, RouteAction, SingleDestination, Subset, Upstream, WeightedDestination,
};
use crate::storage::Snapshot;
use crate::validation::{RouteErrorType, RouteReport, WarningType};

/// Record a problem found while resolving a destination.
///
/// Only a missing upstream or upstream group is a warning; the route still
/// points at the cluster name so a later push can pick it up.
pub fn record_destination_error(report: &mut RouteReport, err: &ConversionError) {
    if err.is_destination_not_found() {
        report.add_warning(WarningType::InvalidDestinationWarning, err.to_string());
    } else {
        report.add_error(RouteErrorType::ProcessingError, err.to_string());
    }
}

/// Record a plugin hook failure on a route
pub fn record_plugin_error(report: &mut RouteReport, plugin: &str, err: &ConversionError) {
    let reason = format!("{}: {}", plugin, err);
    if err.is_destination_not_found() {
        report.add_warning(WarningType::InvalidDestinationWarning, reason);
    } else if err.is_warning() {
        report.add_warning(WarningType::ProcessingWarning, reason);
    } else {
        report.add_error(RouteErrorType::ProcessingError, reason);
    }
}

pub fn convert_action(
    plugins: &PluginRegistry,
    params: &RouteActionParams,
    report: &mut RouteReport,
) -> EnvoyAction {
    match &params.route.action {
        Action::RouteAction(route_action) => {
            let mut out = EnvoyRouteAction::default();
            set_route_action(plugins, &params.route_params, route_action, &mut out, report);

            for plugin in plugins.route_action_plugins() {
                if let Err(e) = plugin.process_route_action(params, route_action, &mut out) {
                    record_plugin_error(report, plugin.name(), &e);
                }
            }

            EnvoyAction::Route(out)
        }
        Action::DirectResponseAction(direct) => EnvoyAction::DirectResponse(convert_direct_response(direct)),
        Action::RedirectAction(redirect) => EnvoyAction::Redirect(convert_redirect(redirect)),
    }
}

fn set_route_action(
    plugins: &PluginRegistry,
    params: &RouteParams,
    route_action: &RouteAction,
    out: &mut EnvoyRouteAction,
    report: &mut RouteReport,
) {
    let snapshot = params.snapshot();
    match &route_action.destination {
        Destination::Single(single) => {
            out.cluster_specifier = Some(ClusterSpecifier::Cluster(upstream_to_cluster_name(
                &single.upstream,
            )));
            out.metadata_match = single.subset.as_ref().map(subset_metadata);
            if let Err(e) = check_single_destination(snapshot, single) {
                record_destination_error(report, &e);
            }
        }
        Destination::Multi(multi) => {
            set_weighted_clusters(plugins, params, &multi.destinations, out, report);
        }
        Destination::UpstreamGroup(group_ref) => match snapshot.find_upstream_group(group_ref) {
            Ok(group) => {
                set_weighted_clusters(plugins, params, &group.destinations, out, report);
            }
            Err(_) => {
                // Empty placeholder keeps the route structurally complete.
                out.cluster_specifier = Some(ClusterSpecifier::Cluster(String::new()));
                record_destination_error(
                    report,
                    &ConversionError::UpstreamGroupNotFound {
                        upstream_group: group_ref.to_string(),
                    },
                );
            }
        },
        Destination::ClusterHeader(header) => {
            if let Err(e) = validate_cluster_header(header) {
                report.add_warning(WarningType::InvalidDestinationWarning, e.to_string());
            }
            out.cluster_specifier = Some(ClusterSpecifier::ClusterHeader(header.clone()));
        }
    }
}

fn set_weighted_clusters(
    plugins: &PluginRegistry,
    params: &RouteParams,
    destinations: &[WeightedDestination],
    out: &mut EnvoyRouteAction,
    report: &mut RouteReport,
) {
    if destinations.is_empty() {
        record_destination_error(report, &ConversionError::NoDestinationSpecified);
        return;
    }

    let snapshot = params.snapshot();
    let mut total_weight: u32 = 0;
    let mut clusters = Vec::with_capacity(destinations.len());

    for weighted in destinations {
        total_weight = match total_weight.checked_add(weighted.weight) {
            Some(sum) => sum,
            None => {
                report.add_error(
                    RouteErrorType::ProcessingError,
                    "total weight of weighted destinations overflows",
                );
                u32::MAX
            }
        };

        let mut cluster = ClusterWeight {
            name: upstream_to_cluster_name(&weighted.destination.upstream),
            weight: Some(UInt32Value {
                value: weighted.weight,
            }),
            metadata_match: weighted.destination.subset.as_ref().map(subset_metadata),
            ..Default::default()
        };

        for plugin in plugins.weighted_destination_plugins() {
            if let Err(e) = plugin.process_weighted_destination(params, weighted, &mut cluster) {
                record_plugin_error(report, plugin.name(), &e);
            }
        }

        if let Err(e) = check_single_destination(snapshot, &weighted.destination) {
            record_destination_error(report, &e);
        }

        clusters.push(cluster);
    }

    debug!(clusters = clusters.len(), total_weight, "built weighted clusters");

    #[allow(deprecated)]
    let weighted_cluster = WeightedCluster {
        clusters,
        total_weight: Some(UInt32Value {
            value: total_weight,
        }),
        ..Default::default()
    };
    out.cluster_specifier = Some(ClusterSpecifier::WeightedClusters(weighted_cluster));
}

/// Check that the upstream exists and, if a subset is requested, that it can serve it
pub fn check_single_destination(
    snapshot: &Snapshot,
    destination: &SingleDestination,
) -> Result<(), ConversionError> {
    let upstream = snapshot.find_upstream(&destination.upstream).map_err(|_| {
        ConversionError::UpstreamNotFound {
            upstream: destination.upstream.to_string(),
        }
    })?;
    match &destination.subset {
        Some(subset) => check_subset(upstream, subset),
        None => Ok(()),
    }
}

/// The subset's key set must equal the key set of one of the upstream's selectors
pub fn check_subset(upstream: &Upstream, subset: &Subset) -> Result<(), ConversionError> {
    let Some(spec) = &upstream.subset_spec else {
        return Err(ConversionError::SubsetsMisconfigured {
            upstream: upstream.metadata.to_string(),
        });
    };

    let keys: BTreeSet<&str> = subset.values.keys().map(String::as_str).collect();
    let matched = spec.selectors.iter().any(|selector| {
        selector.keys.iter().map(String::as_str).collect::<BTreeSet<_>>() == keys
    });

    if matched {
        Ok(())
    } else {
        Err(ConversionError::SubsetNotMatched {
            upstream: upstream.metadata.to_string(),
        })
    }
}

fn subset_metadata(subset: &Subset) -> Metadata {
    let mut metadata = Metadata::default();
    metadata.filter_metadata.insert(
        SUBSET_METADATA_NAMESPACE.to_string(),
        Struct {
            fields: subset
                .values
                .iter()
                .map(|(key, value)| {
                    (
                        key.clone(),
                        Value {
                            kind: Some(Kind::StringValue(value.clone())),
                        },
                    )
                })
                .collect(),
        },
    );
    metadata
}

/// Header names used to pick a cluster must be plain ASCII without ':'
pub fn validate_cluster_header(header: &str) -> Result<(), ConversionError> {
    let reason = if header.is_empty() {
        "header name cannot be empty"
    } else if !header.is_ascii() {
        "header name must be ASCII"
    } else if header.contains(':') {
        "header name cannot contain ':'"
    } else {
        return Ok(());
    };
    Err(ConversionError::InvalidClusterHeader {
        header: header.to_string(),
        reason: reason.to_string(),
    })
}

fn convert_direct_response(direct: &DirectResponseAction) -> EnvoyDirectResponseAction {
    EnvoyDirectResponseAction {
        status: direct.status,
        body: if direct.body.is_empty() {
            None
        } else {
            Some(DataSource {
                specifier: Some(Specifier::InlineString(direct.body.clone())),
                ..Default::default()
            })
        },
        ..Default::default()
    }
}

fn convert_redirect(redirect: &RedirectAction) -> EnvoyRedirectAction {
    let response_code = match redirect.response_code {
        RedirectResponseCode::MovedPermanently => redirect_action::RedirectResponseCode::MovedPermanently,
        RedirectResponseCode::Found => redirect_action::RedirectResponseCode::Found,
        RedirectResponseCode::SeeOther => redirect_action::RedirectResponseCode::SeeOther,
        RedirectResponseCode::TemporaryRedirect => redirect_action::RedirectResponseCode::TemporaryRedirect,
        RedirectResponseCode::PermanentRedirect => redirect_action::RedirectResponseCode::PermanentRedirect,
    };

    EnvoyRedirectAction {
        host_redirect: redirect.host_redirect.clone(),
        response_code: response_code as i32,
        strip_query: redirect.strip_query,
        scheme_rewrite_specifier: redirect
            .https_redirect
            .then_some(SchemeRewriteSpecifier::HttpsRedirect(true)),
        // Unset keeps the request path, as in a host or scheme only redirect.
        path_rewrite_specifier: redirect.path_rewrite.as_ref().map(|rewrite| match rewrite {
            RedirectPathRewrite::PathRedirect(path) => PathRewriteSpecifier::PathRedirect(path.clone()),
            RedirectPathRewrite::PrefixRewrite(prefix) => {
                PathRewriteSpecifier::PrefixRewrite(prefix.clone())
            }
        }),
        ..Default::default()
    }
}
