mod common;

use common::*;
use envoy_types::pb::envoy::config::route::v3::{
    route::Action as EnvoyAction, route_action::ClusterSpecifier, route_match::PathSpecifier as EnvoyPathSpecifier,
    RouteAction as EnvoyRouteAction, RouteConfiguration,
};
use gateway_control_plane::storage::models::*;
use gateway_control_plane::storage::Snapshot;
use gateway_control_plane::validation::{
    ListenerTypeReport, ProxyReport, RouteErrorType, RouteReport, UpstreamGroupErrorType,
    VirtualHostErrorType, WarningType,
};
use gateway_control_plane::xds::ProxyTranslation;
use proptest::prelude::*;
use std::collections::BTreeMap;

fn translate_routes(virtual_hosts: Vec<VirtualHost>, snapshot: &Snapshot) -> ProxyTranslation {
    let proxy = proxy(vec![listener("http", ListenerType::Http(http(virtual_hosts)))]);
    translator().translate(&proxy, snapshot)
}

fn route_report(report: &ProxyReport, vhost: usize, route: usize) -> &RouteReport {
    match &report.listener_reports[0].listener_type {
        ListenerTypeReport::Http(http) => &http.virtual_host_reports[vhost].route_reports[route],
        other => panic!("expected http report, got {:?}", other),
    }
}

fn route_action(route_config: &RouteConfiguration, vhost: usize, route: usize) -> &EnvoyRouteAction {
    match &route_config.virtual_hosts[vhost].routes[route].action {
        Some(EnvoyAction::Route(action)) => action,
        other => panic!("expected route action, got {:?}", other),
    }
}

fn weighted(upstream: &str, weight: u32) -> WeightedDestination {
    WeightedDestination {
        destination: SingleDestination {
            upstream: resource(upstream),
            subset: None,
        },
        weight,
        options: None,
    }
}

#[test]
fn test_subset_on_upstream_without_subset_spec_is_an_error() {
    let destination = Destination::Single(SingleDestination {
        upstream: resource("petstore"),
        subset: Some(Subset {
            values: BTreeMap::from([("env".to_string(), "prod".to_string())]),
        }),
    });
    let snapshot = Snapshot::new(vec![upstream("petstore")], Vec::new(), Vec::new());

    let translation = translate_routes(
        vec![virtual_host("vh", &["a.com"], vec![route(destination)])],
        &snapshot,
    );

    let report = route_report(&translation.report, 0, 0);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].kind, RouteErrorType::ProcessingError);
    assert!(report.errors[0].reason.contains("default.petstore"));

    let action = route_action(&translation.resources.route_configurations[0], 0, 0);
    assert_eq!(
        action.cluster_specifier,
        Some(ClusterSpecifier::Cluster("default_petstore".to_string()))
    );
    assert!(action.metadata_match.is_some());
}

#[test]
fn test_missing_upstream_is_a_warning_and_route_is_kept() {
    let translation = translate_routes(
        vec![virtual_host("vh", &["a.com"], vec![route(single("ghost"))])],
        &Snapshot::default(),
    );

    let report = route_report(&translation.report, 0, 0);
    assert!(report.errors.is_empty());
    assert_eq!(report.warnings[0].kind, WarningType::InvalidDestinationWarning);
    assert!(!translation.report.has_errors());
    assert!(translation.report.has_warnings());
    assert_eq!(
        route_action(&translation.resources.route_configurations[0], 0, 0).cluster_specifier,
        Some(ClusterSpecifier::Cluster("default_ghost".to_string()))
    );
}

#[test]
fn test_missing_upstream_group_points_at_empty_cluster() {
    let translation = translate_routes(
        vec![virtual_host(
            "vh",
            &["a.com"],
            vec![route(Destination::UpstreamGroup(resource("ghost-group")))],
        )],
        &Snapshot::default(),
    );

    assert_eq!(translation.resources.route_configurations.len(), 1);
    assert_eq!(
        route_action(&translation.resources.route_configurations[0], 0, 0).cluster_specifier,
        Some(ClusterSpecifier::Cluster(String::new()))
    );
    let report = route_report(&translation.report, 0, 0);
    assert!(report.errors.is_empty());
    assert_eq!(report.warnings.len(), 1);
    assert!(report.warnings[0].reason.contains("upstream group default.ghost-group not found"));
}

#[test]
fn test_cluster_header_destination_selects_cluster_by_header() {
    let translation = translate_routes(
        vec![virtual_host(
            "vh",
            &["a.com"],
            vec![
                route(Destination::ClusterHeader("x-cluster".to_string())),
                route(Destination::ClusterHeader("bad:header".to_string())),
            ],
        )],
        &Snapshot::default(),
    );

    let route_config = &translation.resources.route_configurations[0];
    assert_eq!(
        route_action(route_config, 0, 0).cluster_specifier,
        Some(ClusterSpecifier::ClusterHeader("x-cluster".to_string()))
    );
    let valid = route_report(&translation.report, 0, 0);
    assert!(valid.errors.is_empty());
    assert!(valid.warnings.is_empty());

    // An invalid header name is a warning and the route still uses it
    assert_eq!(
        route_action(route_config, 0, 1).cluster_specifier,
        Some(ClusterSpecifier::ClusterHeader("bad:header".to_string()))
    );
    let invalid = route_report(&translation.report, 0, 1);
    assert!(invalid.errors.is_empty());
    assert_eq!(invalid.warnings.len(), 1);
    assert_eq!(invalid.warnings[0].kind, WarningType::InvalidDestinationWarning);
    assert!(invalid.warnings[0].reason.contains("bad:header"));
    assert!(!translation.report.has_errors());
}

#[test]
fn test_upstream_group_resolves_to_weighted_clusters_and_is_validated() {
    let group = UpstreamGroup {
        metadata: resource("rollout"),
        destinations: vec![weighted("stable", 90), weighted("canary", 10)],
    };
    let snapshot = Snapshot::new(vec![upstream("stable")], vec![group], Vec::new());

    let translation = translate_routes(
        vec![virtual_host(
            "vh",
            &["a.com"],
            vec![route(Destination::UpstreamGroup(resource("rollout")))],
        )],
        &snapshot,
    );

    let action = route_action(&translation.resources.route_configurations[0], 0, 0);
    let Some(ClusterSpecifier::WeightedClusters(clusters)) = &action.cluster_specifier else {
        panic!("expected weighted clusters");
    };
    assert_eq!(clusters.clusters.len(), 2);

    // Missing member: warning on the route, hard error on the group itself
    assert_eq!(
        route_report(&translation.report, 0, 0).warnings[0].kind,
        WarningType::InvalidDestinationWarning
    );
    let group_reports = &translation.report.upstream_group_reports;
    assert_eq!(group_reports.len(), 1);
    assert_eq!(group_reports[0].upstream_group, resource("rollout"));
    assert_eq!(group_reports[0].errors[0].kind, UpstreamGroupErrorType::UpstreamNotFound);
}

#[test]
fn test_zero_weighted_destinations_is_an_error_without_specifier() {
    let translation = translate_routes(
        vec![virtual_host(
            "vh",
            &["a.com"],
            vec![route(Destination::Multi(MultiDestination::default()))],
        )],
        &Snapshot::default(),
    );

    let report = route_report(&translation.report, 0, 0);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].reason, "no destination specified");
    assert!(route_action(&translation.resources.route_configurations[0], 0, 0)
        .cluster_specifier
        .is_none());
}

#[test]
fn test_route_without_matchers_matches_everything() {
    let mut catch_all = route(single("web"));
    catch_all.matchers.clear();
    let snapshot = Snapshot::new(vec![upstream("web")], Vec::new(), Vec::new());

    let translation = translate_routes(vec![virtual_host("vh", &[], vec![catch_all])], &snapshot);

    let routes = &translation.resources.route_configurations[0].virtual_hosts[0].routes;
    assert_eq!(routes.len(), 1);
    assert_eq!(routes[0].name, "vh-route-0-matcher-0");
    assert_eq!(
        routes[0].r#match.as_ref().unwrap().path_specifier,
        Some(EnvoyPathSpecifier::Prefix("/".to_string()))
    );
}

#[test]
fn test_one_generated_route_per_matcher() {
    let mut multi = route(single("web"));
    multi.name = "api".to_string();
    multi.matchers = vec![
        Matcher {
            path_specifier: Some(PathSpecifier::Exact("/health".to_string())),
            ..Default::default()
        },
        Matcher {
            path_specifier: Some(PathSpecifier::Regex("[".to_string())),
            ..Default::default()
        },
    ];
    let snapshot = Snapshot::new(vec![upstream("web")], Vec::new(), Vec::new());

    let translation = translate_routes(vec![virtual_host("my vh", &[], vec![multi])], &snapshot);

    let virtual_host = &translation.resources.route_configurations[0].virtual_hosts[0];
    assert_eq!(virtual_host.name, "my_vh");
    let names: Vec<_> = virtual_host.routes.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["my_vh-route-0-api-matcher-0", "my_vh-route-0-api-matcher-1"]);

    let report = route_report(&translation.report, 0, 0);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].kind, RouteErrorType::InvalidMatcherError);
}

#[test]
fn test_route_options_and_headers_are_applied() {
    let mut forwarded = route(single("web"));
    forwarded.options = Some(RouteOptions {
        prefix_rewrite: Some("/v2".to_string()),
        timeout_ms: Some(1500),
        host_rewrite: None,
        header_manipulation: Some(HeaderManipulation {
            request_headers_to_add: vec![HeaderValueOption {
                key: "x-route".to_string(),
                value: "forwarded".to_string(),
                append: false,
            }],
            ..Default::default()
        }),
    });
    let mut vhost = virtual_host("vh", &["a.com"], vec![forwarded]);
    vhost.options = Some(VirtualHostOptions {
        header_manipulation: Some(HeaderManipulation {
            response_headers_to_remove: vec!["server".to_string()],
            ..Default::default()
        }),
    });
    let snapshot = Snapshot::new(vec![upstream("web")], Vec::new(), Vec::new());

    let translation = translate_routes(vec![vhost], &snapshot);
    assert!(!translation.report.has_errors(), "{:?}", translation.report);

    let route_config = &translation.resources.route_configurations[0];
    assert_eq!(route_config.virtual_hosts[0].response_headers_to_remove, vec!["server".to_string()]);
    let envoy_route = &route_config.virtual_hosts[0].routes[0];
    assert_eq!(envoy_route.request_headers_to_add.len(), 1);
    let action = route_action(route_config, 0, 0);
    assert_eq!(action.prefix_rewrite, "/v2");
    assert_eq!(action.timeout.as_ref().unwrap().seconds, 1);
    assert_eq!(action.timeout.as_ref().unwrap().nanos, 500_000_000);
}

#[test]
fn test_invalid_route_header_is_reported_once_per_route() {
    let mut bad = route(single("web"));
    bad.matchers.push(Matcher {
        path_specifier: Some(PathSpecifier::Prefix("/other".to_string())),
        ..Default::default()
    });
    bad.options = Some(RouteOptions {
        header_manipulation: Some(HeaderManipulation {
            request_headers_to_remove: vec![":path".to_string()],
            ..Default::default()
        }),
        ..Default::default()
    });
    let snapshot = Snapshot::new(vec![upstream("web")], Vec::new(), Vec::new());

    let translation = translate_routes(vec![virtual_host("vh", &[], vec![bad])], &snapshot);

    assert_eq!(translation.resources.route_configurations[0].virtual_hosts[0].routes.len(), 2);
    let report = route_report(&translation.report, 0, 0);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].kind, RouteErrorType::ProcessingError);
}

#[test]
fn test_direct_response_body_limit_is_passed_through() {
    let proxy = proxy(vec![Listener {
        route_options: Some(RouteConfigurationOptions {
            max_direct_response_body_size_bytes: Some(8192),
        }),
        ..listener(
            "http",
            ListenerType::Http(http(vec![virtual_host(
                "vh",
                &[],
                vec![Route {
                    name: String::new(),
                    matchers: Vec::new(),
                    action: Action::DirectResponseAction(DirectResponseAction {
                        status: 200,
                        body: "ok".to_string(),
                    }),
                    options: None,
                }],
            )])),
        )
    }]);

    let translation = translator().translate(&proxy, &Snapshot::default());
    let route_config = &translation.resources.route_configurations[0];
    assert_eq!(route_config.max_direct_response_body_size_bytes.as_ref().unwrap().value, 8192);
    assert!(matches!(
        route_config.virtual_hosts[0].routes[0].action,
        Some(EnvoyAction::DirectResponse(_))
    ));
}

#[test]
fn test_shared_domains_flag_every_claimant() {
    let snapshot = Snapshot::new(vec![upstream("web")], Vec::new(), Vec::new());
    let translation = translate_routes(
        vec![
            virtual_host("a", &["shared.com"], vec![route(single("web"))]),
            virtual_host("b", &["shared.com", "b.com"], vec![route(single("web"))]),
            virtual_host("c", &["c.com"], vec![route(single("web"))]),
        ],
        &snapshot,
    );

    let ListenerTypeReport::Http(http_report) = &translation.report.listener_reports[0].listener_type else {
        panic!("expected http report");
    };
    let flagged: Vec<bool> = http_report
        .virtual_host_reports
        .iter()
        .map(|r| r.errors.iter().any(|e| e.kind == VirtualHostErrorType::DomainsNotUniqueError))
        .collect();
    assert_eq!(flagged, vec![true, true, false]);
    // Output is still produced for every virtual host
    assert_eq!(translation.resources.route_configurations[0].virtual_hosts.len(), 3);
}

proptest! {
    #[test]
    fn total_weight_is_sum_of_weights(weights in prop::collection::vec(0u32..10_000, 1..8)) {
        let destinations = weights
            .iter()
            .enumerate()
            .map(|(i, w)| weighted(&format!("u{}", i), *w))
            .collect();
        let upstreams = (0..weights.len()).map(|i| upstream(&format!("u{}", i))).collect();
        let snapshot = Snapshot::new(upstreams, Vec::new(), Vec::new());

        let translation = translate_routes(
            vec![virtual_host(
                "vh",
                &[],
                vec![route(Destination::Multi(MultiDestination { destinations }))],
            )],
            &snapshot,
        );

        let action = route_action(&translation.resources.route_configurations[0], 0, 0);
        let Some(ClusterSpecifier::WeightedClusters(clusters)) = &action.cluster_specifier else {
            panic!("expected weighted clusters");
        };
        #[allow(deprecated)]
        let total = clusters.total_weight.as_ref().map(|w| w.value);
        prop_assert_eq!(total, Some(weights.iter().sum::<u32>()));
        prop_assert_eq!(clusters.clusters.len(), weights.len());
        prop_assert!(!translation.report.has_errors());
    }
}
