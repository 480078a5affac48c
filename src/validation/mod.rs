//! Validation report tree and its pre-shaping.
//!
//! `make_report` builds an empty report whose shape matches a proxy exactly.
//! Translators receive that report and navigate into it with [`SegmentPath`].

mod report;

pub use report::*;

use crate::storage::models::{
    HttpListener, Listener, ListenerType, MatchedListenerType, Proxy,
};

/// Build an empty report tree aligned with every listener, virtual host and route of `proxy`
pub fn make_report(proxy: &Proxy) -> ProxyReport {
    ProxyReport {
        listener_reports: proxy.listeners.iter().map(make_listener_report).collect(),
        upstream_group_reports: Vec::new(),
    }
}

pub fn make_listener_report(listener: &Listener) -> ListenerReport {
    let listener_type = match &listener.listener_type {
        None => ListenerTypeReport::None,
        Some(ListenerType::Http(http)) => ListenerTypeReport::Http(make_http_listener_report(http)),
        Some(ListenerType::Tcp(_)) => ListenerTypeReport::Tcp(TcpListenerReport::default()),
        Some(ListenerType::Hybrid(hybrid)) => ListenerTypeReport::Hybrid(HybridListenerReport {
            matched_listener_reports: hybrid
                .matched_listeners
                .iter()
                .map(|matched| match &matched.listener_type {
                    MatchedListenerType::Http(http) => {
                        MatchedListenerReport::Http(make_http_listener_report(http))
                    }
                    MatchedListenerType::Tcp(_) => {
                        MatchedListenerReport::Tcp(TcpListenerReport::default())
                    }
                })
                .collect(),
        }),
        Some(ListenerType::Aggregate(aggregate)) => {
            ListenerTypeReport::Aggregate(AggregateListenerReport {
                http_listener_reports: aggregate
                    .http_filter_chains
                    .iter()
                    .map(|chain| {
                        let (http, _) = aggregate.resolve_http_listener(chain);
                        make_http_listener_report(&http)
                    })
                    .collect(),
            })
        }
    };

    ListenerReport {
        errors: Vec::new(),
        warnings: Vec::new(),
        listener_type,
    }
}

pub fn make_http_listener_report(http: &HttpListener) -> HttpListenerReport {
    HttpListenerReport {
        errors: Vec::new(),
        warnings: Vec::new(),
        virtual_host_reports: http
            .virtual_hosts
            .iter()
            .map(|vhost| VirtualHostReport {
                errors: Vec::new(),
                warnings: Vec::new(),
                route_reports: vec![RouteReport::default(); vhost.routes.len()],
            })
            .collect(),
    }
}

/// Location of one listener segment inside a [`ListenerReport`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentPath {
    /// The listener itself is the segment (plain HTTP or TCP)
    Root,
    /// Index into a hybrid listener's matched listeners
    Matched(usize),
    /// Index into an aggregate listener's filter chains
    Aggregate(usize),
}

impl ListenerReport {
    pub fn http_report(&self, path: SegmentPath) -> Option<&HttpListenerReport> {
        match (&self.listener_type, path) {
            (ListenerTypeReport::Http(http), SegmentPath::Root) => Some(http),
            (ListenerTypeReport::Hybrid(hybrid), SegmentPath::Matched(i)) => {
                match hybrid.matched_listener_reports.get(i)? {
                    MatchedListenerReport::Http(http) => Some(http),
                    MatchedListenerReport::Tcp(_) => None,
                }
            }
            (ListenerTypeReport::Aggregate(aggregate), SegmentPath::Aggregate(i)) => {
                aggregate.http_listener_reports.get(i)
            }
            _ => None,
        }
    }

    pub fn http_report_mut(&mut self, path: SegmentPath) -> Option<&mut HttpListenerReport> {
        match (&mut self.listener_type, path) {
            (ListenerTypeReport::Http(http), SegmentPath::Root) => Some(http),
            (ListenerTypeReport::Hybrid(hybrid), SegmentPath::Matched(i)) => {
                match hybrid.matched_listener_reports.get_mut(i)? {
                    MatchedListenerReport::Http(http) => Some(http),
                    MatchedListenerReport::Tcp(_) => None,
                }
            }
            (ListenerTypeReport::Aggregate(aggregate), SegmentPath::Aggregate(i)) => {
                aggregate.http_listener_reports.get_mut(i)
            }
            _ => None,
        }
    }

    pub fn tcp_report_mut(&mut self, path: SegmentPath) -> Option<&mut TcpListenerReport> {
        match (&mut self.listener_type, path) {
            (ListenerTypeReport::Tcp(tcp), SegmentPath::Root) => Some(tcp),
            (ListenerTypeReport::Hybrid(hybrid), SegmentPath::Matched(i)) => {
                match hybrid.matched_listener_reports.get_mut(i)? {
                    MatchedListenerReport::Tcp(tcp) => Some(tcp),
                    MatchedListenerReport::Http(_) => None,
                }
            }
            _ => None,
        }
    }
}

/// Check that an HTTP report lines up with the segment it describes.
///
/// Returns a description of the first misalignment found.
pub fn check_http_alignment(http: &HttpListener, report: &HttpListenerReport) -> Result<(), String> {
    if http.virtual_hosts.len() != report.virtual_host_reports.len() {
        return Err(format!(
            "expected {} virtual host reports, found {}",
            http.virtual_hosts.len(),
            report.virtual_host_reports.len()
        ));
    }
    for (vhost, vhost_report) in http.virtual_hosts.iter().zip(&report.virtual_host_reports) {
        if vhost.routes.len() != vhost_report.route_reports.len() {
            return Err(format!(
                "virtual host {} has {} routes but {} route reports",
                vhost.name,
                vhost.routes.len(),
                vhost_report.route_reports.len()
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::models::*;
    use std::collections::BTreeMap;

    fn vhost(name: &str, routes: usize) -> VirtualHost {
        VirtualHost {
            name: name.to_string(),
            routes: (0..routes)
                .map(|_| Route {
                    name: String::new(),
                    matchers: vec![],
                    action: Action::DirectResponseAction(DirectResponseAction {
                        status: 200,
                        body: String::new(),
                    }),
                    options: None,
                })
                .collect(),
            ..Default::default()
        }
    }

    fn listener(name: &str, listener_type: ListenerType) -> Listener {
        Listener {
            name: name.to_string(),
            bind_address: "::".to_string(),
            bind_port: 8080,
            ssl_configurations: vec![],
            options: None,
            route_options: None,
            listener_type: Some(listener_type),
        }
    }

    #[test]
    fn test_report_is_aligned_with_http_listener() {
        let http = HttpListener {
            virtual_hosts: vec![vhost("a", 2), vhost("b", 0), vhost("c", 3)],
            ..Default::default()
        };
        let report = make_listener_report(&listener("http", ListenerType::Http(http.clone())));

        let http_report = report.http_report(SegmentPath::Root).unwrap();
        assert_eq!(http_report.virtual_host_reports.len(), 3);
        assert_eq!(http_report.virtual_host_reports[0].route_reports.len(), 2);
        assert_eq!(http_report.virtual_host_reports[1].route_reports.len(), 0);
        assert_eq!(http_report.virtual_host_reports[2].route_reports.len(), 3);
        assert!(check_http_alignment(&http, http_report).is_ok());
    }

    #[test]
    fn test_hybrid_report_is_positional() {
        let hybrid = HybridListener {
            matched_listeners: vec![
                MatchedListener {
                    matcher: None,
                    ssl_configurations: vec![],
                    listener_type: MatchedListenerType::Tcp(TcpListener::default()),
                },
                MatchedListener {
                    matcher: None,
                    ssl_configurations: vec![],
                    listener_type: MatchedListenerType::Http(HttpListener {
                        virtual_hosts: vec![vhost("a", 1)],
                        ..Default::default()
                    }),
                },
            ],
        };
        let mut report = make_listener_report(&listener("hybrid", ListenerType::Hybrid(hybrid)));

        assert!(report.tcp_report_mut(SegmentPath::Matched(0)).is_some());
        assert!(report.http_report_mut(SegmentPath::Matched(0)).is_none());
        assert!(report.http_report_mut(SegmentPath::Matched(1)).is_some());
        assert!(report.http_report_mut(SegmentPath::Matched(2)).is_none());
        assert!(report.http_report_mut(SegmentPath::Root).is_none());
    }

    #[test]
    fn test_aggregate_report_skips_unresolved_virtual_hosts() {
        let mut virtual_hosts = BTreeMap::new();
        virtual_hosts.insert("shared".to_string(), vhost("shared", 2));
        let aggregate = AggregateListener {
            http_resources: HttpResources {
                virtual_hosts,
                http_options: BTreeMap::new(),
            },
            http_filter_chains: vec![
                HttpFilterChain {
                    virtual_host_refs: vec!["shared".to_string(), "gone".to_string()],
                    ..Default::default()
                },
                HttpFilterChain {
                    virtual_host_refs: vec!["shared".to_string()],
                    ..Default::default()
                },
            ],
        };
        let report = make_listener_report(&listener("agg", ListenerType::Aggregate(aggregate)));

        for i in 0..2 {
            let http = report.http_report(SegmentPath::Aggregate(i)).unwrap();
            assert_eq!(http.virtual_host_reports.len(), 1);
            assert_eq!(http.virtual_host_reports[0].route_reports.len(), 2);
        }
    }

    #[test]
    fn test_errors_and_warnings_propagate_to_the_proxy() {
        let proxy = Proxy {
            metadata: ResourceRef::new("default", "proxy"),
            listeners: vec![listener(
                "http",
                ListenerType::Http(HttpListener {
                    virtual_hosts: vec![vhost("a", 1)],
                    ..Default::default()
                }),
            )],
        };
        let mut report = make_report(&proxy);
        assert!(!report.has_errors());
        assert!(!report.has_warnings());

        let http = report.listener_reports[0]
            .http_report_mut(SegmentPath::Root)
            .unwrap();
        http.virtual_host_reports[0].route_reports[0]
            .add_warning(WarningType::InvalidDestinationWarning, "missing upstream");
        assert!(report.has_warnings());
        assert!(!report.has_errors());

        report.listener_reports[0].add_error(ListenerErrorType::SslConfigError, "bad secret");
        assert!(report.has_errors());
    }

    #[test]
    fn test_misaligned_report_is_detected() {
        let http = HttpListener {
            virtual_hosts: vec![vhost("a", 2)],
            ..Default::default()
        };
        let mut report = make_http_listener_report(&http);
        report.virtual_host_reports[0].route_reports.pop();
        let err = check_http_alignment(&http, &report).unwrap_err();
        assert!(err.contains("virtual host a"));
    }
}
