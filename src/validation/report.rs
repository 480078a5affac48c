//! Report tree types.
//!
//! Every node mirrors one input resource and every `Vec` of child reports is
//! positionally aligned with the input array it describes. Findings are only
//! ever appended.

use serde::Serialize;

use crate::storage::ResourceRef;

/// One finding of a given kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding<K> {
    #[serde(rename = "type")]
    pub kind: K,
    pub reason: String,
}

impl<K> Finding<K> {
    pub fn new(kind: K, reason: impl Into<String>) -> Self {
        Self {
            kind,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WarningType {
    InvalidDestinationWarning,
    ProcessingWarning,
}

pub type Warning = Finding<WarningType>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ListenerErrorType {
    ProcessingError,
    SslConfigError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HttpListenerErrorType {
    ProcessingError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TcpListenerErrorType {
    ProcessingError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VirtualHostErrorType {
    DomainsNotUniqueError,
    EmptyDomainError,
    ProcessingError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RouteErrorType {
    InvalidMatcherError,
    ProcessingError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UpstreamGroupErrorType {
    UpstreamNotFound,
    SubsetsMisconfigured,
    NoDestinationSpecified,
}

macro_rules! report_findings {
    ($report:ty, $error_kind:ty) => {
        impl $report {
            pub fn add_error(&mut self, kind: $error_kind, reason: impl Into<String>) {
                self.errors.push(Finding::new(kind, reason));
            }

            pub fn add_warning(&mut self, kind: WarningType, reason: impl Into<String>) {
                self.warnings.push(Finding::new(kind, reason));
            }
        }
    };
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProxyReport {
    pub listener_reports: Vec<ListenerReport>,
    pub upstream_group_reports: Vec<UpstreamGroupReport>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ListenerReport {
    pub errors: Vec<Finding<ListenerErrorType>>,
    pub warnings: Vec<Warning>,
    pub listener_type: ListenerTypeReport,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ListenerTypeReport {
    /// The listener declared no type
    #[default]
    None,
    Http(HttpListenerReport),
    Tcp(TcpListenerReport),
    Hybrid(HybridListenerReport),
    Aggregate(AggregateListenerReport),
}

impl ListenerTypeReport {
    pub fn kind(&self) -> &'static str {
        match self {
            ListenerTypeReport::None => "none",
            ListenerTypeReport::Http(_) => "http",
            ListenerTypeReport::Tcp(_) => "tcp",
            ListenerTypeReport::Hybrid(_) => "hybrid",
            ListenerTypeReport::Aggregate(_) => "aggregate",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HttpListenerReport {
    pub errors: Vec<Finding<HttpListenerErrorType>>,
    pub warnings: Vec<Warning>,
    pub virtual_host_reports: Vec<VirtualHostReport>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TcpListenerReport {
    pub errors: Vec<Finding<TcpListenerErrorType>>,
    pub warnings: Vec<Warning>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HybridListenerReport {
    pub matched_listener_reports: Vec<MatchedListenerReport>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchedListenerReport {
    Http(HttpListenerReport),
    Tcp(TcpListenerReport),
}

/// One HTTP report per declared filter chain
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AggregateListenerReport {
    pub http_listener_reports: Vec<HttpListenerReport>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VirtualHostReport {
    pub errors: Vec<Finding<VirtualHostErrorType>>,
    pub warnings: Vec<Warning>,
    pub route_reports: Vec<RouteReport>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RouteReport {
    pub errors: Vec<Finding<RouteErrorType>>,
    pub warnings: Vec<Warning>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpstreamGroupReport {
    pub upstream_group: ResourceRef,
    pub errors: Vec<Finding<UpstreamGroupErrorType>>,
}

report_findings!(ListenerReport, ListenerErrorType);
report_findings!(HttpListenerReport, HttpListenerErrorType);
report_findings!(TcpListenerReport, TcpListenerErrorType);
report_findings!(VirtualHostReport, VirtualHostErrorType);
report_findings!(RouteReport, RouteErrorType);

impl UpstreamGroupReport {
    pub fn new(upstream_group: ResourceRef) -> Self {
        Self {
            upstream_group,
            errors: Vec::new(),
        }
    }

    pub fn add_error(&mut self, kind: UpstreamGroupErrorType, reason: impl Into<String>) {
        self.errors.push(Finding::new(kind, reason));
    }
}

impl ProxyReport {
    pub fn has_errors(&self) -> bool {
        self.listener_reports.iter().any(ListenerReport::has_errors)
            || self.upstream_group_reports.iter().any(|r| !r.errors.is_empty())
    }

    pub fn has_warnings(&self) -> bool {
        self.listener_reports.iter().any(ListenerReport::has_warnings)
    }
}

impl ListenerReport {
    pub fn has_errors(&self) -> bool {
        if !self.errors.is_empty() {
            return true;
        }
        self.http_reports().any(HttpListenerReport::has_errors)
            || self.tcp_reports().any(|r| !r.errors.is_empty())
    }

    pub fn has_warnings(&self) -> bool {
        if !self.warnings.is_empty() {
            return true;
        }
        self.http_reports().any(HttpListenerReport::has_warnings)
            || self.tcp_reports().any(|r| !r.warnings.is_empty())
    }

    /// Every HTTP segment report of this listener, in declaration order
    pub fn http_reports(&self) -> Box<dyn Iterator<Item = &HttpListenerReport> + '_> {
        match &self.listener_type {
            ListenerTypeReport::Http(http) => Box::new(std::iter::once(http)),
            ListenerTypeReport::Hybrid(hybrid) => Box::new(
                hybrid
                    .matched_listener_reports
                    .iter()
                    .filter_map(|matched| match matched {
                        MatchedListenerReport::Http(http) => Some(http),
                        MatchedListenerReport::Tcp(_) => None,
                    }),
            ),
            ListenerTypeReport::Aggregate(aggregate) => {
                Box::new(aggregate.http_listener_reports.iter())
            }
            ListenerTypeReport::Tcp(_) | ListenerTypeReport::None => Box::new(std::iter::empty()),
        }
    }

    pub fn tcp_reports(&self) -> Box<dyn Iterator<Item = &TcpListenerReport> + '_> {
        match &self.listener_type {
            ListenerTypeReport::Tcp(tcp) => Box::new(std::iter::once(tcp)),
            ListenerTypeReport::Hybrid(hybrid) => Box::new(
                hybrid
                    .matched_listener_reports
                    .iter()
                    .filter_map(|matched| match matched {
                        MatchedListenerReport::Tcp(tcp) => Some(tcp),
                        MatchedListenerReport::Http(_) => None,
                    }),
            ),
            _ => Box::new(std::iter::empty()),
        }
    }
}

impl HttpListenerReport {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
            || self.virtual_host_reports.iter().any(|vh| {
                !vh.errors.is_empty() || vh.route_reports.iter().any(|r| !r.errors.is_empty())
            })
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
            || self.virtual_host_reports.iter().any(|vh| {
                !vh.warnings.is_empty() || vh.route_reports.iter().any(|r| !r.warnings.is_empty())
            })
    }
}
