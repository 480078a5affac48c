//! Request and response header manipulation at virtual host, route and
//! weighted destination level.

use envoy_types::pb::envoy::config::core::v3::{
    header_value_option::HeaderAppendAction, HeaderValue, HeaderValueOption as EnvoyHeaderValueOption,
};
use envoy_types::pb::envoy::config::route::v3::{
    weighted_cluster::ClusterWeight, Route as EnvoyRoute, VirtualHost as EnvoyVirtualHost,
};
use lazy_static::lazy_static;
use regex::Regex;
use std::sync::Arc;

use crate::plugins::{
    Capability, Plugin, RouteParams, RoutePlugin, VirtualHostParams, VirtualHostPlugin,
    WeightedDestinationPlugin,
};
use crate::storage::models::{
    HeaderManipulation, HeaderValueOption, Route, VirtualHost, WeightedDestination,
};
use crate::xds::conversion::ConversionError;

lazy_static! {
    /// RFC 7230 token characters
    static ref HEADER_NAME_REGEX: Regex = Regex::new(r"^[a-zA-Z0-9!#$%&'*+.^_`|~-]+$").unwrap();
}

/// Envoy rejects mutations of these
const RESERVED_HEADERS: [&str; 2] = ["host", "content-length"];

pub struct HeaderManipulationPlugin;

#[derive(Default)]
struct HeaderMutations {
    request_headers_to_add: Vec<EnvoyHeaderValueOption>,
    request_headers_to_remove: Vec<String>,
    response_headers_to_add: Vec<EnvoyHeaderValueOption>,
    response_headers_to_remove: Vec<String>,
}

impl HeaderManipulationPlugin {
    fn convert(manipulation: &HeaderManipulation) -> Result<HeaderMutations, ConversionError> {
        Ok(HeaderMutations {
            request_headers_to_add: convert_headers_to_add(&manipulation.request_headers_to_add)?,
            request_headers_to_remove: validate_headers_to_remove(
                &manipulation.request_headers_to_remove,
            )?,
            response_headers_to_add: convert_headers_to_add(&manipulation.response_headers_to_add)?,
            response_headers_to_remove: validate_headers_to_remove(
                &manipulation.response_headers_to_remove,
            )?,
        })
    }
}

fn validate_header_name(name: &str) -> Result<(), ConversionError> {
    if name.starts_with(':') {
        return Err(ConversionError::InvalidHeader {
            header: name.to_string(),
            reason: "pseudo-headers cannot be modified".to_string(),
        });
    }
    if !HEADER_NAME_REGEX.is_match(name) {
        return Err(ConversionError::InvalidHeader {
            header: name.to_string(),
            reason: "not a valid header name".to_string(),
        });
    }
    if RESERVED_HEADERS.contains(&name.to_ascii_lowercase().as_str()) {
        return Err(ConversionError::InvalidHeader {
            header: name.to_string(),
            reason: "header is reserved".to_string(),
        });
    }
    Ok(())
}

fn convert_headers_to_add(
    headers: &[HeaderValueOption],
) -> Result<Vec<EnvoyHeaderValueOption>, ConversionError> {
    headers
        .iter()
        .map(|header| {
            validate_header_name(&header.key)?;
            let append_action = if header.append {
                HeaderAppendAction::AppendIfExistsOrAdd
            } else {
                HeaderAppendAction::OverwriteIfExistsOrAdd
            };
            Ok(EnvoyHeaderValueOption {
                header: Some(HeaderValue {
                    key: header.key.clone(),
                    value: header.value.clone(),
                    ..Default::default()
                }),
                append_action: append_action as i32,
                ..Default::default()
            })
        })
        .collect()
}

fn validate_headers_to_remove(headers: &[String]) -> Result<Vec<String>, ConversionError> {
    for header in headers {
        validate_header_name(header)?;
    }
    Ok(headers.to_vec())
}

impl Plugin for HeaderManipulationPlugin {
    fn name(&self) -> &'static str {
        "header_manipulation"
    }

    fn capabilities(self: Arc<Self>) -> Vec<Capability> {
        vec![
            Capability::VirtualHost(self.clone()),
            Capability::Route(self.clone()),
            Capability::WeightedDestination(self),
        ]
    }
}

impl VirtualHostPlugin for HeaderManipulationPlugin {
    fn process_virtual_host(
        &self,
        _params: &VirtualHostParams,
        virtual_host: &VirtualHost,
        out: &mut EnvoyVirtualHost,
    ) -> Result<(), ConversionError> {
        let Some(manipulation) = virtual_host
            .options
            .as_ref()
            .and_then(|options| options.header_manipulation.as_ref())
        else {
            return Ok(());
        };

        let mutations = Self::convert(manipulation)?;
        out.request_headers_to_add.extend(mutations.request_headers_to_add);
        out.request_headers_to_remove.extend(mutations.request_headers_to_remove);
        out.response_headers_to_add.extend(mutations.response_headers_to_add);
        out.response_headers_to_remove.extend(mutations.response_headers_to_remove);
        Ok(())
    }
}

impl RoutePlugin for HeaderManipulationPlugin {
    fn process_route(
        &self,
        _params: &RouteParams,
        route: &Route,
        out: &mut EnvoyRoute,
    ) -> Result<(), ConversionError> {
        let Some(manipulation) = route
            .options
            .as_ref()
            .and_then(|options| options.header_manipulation.as_ref())
        else {
            return Ok(());
        };

        let mutations = Self::convert(manipulation)?;
        out.request_headers_to_add.extend(mutations.request_headers_to_add);
        out.request_headers_to_remove.extend(mutations.request_headers_to_remove);
        out.response_headers_to_add.extend(mutations.response_headers_to_add);
        out.response_headers_to_remove.extend(mutations.response_headers_to_remove);
        Ok(())
    }
}

impl WeightedDestinationPlugin for HeaderManipulationPlugin {
    fn process_weighted_destination(
        &self,
        _params: &RouteParams,
        destination: &WeightedDestination,
        out: &mut ClusterWeight,
    ) -> Result<(), ConversionError> {
        let Some(manipulation) = destination
            .options
            .as_ref()
            .and_then(|options| options.header_manipulation.as_ref())
        else {
            return Ok(());
        };
        if manipulation.is_empty() {
            return Ok(());
        }

        let mutations = Self::convert(manipulation)?;
        out.request_headers_to_add.extend(mutations.request_headers_to_add);
        out.request_headers_to_remove.extend(mutations.request_headers_to_remove);
        out.response_headers_to_add.extend(mutations.response_headers_to_add);
        out.response_headers_to_remove.extend(mutations.response_headers_to_remove);
        Ok(())
    }
}
