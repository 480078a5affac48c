use envoy_types::pb::envoy::extensions::filters::http::router::v3::Router;
use envoy_types::pb::envoy::extensions::filters::network::http_connection_manager::v3::{
    http_filter::ConfigType, HttpFilter,
};
use std::sync::Arc;

use crate::plugins::{Capability, FilterStage, HttpFilterPlugin, Params, Plugin, StagedHttpFilter};
use crate::storage::models::HttpListener;
use crate::xds::conversion::utils::{to_any, ROUTER_TYPE_URL};
use crate::xds::conversion::ConversionError;

/// Adds the terminal router filter to every HTTP connection manager
pub struct RouterPlugin {
    filter_name: String,
}

impl RouterPlugin {
    pub fn new(filter_name: String) -> Self {
        Self { filter_name }
    }
}

impl Plugin for RouterPlugin {
    fn name(&self) -> &'static str {
        "router"
    }

    fn capabilities(self: Arc<Self>) -> Vec<Capability> {
        vec![Capability::HttpFilter(self)]
    }
}

impl HttpFilterPlugin for RouterPlugin {
    fn http_filters(
        &self,
        _params: &Params,
        _listener: &HttpListener,
    ) -> Result<Vec<StagedHttpFilter>, ConversionError> {
        let typed_config = to_any(&Router::default(), ROUTER_TYPE_URL, "Router")?;
        Ok(vec![StagedHttpFilter {
            stage: FilterStage::Route,
            filter: HttpFilter {
                name: self.filter_name.clone(),
                config_type: Some(ConfigType::TypedConfig(typed_config)),
                ..Default::default()
            },
        }])
    }
}
