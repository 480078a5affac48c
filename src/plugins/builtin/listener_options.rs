use envoy_types::pb::envoy::config::listener::v3::Listener as EnvoyListener;
use envoy_types::pb::google::protobuf::UInt32Value;
use std::sync::Arc;

use crate::plugins::{Capability, ListenerPlugin, Params, Plugin};
use crate::storage::models::Listener;
use crate::xds::conversion::ConversionError;

pub struct ListenerOptionsPlugin;

impl Plugin for ListenerOptionsPlugin {
    fn name(&self) -> &'static str {
        "listener_options"
    }

    fn capabilities(self: Arc<Self>) -> Vec<Capability> {
        vec![Capability::Listener(self)]
    }
}

impl ListenerPlugin for ListenerOptionsPlugin {
    fn process_listener(
        &self,
        _params: &Params,
        listener: &Listener,
        out: &mut EnvoyListener,
    ) -> Result<(), ConversionError> {
        if let Some(limit) = listener
            .options
            .as_ref()
            .and_then(|options| options.per_connection_buffer_limit_bytes)
        {
            out.per_connection_buffer_limit_bytes = Some(UInt32Value { value: limit });
        }
        Ok(())
    }
}
