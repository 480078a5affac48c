use envoy_types::pb::envoy::extensions::filters::network::http_connection_manager::v3::HttpConnectionManager;
use envoy_types::pb::google::protobuf::BoolValue;
use std::sync::Arc;

use crate::plugins::{Capability, HttpConnectionManagerPlugin, Params, Plugin};
use crate::storage::models::{HttpListener, Listener};
use crate::xds::conversion::ConversionError;

/// Applies `HttpListenerOptions` to the connection manager
pub struct HcmSettingsPlugin;

impl Plugin for HcmSettingsPlugin {
    fn name(&self) -> &'static str {
        "hcm_settings"
    }

    fn capabilities(self: Arc<Self>) -> Vec<Capability> {
        vec![Capability::HttpConnectionManager(self)]
    }
}

impl HttpConnectionManagerPlugin for HcmSettingsPlugin {
    fn process_hcm_network_filter(
        &self,
        _params: &Params,
        _parent: &Listener,
        listener: &HttpListener,
        out: &mut HttpConnectionManager,
    ) -> Result<(), ConversionError> {
        let Some(options) = &listener.options else {
            return Ok(());
        };

        if let Some(use_remote_address) = options.use_remote_address {
            out.use_remote_address = Some(BoolValue {
                value: use_remote_address,
            });
        }
        if let Some(hops) = options.xff_num_trusted_hops {
            out.xff_num_trusted_hops = hops;
        }
        if let Some(server_name) = &options.server_name {
            if server_name.trim().is_empty() {
                return Err(ConversionError::ValidationFailed {
                    reason: "server_name cannot be blank".to_string(),
                });
            }
            out.server_name = server_name.clone();
        }
        if let Some(generate_request_id) = options.generate_request_id {
            out.generate_request_id = Some(BoolValue {
                value: generate_request_id,
            });
        }
        if let Some(skip_xff_append) = options.skip_xff_append {
            out.skip_xff_append = skip_xff_append;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::models::HttpListenerOptions;
    use crate::storage::Snapshot;

    fn parent() -> Listener {
        Listener {
            name: "gateway".to_string(),
            bind_address: "::".to_string(),
            bind_port: 8080,
            ssl_configurations: vec![],
            options: None,
            route_options: None,
            listener_type: None,
        }
    }

    #[test]
    fn test_applies_options() {
        let snapshot = Snapshot::default();
        let listener = HttpListener {
            options: Some(HttpListenerOptions {
                use_remote_address: Some(true),
                xff_num_trusted_hops: Some(2),
                server_name: Some("gateway".to_string()),
                generate_request_id: Some(false),
                skip_xff_append: Some(true),
            }),
            ..Default::default()
        };
        let mut hcm = HttpConnectionManager::default();
        HcmSettingsPlugin
            .process_hcm_network_filter(&Params { snapshot: &snapshot }, &parent(), &listener, &mut hcm)
            .unwrap();

        assert_eq!(hcm.use_remote_address, Some(BoolValue { value: true }));
        assert_eq!(hcm.xff_num_trusted_hops, 2);
        assert_eq!(hcm.server_name, "gateway");
        assert_eq!(hcm.generate_request_id, Some(BoolValue { value: false }));
        assert!(hcm.skip_xff_append);
    }

    #[test]
    fn test_blank_server_name_is_rejected() {
        let snapshot = Snapshot::default();
        let listener = HttpListener {
            options: Some(HttpListenerOptions {
                server_name: Some("  ".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let mut hcm = HttpConnectionManager::default();
        let result = HcmSettingsPlugin.process_hcm_network_filter(
            &Params { snapshot: &snapshot },
            &parent(),
            &listener,
            &mut hcm,
        );
        assert!(result.is_err());
    }
}
