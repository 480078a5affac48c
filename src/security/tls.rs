/// TLS config consolidation and resolution
///
/// - Deduplicating the TLS configurations of one listener segment
/// - Merging segment-level configs with a matcher-supplied default
/// - Resolving configs into `DownstreamTlsContext` from snapshot secrets

use envoy_types::pb::envoy::config::core::v3::{
    data_source::Specifier, transport_socket::ConfigType as TransportSocketConfigType, DataSource,
    TransportSocket,
};
use envoy_types::pb::envoy::extensions::transport_sockets::tls::v3::{
    common_tls_context, downstream_tls_context, subject_alt_name_matcher::SanType,
    tls_parameters::TlsProtocol, CertificateValidationContext, CommonTlsContext,
    DownstreamTlsContext, SubjectAltNameMatcher, TlsCertificate, TlsParameters,
};
use envoy_types::pb::envoy::r#type::matcher::v3::{string_matcher::MatchPattern, StringMatcher};
use envoy_types::pb::google::protobuf::BoolValue;
use std::collections::BTreeSet;
use tracing::debug;

use crate::storage::models::{SslConfig, SslParameters, SslSecrets};
use crate::storage::Snapshot;
use crate::xds::conversion::errors::ConversionError;
use crate::xds::conversion::utils::{to_any, DOWNSTREAM_TLS_CONTEXT_TYPE_URL};

/// Drop TLS configs that repeat an earlier config's secrets and SNI domains.
///
/// SNI domains are compared as a set. The first occurrence wins and keeps its
/// position, so the result is stable and consolidating it again is a no-op.
pub fn consolidate_ssl_configurations(configs: &[SslConfig]) -> Vec<SslConfig> {
    let mut seen: Vec<(Option<&SslSecrets>, BTreeSet<&str>)> = Vec::new();
    let mut consolidated = Vec::with_capacity(configs.len());

    for config in configs {
        let key = (
            config.ssl_secrets.as_ref(),
            config.sni_domains.iter().map(String::as_str).collect::<BTreeSet<_>>(),
        );
        if seen.contains(&key) {
            debug!(sni_domains = ?config.sni_domains, "dropping duplicate ssl config");
            continue;
        }
        seen.push(key);
        consolidated.push(config.clone());
    }

    consolidated
}

/// Fill every unset field of `specific` from `default`
pub fn merge_ssl_config(specific: &SslConfig, default: Option<&SslConfig>) -> SslConfig {
    let Some(default) = default else {
        return specific.clone();
    };

    fn or_vec(specific: &[String], default: &[String]) -> Vec<String> {
        if specific.is_empty() {
            default.to_vec()
        } else {
            specific.to_vec()
        }
    }

    SslConfig {
        ssl_secrets: specific.ssl_secrets.clone().or_else(|| default.ssl_secrets.clone()),
        sni_domains: or_vec(&specific.sni_domains, &default.sni_domains),
        verify_subject_alt_name: or_vec(
            &specific.verify_subject_alt_name,
            &default.verify_subject_alt_name,
        ),
        parameters: specific.parameters.clone().or_else(|| default.parameters.clone()),
        alpn_protocols: or_vec(&specific.alpn_protocols, &default.alpn_protocols),
        one_way_tls: specific.one_way_tls.or(default.one_way_tls),
        disable_tls_session_resumption: specific
            .disable_tls_session_resumption
            .or(default.disable_tls_session_resumption),
        transport_socket_connect_timeout_ms: specific
            .transport_socket_connect_timeout_ms
            .or(default.transport_socket_connect_timeout_ms),
    }
}

/// Consolidate a segment's TLS configs, then merge each survivor with the default
pub fn consolidate_and_merge(configs: &[SslConfig], default: Option<&SslConfig>) -> Vec<SslConfig> {
    consolidate_ssl_configurations(configs)
        .iter()
        .map(|config| merge_ssl_config(config, default))
        .collect()
}

/// Resolves a TLS config into the context served on a filter chain
pub trait SslConfigTranslator: Send + Sync {
    fn resolve_downstream_ssl_config(
        &self,
        snapshot: &Snapshot,
        ssl_config: &SslConfig,
    ) -> Result<DownstreamTlsContext, ConversionError>;
}

/// Reads certificates from snapshot secrets or from file paths on the proxy host
#[derive(Debug, Clone, Default)]
pub struct DefaultSslConfigTranslator;

struct CertificateSources {
    cert_chain: DataSource,
    private_key: DataSource,
    root_ca: Option<DataSource>,
}

impl DefaultSslConfigTranslator {
    fn certificate_sources(
        &self,
        snapshot: &Snapshot,
        secrets: &SslSecrets,
    ) -> Result<CertificateSources, ConversionError> {
        match secrets {
            SslSecrets::SecretRef(secret_ref) => {
                let secret = snapshot.find_secret(secret_ref).map_err(|_| {
                    ConversionError::SecretNotFound {
                        secret: secret_ref.to_string(),
                    }
                })?;
                let tls = &secret.tls;
                if tls.cert_chain.is_empty() || tls.private_key.is_empty() {
                    return Err(ConversionError::SslConfig {
                        reason: format!(
                            "secret {} must contain both a certificate chain and a private key",
                            secret_ref
                        ),
                    });
                }
                Ok(CertificateSources {
                    cert_chain: inline_string(&tls.cert_chain),
                    private_key: inline_string(&tls.private_key),
                    root_ca: non_empty(&tls.root_ca).map(inline_string),
                })
            }
            SslSecrets::SslFiles(files) => {
                if files.tls_cert.is_empty() || files.tls_key.is_empty() {
                    return Err(ConversionError::SslConfig {
                        reason: "both tls_cert and tls_key file paths are required".to_string(),
                    });
                }
                Ok(CertificateSources {
                    cert_chain: filename(&files.tls_cert),
                    private_key: filename(&files.tls_key),
                    root_ca: non_empty(&files.root_ca).map(filename),
                })
            }
        }
    }
}

impl SslConfigTranslator for DefaultSslConfigTranslator {
    fn resolve_downstream_ssl_config(
        &self,
        snapshot: &Snapshot,
        ssl_config: &SslConfig,
    ) -> Result<DownstreamTlsContext, ConversionError> {
        let secrets = ssl_config.ssl_secrets.as_ref().ok_or_else(|| ConversionError::SslConfig {
            reason: "no ssl secrets specified".to_string(),
        })?;
        let sources = self.certificate_sources(snapshot, secrets)?;

        if !ssl_config.verify_subject_alt_name.is_empty() && sources.root_ca.is_none() {
            return Err(ConversionError::SslConfig {
                reason: "a root_ca must be provided if verify_subject_alt_name is not empty"
                    .to_string(),
            });
        }

        let require_client_certificate =
            sources.root_ca.is_some() && !ssl_config.one_way_tls.unwrap_or(false);

        let validation_context_type = sources.root_ca.map(|trusted_ca| {
            common_tls_context::ValidationContextType::ValidationContext(
                CertificateValidationContext {
                    trusted_ca: Some(trusted_ca),
                    match_typed_subject_alt_names: ssl_config
                        .verify_subject_alt_name
                        .iter()
                        .map(|san| SubjectAltNameMatcher {
                            san_type: SanType::Dns as i32,
                            matcher: Some(StringMatcher {
                                match_pattern: Some(MatchPattern::Exact(san.clone())),
                                ..Default::default()
                            }),
                            ..Default::default()
                        })
                        .collect(),
                    ..Default::default()
                },
            )
        });

        let tls_params = ssl_config
            .parameters
            .as_ref()
            .map(convert_ssl_parameters)
            .transpose()?;

        let common = CommonTlsContext {
            tls_params,
            tls_certificates: vec![TlsCertificate {
                certificate_chain: Some(sources.cert_chain),
                private_key: Some(sources.private_key),
                ..Default::default()
            }],
            validation_context_type,
            alpn_protocols: ssl_config.alpn_protocols.clone(),
            ..Default::default()
        };

        let mut context = DownstreamTlsContext {
            common_tls_context: Some(common),
            require_client_certificate: Some(BoolValue {
                value: require_client_certificate,
            }),
            ..Default::default()
        };

        if ssl_config.disable_tls_session_resumption.unwrap_or(false) {
            context.session_ticket_keys_type = Some(
                downstream_tls_context::SessionTicketKeysType::DisableStatelessSessionResumption(
                    true,
                ),
            );
        }

        Ok(context)
    }
}

/// Wrap a resolved context into the transport socket attached to a filter chain
pub fn downstream_transport_socket(
    context: &DownstreamTlsContext,
    socket_name: &str,
) -> Result<TransportSocket, ConversionError> {
    let any = to_any(context, DOWNSTREAM_TLS_CONTEXT_TYPE_URL, "DownstreamTlsContext")?;
    Ok(TransportSocket {
        name: socket_name.to_string(),
        config_type: Some(TransportSocketConfigType::TypedConfig(any)),
    })
}

fn convert_ssl_parameters(parameters: &SslParameters) -> Result<TlsParameters, ConversionError> {
    Ok(TlsParameters {
        tls_minimum_protocol_version: parse_tls_protocol(
            parameters.minimum_protocol_version.as_deref(),
        )? as i32,
        tls_maximum_protocol_version: parse_tls_protocol(
            parameters.maximum_protocol_version.as_deref(),
        )? as i32,
        cipher_suites: parameters.cipher_suites.clone(),
        ecdh_curves: parameters.ecdh_curves.clone(),
        ..Default::default()
    })
}

/// Accepts Envoy's enum names such as `TLSv1_2`; unset means `TLS_AUTO`
fn parse_tls_protocol(version: Option<&str>) -> Result<TlsProtocol, ConversionError> {
    match version {
        None | Some("") => Ok(TlsProtocol::TlsAuto),
        Some(name) => TlsProtocol::from_str_name(name).ok_or_else(|| ConversionError::SslConfig {
            reason: format!("unknown tls protocol version {}", name),
        }),
    }
}

fn inline_string(value: &str) -> DataSource {
    DataSource {
        specifier: Some(Specifier::InlineString(value.to_string())),
        ..Default::default()
    }
}

fn filename(path: &str) -> DataSource {
    DataSource {
        specifier: Some(Specifier::Filename(path.to_string())),
        ..Default::default()
    }
}

fn non_empty(value: &str) -> Option<&str> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}
