use thiserror::Error;

/// Errors raised while translating a listener graph into xDS resources.
///
/// Most variants are domain findings that end up in the report tree rather
/// than being returned to the caller.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConversionError {
    #[error("no destination specified")]
    NoDestinationSpecified,

    #[error("route has a subset config, but the upstream does not: {upstream}")]
    SubsetsMisconfigured { upstream: String },

    #[error("route has a subset config, but none of the subsets in the upstream match it: {upstream}")]
    SubsetNotMatched { upstream: String },

    #[error("upstream {upstream} not found")]
    UpstreamNotFound { upstream: String },

    #[error("upstream group {upstream_group} not found")]
    UpstreamGroupNotFound { upstream_group: String },

    #[error("invalid cluster header name '{header}': {reason}")]
    InvalidClusterHeader { header: String, reason: String },

    #[error("invalid matcher: {reason}")]
    InvalidMatcher { reason: String },

    #[error("invalid ssl config: {reason}")]
    SslConfig { reason: String },

    #[error("secret {secret} not found")]
    SecretNotFound { secret: String },

    #[error("invalid header '{header}': {reason}")]
    InvalidHeader { header: String, reason: String },

    #[error("plugin {plugin} failed: {reason}")]
    Plugin { plugin: String, reason: String },

    #[error("Protobuf encoding failed for {resource_type}: {reason}")]
    ProtobufEncoding { resource_type: String, reason: String },

    #[error("Resource validation failed: {reason}")]
    ValidationFailed { reason: String },
}

impl ConversionError {
    pub fn encoding(resource_type: &str, source: prost::EncodeError) -> Self {
        ConversionError::ProtobufEncoding {
            resource_type: resource_type.to_string(),
            reason: source.to_string(),
        }
    }

    /// The referenced upstream or upstream group does not exist in the snapshot
    pub fn is_destination_not_found(&self) -> bool {
        matches!(
            self,
            ConversionError::UpstreamNotFound { .. } | ConversionError::UpstreamGroupNotFound { .. }
        )
    }

    /// Plugin failures of these kinds are reported as warnings instead of errors
    pub fn is_warning(&self) -> bool {
        self.is_destination_not_found()
            || matches!(self, ConversionError::SubsetsMisconfigured { .. })
    }
}
