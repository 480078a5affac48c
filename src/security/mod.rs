/// Downstream TLS handling for listener filter chains
///
/// This module consolidates the TLS configurations declared on a listener
/// segment and resolves them into Envoy `DownstreamTlsContext` messages
/// using secrets from the snapshot.

pub mod tls;

pub use tls::*;
