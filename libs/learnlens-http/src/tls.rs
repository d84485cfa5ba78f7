//! TLS setup for the HTTP client.
//!
//! Uses Mozilla's root certificates (webpki-roots) so behaviour does not
//! depend on the host certificate store.

use crate::config::TransportSecurity;
use crate::error::HttpError;
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::connect::HttpConnector;
use std::sync::Arc;

/// Get the crypto provider for TLS connections.
///
/// Uses the globally installed provider when one exists, otherwise creates an
/// aws-lc-rs provider without installing it globally.
pub fn get_crypto_provider() -> Arc<rustls::crypto::CryptoProvider> {
    rustls::crypto::CryptoProvider::get_default()
        .cloned()
        .unwrap_or_else(|| Arc::new(rustls::crypto::aws_lc_rs::default_provider()))
}

/// Build the HTTPS connector.
///
/// HTTP/2 is enabled via `enable_all_versions()`; protocol selection happens
/// during the TLS handshake. Plain `http://` is only accepted when the
/// transport security mode allows it.
///
/// # Errors
///
/// Returns `HttpError::Tls` if the crypto provider cannot be configured.
pub fn build_https_connector(
    transport: TransportSecurity,
) -> Result<HttpsConnector<HttpConnector>, HttpError> {
    let builder = hyper_rustls::HttpsConnectorBuilder::new()
        .with_provider_and_webpki_roots(get_crypto_provider())
        .map_err(|e| HttpError::Tls(Box::new(e)))?;

    let connector = if transport == TransportSecurity::AllowInsecureHttp {
        builder.https_or_http().enable_all_versions().build()
    } else {
        builder.https_only().enable_all_versions().build()
    };
    Ok(connector)
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_connector_builds_for_both_modes() {
        assert!(build_https_connector(TransportSecurity::TlsOnly).is_ok());
        assert!(build_https_connector(TransportSecurity::AllowInsecureHttp).is_ok());
    }
}
