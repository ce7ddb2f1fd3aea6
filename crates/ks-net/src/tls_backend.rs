//! rustls connector used for HTTPS.

use crate::tls::TlsPolicy;
use crate::transport::BoxedIoStream;
use ks_core::BrowserError;
use ks_core::BrowserResult;
use std::net::TcpStream;

#[cfg(feature = "tls-rustls")]
use crate::tls::TlsVersion;
#[cfg(feature = "tls-rustls")]
use crate::tls::TrustStoreMode;
#[cfg(feature = "tls-rustls")]
use rustls::RootCertStore;
#[cfg(feature = "tls-rustls")]
use rustls::pki_types::ServerName;
#[cfg(feature = "tls-rustls")]
use std::sync::Arc;

#[cfg(feature = "tls-rustls")]
const ALPN_HTTP11: &[u8] = b"http/1.1";

/// Upgrades an open TCP stream to TLS for `server_name`.
pub trait TlsBackendAdapter {
    fn connect_tls(
        &self,
        stream: TcpStream,
        server_name: &str,
        policy: &TlsPolicy,
    ) -> BrowserResult<BoxedIoStream>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RustlsTlsAdapter;

#[cfg(feature = "tls-rustls")]
impl TlsBackendAdapter for RustlsTlsAdapter {
    fn connect_tls(
        &self,
        mut stream: TcpStream,
        server_name: &str,
        policy: &TlsPolicy,
    ) -> BrowserResult<BoxedIoStream> {
        use rustls::ClientConnection;
        use rustls::StreamOwned;

        let config = client_config(policy)?;
        let name = ServerName::try_from(server_name.to_owned()).map_err(|error| {
            BrowserError::new(
                "net.tls.server_name_invalid",
                format!("Invalid TLS server name `{server_name}`: {error}"),
            )
        })?;

        let mut connection = ClientConnection::new(config, name).map_err(|error| {
            BrowserError::new(
                "net.tls.connection_init_failed",
                format!("TLS setup for {server_name} failed: {error}"),
            )
        })?;
        connection.complete_io(&mut stream).map_err(|error| {
            BrowserError::new(
                "net.tls.handshake_failed",
                format!("SSL handshake with {server_name} failed: {error}"),
            )
        })?;

        Ok(Box::new(StreamOwned::new(connection, stream)))
    }
}

#[cfg(feature = "tls-rustls")]
fn client_config(policy: &TlsPolicy) -> BrowserResult<Arc<rustls::ClientConfig>> {
    let versions = policy
        .offered_versions()
        .into_iter()
        .map(|version| match version {
            TlsVersion::V1_2 => &rustls::version::TLS12,
            TlsVersion::V1_3 => &rustls::version::TLS13,
        })
        .collect::<Vec<_>>();
    let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());

    let mut config = rustls::ClientConfig::builder_with_provider(provider)
        .with_protocol_versions(&versions)
        .map_err(|error| {
            BrowserError::new(
                "net.tls.config_versions_invalid",
                format!("TLS protocol versions rejected: {error}"),
            )
        })?
        .with_root_certificates(root_store(policy.trust_store)?)
        .with_no_client_auth();
    config.alpn_protocols = vec![ALPN_HTTP11.to_vec()];

    Ok(Arc::new(config))
}

#[cfg(feature = "tls-rustls")]
fn root_store(mode: TrustStoreMode) -> BrowserResult<RootCertStore> {
    let mut roots = RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    if mode == TrustStoreMode::WebPkiAndOs {
        let native = rustls_native_certs::load_native_certs();
        for error in &native.errors {
            tracing::debug!("skipping operating-system root: {error}");
        }
        let (added, ignored) = roots.add_parsable_certificates(native.certs);
        tracing::debug!(added, ignored, "merged operating-system trust roots");
    }

    if roots.is_empty() {
        return Err(BrowserError::new(
            "net.tls.root_store_empty",
            "no trust anchors available for TLS verification",
        ));
    }
    Ok(roots)
}

#[cfg(not(feature = "tls-rustls"))]
impl TlsBackendAdapter for RustlsTlsAdapter {
    fn connect_tls(
        &self,
        _stream: TcpStream,
        _server_name: &str,
        _policy: &TlsPolicy,
    ) -> BrowserResult<BoxedIoStream> {
        Err(BrowserError::new(
            "net.tls.backend_unavailable",
            "HTTPS is not available in this build; enable `ks-net/tls-rustls`",
        ))
    }
}
