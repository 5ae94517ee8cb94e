use std::sync::Arc;

use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::{ClientConfig, RootCertStore};
use tokio_rustls::TlsConnector;
use tracing::debug;

use crate::proto::error::{Error, Result};

/// TLS client wrapper using rustls.
#[derive(Clone)]
pub(crate) struct TlsConnectorInner {
    connector: TlsConnector,
}

impl TlsConnectorInner {
    /// Creates a new TLS connector with default secure configuration.
    ///
    /// Uses `webpki-roots` for Mozilla's root certificates and `ring` as the crypto provider.
    pub(crate) fn new() -> Self {
        let mut root_store = RootCertStore::empty();
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

        let config = ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth();

        Self {
            connector: TlsConnector::from(Arc::new(config)),
        }
    }

    /// Runs the client handshake, verifying the certificate chain and that
    /// it was issued for `host`.
    pub(crate) async fn handshake(
        &self,
        tcp: TcpStream,
        host: &str,
    ) -> Result<TlsStream<TcpStream>> {
        let server_name =
            ServerName::try_from(host.to_owned()).map_err(|e| Error::TlsHandshake {
                message: format!("invalid server name {:?}: {}", host, e),
            })?;
        let stream = self
            .connector
            .connect(server_name, tcp)
            .await
            .map_err(|e| Error::TlsHandshake {
                message: e.to_string(),
            })?;
        debug!(host, "TLS handshake complete");
        Ok(stream)
    }
}
