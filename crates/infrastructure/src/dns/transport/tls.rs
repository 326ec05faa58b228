//! DNS-over-TLS connections (RFC 7858)

use super::resolver::BootstrapResolver;
use super::tcp::connect_tcp;
use super::StreamConnector;
use async_trait::async_trait;
use danse_domain::{DomainError, DotEndpoint, UpstreamAddr};
use rustls::pki_types::ServerName;
use rustls::{ClientConfig, RootCertStore};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tracing::debug;

/// Client configuration trusting the webpki root set.
pub fn default_client_config() -> Result<Arc<ClientConfig>, DomainError> {
    let mut root_store = RootCertStore::empty();
    root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let config =
        ClientConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
            .with_safe_default_protocol_versions()
            .map_err(|e| DomainError::ConfigError(format!("TLS configuration: {}", e)))?
            .with_root_certificates(root_store)
            .with_no_client_auth();

    Ok(Arc::new(config))
}

/// Dials TLS streams to DoT endpoints, resolving hostnames through the bootstrap
/// resolver. Each instance owns its TLS configuration and session cache.
#[derive(Clone)]
pub struct TlsConnector {
    config: Arc<ClientConfig>,
    bootstrap: Option<Arc<BootstrapResolver>>,
}

impl TlsConnector {
    pub fn new(bootstrap: Option<Arc<BootstrapResolver>>) -> Result<Self, DomainError> {
        Ok(Self::with_config(default_client_config()?, bootstrap))
    }

    pub fn with_config(config: Arc<ClientConfig>, bootstrap: Option<Arc<BootstrapResolver>>) -> Self {
        Self { config, bootstrap }
    }

    async fn resolve(&self, addr: &UpstreamAddr) -> Result<SocketAddr, DomainError> {
        match addr {
            UpstreamAddr::Resolved(addr) => Ok(*addr),
            UpstreamAddr::Unresolved { hostname, port } => match &self.bootstrap {
                Some(bootstrap) => bootstrap.resolve_socket_addr(hostname, *port).await,
                None => tokio::net::lookup_host((&**hostname, *port))
                    .await
                    .ok()
                    .and_then(|mut addrs| addrs.next())
                    .ok_or_else(|| {
                        DomainError::InvalidEndpoint(format!("Cannot resolve {}", addr))
                    }),
            },
        }
    }
}

#[async_trait]
impl StreamConnector for TlsConnector {
    type Stream = TlsStream<TcpStream>;

    async fn connect(
        &self,
        endpoint: &DotEndpoint,
        timeout: Duration,
    ) -> Result<Self::Stream, DomainError> {
        let server_name = ServerName::try_from(endpoint.server_name.to_string()).map_err(|e| {
            DomainError::InvalidEndpoint(format!(
                "Invalid TLS server name '{}': {}",
                endpoint.server_name, e
            ))
        })?;

        let server_addr = self.resolve(&endpoint.addr).await?;
        let tcp_stream = connect_tcp(server_addr, timeout).await?;

        let connector = tokio_rustls::TlsConnector::from(self.config.clone());
        let tls_stream = tokio::time::timeout(timeout, connector.connect(server_name, tcp_stream))
            .await
            .map_err(|_| DomainError::TransportTimeout {
                server: endpoint.to_string(),
            })?
            .map_err(|e| DomainError::TlsHandshake {
                server: endpoint.to_string(),
                reason: e.to_string(),
            })?;

        debug!(server = %server_addr, server_name = %endpoint.server_name, "TLS connection established");
        Ok(tls_stream)
    }
}
