pub mod resolver;
pub mod tcp;
pub mod tls;
pub mod udp;

use async_trait::async_trait;
use danse_domain::{DomainError, DotEndpoint};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

pub use resolver::BootstrapResolver;
pub use tls::TlsConnector;

/// Opens byte streams to stream-transport upstreams.
///
/// DoT clients and the multiplexer are generic over this so the TLS layer can be
/// swapped for plain TCP.
#[async_trait]
pub trait StreamConnector: Send + Sync + 'static {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    async fn connect(
        &self,
        endpoint: &DotEndpoint,
        timeout: Duration,
    ) -> Result<Self::Stream, DomainError>;

    fn protocol_name(&self) -> &'static str {
        "TLS"
    }
}

/// Unencrypted DNS-over-TCP connections. Requires resolved endpoint addresses.
#[derive(Debug, Default, Clone, Copy)]
pub struct TcpConnector;

#[async_trait]
impl StreamConnector for TcpConnector {
    type Stream = TcpStream;

    async fn connect(
        &self,
        endpoint: &DotEndpoint,
        timeout: Duration,
    ) -> Result<Self::Stream, DomainError> {
        let server_addr = endpoint.addr.socket_addr().ok_or_else(|| {
            DomainError::InvalidEndpoint(format!(
                "TCP transport requires resolved address, got: {}",
                endpoint.addr
            ))
        })?;
        tcp::connect_tcp(server_addr, timeout).await
    }

    fn protocol_name(&self) -> &'static str {
        "TCP"
    }
}
