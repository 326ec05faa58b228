//! Plain DNS over UDP (RFC 1035 §4.2.1), used for bootstrap lookups and DNSCrypt.

use danse_domain::DomainError;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tracing::debug;

/// Maximum UDP DNS response size with EDNS(0)
pub const MAX_UDP_RESPONSE_SIZE: usize = 4096;

/// Sends one datagram to `server` and waits for the first datagram it sends back.
pub async fn exchange(
    server: SocketAddr,
    message_bytes: &[u8],
    timeout: Duration,
) -> Result<Vec<u8>, DomainError> {
    let bind_addr: SocketAddr = if server.is_ipv4() {
        SocketAddr::from(([0, 0, 0, 0], 0))
    } else {
        SocketAddr::from(([0u16; 8], 0))
    };

    let io_error = |e: std::io::Error| DomainError::TransportIo {
        server: server.to_string(),
        reason: e.to_string(),
    };

    let socket = UdpSocket::bind(bind_addr).await.map_err(io_error)?;
    // A connected socket only receives datagrams from `server`.
    socket.connect(server).await.map_err(io_error)?;

    let round_trip = async {
        socket.send(message_bytes).await?;
        let mut recv_buf = vec![0u8; MAX_UDP_RESPONSE_SIZE];
        let received = socket.recv(&mut recv_buf).await?;
        recv_buf.truncate(received);
        Ok::<_, std::io::Error>(recv_buf)
    };

    let response = tokio::time::timeout(timeout, round_trip)
        .await
        .map_err(|_| DomainError::TransportTimeout {
            server: server.to_string(),
        })?
        .map_err(io_error)?;

    debug!(
        server = %server,
        bytes_sent = message_bytes.len(),
        bytes_received = response.len(),
        "UDP exchange complete"
    );

    Ok(response)
}
