//! Stream framing shared by DNS-over-TCP, DNS-over-TLS and DNSCrypt-over-TCP:
//! every message travels as a 2-byte big-endian length followed by exactly that
//! many bytes (RFC 1035 §4.2.2).

use socket2::{SockRef, TcpKeepalive};
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use danse_domain::DomainError;

pub const MAX_TCP_MESSAGE_SIZE: usize = u16::MAX as usize;

const KEEPALIVE_TIME: Duration = Duration::from_secs(30);

/// Prepends the length prefix to `message_bytes`.
pub fn frame(message_bytes: &[u8]) -> io::Result<Vec<u8>> {
    let length = u16::try_from(message_bytes.len()).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!(
                "DNS message too large for stream framing: {} bytes (max {})",
                message_bytes.len(),
                MAX_TCP_MESSAGE_SIZE
            ),
        )
    })?;

    let mut framed = Vec::with_capacity(message_bytes.len() + 2);
    framed.extend_from_slice(&length.to_be_bytes());
    framed.extend_from_slice(message_bytes);
    Ok(framed)
}

pub async fn send_with_length_prefix<S>(stream: &mut S, message_bytes: &[u8]) -> io::Result<()>
where
    S: AsyncWrite + Unpin,
{
    let framed = frame(message_bytes)?;
    stream.write_all(&framed).await?;
    stream.flush().await
}

pub async fn read_with_length_prefix<S>(stream: &mut S) -> io::Result<Vec<u8>>
where
    S: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 2];
    stream.read_exact(&mut len_buf).await?;

    let message_len = u16::from_be_bytes(len_buf) as usize;
    let mut message = vec![0u8; message_len];
    stream.read_exact(&mut message).await?;

    Ok(message)
}

/// Opens a TCP connection with `TCP_NODELAY` and keep-alive enabled.
pub async fn connect_tcp(server: SocketAddr, timeout: Duration) -> Result<TcpStream, DomainError> {
    let stream = tokio::time::timeout(timeout, TcpStream::connect(server))
        .await
        .map_err(|_| DomainError::TransportTimeout {
            server: server.to_string(),
        })?
        .map_err(|e| DomainError::TransportConnectionRefused {
            server: server.to_string(),
            reason: e.to_string(),
        })?;

    let io_error = |e: io::Error| DomainError::TransportIo {
        server: server.to_string(),
        reason: e.to_string(),
    };
    stream.set_nodelay(true).map_err(io_error)?;
    SockRef::from(&stream)
        .set_tcp_keepalive(&TcpKeepalive::new().with_time(KEEPALIVE_TIME))
        .map_err(io_error)?;

    Ok(stream)
}
