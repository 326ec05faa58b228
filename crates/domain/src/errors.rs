use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Invalid DNS message: {0}")]
    InvalidDnsMessage(String),

    #[error("Invalid upstream endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("Transport timeout talking to {server}")]
    TransportTimeout { server: String },

    #[error("Transport connection refused by {server}: {reason}")]
    TransportConnectionRefused { server: String, reason: String },

    #[error("Transport connection reset by {server}")]
    TransportConnectionReset { server: String },

    #[error("TLS handshake with {server} failed: {reason}")]
    TlsHandshake { server: String, reason: String },

    #[error("Upstream {server} answered with HTTP status {status}")]
    HttpStatus { server: String, status: u16 },

    #[error("Transport I/O error with {server}: {reason}")]
    TransportIo { server: String, reason: String },

    #[error("Upstream {server} failed after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        server: String,
        attempts: u8,
        last_error: String,
    },

    #[error("DNSCrypt protocol error: {0}")]
    DnscryptProtocol(String),

    #[error("DNSCrypt handshake with {provider} failed: {reason}")]
    DnscryptHandshake { provider: String, reason: String },

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl DomainError {
    /// Failures of the path to the upstream, as opposed to the message carried over it.
    pub fn is_transport_error(&self) -> bool {
        matches!(
            self,
            DomainError::TransportTimeout { .. }
                | DomainError::TransportConnectionRefused { .. }
                | DomainError::TransportConnectionReset { .. }
                | DomainError::TlsHandshake { .. }
                | DomainError::HttpStatus { .. }
                | DomainError::TransportIo { .. }
                | DomainError::RetriesExhausted { .. }
        )
    }

    /// Malformed bytes from the upstream, including DNSCrypt packets that fail
    /// to authenticate, decrypt or unpad.
    pub fn is_message_error(&self) -> bool {
        matches!(
            self,
            DomainError::InvalidDnsMessage(_) | DomainError::DnscryptProtocol(_)
        )
    }
}
