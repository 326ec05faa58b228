//! DNSCrypt v2 client.

mod certificate;
mod padding;
mod session;
mod stamp;

pub use certificate::{Certificate, EsVersion, CERT_LEN, CERT_MAGIC};
pub use padding::{pad, unpad, PADDING_BLOCK};
pub use session::{ResolverSession, HALF_NONCE_LEN, NONCE_LEN, RESOLVER_MAGIC, UDP_MIN_QUERY_LEN};
pub use stamp::ServerStamp;

use crate::dns::load_balancer::EndpointSet;
use danse_domain::{DnscryptNet, DomainError};
use hickory_proto::op::Message;
use std::time::Duration;
use tracing::debug;

/// Fixed per-exchange timeout for DNSCrypt resolvers.
pub const DNSCRYPT_TIMEOUT: Duration = Duration::from_secs(10);

pub struct DnscryptClient {
    sessions: EndpointSet<ResolverSession>,
    timeout: Duration,
}

impl DnscryptClient {
    /// Parses every stamp and completes each resolver handshake.
    ///
    /// Any stamp that fails to parse or handshake fails construction.
    pub async fn connect(stamps: &[String], net: DnscryptNet) -> Result<Self, DomainError> {
        let mut sessions = Vec::with_capacity(stamps.len());
        for stamp in stamps {
            let stamp: ServerStamp = stamp.parse()?;
            sessions.push(ResolverSession::establish(&stamp, net, DNSCRYPT_TIMEOUT).await?);
        }

        Ok(Self {
            sessions: EndpointSet::new(sessions)?,
            timeout: DNSCRYPT_TIMEOUT,
        })
    }

    pub async fn resolve(&self, query: &Message) -> Result<Message, DomainError> {
        if query.queries().is_empty() {
            return Ok(query.clone());
        }

        let session = self.sessions.next();
        debug!(
            provider = session.provider_name(),
            server = %session.server_addr(),
            "Forwarding query over DNSCrypt"
        );
        session.exchange(query, self.timeout).await
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}
