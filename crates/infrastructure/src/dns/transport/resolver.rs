//! Fixed-address resolver for upstream hostnames.
//!
//! Upstream hostnames cannot be resolved through the proxy itself, so they are
//! looked up with plain UDP queries sent straight to the configured bootstrap server.

use crate::dns::forwarding::{MessageBuilder, ResponseParser};
use crate::dns::transport::udp;
use danse_domain::DomainError;
use hickory_proto::rr::{Name, RecordType};
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct BootstrapResolver {
    server: SocketAddr,
    timeout: Duration,
}

impl BootstrapResolver {
    pub fn new(server: SocketAddr, timeout: Duration) -> Self {
        Self { server, timeout }
    }

    /// IPv4 addresses of `hostname`, falling back to IPv6 when there are none.
    /// IP literals are returned as-is without a lookup.
    pub async fn lookup(&self, hostname: &str) -> Result<Vec<IpAddr>, DomainError> {
        if let Ok(ip) = hostname.trim_matches(|c| c == '[' || c == ']').parse::<IpAddr>() {
            return Ok(vec![ip]);
        }

        let fqdn = if hostname.ends_with('.') {
            hostname.to_string()
        } else {
            format!("{}.", hostname)
        };
        let name = Name::from_ascii(&fqdn)
            .map_err(|e| DomainError::InvalidEndpoint(format!("Invalid hostname '{}': {}", hostname, e)))?;

        let mut addresses = self.query(name.clone(), RecordType::A).await?;
        if addresses.is_empty() {
            addresses = self.query(name, RecordType::AAAA).await?;
        }

        if addresses.is_empty() {
            return Err(DomainError::InvalidEndpoint(format!(
                "No addresses found for {} via bootstrap {}",
                hostname, self.server
            )));
        }

        debug!(hostname = %hostname, bootstrap = %self.server, addresses = ?addresses, "Bootstrap lookup");
        Ok(addresses)
    }

    /// First address of `hostname` combined with `port`.
    pub async fn resolve_socket_addr(
        &self,
        hostname: &str,
        port: u16,
    ) -> Result<SocketAddr, DomainError> {
        let addresses = self.lookup(hostname).await?;
        Ok(SocketAddr::new(addresses[0], port))
    }

    async fn query(&self, name: Name, record_type: RecordType) -> Result<Vec<IpAddr>, DomainError> {
        let query = MessageBuilder::build_query(name, record_type);
        let query_bytes = MessageBuilder::encode(&query)?;
        let response_bytes = udp::exchange(self.server, &query_bytes, self.timeout).await?;
        let response = MessageBuilder::decode(&response_bytes)?;

        if response.id() != query.id() {
            return Err(DomainError::TransportIo {
                server: self.server.to_string(),
                reason: format!(
                    "Reply ID {} does not match query ID {}",
                    response.id(),
                    query.id()
                ),
            });
        }

        Ok(ResponseParser::addresses(&response))
    }
}

impl reqwest::dns::Resolve for BootstrapResolver {
    fn resolve(&self, name: reqwest::dns::Name) -> reqwest::dns::Resolving {
        let resolver = self.clone();
        Box::pin(async move {
            let addresses = resolver
                .lookup(name.as_str())
                .await
                .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>)?;
            let addrs: reqwest::dns::Addrs =
                Box::new(addresses.into_iter().map(|ip| SocketAddr::new(ip, 0)));
            Ok(addrs)
        })
    }
}
