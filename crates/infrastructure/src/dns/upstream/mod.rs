pub mod dnscrypt;
pub mod doh;
pub mod dot;
pub mod multiplexer;

use crate::dns::transport::{BootstrapResolver, TlsConnector};
use async_trait::async_trait;
use danse_application::ports::UpstreamClient;
use danse_domain::{DomainError, DotEndpoint, DotMode, ResolverConfig, UpstreamKind};
use hickory_proto::op::Message;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

pub use dnscrypt::DnscryptClient;
pub use doh::DohClient;
pub use dot::DotClient;
pub use multiplexer::{MultiplexedDotClient, StreamMultiplexer};

/// The upstream transport chosen at startup.
pub enum Upstream {
    Doh(DohClient),
    Dot(DotClient),
    DotMultiplexed(MultiplexedDotClient),
    Dnscrypt(DnscryptClient),
}

#[async_trait]
impl UpstreamClient for Upstream {
    async fn resolve(&self, query: &Message) -> Result<Message, DomainError> {
        match self {
            Self::Doh(client) => client.resolve(query).await,
            Self::Dot(client) => client.resolve(query).await,
            Self::DotMultiplexed(client) => client.resolve(query).await,
            Self::Dnscrypt(client) => client.resolve(query).await,
        }
    }

    fn protocol_name(&self) -> &'static str {
        match self {
            Self::Doh(_) => "HTTPS",
            Self::Dot(client) => client.protocol_name(),
            Self::DotMultiplexed(_) => "TLS",
            Self::Dnscrypt(_) => "DNSCrypt",
        }
    }
}

/// Builds the configured upstream client.
///
/// DNSCrypt handshakes run here, so an unreachable DNSCrypt resolver fails startup.
pub async fn create_upstream_client(config: &ResolverConfig) -> Result<Upstream, DomainError> {
    let timeout = config.query_timeout();
    let bootstrap_addr: SocketAddr = config.bootstrap_address.parse().map_err(|_| {
        DomainError::InvalidEndpoint(format!(
            "Invalid bootstrap address: {}",
            config.bootstrap_address
        ))
    })?;
    let bootstrap = Arc::new(BootstrapResolver::new(bootstrap_addr, timeout));

    let upstream = match config.kind {
        UpstreamKind::Doh => Upstream::Doh(DohClient::new(
            config.urls.clone(),
            timeout,
            Some(bootstrap),
        )?),
        UpstreamKind::Dot => {
            let endpoints = config
                .urls
                .iter()
                .map(|url| url.parse::<DotEndpoint>())
                .collect::<Result<Vec<_>, _>>()?;
            let connector = TlsConnector::new(Some(bootstrap))?;

            match config.dot_mode {
                DotMode::Pool => Upstream::Dot(DotClient::new(endpoints, connector, timeout)?),
                DotMode::Multiplexed => Upstream::DotMultiplexed(MultiplexedDotClient::start(
                    endpoints, connector, timeout,
                )?),
            }
        }
        UpstreamKind::Dnscrypt => {
            Upstream::Dnscrypt(DnscryptClient::connect(&config.urls, config.dnscrypt_net).await?)
        }
    };

    info!(
        kind = %config.kind,
        protocol = upstream.protocol_name(),
        endpoints = config.urls.len(),
        bootstrap = %bootstrap_addr,
        "Upstream client created"
    );

    Ok(upstream)
}
