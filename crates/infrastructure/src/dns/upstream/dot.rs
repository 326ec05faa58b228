//! DNS-over-TLS client with one persistent connection per endpoint.

use crate::dns::forwarding::MessageBuilder;
use crate::dns::load_balancer::EndpointSet;
use crate::dns::transport::tcp::{read_with_length_prefix, send_with_length_prefix};
use crate::dns::transport::{StreamConnector, TlsConnector};
use danse_domain::{DomainError, DotEndpoint};
use hickory_proto::op::Message;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Exchanges attempted per query before giving up on the endpoint.
pub const MAX_EXCHANGE_ATTEMPTS: u8 = 5;

/// Synchronous query/response exchange over cached stream connections.
///
/// Every endpoint owns one connection slot. The slot lock is held for the whole
/// exchange, so checking for a live connection and dialing a new one happen
/// atomically and one connection never carries two exchanges at once.
///
/// Queries to the same endpoint therefore queue behind each other. A caller
/// waits at most one `timeout` for the slot and fails with `TransportTimeout`
/// if a slow exchange still holds it.
pub struct DotClient<C: StreamConnector = TlsConnector> {
    connector: C,
    endpoints: EndpointSet<DotEndpoint>,
    connections: HashMap<DotEndpoint, Mutex<Option<C::Stream>>>,
    timeout: Duration,
}

impl<C: StreamConnector> DotClient<C> {
    pub fn new(
        endpoints: Vec<DotEndpoint>,
        connector: C,
        timeout: Duration,
    ) -> Result<Self, DomainError> {
        let connections = endpoints
            .iter()
            .map(|endpoint| (endpoint.clone(), Mutex::new(None)))
            .collect();

        Ok(Self {
            connector,
            endpoints: EndpointSet::new(endpoints)?,
            connections,
            timeout,
        })
    }

    /// Sends `query` to the next endpoint, reconnecting after each failed exchange.
    ///
    /// Failing to dial is reported immediately. Malformed replies are not retried.
    pub async fn resolve(&self, query: &Message) -> Result<Message, DomainError> {
        let query_bytes = MessageBuilder::encode(query)?;
        let endpoint = self.endpoints.next();
        let slot = self.connections.get(endpoint).ok_or_else(|| {
            DomainError::InvalidEndpoint(format!("No connection slot for {}", endpoint))
        })?;

        let mut connection = tokio::time::timeout(self.timeout, slot.lock())
            .await
            .map_err(|_| {
                debug!(server = %endpoint, "Timed out waiting for the DoT connection slot");
                DomainError::TransportTimeout {
                    server: endpoint.to_string(),
                }
            })?;
        let mut last_error = None;

        for attempt in 1..=MAX_EXCHANGE_ATTEMPTS {
            let mut stream = match connection.take() {
                Some(stream) => stream,
                None => {
                    debug!(server = %endpoint, attempt, "Opening DoT connection");
                    self.connector.connect(endpoint, self.timeout).await?
                }
            };

            match self.exchange(&mut stream, &query_bytes, query.id(), endpoint).await {
                Ok(response) => {
                    *connection = Some(stream);
                    return Ok(response);
                }
                Err(e) if e.is_message_error() => {
                    *connection = Some(stream);
                    return Err(e);
                }
                Err(e) => {
                    warn!(server = %endpoint, attempt, error = %e, "DoT exchange failed, dropping connection");
                    last_error = Some(e);
                }
            }
        }

        Err(DomainError::RetriesExhausted {
            server: endpoint.to_string(),
            attempts: MAX_EXCHANGE_ATTEMPTS,
            last_error: last_error.map(|e| e.to_string()).unwrap_or_default(),
        })
    }

    pub fn protocol_name(&self) -> &'static str {
        self.connector.protocol_name()
    }

    async fn exchange(
        &self,
        stream: &mut C::Stream,
        query_bytes: &[u8],
        query_id: u16,
        endpoint: &DotEndpoint,
    ) -> Result<Message, DomainError> {
        let response_bytes = tokio::time::timeout(self.timeout, async {
            send_with_length_prefix(stream, query_bytes).await?;
            read_with_length_prefix(stream).await
        })
        .await
        .map_err(|_| DomainError::TransportTimeout {
            server: endpoint.to_string(),
        })?
        .map_err(|e| DomainError::TransportIo {
            server: endpoint.to_string(),
            reason: e.to_string(),
        })?;

        let response = MessageBuilder::decode(&response_bytes)?;
        if response.id() != query_id {
            return Err(DomainError::TransportIo {
                server: endpoint.to_string(),
                reason: format!(
                    "Reply ID {} does not match query ID {}",
                    response.id(),
                    query_id
                ),
            });
        }

        Ok(response)
    }
}
