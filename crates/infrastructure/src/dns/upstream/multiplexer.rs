//! One long-lived stream connection shared by any number of concurrent queries.
//!
//! Three tasks cooperate per connection:
//! - the connection loop dials, starts the sender and receiver, waits for
//!   either to stop, fails every pending query and starts over after a capped
//!   exponential backoff. The backoff resets only after a connection delivered
//!   a reply or stayed up for `STABLE_CONNECTION_TIME`;
//! - the sender drains the outbound queue and writes length-prefixed queries;
//! - the receiver reads length-prefixed replies and hands each one to the caller
//!   waiting on its transaction ID.
//!
//! Each in-flight query is given a transaction ID that is unique on the
//! connection; the caller's own ID is restored on the reply.

use crate::dns::forwarding::MessageBuilder;
use crate::dns::load_balancer::EndpointSet;
use crate::dns::transport::tcp::{read_with_length_prefix, send_with_length_prefix};
use crate::dns::transport::StreamConnector;
use danse_domain::{DomainError, DotEndpoint};
use hickory_proto::op::{Message, Query};
use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::Instant;
use tracing::{debug, info, warn};

const INITIAL_RECONNECT_DELAY: Duration = Duration::from_millis(100);
const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(5);
const STABLE_CONNECTION_TIME: Duration = Duration::from_secs(5);
const MAX_IN_FLIGHT: usize = u16::MAX as usize + 1;

type Reply = Result<Message, DomainError>;
type OutboundQueue = Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<Message>>>;

struct PendingQuery {
    question: Option<Query>,
    reply: oneshot::Sender<Reply>,
}

/// In-flight queries keyed by the transaction ID used on the connection.
#[derive(Default)]
struct PendingReplies {
    entries: Mutex<HashMap<u16, PendingQuery>>,
    delivered: AtomicU64,
}

impl PendingReplies {
    fn lock(&self) -> MutexGuard<'_, HashMap<u16, PendingQuery>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Reserves an unused transaction ID for `question`.
    fn register(&self, question: Option<Query>) -> Option<(u16, oneshot::Receiver<Reply>)> {
        let mut entries = self.lock();
        if entries.len() >= MAX_IN_FLIGHT {
            return None;
        }

        let id = loop {
            let candidate = fastrand::u16(..);
            if !entries.contains_key(&candidate) {
                break candidate;
            }
        };

        let (reply, receiver) = oneshot::channel();
        entries.insert(id, PendingQuery { question, reply });
        Some((id, receiver))
    }

    fn contains(&self, id: u16) -> bool {
        self.lock().contains_key(&id)
    }

    /// Delivers `response` to the query registered under its ID. Replies whose
    /// question differs from the registered one are left undelivered; replies
    /// without a question section (FORMERR, REFUSED) match on ID alone.
    fn complete(&self, response: Message) -> bool {
        let mut entries = self.lock();
        let id = response.id();
        let matches = entries.get(&id).is_some_and(|pending| {
            match response.queries().first() {
                Some(question) => pending.question.as_ref() == Some(question),
                None => true,
            }
        });
        if !matches {
            return false;
        }

        match entries.remove(&id) {
            Some(pending) => {
                let _ = pending.reply.send(Ok(response));
                self.delivered.fetch_add(1, Ordering::Relaxed);
                true
            }
            None => false,
        }
    }

    /// Replies handed to callers since the multiplexer started.
    fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    fn fail(&self, id: u16, error: DomainError) {
        if let Some(pending) = self.lock().remove(&id) {
            let _ = pending.reply.send(Err(error));
        }
    }

    fn cancel(&self, id: u16) {
        self.lock().remove(&id);
    }

    /// Fails every in-flight query, returning how many there were.
    fn fail_all(&self, error: &DomainError) -> usize {
        let drained: Vec<PendingQuery> = self.lock().drain().map(|(_, pending)| pending).collect();
        let count = drained.len();
        for pending in drained {
            let _ = pending.reply.send(Err(error.clone()));
        }
        count
    }

    fn len(&self) -> usize {
        self.lock().len()
    }
}

pub struct StreamMultiplexer {
    endpoint: DotEndpoint,
    pending: Arc<PendingReplies>,
    outbound: mpsc::UnboundedSender<Message>,
    timeout: Duration,
    connection_task: JoinHandle<()>,
}

impl StreamMultiplexer {
    /// Starts the background connection loop. Must be called within a Tokio runtime.
    ///
    /// `timeout` bounds both dialing and each caller's wait for its reply.
    pub fn start<C: StreamConnector>(connector: C, endpoint: DotEndpoint, timeout: Duration) -> Self {
        let (outbound, queue) = mpsc::unbounded_channel();
        let pending = Arc::new(PendingReplies::default());

        let connection_task = tokio::spawn(run_connection_loop(
            connector,
            endpoint.clone(),
            timeout,
            Arc::new(tokio::sync::Mutex::new(queue)),
            pending.clone(),
        ));

        Self {
            endpoint,
            pending,
            outbound,
            timeout,
            connection_task,
        }
    }

    pub async fn send(&self, query: &Message) -> Result<Message, DomainError> {
        // Register before enqueueing so a fast reply always finds its entry.
        let (id, reply) = self
            .pending
            .register(query.queries().first().cloned())
            .ok_or_else(|| DomainError::TransportIo {
                server: self.endpoint.to_string(),
                reason: "All transaction IDs are in flight".to_string(),
            })?;

        let mut outbound = query.clone();
        outbound.set_id(id);
        if self.outbound.send(outbound).is_err() {
            self.pending.cancel(id);
            return Err(self.connection_reset());
        }

        let mut response = match tokio::time::timeout(self.timeout, reply).await {
            Ok(Ok(result)) => result?,
            Ok(Err(_)) => return Err(self.connection_reset()),
            Err(_) => {
                self.pending.cancel(id);
                return Err(DomainError::TransportTimeout {
                    server: self.endpoint.to_string(),
                });
            }
        };

        response.set_id(query.id());
        Ok(response)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    fn connection_reset(&self) -> DomainError {
        DomainError::TransportConnectionReset {
            server: self.endpoint.to_string(),
        }
    }
}

impl Drop for StreamMultiplexer {
    fn drop(&mut self) {
        self.connection_task.abort();
    }
}

async fn run_connection_loop<C: StreamConnector>(
    connector: C,
    endpoint: DotEndpoint,
    timeout: Duration,
    queue: OutboundQueue,
    pending: Arc<PendingReplies>,
) {
    let server = endpoint.to_string();
    let mut delay = INITIAL_RECONNECT_DELAY;

    loop {
        let stream = match connector.connect(&endpoint, timeout).await {
            Ok(stream) => stream,
            Err(e) => {
                warn!(
                    server = %server,
                    error = %e,
                    retry_in_ms = delay.as_millis() as u64,
                    "Multiplexed connection failed"
                );
                tokio::time::sleep(delay).await;
                delay = (delay * 2).min(MAX_RECONNECT_DELAY);
                continue;
            }
        };
        info!(server = %server, "Multiplexed connection established");
        let connected_at = Instant::now();
        let delivered_before = pending.delivered();

        let (reader, writer) = tokio::io::split(stream);
        let mut loops = JoinSet::new();
        loops.spawn(send_loop(writer, queue.clone(), pending.clone(), server.clone()));
        loops.spawn(receive_loop(reader, pending.clone(), server.clone()));

        let reason = match loops.join_next().await {
            Some(Ok(reason)) => reason,
            Some(Err(e)) => DomainError::TransportIo {
                server: server.clone(),
                reason: e.to_string(),
            },
            None => DomainError::TransportConnectionReset {
                server: server.clone(),
            },
        };
        loops.shutdown().await;

        let failed = pending.fail_all(&reason);
        if pending.delivered() > delivered_before
            || connected_at.elapsed() >= STABLE_CONNECTION_TIME
        {
            delay = INITIAL_RECONNECT_DELAY;
        }
        warn!(
            server = %server,
            error = %reason,
            failed_queries = failed,
            retry_in_ms = delay.as_millis() as u64,
            "Multiplexed connection lost, reconnecting"
        );
        tokio::time::sleep(delay).await;
        delay = (delay * 2).min(MAX_RECONNECT_DELAY);
    }
}

async fn send_loop<W>(
    mut writer: W,
    queue: OutboundQueue,
    pending: Arc<PendingReplies>,
    server: String,
) -> DomainError
where
    W: AsyncWrite + Unpin,
{
    let mut queue = queue.lock().await;

    while let Some(query) = queue.recv().await {
        // The caller already gave up or the previous connection failed it.
        if !pending.contains(query.id()) {
            continue;
        }

        let query_bytes = match MessageBuilder::encode(&query) {
            Ok(bytes) => bytes,
            Err(e) => {
                pending.fail(query.id(), e);
                continue;
            }
        };

        if let Err(e) = send_with_length_prefix(&mut writer, &query_bytes).await {
            return stream_error(&server, e);
        }
    }

    DomainError::TransportConnectionReset { server }
}

async fn receive_loop<R>(mut reader: R, pending: Arc<PendingReplies>, server: String) -> DomainError
where
    R: AsyncRead + Unpin,
{
    loop {
        let response_bytes = match read_with_length_prefix(&mut reader).await {
            Ok(bytes) => bytes,
            Err(e) => return stream_error(&server, e),
        };

        let response = match MessageBuilder::decode(&response_bytes) {
            Ok(response) => response,
            Err(e) => {
                warn!(server = %server, error = %e, "Undecodable reply on multiplexed connection");
                if response_bytes.len() >= 2 {
                    let id = u16::from_be_bytes([response_bytes[0], response_bytes[1]]);
                    pending.fail(id, e);
                }
                continue;
            }
        };

        let id = response.id();
        if !pending.complete(response) {
            debug!(server = %server, id, "Dropping reply with no matching pending query");
        }
    }
}

fn stream_error(server: &str, error: io::Error) -> DomainError {
    match error.kind() {
        io::ErrorKind::UnexpectedEof
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::BrokenPipe => DomainError::TransportConnectionReset {
            server: server.to_string(),
        },
        _ => DomainError::TransportIo {
            server: server.to_string(),
            reason: error.to_string(),
        },
    }
}

/// Async DoT mode: one multiplexed connection per endpoint, selected round-robin.
pub struct MultiplexedDotClient {
    multiplexers: EndpointSet<StreamMultiplexer>,
}

impl MultiplexedDotClient {
    pub fn start<C: StreamConnector + Clone>(
        endpoints: Vec<DotEndpoint>,
        connector: C,
        timeout: Duration,
    ) -> Result<Self, DomainError> {
        let multiplexers = endpoints
            .into_iter()
            .map(|endpoint| StreamMultiplexer::start(connector.clone(), endpoint, timeout))
            .collect();

        Ok(Self {
            multiplexers: EndpointSet::new(multiplexers)?,
        })
    }

    pub async fn resolve(&self, query: &Message) -> Result<Message, DomainError> {
        self.multiplexers.next().send(query).await
    }
}
