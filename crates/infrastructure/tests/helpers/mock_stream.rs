use super::messages::{answer_bytes, refused_bytes};
use danse_domain::{DotEndpoint, UpstreamAddr};
use danse_infrastructure::dns::transport::tcp::{read_with_length_prefix, send_with_length_prefix};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy)]
pub enum StreamBehavior {
    /// Answers each query as soon as it arrives.
    Echo,
    /// Collects `n` queries, then answers them in reverse order.
    ReverseBatch(usize),
    /// Reads one query and closes the connection.
    CloseAfterRead,
    /// Reads queries and never answers.
    Silent,
    /// Answers with a frame that keeps the query ID but is not a DNS message.
    Garbage,
    /// Answers with the query ID plus one.
    WrongId,
    /// Answers REFUSED without echoing the question.
    RefuseWithoutQuestion,
    /// Closes every connection as soon as it is accepted.
    CloseOnAccept,
}

/// Length-prefixed DNS over plain TCP, standing in for a DoT server.
pub struct MockStreamServer {
    addr: SocketAddr,
    connections: Arc<AtomicUsize>,
    queries: Arc<AtomicUsize>,
    task: JoinHandle<()>,
}

impl MockStreamServer {
    pub async fn start(behavior: StreamBehavior) -> Self {
        Self::start_with(behavior, behavior).await
    }

    /// The first connection gets `first`, every later one gets `then`.
    pub async fn start_with(first: StreamBehavior, then: StreamBehavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let connections = Arc::new(AtomicUsize::new(0));
        let queries = Arc::new(AtomicUsize::new(0));

        let task = {
            let connections = connections.clone();
            let queries = queries.clone();
            tokio::spawn(async move {
                while let Ok((stream, _)) = listener.accept().await {
                    let index = connections.fetch_add(1, Ordering::SeqCst);
                    let behavior = if index == 0 { first } else { then };
                    tokio::spawn(serve_connection(stream, behavior, queries.clone()));
                }
            })
        };

        Self {
            addr,
            connections,
            queries,
            task,
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn endpoint(&self) -> DotEndpoint {
        DotEndpoint::new(UpstreamAddr::Resolved(self.addr), "localhost")
    }

    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

impl Drop for MockStreamServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve_connection(mut stream: TcpStream, behavior: StreamBehavior, queries: Arc<AtomicUsize>) {
    if matches!(behavior, StreamBehavior::CloseOnAccept) {
        return;
    }
    let mut batch = Vec::new();

    while let Ok(query) = read_with_length_prefix(&mut stream).await {
        queries.fetch_add(1, Ordering::SeqCst);

        let replies: Vec<Vec<u8>> = match behavior {
            StreamBehavior::Echo => answer_bytes(&query).into_iter().collect(),
            StreamBehavior::ReverseBatch(n) => {
                batch.push(query);
                if batch.len() < n {
                    continue;
                }
                batch.drain(..).rev().filter_map(|q| answer_bytes(&q)).collect()
            }
            StreamBehavior::CloseAfterRead | StreamBehavior::CloseOnAccept => return,
            StreamBehavior::Silent => continue,
            StreamBehavior::Garbage => vec![vec![query[0], query[1], 0xff]],
            StreamBehavior::WrongId => answer_bytes(&query)
                .map(|mut reply| {
                    let id = u16::from_be_bytes([reply[0], reply[1]]).wrapping_add(1);
                    reply[..2].copy_from_slice(&id.to_be_bytes());
                    reply
                })
                .into_iter()
                .collect(),
            StreamBehavior::RefuseWithoutQuestion => refused_bytes(&query).into_iter().collect(),
        };

        for reply in replies {
            if send_with_length_prefix(&mut stream, &reply).await.is_err() {
                return;
            }
        }
    }
}
