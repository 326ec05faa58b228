use super::messages::answer;
use crypto_box::aead::generic_array::GenericArray;
use crypto_box::aead::Aead;
use crypto_box::{ChaChaBox, PublicKey, SalsaBox, SecretKey};
use danse_infrastructure::dns::transport::tcp::{read_with_length_prefix, send_with_length_prefix};
use danse_infrastructure::dns::upstream::dnscrypt::{
    pad, unpad, Certificate, EsVersion, ServerStamp, HALF_NONCE_LEN, NONCE_LEN, RESOLVER_MAGIC,
};
use hickory_proto::op::{Message, MessageType};
use hickory_proto::rr::rdata::TXT;
use hickory_proto::rr::{RData, Record, RecordType};
use ring::rand::{SecureRandom, SystemRandom};
use ring::signature::{Ed25519KeyPair, KeyPair};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::{TcpListener, UdpSocket};
use tokio::task::JoinHandle;

const CLIENT_MAGIC: [u8; 8] = *b"mockdnsc";
const PROVIDER_NAME: &str = "2.dnscrypt-cert.mock.test";

#[derive(Debug, Clone, Copy)]
pub struct ResolverOptions {
    pub es_version: EsVersion,
    /// UDP answers come back truncated so clients must retry over TCP.
    pub truncate_udp: bool,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            es_version: EsVersion::XSalsa20Poly1305,
            truncate_udp: false,
        }
    }
}

struct ResolverState {
    options: ResolverOptions,
    certificate: Vec<u8>,
    secret: SecretKey,
    udp_queries: AtomicUsize,
    tcp_queries: AtomicUsize,
}

/// In-process DNSCrypt v2 resolver on UDP and TCP at the same port.
pub struct MockDnscryptResolver {
    stamp: ServerStamp,
    state: Arc<ResolverState>,
    tasks: Vec<JoinHandle<()>>,
}

impl MockDnscryptResolver {
    pub async fn start(options: ResolverOptions) -> Self {
        let rng = SystemRandom::new();
        let pkcs8 = Ed25519KeyPair::generate_pkcs8(&rng).unwrap();
        let provider_key = Ed25519KeyPair::from_pkcs8(pkcs8.as_ref()).unwrap();

        let mut secret_bytes = [0u8; 32];
        rng.fill(&mut secret_bytes).unwrap();
        let secret = SecretKey::from(secret_bytes);

        let now = chrono::Utc::now().timestamp() as u32;
        let cert = Certificate {
            es_version: options.es_version,
            resolver_pk: *secret.public_key().as_bytes(),
            client_magic: CLIENT_MAGIC,
            serial: 1,
            ts_start: now - 3600,
            ts_end: now + 3600,
        };
        let signature: [u8; 64] = provider_key
            .sign(&cert.signed_bytes())
            .as_ref()
            .try_into()
            .unwrap();

        let udp = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = udp.local_addr().unwrap();
        let tcp = TcpListener::bind(addr).await.unwrap();

        let state = Arc::new(ResolverState {
            options,
            certificate: cert.to_bytes(&signature),
            secret,
            udp_queries: AtomicUsize::new(0),
            tcp_queries: AtomicUsize::new(0),
        });

        let tasks = vec![
            tokio::spawn(serve_udp(udp, state.clone())),
            tokio::spawn(serve_tcp(tcp, state.clone())),
        ];

        let stamp = ServerStamp {
            props: 0,
            server_addr: addr,
            provider_pk: provider_key.public_key().as_ref().try_into().unwrap(),
            provider_name: PROVIDER_NAME.to_string(),
        };

        Self { stamp, state, tasks }
    }

    pub fn stamp(&self) -> String {
        self.stamp.to_string()
    }

    /// A stamp for this resolver signed by someone else's provider key.
    pub fn stamp_with_wrong_key(&self) -> String {
        let mut stamp = self.stamp.clone();
        stamp.provider_pk = [0x42; 32];
        stamp.to_string()
    }

    pub fn addr(&self) -> SocketAddr {
        self.stamp.server_addr
    }

    pub fn udp_queries(&self) -> usize {
        self.state.udp_queries.load(Ordering::SeqCst)
    }

    pub fn tcp_queries(&self) -> usize {
        self.state.tcp_queries.load(Ordering::SeqCst)
    }
}

impl Drop for MockDnscryptResolver {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

async fn serve_udp(socket: UdpSocket, state: Arc<ResolverState>) {
    let mut buf = vec![0u8; 4096];
    while let Ok((len, peer)) = socket.recv_from(&mut buf).await {
        let packet = &buf[..len];
        let reply = if packet.starts_with(&CLIENT_MAGIC) {
            state.udp_queries.fetch_add(1, Ordering::SeqCst);
            answer_encrypted(&state, packet, state.options.truncate_udp)
        } else {
            answer_certificate(&state, packet)
        };
        if let Some(reply) = reply {
            let _ = socket.send_to(&reply, peer).await;
        }
    }
}

async fn serve_tcp(listener: TcpListener, state: Arc<ResolverState>) {
    while let Ok((mut stream, _)) = listener.accept().await {
        let state = state.clone();
        tokio::spawn(async move {
            while let Ok(packet) = read_with_length_prefix(&mut stream).await {
                state.tcp_queries.fetch_add(1, Ordering::SeqCst);
                let Some(reply) = answer_encrypted(&state, &packet, false) else {
                    return;
                };
                if send_with_length_prefix(&mut stream, &reply).await.is_err() {
                    return;
                }
            }
        });
    }
}

fn answer_certificate(state: &ResolverState, packet: &[u8]) -> Option<Vec<u8>> {
    let query = Message::from_vec(packet).ok()?;
    let question = query.queries().first()?.clone();
    if question.query_type() != RecordType::TXT {
        return None;
    }

    let mut response = Message::new();
    response
        .set_id(query.id())
        .set_message_type(MessageType::Response)
        .add_query(question.clone())
        .add_answer(Record::from_rdata(
            question.name().clone(),
            86400,
            RData::TXT(TXT::from_bytes(vec![&state.certificate[..]])),
        ));
    response.to_vec().ok()
}

enum Cipher {
    Salsa(SalsaBox),
    ChaCha(ChaChaBox),
}

fn answer_encrypted(state: &ResolverState, packet: &[u8], truncate: bool) -> Option<Vec<u8>> {
    let header_len = CLIENT_MAGIC.len() + 32 + HALF_NONCE_LEN;
    if packet.len() < header_len {
        return None;
    }
    let client_pk: [u8; 32] = packet[8..40].try_into().ok()?;
    let client_pk = PublicKey::from(client_pk);
    let client_nonce = &packet[40..header_len];

    let cipher = match state.options.es_version {
        EsVersion::XSalsa20Poly1305 => Cipher::Salsa(SalsaBox::new(&client_pk, &state.secret)),
        EsVersion::XChaCha20Poly1305 => Cipher::ChaCha(ChaChaBox::new(&client_pk, &state.secret)),
    };

    let mut query_nonce = [0u8; NONCE_LEN];
    query_nonce[..HALF_NONCE_LEN].copy_from_slice(client_nonce);
    let padded = match &cipher {
        Cipher::Salsa(b) => b.decrypt(GenericArray::from_slice(&query_nonce), &packet[header_len..]),
        Cipher::ChaCha(b) => b.decrypt(GenericArray::from_slice(&query_nonce), &packet[header_len..]),
    }
    .ok()?;
    let query = Message::from_vec(unpad(&padded).ok()?).ok()?;

    let mut response = answer(&query);
    if truncate {
        response.set_truncated(true);
        response.answers_mut().clear();
    }
    let plaintext = pad(&response.to_vec().ok()?, 0);

    let mut response_nonce = [0u8; NONCE_LEN];
    response_nonce[..HALF_NONCE_LEN].copy_from_slice(client_nonce);
    SystemRandom::new().fill(&mut response_nonce[HALF_NONCE_LEN..]).ok()?;

    let ciphertext = match &cipher {
        Cipher::Salsa(b) => b.encrypt(GenericArray::from_slice(&response_nonce), &plaintext[..]),
        Cipher::ChaCha(b) => b.encrypt(GenericArray::from_slice(&response_nonce), &plaintext[..]),
    }
    .ok()?;

    let mut reply = RESOLVER_MAGIC.to_vec();
    reply.extend_from_slice(&response_nonce);
    reply.extend_from_slice(&ciphertext);
    Some(reply)
}
