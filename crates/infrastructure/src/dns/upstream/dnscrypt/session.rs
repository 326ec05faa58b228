//! Per-resolver DNSCrypt session: certificate handshake and encrypted exchanges.

use super::certificate::{select_certificate, Certificate, EsVersion};
use super::padding::{pad, unpad};
use super::stamp::ServerStamp;
use crate::dns::forwarding::{MessageBuilder, ResponseParser};
use crate::dns::transport::tcp::{connect_tcp, read_with_length_prefix, send_with_length_prefix};
use crate::dns::transport::udp;
use chrono::Utc;
use crypto_box::aead::generic_array::GenericArray;
use crypto_box::aead::Aead;
use crypto_box::{ChaChaBox, PublicKey, SalsaBox, SecretKey};
use danse_domain::{DnscryptNet, DomainError};
use hickory_proto::op::Message;
use hickory_proto::rr::{Name, RecordType};
use ring::rand::{SecureRandom, SystemRandom};
use std::net::SocketAddr;
use std::time::Duration;
use tracing::{debug, info};

pub const RESOLVER_MAGIC: [u8; 8] = *b"r6fnvWj8";
pub const HALF_NONCE_LEN: usize = 12;
pub const NONCE_LEN: usize = 24;
const TAG_LEN: usize = 16;
const QUERY_HEADER_LEN: usize = 8 + 32 + HALF_NONCE_LEN;
const RESPONSE_HEADER_LEN: usize = RESOLVER_MAGIC.len() + NONCE_LEN;

/// Minimum padded query size over UDP; TCP queries only pad to the block size.
pub const UDP_MIN_QUERY_LEN: usize = 256;
const TCP_MIN_QUERY_LEN: usize = 0;

enum SessionCipher {
    XSalsa20(SalsaBox),
    XChaCha20(ChaChaBox),
}

impl SessionCipher {
    fn new(es_version: EsVersion, resolver_pk: &PublicKey, client_sk: &SecretKey) -> Self {
        match es_version {
            EsVersion::XSalsa20Poly1305 => Self::XSalsa20(SalsaBox::new(resolver_pk, client_sk)),
            EsVersion::XChaCha20Poly1305 => Self::XChaCha20(ChaChaBox::new(resolver_pk, client_sk)),
        }
    }

    fn seal(&self, nonce: &[u8; NONCE_LEN], plaintext: &[u8]) -> Result<Vec<u8>, DomainError> {
        let nonce = GenericArray::from_slice(nonce);
        match self {
            Self::XSalsa20(cipher) => cipher.encrypt(nonce, plaintext),
            Self::XChaCha20(cipher) => cipher.encrypt(nonce, plaintext),
        }
        .map_err(|_| DomainError::DnscryptProtocol("Failed to encrypt query".into()))
    }

    fn open(&self, nonce: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, DomainError> {
        let nonce = GenericArray::from_slice(nonce);
        match self {
            Self::XSalsa20(cipher) => cipher.decrypt(nonce, ciphertext),
            Self::XChaCha20(cipher) => cipher.decrypt(nonce, ciphertext),
        }
        .map_err(|_| DomainError::DnscryptProtocol("Failed to decrypt response".into()))
    }
}

/// Shared secret and client identity for one resolver.
pub struct ResolverSession {
    server_addr: SocketAddr,
    provider_name: String,
    net: DnscryptNet,
    client_magic: [u8; 8],
    client_pk: [u8; 32],
    cipher: SessionCipher,
    rng: SystemRandom,
}

impl ResolverSession {
    /// Fetches and verifies the resolver certificate, then derives the session key.
    pub async fn establish(
        stamp: &ServerStamp,
        net: DnscryptNet,
        timeout: Duration,
    ) -> Result<Self, DomainError> {
        let handshake_error = |reason: String| DomainError::DnscryptHandshake {
            provider: stamp.provider_name.clone(),
            reason,
        };

        let certificate = fetch_certificate(stamp, timeout)
            .await
            .map_err(|e| handshake_error(e.to_string()))?;

        let rng = SystemRandom::new();
        let mut secret = [0u8; 32];
        rng.fill(&mut secret)
            .map_err(|_| handshake_error("Failed to generate client key".into()))?;
        let client_sk = SecretKey::from(secret);
        let client_pk = *client_sk.public_key().as_bytes();
        let resolver_pk = PublicKey::from(certificate.resolver_pk);

        info!(
            provider = %stamp.provider_name,
            server = %stamp.server_addr,
            serial = certificate.serial,
            es_version = ?certificate.es_version,
            "DNSCrypt session established"
        );

        Ok(Self {
            server_addr: stamp.server_addr,
            provider_name: stamp.provider_name.clone(),
            net,
            client_magic: certificate.client_magic,
            client_pk,
            cipher: SessionCipher::new(certificate.es_version, &resolver_pk, &client_sk),
            rng,
        })
    }

    pub fn server_addr(&self) -> SocketAddr {
        self.server_addr
    }

    pub fn provider_name(&self) -> &str {
        &self.provider_name
    }

    pub async fn exchange(&self, query: &Message, timeout: Duration) -> Result<Message, DomainError> {
        let query_bytes = MessageBuilder::encode(query)?;

        let response = match self.net {
            DnscryptNet::Udp => {
                let response = self.encrypted_exchange(&query_bytes, DnscryptNet::Udp, timeout).await?;
                if response.truncated() {
                    debug!(server = %self.server_addr, "Truncated DNSCrypt response, retrying over TCP");
                    self.encrypted_exchange(&query_bytes, DnscryptNet::Tcp, timeout).await?
                } else {
                    response
                }
            }
            DnscryptNet::Tcp => self.encrypted_exchange(&query_bytes, DnscryptNet::Tcp, timeout).await?,
        };

        if response.id() != query.id() {
            return Err(DomainError::DnscryptProtocol(format!(
                "Response ID {} does not match query ID {}",
                response.id(),
                query.id()
            )));
        }
        Ok(response)
    }

    async fn encrypted_exchange(
        &self,
        query_bytes: &[u8],
        net: DnscryptNet,
        timeout: Duration,
    ) -> Result<Message, DomainError> {
        let min_len = match net {
            DnscryptNet::Udp => UDP_MIN_QUERY_LEN,
            DnscryptNet::Tcp => TCP_MIN_QUERY_LEN,
        };
        let (packet, client_nonce) = self.encrypt_query(query_bytes, min_len)?;
        let reply = raw_exchange(self.server_addr, net, &packet, timeout).await?;
        let plaintext = self.decrypt_response(&reply, &client_nonce)?;
        MessageBuilder::decode(&plaintext)
    }

    fn encrypt_query(
        &self,
        query_bytes: &[u8],
        min_len: usize,
    ) -> Result<(Vec<u8>, [u8; HALF_NONCE_LEN]), DomainError> {
        let mut client_nonce = [0u8; HALF_NONCE_LEN];
        self.rng
            .fill(&mut client_nonce)
            .map_err(|_| DomainError::DnscryptProtocol("Failed to generate nonce".into()))?;

        let mut nonce = [0u8; NONCE_LEN];
        nonce[..HALF_NONCE_LEN].copy_from_slice(&client_nonce);

        let ciphertext = self.cipher.seal(&nonce, &pad(query_bytes, min_len))?;

        let mut packet = Vec::with_capacity(QUERY_HEADER_LEN + ciphertext.len());
        packet.extend_from_slice(&self.client_magic);
        packet.extend_from_slice(&self.client_pk);
        packet.extend_from_slice(&client_nonce);
        packet.extend_from_slice(&ciphertext);
        Ok((packet, client_nonce))
    }

    fn decrypt_response(
        &self,
        packet: &[u8],
        client_nonce: &[u8; HALF_NONCE_LEN],
    ) -> Result<Vec<u8>, DomainError> {
        if packet.len() < RESPONSE_HEADER_LEN + TAG_LEN {
            return Err(DomainError::DnscryptProtocol(format!(
                "Response too short: {} bytes",
                packet.len()
            )));
        }
        if packet[..RESOLVER_MAGIC.len()] != RESOLVER_MAGIC {
            return Err(DomainError::DnscryptProtocol("Bad resolver magic".into()));
        }

        let nonce = &packet[RESOLVER_MAGIC.len()..RESPONSE_HEADER_LEN];
        if nonce[..HALF_NONCE_LEN] != client_nonce[..] {
            return Err(DomainError::DnscryptProtocol(
                "Response nonce does not echo the query nonce".into(),
            ));
        }

        let padded = self.cipher.open(nonce, &packet[RESPONSE_HEADER_LEN..])?;
        Ok(unpad(&padded)?.to_vec())
    }
}

/// Certificates are always fetched as plain DNS over UDP.
async fn fetch_certificate(stamp: &ServerStamp, timeout: Duration) -> Result<Certificate, DomainError> {
    let mut name = Name::from_ascii(&stamp.provider_name).map_err(|e| {
        DomainError::InvalidEndpoint(format!("Invalid provider name '{}': {}", stamp.provider_name, e))
    })?;
    name.set_fqdn(true);

    let query = MessageBuilder::build_query(name, RecordType::TXT);
    let reply = udp::exchange(stamp.server_addr, &MessageBuilder::encode(&query)?, timeout).await?;
    let response = MessageBuilder::decode(&reply)?;

    let certificates = ResponseParser::txt_payloads(&response)
        .iter()
        .filter_map(|payload| match Certificate::parse(payload, &stamp.provider_pk) {
            Ok(cert) => Some(cert),
            Err(e) => {
                debug!(provider = %stamp.provider_name, error = %e, "Skipping certificate");
                None
            }
        })
        .collect();

    let now = u32::try_from(Utc::now().timestamp()).unwrap_or(u32::MAX);
    select_certificate(certificates, now)
        .ok_or_else(|| DomainError::DnscryptProtocol("No valid certificate".into()))
}

async fn raw_exchange(
    server: SocketAddr,
    net: DnscryptNet,
    packet: &[u8],
    timeout: Duration,
) -> Result<Vec<u8>, DomainError> {
    match net {
        DnscryptNet::Udp => udp::exchange(server, packet, timeout).await,
        DnscryptNet::Tcp => {
            let mut stream = connect_tcp(server, timeout).await?;
            let round_trip = async {
                send_with_length_prefix(&mut stream, packet).await?;
                read_with_length_prefix(&mut stream).await
            };
            tokio::time::timeout(timeout, round_trip)
                .await
                .map_err(|_| DomainError::TransportTimeout {
                    server: server.to_string(),
                })?
                .map_err(|e| DomainError::TransportIo {
                    server: server.to_string(),
                    reason: e.to_string(),
                })
        }
    }
}
