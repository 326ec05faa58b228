//! `sdns://` server stamps for DNSCrypt resolvers.
//!
//! Layout after base64url decoding:
//! `0x01 ‖ props (u64 LE) ‖ LP(addr) ‖ LP(provider pk) ‖ LP(provider name)`
//! where `LP(x)` is a one-byte length followed by `x`.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use danse_domain::DomainError;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

const STAMP_SCHEME: &str = "sdns://";
const PROTOCOL_DNSCRYPT: u8 = 0x01;
const DEFAULT_PORT: u16 = 443;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerStamp {
    pub props: u64,
    pub server_addr: SocketAddr,
    /// Ed25519 key that signs the resolver's certificates.
    pub provider_pk: [u8; 32],
    /// Name queried for certificates, e.g. `2.dnscrypt-cert.example.com`.
    pub provider_name: String,
}

impl FromStr for ServerStamp {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| DomainError::InvalidEndpoint(format!("Invalid stamp '{}': {}", s, reason));

        let encoded = s
            .strip_prefix(STAMP_SCHEME)
            .ok_or_else(|| invalid("missing sdns:// prefix"))?;
        let bytes = URL_SAFE_NO_PAD
            .decode(encoded.trim_end_matches('='))
            .map_err(|e| invalid(&e.to_string()))?;

        let mut reader = StampReader::new(&bytes);
        if reader.take(1).ok_or_else(|| invalid("empty"))?[0] != PROTOCOL_DNSCRYPT {
            return Err(invalid("not a DNSCrypt stamp"));
        }

        let props = reader
            .take(8)
            .and_then(|b| <[u8; 8]>::try_from(b).ok())
            .map(u64::from_le_bytes)
            .ok_or_else(|| invalid("truncated properties"))?;

        let addr = reader
            .length_prefixed()
            .and_then(|b| std::str::from_utf8(b).ok())
            .ok_or_else(|| invalid("bad server address"))?;
        let server_addr = parse_stamp_addr(addr).ok_or_else(|| invalid("bad server address"))?;

        let provider_pk = reader
            .length_prefixed()
            .and_then(|b| <[u8; 32]>::try_from(b).ok())
            .ok_or_else(|| invalid("provider key must be 32 bytes"))?;

        let provider_name = reader
            .length_prefixed()
            .and_then(|b| std::str::from_utf8(b).ok())
            .filter(|name| !name.is_empty())
            .ok_or_else(|| invalid("bad provider name"))?
            .to_string();

        Ok(ServerStamp {
            props,
            server_addr,
            provider_pk,
            provider_name,
        })
    }
}

impl fmt::Display for ServerStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let addr = if self.server_addr.port() == DEFAULT_PORT {
            match self.server_addr.ip() {
                IpAddr::V4(ip) => ip.to_string(),
                IpAddr::V6(ip) => format!("[{}]", ip),
            }
        } else {
            self.server_addr.to_string()
        };

        let mut bytes = vec![PROTOCOL_DNSCRYPT];
        bytes.extend_from_slice(&self.props.to_le_bytes());
        for field in [addr.as_bytes(), &self.provider_pk[..], self.provider_name.as_bytes()] {
            bytes.push(field.len() as u8);
            bytes.extend_from_slice(field);
        }

        write!(f, "{}{}", STAMP_SCHEME, URL_SAFE_NO_PAD.encode(bytes))
    }
}

fn parse_stamp_addr(addr: &str) -> Option<SocketAddr> {
    if let Ok(addr) = addr.parse::<SocketAddr>() {
        return Some(addr);
    }
    addr.trim_start_matches('[')
        .trim_end_matches(']')
        .parse::<IpAddr>()
        .ok()
        .map(|ip| SocketAddr::new(ip, DEFAULT_PORT))
}

struct StampReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> StampReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take(&mut self, len: usize) -> Option<&'a [u8]> {
        let chunk = self.bytes.get(self.pos..self.pos + len)?;
        self.pos += len;
        Some(chunk)
    }

    fn length_prefixed(&mut self) -> Option<&'a [u8]> {
        let len = *self.take(1)?.first()? as usize;
        self.take(len)
    }
}
