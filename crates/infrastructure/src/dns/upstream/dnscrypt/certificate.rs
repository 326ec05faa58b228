//! Resolver certificates published as TXT records under the provider name.

use danse_domain::DomainError;
use ring::signature::{UnparsedPublicKey, ED25519};

pub const CERT_MAGIC: [u8; 4] = *b"DNSC";
pub const CERT_LEN: usize = 124;
const SIGNATURE_RANGE: std::ops::Range<usize> = 8..72;
const SIGNED_OFFSET: usize = 72;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EsVersion {
    XSalsa20Poly1305,
    XChaCha20Poly1305,
}

impl EsVersion {
    pub fn from_wire(value: u16) -> Option<Self> {
        match value {
            1 => Some(Self::XSalsa20Poly1305),
            2 => Some(Self::XChaCha20Poly1305),
            _ => None,
        }
    }

    pub fn to_wire(self) -> u16 {
        match self {
            Self::XSalsa20Poly1305 => 1,
            Self::XChaCha20Poly1305 => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    pub es_version: EsVersion,
    pub resolver_pk: [u8; 32],
    pub client_magic: [u8; 8],
    pub serial: u32,
    pub ts_start: u32,
    pub ts_end: u32,
}

impl Certificate {
    /// Parses a certificate and checks its signature against the provider key.
    pub fn parse(bytes: &[u8], provider_pk: &[u8; 32]) -> Result<Self, DomainError> {
        if bytes.len() < CERT_LEN {
            return Err(DomainError::DnscryptProtocol(format!(
                "Certificate too short: {} bytes",
                bytes.len()
            )));
        }
        if bytes[..4] != CERT_MAGIC {
            return Err(DomainError::DnscryptProtocol("Bad certificate magic".into()));
        }

        let es_version = EsVersion::from_wire(u16::from_be_bytes([bytes[4], bytes[5]])).ok_or_else(|| {
            DomainError::DnscryptProtocol(format!(
                "Unsupported encryption system {}",
                u16::from_be_bytes([bytes[4], bytes[5]])
            ))
        })?;

        UnparsedPublicKey::new(&ED25519, provider_pk)
            .verify(&bytes[SIGNED_OFFSET..], &bytes[SIGNATURE_RANGE])
            .map_err(|_| DomainError::DnscryptProtocol("Certificate signature mismatch".into()))?;

        let mut resolver_pk = [0u8; 32];
        resolver_pk.copy_from_slice(&bytes[72..104]);
        let mut client_magic = [0u8; 8];
        client_magic.copy_from_slice(&bytes[104..112]);

        Ok(Certificate {
            es_version,
            resolver_pk,
            client_magic,
            serial: read_u32(bytes, 112),
            ts_start: read_u32(bytes, 116),
            ts_end: read_u32(bytes, 120),
        })
    }

    /// The bytes covered by the provider signature.
    pub fn signed_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(CERT_LEN - SIGNED_OFFSET);
        out.extend_from_slice(&self.resolver_pk);
        out.extend_from_slice(&self.client_magic);
        out.extend_from_slice(&self.serial.to_be_bytes());
        out.extend_from_slice(&self.ts_start.to_be_bytes());
        out.extend_from_slice(&self.ts_end.to_be_bytes());
        out
    }

    /// Serializes with the given provider signature.
    pub fn to_bytes(&self, signature: &[u8; 64]) -> Vec<u8> {
        let mut out = Vec::with_capacity(CERT_LEN);
        out.extend_from_slice(&CERT_MAGIC);
        out.extend_from_slice(&self.es_version.to_wire().to_be_bytes());
        out.extend_from_slice(&0u16.to_be_bytes());
        out.extend_from_slice(signature);
        out.extend_from_slice(&self.signed_bytes());
        out
    }

    pub fn is_valid_at(&self, unix_secs: u32) -> bool {
        self.ts_start <= unix_secs && unix_secs <= self.ts_end
    }
}

/// Picks the newest valid certificate, preferring XChaCha20 on equal serials.
pub fn select_certificate(certificates: Vec<Certificate>, unix_secs: u32) -> Option<Certificate> {
    certificates
        .into_iter()
        .filter(|cert| cert.is_valid_at(unix_secs))
        .max_by_key(|cert| (cert.serial, cert.es_version == EsVersion::XChaCha20Poly1305))
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes([bytes[offset], bytes[offset + 1], bytes[offset + 2], bytes[offset + 3]])
}
