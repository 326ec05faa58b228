use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::sync::Arc;

use crate::errors::DomainError;

pub const DEFAULT_DOT_PORT: u16 = 853;

/// Upstream transport selected once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UpstreamKind {
    #[default]
    #[serde(alias = "https")]
    Doh,
    #[serde(alias = "tls")]
    Dot,
    Dnscrypt,
}

impl UpstreamKind {
    pub fn protocol_name(&self) -> &'static str {
        match self {
            UpstreamKind::Doh => "HTTPS",
            UpstreamKind::Dot => "TLS",
            UpstreamKind::Dnscrypt => "DNSCrypt",
        }
    }
}

impl fmt::Display for UpstreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UpstreamKind::Doh => "doh",
            UpstreamKind::Dot => "dot",
            UpstreamKind::Dnscrypt => "dnscrypt",
        };
        f.write_str(name)
    }
}

impl FromStr for UpstreamKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "doh" | "https" => Ok(UpstreamKind::Doh),
            "dot" | "tls" => Ok(UpstreamKind::Dot),
            "dnscrypt" => Ok(UpstreamKind::Dnscrypt),
            other => Err(DomainError::ConfigError(format!(
                "Unknown resolver type '{}' (expected doh, dot or dnscrypt)",
                other
            ))),
        }
    }
}

/// Represents an upstream server address that may or may not be resolved to an IP.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum UpstreamAddr {
    Resolved(SocketAddr),
    Unresolved { hostname: Arc<str>, port: u16 },
}

impl UpstreamAddr {
    pub fn socket_addr(&self) -> Option<SocketAddr> {
        match self {
            UpstreamAddr::Resolved(addr) => Some(*addr),
            UpstreamAddr::Unresolved { .. } => None,
        }
    }

    pub fn port(&self) -> u16 {
        match self {
            UpstreamAddr::Resolved(addr) => addr.port(),
            UpstreamAddr::Unresolved { port, .. } => *port,
        }
    }

    pub fn hostname_str(&self) -> Option<&str> {
        match self {
            UpstreamAddr::Resolved(_) => None,
            UpstreamAddr::Unresolved { hostname, .. } => Some(hostname),
        }
    }

    pub fn is_unresolved(&self) -> bool {
        matches!(self, UpstreamAddr::Unresolved { .. })
    }
}

impl fmt::Display for UpstreamAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpstreamAddr::Resolved(addr) => write!(f, "{}", addr),
            UpstreamAddr::Unresolved { hostname, port } => write!(f, "{}:{}", hostname, port),
        }
    }
}

/// A DNS-over-TLS server: where to connect and which name its certificate must carry.
///
/// Accepted forms: `tls://host:port`, `host:port`, `host` (port 853), and any of
/// those followed by `#server-name` to override the name checked during the handshake.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DotEndpoint {
    pub addr: UpstreamAddr,
    pub server_name: Arc<str>,
}

impl DotEndpoint {
    pub fn new(addr: UpstreamAddr, server_name: impl Into<Arc<str>>) -> Self {
        Self {
            addr,
            server_name: server_name.into(),
        }
    }

    fn host_label(&self) -> String {
        match &self.addr {
            UpstreamAddr::Resolved(addr) => addr.ip().to_string(),
            UpstreamAddr::Unresolved { hostname, .. } => hostname.to_string(),
        }
    }
}

impl fmt::Display for DotEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host_label() == *self.server_name {
            write!(f, "tls://{}", self.addr)
        } else {
            write!(f, "tls://{}#{}", self.addr, self.server_name)
        }
    }
}

impl FromStr for DotEndpoint {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s.strip_prefix("tls://").unwrap_or(s);
        let (addr_str, explicit_name) = match rest.split_once('#') {
            Some((addr, name)) if !name.is_empty() => (addr, Some(name)),
            Some(_) => {
                return Err(DomainError::InvalidEndpoint(format!(
                    "Empty TLS server name in '{}'",
                    s
                )))
            }
            None => (rest, None),
        };

        let (addr, host) = parse_dot_addr(addr_str)
            .ok_or_else(|| DomainError::InvalidEndpoint(format!("Invalid DoT address '{}'", s)))?;

        Ok(DotEndpoint {
            addr,
            server_name: explicit_name.unwrap_or(&host).into(),
        })
    }
}

fn parse_dot_addr(s: &str) -> Option<(UpstreamAddr, String)> {
    if s.is_empty() {
        return None;
    }
    if let Ok(addr) = s.parse::<SocketAddr>() {
        return Some((UpstreamAddr::Resolved(addr), addr.ip().to_string()));
    }
    if let Ok(ip) = s.trim_start_matches('[').trim_end_matches(']').parse::<IpAddr>() {
        let addr = SocketAddr::new(ip, DEFAULT_DOT_PORT);
        return Some((UpstreamAddr::Resolved(addr), ip.to_string()));
    }
    let (host, port) = match parse_host_port(s) {
        Some(parts) => parts,
        None if !s.contains(':') => (s, DEFAULT_DOT_PORT),
        None => return None,
    };
    if host.is_empty() {
        return None;
    }
    Some((
        UpstreamAddr::Unresolved {
            hostname: host.into(),
            port,
        },
        host.to_string(),
    ))
}

pub fn parse_host_port(s: &str) -> Option<(&str, u16)> {
    if s.starts_with('[') {
        let end = s.find(']')?;
        let host = &s[1..end];
        let rest = &s[end + 1..];
        let port_str = rest.strip_prefix(':')?;
        let port = port_str.parse::<u16>().ok()?;
        Some((host, port))
    } else {
        let (host, port_str) = s.rsplit_once(':')?;
        let port = port_str.parse::<u16>().ok()?;
        Some((host, port))
    }
}
