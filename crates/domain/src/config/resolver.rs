use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::upstream::UpstreamKind;

/// How DNS-over-TLS upstreams are driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DotMode {
    /// One persistent connection per endpoint, one exchange at a time.
    #[default]
    Pool,
    /// A single shared connection carrying many in-flight queries.
    Multiplexed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DnscryptNet {
    #[default]
    Udp,
    Tcp,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResolverConfig {
    #[serde(rename = "type", default)]
    pub kind: UpstreamKind,

    /// DoH URLs, DoT addresses or DNSCrypt stamps, depending on `type`.
    #[serde(default = "default_urls")]
    pub urls: Vec<String>,

    /// Plain DNS server used only to resolve upstream hostnames.
    #[serde(default = "default_bootstrap_address")]
    pub bootstrap_address: String,

    #[serde(default)]
    pub dot_mode: DotMode,

    #[serde(default)]
    pub dnscrypt_net: DnscryptNet,

    /// Per-attempt timeout in milliseconds.
    #[serde(default = "default_query_timeout")]
    pub query_timeout: u64,
}

impl ResolverConfig {
    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout)
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            kind: UpstreamKind::default(),
            urls: default_urls(),
            bootstrap_address: default_bootstrap_address(),
            dot_mode: DotMode::default(),
            dnscrypt_net: DnscryptNet::default(),
            query_timeout: default_query_timeout(),
        }
    }
}

fn default_urls() -> Vec<String> {
    vec!["https://dns.quad9.net/dns-query".to_string()]
}

fn default_bootstrap_address() -> String {
    "9.9.9.9:53".to_string()
}

fn default_query_timeout() -> u64 {
    10_000
}
