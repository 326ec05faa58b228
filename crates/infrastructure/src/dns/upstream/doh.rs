//! DNS-over-HTTPS client (RFC 8484)
//!
//! Queries are POSTed as raw wire-format bodies:
//! ```text
//! POST /dns-query HTTP/2
//! Content-Type: application/dns-message
//! Accept: application/dns-message
//!
//! <raw DNS message bytes>
//! ```
//! Servers that refuse POST with `405 Method Not Allowed` are asked again with
//! `GET ?dns=<base64url>` on the same endpoint.

use crate::dns::forwarding::MessageBuilder;
use crate::dns::load_balancer::EndpointSet;
use crate::dns::transport::BootstrapResolver;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use danse_domain::DomainError;
use hickory_proto::op::Message;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::StatusCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const DNS_MESSAGE_CONTENT_TYPE: &str = "application/dns-message";

pub struct DohClient {
    http: reqwest::Client,
    endpoints: EndpointSet<String>,
}

impl DohClient {
    pub fn new(
        urls: Vec<String>,
        timeout: Duration,
        bootstrap: Option<Arc<BootstrapResolver>>,
    ) -> Result<Self, DomainError> {
        let mut builder = reqwest::Client::builder()
            .use_rustls_tls()
            .timeout(timeout)
            .pool_max_idle_per_host(4);
        if let Some(bootstrap) = bootstrap {
            builder = builder.dns_resolver(bootstrap);
        }
        let http = builder
            .build()
            .map_err(|e| DomainError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            endpoints: EndpointSet::new(urls)?,
        })
    }

    pub async fn resolve(&self, query: &Message) -> Result<Message, DomainError> {
        let query_bytes = MessageBuilder::encode(query)?;
        let url = self.endpoints.next();

        debug!(url = %url, message_len = query_bytes.len(), "Sending DoH query");

        let mut response = self.post(url, &query_bytes).await?;
        if response.status() == StatusCode::METHOD_NOT_ALLOWED {
            debug!(url = %url, "DoH server refused POST, retrying with GET");
            response = self.get(url, &query_bytes).await?;
        }

        let status = response.status();
        if status != StatusCode::OK {
            return Err(DomainError::HttpStatus {
                server: url.clone(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(|e| request_error(url, e))?;

        debug!(url = %url, response_len = body.len(), "DoH response received");

        MessageBuilder::decode(&body)
    }

    pub fn endpoint_count(&self) -> usize {
        self.endpoints.len()
    }

    async fn post(&self, url: &str, query_bytes: &[u8]) -> Result<reqwest::Response, DomainError> {
        self.http
            .post(url)
            .header(CONTENT_TYPE, DNS_MESSAGE_CONTENT_TYPE)
            .header(ACCEPT, DNS_MESSAGE_CONTENT_TYPE)
            .body(query_bytes.to_vec())
            .send()
            .await
            .map_err(|e| request_error(url, e))
    }

    async fn get(&self, url: &str, query_bytes: &[u8]) -> Result<reqwest::Response, DomainError> {
        let separator = if url.contains('?') { '&' } else { '?' };
        let get_url = format!("{}{}dns={}", url, separator, URL_SAFE_NO_PAD.encode(query_bytes));

        self.http
            .get(get_url)
            .header(ACCEPT, DNS_MESSAGE_CONTENT_TYPE)
            .send()
            .await
            .map_err(|e| request_error(url, e))
    }
}

fn request_error(url: &str, error: reqwest::Error) -> DomainError {
    if error.is_timeout() {
        DomainError::TransportTimeout {
            server: url.to_string(),
        }
    } else if error.is_connect() {
        DomainError::TransportConnectionRefused {
            server: url.to_string(),
            reason: error.to_string(),
        }
    } else {
        DomainError::TransportIo {
            server: url.to_string(),
            reason: error.to_string(),
        }
    }
}
