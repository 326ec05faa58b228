use crate::ports::{CachedResponse, Clock, ResponseCache, UpstreamClient};
use crate::services::{ttl, CacheKey};
use danse_domain::DomainError;
use hickory_proto::op::Message;
use std::sync::Arc;
use tracing::{debug, info};

/// Per-query control flow: cache lookup, upstream resolution, cache write.
pub struct HandleDnsQueryUseCase {
    upstream: Arc<dyn UpstreamClient>,
    clock: Arc<dyn Clock>,
    cache: Option<Arc<dyn ResponseCache>>,
    log_queries: bool,
}

impl HandleDnsQueryUseCase {
    pub fn new(upstream: Arc<dyn UpstreamClient>, clock: Arc<dyn Clock>) -> Self {
        Self {
            upstream,
            clock,
            cache: None,
            log_queries: false,
        }
    }

    pub fn with_cache(mut self, cache: Arc<dyn ResponseCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_query_logging(mut self, enabled: bool) -> Self {
        self.log_queries = enabled;
        self
    }

    /// Answers `query`, or returns `Ok(None)` when the query carries no question
    /// and must be dropped without a reply.
    ///
    /// The returned message always carries the transaction ID of `query`.
    pub async fn execute(&self, query: &Message) -> Result<Option<Message>, DomainError> {
        let Some(question) = query.queries().first() else {
            debug!(id = query.id(), "Dropping query without question");
            return Ok(None);
        };

        if self.log_queries {
            info!(
                name = %question.name(),
                record_type = %question.query_type(),
                upstream = self.upstream.protocol_name(),
                "Query"
            );
        }

        let Some(cache) = &self.cache else {
            return self.resolve_upstream(query).await.map(Some);
        };

        let key = CacheKey::from_query(question);
        let now = self.clock.now();

        if let Some(entry) = cache.get(&key) {
            if !ttl::is_expired(&entry.response, entry.created_at, now) {
                debug!(key = %key, "Cache hit");
                let mut response = ttl::adjust_ttl(&entry.response, entry.created_at, now);
                response.set_id(query.id());
                return Ok(Some(response));
            }
            debug!(key = %key, "Cache entry expired");
        }

        let response = self.resolve_upstream(query).await?;
        cache.put(
            key,
            CachedResponse::new(response.clone(), self.clock.now()),
        );

        Ok(Some(response))
    }

    async fn resolve_upstream(&self, query: &Message) -> Result<Message, DomainError> {
        let mut response = self.upstream.resolve(query).await?;
        response.set_id(query.id());
        Ok(response)
    }
}
