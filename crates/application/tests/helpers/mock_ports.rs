use super::messages::a_response;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use danse_application::ports::{CachedResponse, Clock, ResponseCache, UpstreamClient};
use danse_application::services::CacheKey;
use danse_domain::DomainError;
use hickory_proto::op::Message;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Upstream answering every question with A records carrying the configured TTLs.
/// Replies use a different transaction ID than the query, like a real upstream leg might.
pub struct MockUpstreamClient {
    ttls: Mutex<Vec<u32>>,
    error: Mutex<Option<DomainError>>,
    calls: AtomicUsize,
}

impl MockUpstreamClient {
    pub fn new(ttls: &[u32]) -> Self {
        Self {
            ttls: Mutex::new(ttls.to_vec()),
            error: Mutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn set_ttls(&self, ttls: &[u32]) {
        *self.ttls.lock().unwrap() = ttls.to_vec();
    }

    pub fn set_error(&self, error: Option<DomainError>) {
        *self.error.lock().unwrap() = error;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UpstreamClient for MockUpstreamClient {
    async fn resolve(&self, query: &Message) -> Result<Message, DomainError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.error.lock().unwrap().clone() {
            return Err(error);
        }
        let ttls = self.ttls.lock().unwrap().clone();
        Ok(a_response(query, query.id().wrapping_add(7), &ttls))
    }

    fn protocol_name(&self) -> &'static str {
        "MOCK"
    }
}

pub struct MockClock {
    now: Mutex<DateTime<Utc>>,
}

impl MockClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += chrono::Duration::from_std(by).unwrap();
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

#[derive(Default)]
pub struct InMemoryResponseCache {
    entries: Mutex<HashMap<CacheKey, CachedResponse>>,
}

impl InMemoryResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn peek(&self, key: &CacheKey) -> Option<CachedResponse> {
        self.entries.lock().unwrap().get(key).cloned()
    }
}

impl ResponseCache for InMemoryResponseCache {
    fn get(&self, key: &CacheKey) -> Option<CachedResponse> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    fn put(&self, key: CacheKey, entry: CachedResponse) {
        self.entries.lock().unwrap().insert(key, entry);
    }

    fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    fn capacity(&self) -> usize {
        usize::MAX
    }
}
