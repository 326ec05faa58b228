use chrono::{DateTime, Utc};
use hickory_proto::op::Message;

use crate::services::CacheKey;

/// A cached upstream answer. TTLs are kept exactly as the upstream sent them;
/// readers derive the remaining lifetime from `created_at`.
#[derive(Debug, Clone)]
pub struct CachedResponse {
    pub response: Message,
    pub created_at: DateTime<Utc>,
}

impl CachedResponse {
    pub fn new(response: Message, created_at: DateTime<Utc>) -> Self {
        Self {
            response,
            created_at,
        }
    }
}

/// Bounded store of upstream answers. Expiry is decided by the caller.
pub trait ResponseCache: Send + Sync {
    fn get(&self, key: &CacheKey) -> Option<CachedResponse>;

    /// Replaces any previous entry for `key`.
    fn put(&self, key: CacheKey, entry: CachedResponse);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn capacity(&self) -> usize;
}
