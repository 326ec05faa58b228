mod cache_key;
pub mod ttl;

pub use cache_key::CacheKey;
