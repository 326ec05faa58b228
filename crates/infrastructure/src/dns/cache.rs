mod lru_store;

pub use lru_store::LruResponseCache;
