mod clock;
mod response_cache;
mod upstream_client;

pub use clock::Clock;
pub use response_cache::{CachedResponse, ResponseCache};
pub use upstream_client::UpstreamClient;
