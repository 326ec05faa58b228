pub mod cache;
pub mod forwarding;
pub mod load_balancer;
pub mod server;
pub mod transport;
pub mod upstream;

pub use cache::LruResponseCache;
pub use load_balancer::EndpointSet;
pub use server::DnsServerHandler;
pub use transport::resolver::BootstrapResolver;
pub use upstream::{create_upstream_client, Upstream};
