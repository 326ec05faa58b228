//! danse domain layer
pub mod config;
pub mod errors;
pub mod upstream;

pub use config::{
    CacheConfig, CliOverrides, Config, ConfigError, DnscryptNet, DotMode, LoggingConfig,
    ResolverConfig, ServerConfig,
};
pub use errors::DomainError;
pub use upstream::{DotEndpoint, UpstreamAddr, UpstreamKind};
