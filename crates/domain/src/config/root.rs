use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

use super::cache::CacheConfig;
use super::errors::ConfigError;
use super::logging::LoggingConfig;
use super::resolver::ResolverConfig;
use super::server::ServerConfig;
use crate::upstream::{DotEndpoint, UpstreamKind};

const LOCAL_CONFIG_PATH: &str = "danse.toml";
const SYSTEM_CONFIG_PATH: &str = "/etc/danse/config.toml";

/// Main configuration structure for danse
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub resolver: ResolverConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from file or use defaults
    ///
    /// Priority order:
    /// 1. Explicitly provided path
    /// 2. danse.toml in current directory
    /// 3. /etc/danse/config.toml
    /// 4. Default configuration
    pub fn load(path: Option<&str>, cli_overrides: CliOverrides) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = path {
            Self::from_file(path)?
        } else if std::path::Path::new(LOCAL_CONFIG_PATH).exists() {
            Self::from_file(LOCAL_CONFIG_PATH)?
        } else if std::path::Path::new(SYSTEM_CONFIG_PATH).exists() {
            Self::from_file(SYSTEM_CONFIG_PATH)?
        } else {
            Self::default()
        };

        config.apply_cli_overrides(cli_overrides);
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::FileRead(path.to_string(), e.to_string()))?;
        Self::from_toml(&contents)
    }

    fn apply_cli_overrides(&mut self, overrides: CliOverrides) {
        if let Some(bind) = overrides.bind_address {
            self.server.bind_address = bind;
        }
        if let Some(level) = overrides.log_level {
            self.logging.level = level;
        }
        if overrides.disable_cache {
            self.cache.enabled = false;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        parse_socket_addr("server.bind_address", &self.server.bind_address)?;
        parse_socket_addr("resolver.bootstrap_address", &self.resolver.bootstrap_address)?;

        if self.resolver.urls.is_empty() {
            return Err(ConfigError::Validation(
                "No upstream servers configured".to_string(),
            ));
        }

        for url in &self.resolver.urls {
            validate_upstream(self.resolver.kind, url)?;
        }

        if self.resolver.query_timeout == 0 {
            return Err(ConfigError::Validation(
                "resolver.query_timeout must be greater than 0".to_string(),
            ));
        }

        if self.cache.enabled && self.cache.max_items == 0 {
            return Err(ConfigError::Validation(
                "cache.max_items must be greater than 0 when the cache is enabled".to_string(),
            ));
        }

        Ok(())
    }
}

fn parse_socket_addr(field: &str, value: &str) -> Result<SocketAddr, ConfigError> {
    value.parse::<SocketAddr>().map_err(|e| {
        ConfigError::Validation(format!("{} '{}' is not a socket address: {}", field, value, e))
    })
}

fn validate_upstream(kind: UpstreamKind, url: &str) -> Result<(), ConfigError> {
    let valid = match kind {
        UpstreamKind::Doh => url.starts_with("https://") || url.starts_with("http://"),
        UpstreamKind::Dot => url.parse::<DotEndpoint>().is_ok(),
        UpstreamKind::Dnscrypt => url.starts_with("sdns://"),
    };

    if valid {
        Ok(())
    } else {
        Err(ConfigError::Validation(format!(
            "'{}' is not a valid {} upstream",
            url, kind
        )))
    }
}

/// Command-line overrides for configuration
#[derive(Debug, Default)]
pub struct CliOverrides {
    pub bind_address: Option<String>,
    pub log_level: Option<String>,
    pub disable_cache: bool,
}
