use danse_application::ports::{ResponseCache, UpstreamClient};
use danse_application::use_cases::HandleDnsQueryUseCase;
use danse_domain::Config;
use danse_infrastructure::dns::{create_upstream_client, LruResponseCache};
use danse_infrastructure::system::SystemClock;
use std::sync::Arc;
use tracing::info;

pub struct DnsServices {
    pub upstream: Arc<dyn UpstreamClient>,
    pub cache: Option<Arc<dyn ResponseCache>>,
    pub handler_use_case: Arc<HandleDnsQueryUseCase>,
}

impl DnsServices {
    pub async fn new(config: &Config) -> anyhow::Result<Self> {
        info!(
            kind = %config.resolver.kind,
            upstreams = config.resolver.urls.len(),
            "Initializing upstream client"
        );

        let upstream: Arc<dyn UpstreamClient> =
            Arc::new(create_upstream_client(&config.resolver).await?);
        let cache = Self::build_cache(config);

        let mut use_case = HandleDnsQueryUseCase::new(upstream.clone(), Arc::new(SystemClock))
            .with_query_logging(config.logging.log_queries);
        if let Some(cache) = &cache {
            use_case = use_case.with_cache(cache.clone());
        }

        Ok(Self {
            upstream,
            cache,
            handler_use_case: Arc::new(use_case),
        })
    }

    fn build_cache(config: &Config) -> Option<Arc<dyn ResponseCache>> {
        if !config.cache.enabled {
            info!("Response cache disabled");
            return None;
        }

        info!(max_items = config.cache.max_items, "Response cache enabled");
        Some(Arc::new(LruResponseCache::new(config.cache.max_items)))
    }
}
