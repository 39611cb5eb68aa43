// hotelcache demo: one cached hotel search through both tiers
use std::sync::Arc;

use hotelcache::cache::{CacheCoordinator, RedisCache, SharedCache, SharedMemoryCache};
use hotelcache::monitoring::{MonitoringConfig, MonitoringContext};
use hotelcache::provider::{HttpTransport, NormalizedHotelRecord, ResilientFetchClient};
use hotelcache::{AppConfig, CacheOptions, FetchError, Params};

#[derive(Debug, thiserror::Error)]
enum SearchError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Provider failed and fallback data was served; kept out of the cache
    #[error("provider degraded ({reason}), {} fallback hotels", .hotels.len())]
    Degraded {
        reason: String,
        hotels: Vec<NormalizedHotelRecord>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::from_env()?;
    config.cache.validate()?;
    let monitoring = MonitoringContext::new(MonitoringConfig::from_env()?)?;

    let l2: Arc<dyn SharedCache> = match (config.cache.redis_enabled, config.cache.redis_url.as_deref()) {
        (true, Some(url)) => Arc::new(RedisCache::new(url).await),
        _ => {
            tracing::info!("Redis disabled; using in-process shared tier");
            Arc::new(SharedMemoryCache::new())
        }
    };

    let coordinator = Arc::new(CacheCoordinator::new(
        config.cache.clone(),
        l2,
        monitoring.metrics.clone(),
    ));
    let _warming = coordinator.start_warming();

    let transport = Arc::new(HttpTransport::new(&config.provider)?);
    let client = Arc::new(ResilientFetchClient::new(
        config.provider.clone(),
        transport,
        monitoring.metrics.clone(),
    ));
    monitoring.startup_complete();

    let keyword = std::env::args().nth(1).unwrap_or_else(|| "東京".to_string());
    let mut params = Params::new();
    params.insert("keyword".to_string(), keyword.as_str().into());
    let key = coordinator.key("hotels:keyword", &params);

    let producer = {
        let client = client.clone();
        let params = params.clone();
        move || {
            let client = client.clone();
            let params = params.clone();
            async move {
                let outcome = client
                    .fetch("KeywordHotelSearch", &params)
                    .await
                    .map_err(SearchError::from)?;
                if let hotelcache::ResultOrigin::Fallback { message, .. } = outcome.origin {
                    return Err(SearchError::Degraded {
                        reason: message,
                        hotels: outcome.hotels,
                    });
                }
                Ok::<_, SearchError>(outcome.hotels)
            }
        }
    };

    let options = CacheOptions::new(config.cache.default_ttl, true)?;
    let hotels = match coordinator.get(&key, producer, options).await {
        Ok(hotels) => hotels,
        Err(SearchError::Degraded { reason, hotels }) => {
            tracing::warn!(%reason, "serving fallback hotels");
            hotels
        }
        Err(e) => return Err(e.into()),
    };

    println!("{}", serde_json::to_string_pretty(&hotels)?);
    println!("{}", serde_json::to_string_pretty(&coordinator.stats())?);
    println!("{}", serde_json::to_string_pretty(&client.get_metrics().await)?);

    Ok(())
}
