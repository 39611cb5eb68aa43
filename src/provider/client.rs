// src/provider/client.rs
// Resilient fetch client: response cache, rate limiting, timeout,
// one retry on throttling, and mock fallback on failure

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, info, warn};

use super::classifier::HotelClassifier;
use super::fallback;
use super::normalize::Normalizer;
use super::rate_limiter::RateLimiter;
use super::response_cache::ResponseCache;
use super::transport::{ProviderTransport, TransportError, TransportResponse};
use super::{ExternalRequestContext, FetchOutcome, ResultOrigin};
use crate::cache::key::{KeyBuilder, Params};
use crate::config::ProviderConfig;
use crate::error::FetchError;
use crate::monitoring::metrics::{MetricsRecorder, MetricsSnapshot};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderMetrics {
    #[serde(flatten)]
    pub counters: MetricsSnapshot,
    pub response_cache_entries: usize,
}

pub struct ResilientFetchClient {
    transport: Arc<dyn ProviderTransport>,
    limiter: Arc<RateLimiter>,
    responses: ResponseCache,
    normalizer: Normalizer,
    metrics: Arc<MetricsRecorder>,
    keys: KeyBuilder,
    config: ProviderConfig,
}

impl ResilientFetchClient {
    pub fn new(
        config: ProviderConfig,
        transport: Arc<dyn ProviderTransport>,
        metrics: Arc<MetricsRecorder>,
    ) -> Self {
        Self {
            limiter: Arc::new(RateLimiter::new(config.min_interval)),
            responses: ResponseCache::new(config.response_ttl),
            normalizer: Normalizer::default(),
            keys: KeyBuilder::default(),
            transport,
            metrics,
            config,
        }
    }

    /// Share one limiter between clients that talk to the same provider.
    pub fn with_rate_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.limiter = limiter;
        self
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn HotelClassifier>) -> Self {
        self.normalizer = Normalizer::new(classifier);
        self
    }

    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Fetch hotels from `endpoint`.
    ///
    /// Provider failures never surface as errors: they are logged, counted,
    /// and answered with the built-in dataset marked as
    /// [`ResultOrigin::Fallback`]. Only an unknown endpoint or missing
    /// required parameter returns `Err`.
    pub async fn fetch(&self, endpoint: &str, params: &Params) -> Result<FetchOutcome, FetchError> {
        let request = ExternalRequestContext::new(endpoint, params)?;
        let key = self
            .keys
            .build(&format!("provider:{}", request.endpoint.as_str()), &request.params);

        if let Some(hotels) = self.responses.get(&key).await {
            debug!(endpoint = %request.endpoint, "provider response cache hit");
            return Ok(FetchOutcome {
                hotels,
                origin: ResultOrigin::Cached,
            });
        }

        let metrics = self.metrics.provider();
        metrics.record_request();

        let mut retried = false;
        let failure = loop {
            self.limiter.await_turn().await;
            let started = Instant::now();

            match self.attempt(&request).await {
                Ok(payload) => {
                    metrics.observe_response_time(started.elapsed());
                    let hotels = self.normalizer.normalize(&payload);
                    self.responses.set(key, hotels.clone()).await;
                    return Ok(FetchOutcome {
                        hotels,
                        origin: ResultOrigin::Live,
                    });
                }
                Err(FetchError::Throttled(msg)) if !retried => {
                    retried = true;
                    info!(
                        endpoint = %request.endpoint,
                        backoff_ms = self.config.throttle_backoff.as_millis() as u64,
                        "provider throttled, retrying once: {}", msg
                    );
                    sleep(self.config.throttle_backoff).await;
                }
                Err(FetchError::Throttled(msg)) => {
                    break FetchError::UpstreamError(format!("still throttled after retry: {}", msg));
                }
                Err(e) => break e,
            }
        };

        metrics.record_error();
        warn!(
            endpoint = %request.endpoint,
            kind = failure.kind(),
            "provider unavailable, serving fallback data: {}", failure
        );

        Ok(FetchOutcome {
            hotels: fallback::mock_hotels(&self.normalizer),
            origin: ResultOrigin::Fallback {
                kind: failure.kind().to_string(),
                message: failure.to_string(),
            },
        })
    }

    async fn attempt(&self, request: &ExternalRequestContext) -> Result<Value, FetchError> {
        let timeout_ms = self.config.timeout.as_millis() as u64;
        match timeout(self.config.timeout, self.transport.send(request)).await {
            Err(_) => Err(FetchError::ApiTimeout(timeout_ms)),
            Ok(Err(TransportError::Timeout)) => Err(FetchError::ApiTimeout(timeout_ms)),
            Ok(Err(e)) => Err(FetchError::UpstreamError(e.to_string())),
            Ok(Ok(response)) => classify(response),
        }
    }

    /// Counters plus the number of live response-cache entries. Expired
    /// entries are pruned first so the count never includes them.
    pub async fn get_metrics(&self) -> ProviderMetrics {
        self.responses.cleanup_expired().await;
        ProviderMetrics {
            counters: self.metrics.provider().snapshot(),
            response_cache_entries: self.responses.size().await,
        }
    }

    pub fn reset_metrics(&self) {
        self.metrics.provider().reset();
    }

    pub async fn clear_response_cache(&self) {
        self.responses.clear().await;
    }

    pub async fn cleanup_response_cache(&self) -> usize {
        self.responses.cleanup_expired().await
    }
}

/// Map a provider reply to a payload or a classified failure.
///
/// Besides HTTP status, the provider reports some conditions through an
/// `error` field in the body, and answers "no hotels matched" with 404.
pub fn classify(response: TransportResponse) -> Result<Value, FetchError> {
    let code = response.body.get("error").and_then(Value::as_str).unwrap_or("");
    let description = response
        .body
        .get("error_description")
        .and_then(Value::as_str)
        .unwrap_or(code);

    if response.status == 404 && code == "not_found" {
        return Ok(json!({ "hotels": [] }));
    }
    if matches!(response.status, 401 | 403)
        || code == "unauthorized"
        || code == "invalid_client"
        || (code == "wrong_parameter" && description.contains("applicationId"))
    {
        return Err(FetchError::AuthError(description.to_string()));
    }
    if response.status == 429 || code == "too_many_requests" {
        return Err(FetchError::Throttled(description.to_string()));
    }
    if !response.is_success() {
        let detail = match &response.body {
            Value::String(s) => s.clone(),
            _ => description.to_string(),
        };
        return Err(FetchError::UpstreamError(format!("HTTP {}: {}", response.status, detail)));
    }
    if !code.is_empty() {
        return Err(FetchError::UpstreamError(description.to_string()));
    }
    if !response.body.is_object() {
        return Err(FetchError::UpstreamError("unexpected payload shape".to_string()));
    }
    Ok(response.body)
}
