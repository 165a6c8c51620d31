use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use serde_json::Value;

use crate::{
    config::AppConfig,
    error::{AppError, AppResult},
    repository::ReportSource,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub source: Arc<ReportSource>,
    /// Rendered report bodies keyed by endpoint + resolved parameters.
    pub report_cache: Cache<String, Value>,
}

impl AppState {
    pub fn build(config: AppConfig) -> AppResult<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(config.app_name.clone())
            .build()
            .map_err(|error| AppError::Internal(format!("HTTP client setup failed: {error}")))?;
        let source = ReportSource::from_config(&config, http_client)?;
        Ok(Self::with_source(config, source))
    }

    pub fn with_source(config: AppConfig, source: ReportSource) -> Self {
        let report_cache = Cache::builder()
            .max_capacity(config.report_response_cache_max_entries)
            .time_to_live(Duration::from_secs(
                config.report_response_cache_ttl_seconds.max(1),
            ))
            .build();

        tracing::info!(
            source = source.kind().as_str(),
            cache_ttl_seconds = config.report_response_cache_ttl_seconds,
            "Report source configured"
        );

        Self {
            config: Arc::new(config),
            source: Arc::new(source),
            report_cache,
        }
    }
}
