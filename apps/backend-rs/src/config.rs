use std::env;

use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportSourceKind {
    ClickHouse,
    Snapshots,
}

impl ReportSourceKind {
    fn from_env(value: Option<String>) -> Self {
        match value
            .as_deref()
            .map(str::trim)
            .unwrap_or_default()
            .to_ascii_lowercase()
            .as_str()
        {
            "snapshots" | "csv" => Self::Snapshots,
            _ => Self::ClickHouse,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ClickHouse => "clickhouse",
            Self::Snapshots => "snapshots",
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub app_name: String,
    pub environment: String,
    pub api_prefix: String,
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
    pub rate_limit_enabled: bool,
    pub rate_limit_per_second: u64,
    pub rate_limit_burst_size: u32,
    pub request_timeout_seconds: u64,
    pub report_source: ReportSourceKind,
    pub clickhouse_host: String,
    pub clickhouse_user: String,
    pub clickhouse_password: Option<String>,
    pub clickhouse_database: String,
    pub clickhouse_timeout_seconds: u64,
    pub snapshot_dir: String,
    pub hotel_timezone: String,
    pub report_response_cache_ttl_seconds: u64,
    pub report_response_cache_max_entries: u64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            app_name: env_or("APP_NAME", "Hotel Insights API"),
            environment: env_or("ENVIRONMENT", "development"),
            api_prefix: normalize_prefix(&env_or("API_PREFIX", "/v1")),
            host: env_or("HOST", "0.0.0.0"),
            port: env_parse_or("PORT", 8000),
            cors_origins: parse_csv(&env_or("CORS_ORIGINS", "http://localhost:3000")),
            rate_limit_enabled: env_parse_bool_or("RATE_LIMIT_ENABLED", true),
            rate_limit_per_second: env_parse_or("RATE_LIMIT_PER_SECOND", 10),
            rate_limit_burst_size: env_parse_or("RATE_LIMIT_BURST_SIZE", 100),
            request_timeout_seconds: env_parse_or("REQUEST_TIMEOUT_SECONDS", 30),
            report_source: ReportSourceKind::from_env(env_opt("REPORT_SOURCE")),
            clickhouse_host: env_or("CLICKHOUSE_HOST", "http://localhost:8123"),
            clickhouse_user: env_or("CLICKHOUSE_USER", "default"),
            clickhouse_password: env_opt("CLICKHOUSE_PASSWORD"),
            clickhouse_database: env_or("CLICKHOUSE_DATABASE", "SAND01CN"),
            clickhouse_timeout_seconds: env_parse_or("CLICKHOUSE_TIMEOUT_SECONDS", 15),
            snapshot_dir: env_or("SNAPSHOT_DIR", "./data"),
            hotel_timezone: env_or("HOTEL_TIMEZONE", "UTC"),
            report_response_cache_ttl_seconds: env_parse_or(
                "REPORT_RESPONSE_CACHE_TTL_SECONDS",
                20,
            ),
            report_response_cache_max_entries: env_parse_or(
                "REPORT_RESPONSE_CACHE_MAX_ENTRIES",
                2000,
            ),
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment.trim().eq_ignore_ascii_case("production")
    }

    /// Default business date: today on the hotel's wall clock.
    pub fn hotel_today(&self) -> NaiveDate {
        let now = Utc::now();
        match self.hotel_timezone.trim().parse::<Tz>() {
            Ok(timezone) => now.with_timezone(&timezone).date_naive(),
            Err(_) => {
                tracing::warn!(
                    timezone = %self.hotel_timezone,
                    "Unknown HOTEL_TIMEZONE, using UTC"
                );
                now.date_naive()
            }
        }
    }
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn env_or(key: &str, default: &str) -> String {
    env_opt(key).unwrap_or_else(|| default.to_string())
}

fn env_parse_or<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    env_opt(key)
        .and_then(|raw| raw.parse::<T>().ok())
        .unwrap_or(default)
}

fn env_parse_bool_or(key: &str, default: bool) -> bool {
    match env_opt(key).as_deref().map(str::to_ascii_lowercase) {
        Some(value) if value == "1" || value == "true" || value == "yes" || value == "on" => true,
        Some(value) if value == "0" || value == "false" || value == "no" || value == "off" => false,
        Some(_) => default,
        None => default,
    }
}

fn parse_csv(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

fn normalize_prefix(raw: &str) -> String {
    let mut prefix = raw.trim().to_string();
    if prefix.is_empty() {
        return "/v1".to_string();
    }
    if !prefix.starts_with('/') {
        prefix.insert(0, '/');
    }
    while prefix.ends_with('/') && prefix.len() > 1 {
        prefix.pop();
    }
    prefix
}

#[cfg(test)]
pub(crate) fn test_config() -> AppConfig {
    AppConfig {
        app_name: "Hotel Insights API".to_string(),
        environment: "test".to_string(),
        api_prefix: "/v1".to_string(),
        host: "127.0.0.1".to_string(),
        port: 8000,
        cors_origins: vec!["*".to_string()],
        rate_limit_enabled: false,
        rate_limit_per_second: 10,
        rate_limit_burst_size: 100,
        request_timeout_seconds: 30,
        report_source: ReportSourceKind::Snapshots,
        clickhouse_host: "http://localhost:8123".to_string(),
        clickhouse_user: "default".to_string(),
        clickhouse_password: None,
        clickhouse_database: "SAND01CN".to_string(),
        clickhouse_timeout_seconds: 15,
        snapshot_dir: "./data".to_string(),
        hotel_timezone: "Europe/Madrid".to_string(),
        report_response_cache_ttl_seconds: 20,
        report_response_cache_max_entries: 100,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_prefix() {
        assert_eq!(normalize_prefix("v1"), "/v1");
        assert_eq!(normalize_prefix("/v1/"), "/v1");
        assert_eq!(normalize_prefix(""), "/v1");
    }

    #[test]
    fn parses_report_source() {
        assert_eq!(
            ReportSourceKind::from_env(Some(" Snapshots ".to_string())),
            ReportSourceKind::Snapshots
        );
        assert_eq!(ReportSourceKind::from_env(None), ReportSourceKind::ClickHouse);
        assert_eq!(ReportSourceKind::Snapshots.as_str(), "snapshots");
    }

    #[test]
    fn splits_csv_values() {
        assert_eq!(
            parse_csv("http://a.test, ,http://b.test"),
            vec!["http://a.test".to_string(), "http://b.test".to_string()]
        );
    }

    #[test]
    fn unknown_timezone_falls_back_to_utc() {
        let mut config = test_config();
        config.hotel_timezone = "Mars/Olympus".to_string();
        assert_eq!(config.hotel_today(), Utc::now().date_naive());
    }
}
