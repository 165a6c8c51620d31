pub mod catalog;
pub mod clickhouse;
pub mod snapshots;

use chrono::NaiveDate;
use serde_json::Value;

use crate::{
    config::{AppConfig, ReportSourceKind},
    error::AppResult,
};
use catalog::BucketQuery;
use clickhouse::ClickHouseClient;
use snapshots::SnapshotStore;

/// Where report rows come from.
#[derive(Debug, Clone)]
pub enum ReportSource {
    ClickHouse(ClickHouseClient),
    Snapshots(SnapshotStore),
}

impl ReportSource {
    pub fn from_config(config: &AppConfig, http_client: reqwest::Client) -> AppResult<Self> {
        match config.report_source {
            ReportSourceKind::ClickHouse => Ok(Self::ClickHouse(ClickHouseClient::new(
                http_client,
                config,
            )?)),
            ReportSourceKind::Snapshots => {
                Ok(Self::Snapshots(SnapshotStore::new(&config.snapshot_dir)))
            }
        }
    }

    pub fn kind(&self) -> ReportSourceKind {
        match self {
            Self::ClickHouse(_) => ReportSourceKind::ClickHouse,
            Self::Snapshots(_) => ReportSourceKind::Snapshots,
        }
    }

    /// Rows shaped `{primary_key, sub_key, value}`.
    pub async fn fetch_bucket_rows(&self, query: &BucketQuery<'_>) -> AppResult<Vec<Value>> {
        match self {
            Self::ClickHouse(client) => client.fetch_bucket_rows(query).await,
            Self::Snapshots(store) => store.fetch_bucket_rows(query).await,
        }
    }

    pub async fn fetch_available_rooms(
        &self,
        business_date: NaiveDate,
        property: Option<&str>,
    ) -> AppResult<f64> {
        match self {
            Self::ClickHouse(client) => client.fetch_available_rooms(business_date, property).await,
            Self::Snapshots(store) => store.fetch_available_rooms(business_date, property).await,
        }
    }

    pub async fn ping(&self) -> bool {
        match self {
            Self::ClickHouse(client) => client.ping().await,
            Self::Snapshots(store) => store.is_available(),
        }
    }
}
