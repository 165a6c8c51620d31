use std::time::Duration;

use chrono::NaiveDate;
use serde_json::Value;

use super::catalog::{
    BucketQuery, BucketSource, OCCUPANCY_DATE_COLUMN, PROPERTY_COLUMN, ROOM_INVENTORY_COLUMN,
    ROOM_INVENTORY_TABLE, SCD_VALID_FROM_COLUMN, SCD_VALID_TO_COLUMN,
};
use crate::{
    config::AppConfig,
    error::{AppError, AppResult},
    services::reconcile::metric_value,
};

/// Thin client for the ClickHouse HTTP interface.
#[derive(Debug, Clone)]
pub struct ClickHouseClient {
    http_client: reqwest::Client,
    url: String,
    user: String,
    password: Option<String>,
    database: String,
    timeout: Duration,
}

impl ClickHouseClient {
    pub fn new(http_client: reqwest::Client, config: &AppConfig) -> AppResult<Self> {
        let database = validate_identifier(&config.clickhouse_database)?.to_string();
        Ok(Self {
            http_client,
            url: config.clickhouse_host.trim_end_matches('/').to_string(),
            user: config.clickhouse_user.clone(),
            password: config.clickhouse_password.clone(),
            database,
            timeout: Duration::from_secs(config.clickhouse_timeout_seconds),
        })
    }

    pub async fn ping(&self) -> bool {
        let response = self
            .http_client
            .get(format!("{}/ping", self.url))
            .timeout(self.timeout)
            .send()
            .await;
        match response {
            Ok(response) => response.status().is_success(),
            Err(error) => {
                tracing::warn!(error = %error, "ClickHouse ping failed");
                false
            }
        }
    }

    pub async fn query_rows(&self, sql: &str) -> AppResult<Vec<Value>> {
        let response = self
            .http_client
            .post(&self.url)
            .basic_auth(&self.user, self.password.as_deref())
            .query(&[("default_format", "JSONEachRow")])
            .timeout(self.timeout)
            .body(sql.to_string())
            .send()
            .await
            .map_err(|error| AppError::Dependency(format!("ClickHouse request failed: {error}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| AppError::Dependency(format!("ClickHouse response failed: {error}")))?;
        if !status.is_success() {
            return Err(AppError::Dependency(format!(
                "ClickHouse returned {status}: {}",
                body.trim()
            )));
        }

        parse_json_each_row(&body)
    }

    pub async fn fetch_bucket_rows(&self, query: &BucketQuery<'_>) -> AppResult<Vec<Value>> {
        if query.window.is_empty() {
            return Ok(Vec::new());
        }
        let sql = bucket_sql(&self.database, query);
        tracing::debug!(metric = query.metric.key, sql = %sql, "ClickHouse bucket query");
        self.query_rows(&sql).await
    }

    pub async fn fetch_available_rooms(
        &self,
        business_date: NaiveDate,
        property: Option<&str>,
    ) -> AppResult<f64> {
        let sql = available_rooms_sql(&self.database, business_date, property);
        let rows = self.query_rows(&sql).await?;
        Ok(rows
            .first()
            .map(|row| metric_value(row.get("available_rooms")))
            .unwrap_or(0.0))
    }
}

pub fn bucket_sql(database: &str, query: &BucketQuery<'_>) -> String {
    let primary_key = query
        .dimension
        .column()
        .map(|column| format!("toString({column})"))
        .unwrap_or_else(|| "''".to_string());
    let sub_key = match query.metric.bucket {
        BucketSource::Column(column) => format!("toString({column})"),
        BucketSource::WeekdayOf(column) => format!("toDayOfWeek({column})"),
        BucketSource::DateOf(column) => format!("toString(toDate({column}))"),
        BucketSource::MonthOf(column) => format!("formatDateTime(toDate({column}), '%Y-%m')"),
    };

    let mut sql = format!(
        "SELECT {primary_key} AS primary_key, {sub_key} AS sub_key, SUM({value}) AS value \
         FROM {database}.{table} \
         WHERE toDate({OCCUPANCY_DATE_COLUMN}) BETWEEN '{start}' AND '{end}' \
         AND {scd}",
        value = query.metric.value_column,
        table = query.metric.table,
        start = query.window.start,
        end = query.window.end,
        scd = scd_clause(query.business_date),
    );
    push_property_filter(&mut sql, query.property);
    sql.push_str(" GROUP BY primary_key, sub_key ORDER BY primary_key, sub_key");
    sql
}

pub fn available_rooms_sql(
    database: &str,
    business_date: NaiveDate,
    property: Option<&str>,
) -> String {
    let mut sql = format!(
        "SELECT SUM({ROOM_INVENTORY_COLUMN}) AS available_rooms \
         FROM {database}.{ROOM_INVENTORY_TABLE} WHERE {}",
        scd_clause(business_date)
    );
    push_property_filter(&mut sql, property);
    sql
}

fn scd_clause(business_date: NaiveDate) -> String {
    format!(
        "date({SCD_VALID_FROM_COLUMN}) <= DATE('{business_date}') \
         AND DATE('{business_date}') < date({SCD_VALID_TO_COLUMN})"
    )
}

fn push_property_filter(sql: &mut String, property: Option<&str>) {
    if let Some(property) = property.map(str::trim).filter(|value| !value.is_empty()) {
        sql.push_str(&format!(" AND {PROPERTY_COLUMN} = {}", quote_literal(property)));
    }
}

fn quote_literal(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('\'', "\\'");
    format!("'{escaped}'")
}

fn parse_json_each_row(body: &str) -> AppResult<Vec<Value>> {
    body.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            serde_json::from_str::<Value>(line).map_err(|error| {
                AppError::Dependency(format!("ClickHouse returned malformed JSON: {error}"))
            })
        })
        .collect()
}

fn validate_identifier(value: &str) -> AppResult<&str> {
    let trimmed = value.trim();
    let valid = !trimmed.is_empty()
        && trimmed
            .chars()
            .all(|character| character.is_ascii_alphanumeric() || character == '_');
    if !valid {
        return Err(AppError::Internal(format!(
            "Invalid ClickHouse identifier: {value}"
        )));
    }
    Ok(trimmed)
}
