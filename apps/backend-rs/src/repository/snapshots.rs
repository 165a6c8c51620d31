use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use chrono::{Datelike, NaiveDate};
use csv::ReaderBuilder;
use serde_json::{json, Value};

use super::catalog::{
    BucketQuery, BucketSource, OCCUPANCY_DATE_COLUMN, PROPERTY_COLUMN, ROOM_INVENTORY_COLUMN,
    ROOM_INVENTORY_TABLE, SCD_VALID_FROM_COLUMN, SCD_VALID_TO_COLUMN,
};
use crate::error::{AppError, AppResult};

pub type SnapshotRecord = HashMap<String, String>;

/// CSV exports of the analytical tables, one `<table>.csv` per table.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn is_available(&self) -> bool {
        self.dir.is_dir()
    }

    pub async fn load_table(&self, table: &str) -> AppResult<Vec<SnapshotRecord>> {
        if !self.is_available() {
            return Err(AppError::ServiceUnavailable(format!(
                "Snapshot directory {} is not available.",
                self.dir.display()
            )));
        }
        let path = self.dir.join(format!("{table}.csv"));
        tokio::task::spawn_blocking(move || read_records(&path))
            .await
            .map_err(|error| AppError::Internal(format!("Snapshot reader failed: {error}")))?
    }

    pub async fn fetch_bucket_rows(&self, query: &BucketQuery<'_>) -> AppResult<Vec<Value>> {
        if query.window.is_empty() {
            return Ok(Vec::new());
        }
        let records = self.load_table(query.metric.table).await?;
        Ok(evaluate_bucket_query(&records, query))
    }

    pub async fn fetch_available_rooms(
        &self,
        business_date: NaiveDate,
        property: Option<&str>,
    ) -> AppResult<f64> {
        let records = self.load_table(ROOM_INVENTORY_TABLE).await?;
        Ok(records
            .iter()
            .filter(|record| scd_valid(record, business_date))
            .filter(|record| property_matches(record, property))
            .map(|record| number_field(record, ROOM_INVENTORY_COLUMN))
            .sum())
    }
}

fn read_records(path: &Path) -> AppResult<Vec<SnapshotRecord>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|error| {
            AppError::Dependency(format!(
                "Snapshot {} could not be opened: {error}",
                path.display()
            ))
        })?;

    let mut records = Vec::new();
    let mut skipped = 0_usize;
    for record in reader.deserialize::<SnapshotRecord>() {
        match record {
            Ok(record) => records.push(record),
            Err(_) => skipped += 1,
        }
    }
    if skipped > 0 {
        tracing::warn!(path = %path.display(), skipped, "Skipped malformed snapshot rows");
    }
    Ok(records)
}

/// In-memory equivalent of the analytical-store bucket query: window and SCD
/// filter, then `SUM(value)` grouped by primary key and sub-key.
pub fn evaluate_bucket_query(records: &[SnapshotRecord], query: &BucketQuery<'_>) -> Vec<Value> {
    let mut groups: BTreeMap<(String, String), f64> = BTreeMap::new();

    for record in records {
        let Some(occupancy_date) = date_field(record, OCCUPANCY_DATE_COLUMN) else {
            continue;
        };
        if !query.window.contains(occupancy_date)
            || !scd_valid(record, query.business_date)
            || !property_matches(record, query.property)
        {
            continue;
        }

        let primary_key = query
            .dimension
            .column()
            .map(|column| text_field(record, column))
            .unwrap_or_default();
        let sub_key = match query.metric.bucket {
            BucketSource::Column(column) => text_field(record, column),
            BucketSource::WeekdayOf(column) => match date_field(record, column) {
                Some(date) => date.weekday().number_from_monday().to_string(),
                None => continue,
            },
            BucketSource::DateOf(column) => match date_field(record, column) {
                Some(date) => date.to_string(),
                None => continue,
            },
            BucketSource::MonthOf(column) => match date_field(record, column) {
                Some(date) => date.format("%Y-%m").to_string(),
                None => continue,
            },
        };

        *groups.entry((primary_key, sub_key)).or_insert(0.0) +=
            number_field(record, query.metric.value_column);
    }

    groups
        .into_iter()
        .map(|((primary_key, sub_key), value)| {
            json!({
                "primary_key": primary_key,
                "sub_key": sub_key,
                "value": value,
            })
        })
        .collect()
}

/// `scd_valid_from <= business_date < scd_valid_to`; a blank end is open.
fn scd_valid(record: &SnapshotRecord, business_date: NaiveDate) -> bool {
    let Some(valid_from) = date_field(record, SCD_VALID_FROM_COLUMN) else {
        return false;
    };
    let valid_to = date_field(record, SCD_VALID_TO_COLUMN);
    valid_from <= business_date && valid_to.map_or(true, |valid_to| business_date < valid_to)
}

fn property_matches(record: &SnapshotRecord, property: Option<&str>) -> bool {
    match property.map(str::trim).filter(|value| !value.is_empty()) {
        Some(property) => text_field(record, PROPERTY_COLUMN) == property,
        None => true,
    }
}

fn text_field(record: &SnapshotRecord, column: &str) -> String {
    record
        .get(column)
        .map(|value| value.trim().to_string())
        .unwrap_or_default()
}

/// Accepts `YYYY-MM-DD` with an optional time suffix.
fn date_field(record: &SnapshotRecord, column: &str) -> Option<NaiveDate> {
    let raw = record.get(column)?.trim();
    let day = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

fn number_field(record: &SnapshotRecord, column: &str) -> f64 {
    record
        .get(column)
        .and_then(|value| value.trim().parse::<f64>().ok())
        .filter(|value| value.is_finite())
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::catalog::{
        Dimension, BOOKING_LEAD_TIME, OCCUPANCY_BY_WEEKDAY, ROOMS_SOLD_DAILY,
    };
    use crate::services::period::OccupancyWindow;
    use std::io::Write;

    fn date(value: &str) -> NaiveDate {
        NaiveDate::parse_from_str(value, "%Y-%m-%d").unwrap()
    }

    fn record(fields: &[(&str, &str)]) -> SnapshotRecord {
        fields
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect()
    }

    fn lead_time_record(channel: &str, bucket: &str, day: &str, count: &str) -> SnapshotRecord {
        record(&[
            ("booking_channel", channel),
            ("bucket", bucket),
            ("occupancy_date", day),
            ("scd_valid_from", "2024-01-01 00:00:00"),
            ("scd_valid_to", "2024-12-31 00:00:00"),
            ("booking_lead_num", count),
            ("property", "HTL1"),
        ])
    }

    fn query<'a>(
        metric: &'a crate::repository::catalog::MetricSpec,
        dimension: Dimension,
    ) -> BucketQuery<'a> {
        BucketQuery {
            metric,
            dimension,
            window: OccupancyWindow::new(date("2024-03-01"), date("2024-03-15")),
            business_date: date("2024-03-15"),
            property: None,
        }
    }

    #[test]
    fn groups_and_sums_within_window() {
        let records = vec![
            lead_time_record("direct", "0-7 days", "2024-03-02", "3"),
            lead_time_record("direct", "0-7 days", "2024-03-03", "2"),
            lead_time_record("gds", "8-14 days", "2024-03-10", "4"),
            lead_time_record("gds", "8-14 days", "2024-03-20", "100"),
        ];
        let rows = evaluate_bucket_query(&records, &query(&BOOKING_LEAD_TIME, Dimension::BookingChannel));

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["primary_key"], "direct");
        assert_eq!(rows[0]["value"], 5.0);
        assert_eq!(rows[1]["sub_key"], "8-14 days");
        assert_eq!(rows[1]["value"], 4.0);
    }

    #[test]
    fn applies_scd_validity_and_property() {
        let mut expired = lead_time_record("direct", "0-7 days", "2024-03-02", "9");
        expired.insert("scd_valid_to".to_string(), "2024-03-15".to_string());
        let mut other_property = lead_time_record("direct", "0-7 days", "2024-03-02", "7");
        other_property.insert("property".to_string(), "HTL2".to_string());
        let mut open_ended = lead_time_record("direct", "0-7 days", "2024-03-02", "1");
        open_ended.insert("scd_valid_to".to_string(), String::new());

        let records = vec![expired, other_property, open_ended];
        let mut scoped = query(&BOOKING_LEAD_TIME, Dimension::BookingChannel);
        scoped.property = Some("HTL1");
        let rows = evaluate_bucket_query(&records, &scoped);

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["value"], 1.0);
    }

    #[test]
    fn derives_weekday_and_date_buckets() {
        let records = vec![record(&[
            ("occupancy_date", "2024-03-04"),
            ("booking_date", "2024-02-10"),
            ("scd_valid_from", "2024-01-01"),
            ("scd_valid_to", "2025-01-01"),
            ("sold_rooms", "6"),
        ])];

        let weekday = evaluate_bucket_query(&records, &query(&OCCUPANCY_BY_WEEKDAY, Dimension::Overview));
        assert_eq!(weekday[0]["sub_key"], "1");
        assert_eq!(weekday[0]["primary_key"], "");

        let daily = evaluate_bucket_query(&records, &query(&ROOMS_SOLD_DAILY, Dimension::Overview));
        assert_eq!(daily[0]["sub_key"], "2024-03-04");
        assert_eq!(daily[0]["value"], 6.0);

        let monthly = ROOMS_SOLD_DAILY.monthly();
        let monthly = evaluate_bucket_query(&records, &query(&monthly, Dimension::Overview));
        assert_eq!(monthly[0]["sub_key"], "2024-03");
    }

    #[tokio::test]
    async fn loads_tables_from_csv_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = std::fs::File::create(dir.path().join("room_type_details.csv")).unwrap();
        writeln!(file, "room_type,physicalRooms,scd_valid_from,scd_valid_to,property").unwrap();
        writeln!(file, "DBL,20,2024-01-01,2025-01-01,HTL1").unwrap();
        writeln!(file, "SGL,5,2024-01-01,2025-01-01,HTL1").unwrap();
        writeln!(file, "SGL,8,2023-01-01,2024-01-01,HTL1").unwrap();

        let store = SnapshotStore::new(dir.path());
        assert!(store.is_available());
        let rooms = store
            .fetch_available_rooms(date("2024-03-15"), Some("HTL1"))
            .await
            .unwrap();
        assert_eq!(rooms, 25.0);

        let missing = store.load_table("insights").await;
        assert!(matches!(missing, Err(AppError::Dependency(_))));

        let gone = SnapshotStore::new(dir.path().join("nowhere"));
        assert!(matches!(
            gone.load_table("insights").await,
            Err(AppError::ServiceUnavailable(_))
        ));
    }
}
