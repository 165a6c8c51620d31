use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use futures::future::try_join_all;
use serde::Serialize;
use serde_json::{json, Map, Value};

use super::{
    buckets::{filter_all_zero, sort_series, weekday_label, with_full_week, BucketKind},
    kpi::{average_daily_rate, compare, derive_kpis, series_totals, MetricDelta, PeriodTotals},
    period::{one_year_forward, PeriodType, ReportPeriod},
    reconcile::{reconcile_rows, ReconciledEntry, ReconciledSeries, SeriesRow, AGGREGATE_KEY},
};
use crate::{
    error::AppResult,
    repository::{
        catalog::{
            BucketQuery, Dimension, MetricSpec, CANCELLATION_METRICS, DAILY_OVERVIEW_METRICS,
            DISTRIBUTION_METRICS, ROOMS_SOLD_DAILY, ROOM_REVENUE_DAILY, TOTAL_REVENUE_DAILY,
        },
        ReportSource,
    },
};

/// One metric, reconciled and sorted, ready to be placed in an envelope.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub metric: MetricSpec,
    pub series: ReconciledSeries,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Current,
    Previous,
}

/// Fetches both sides of one metric concurrently and reconciles them.
pub async fn fetch_dataset(
    source: &ReportSource,
    period: &ReportPeriod,
    metric: &MetricSpec,
    dimension: Dimension,
    property: Option<&str>,
) -> AppResult<Dataset> {
    let current_query = BucketQuery {
        metric,
        dimension,
        window: period.current,
        business_date: period.business_date,
        property,
    };
    let previous_query = BucketQuery {
        metric,
        dimension,
        window: period.previous.window,
        business_date: period.previous.business_date,
        property,
    };

    let (current_rows, previous_rows) = tokio::try_join!(
        source.fetch_bucket_rows(&current_query),
        source.fetch_bucket_rows(&previous_query)
    )?;
    tracing::debug!(
        metric = metric.key,
        dimension = dimension.slug(),
        current_rows = current_rows.len(),
        previous_rows = previous_rows.len(),
        "Fetched report rows"
    );

    Ok(reconcile_dataset(
        metric,
        dimension,
        period,
        &current_rows,
        &previous_rows,
    ))
}

/// Metrics are reconciled independently of each other.
pub async fn fetch_datasets(
    source: &ReportSource,
    period: &ReportPeriod,
    metrics: &[MetricSpec],
    dimension: Dimension,
    property: Option<&str>,
) -> AppResult<Vec<Dataset>> {
    try_join_all(
        metrics
            .iter()
            .map(|metric| fetch_dataset(source, period, metric, dimension, property)),
    )
    .await
}

pub fn reconcile_dataset(
    metric: &MetricSpec,
    dimension: Dimension,
    period: &ReportPeriod,
    current: &[Value],
    previous: &[Value],
) -> Dataset {
    let current_rows = normalize_rows(metric, period, current, Side::Current);
    let previous_rows = normalize_rows(metric, period, previous, Side::Previous);

    let mut series = reconcile_rows(&current_rows, &previous_rows);
    if dimension == Dimension::Overview {
        series.entry(AGGREGATE_KEY.to_string()).or_default();
        if metric.kind == BucketKind::Weekday {
            series = with_full_week(series);
        }
    }

    Dataset {
        metric: *metric,
        series: sort_series(series, metric.kind),
    }
}

/// Rows without a sub key carry no bucket and are dropped.
fn normalize_rows(
    metric: &MetricSpec,
    period: &ReportPeriod,
    rows: &[Value],
    side: Side,
) -> Vec<SeriesRow> {
    let normalized = rows
        .iter()
        .filter_map(SeriesRow::from_json)
        .map(|row| normalize_row(metric, period, row, side))
        .collect::<Vec<_>>();
    let skipped = rows.len() - normalized.len();
    if skipped > 0 {
        tracing::warn!(
            metric = metric.key,
            side = ?side,
            skipped,
            "Dropped report rows without a sub key"
        );
    }
    normalized
}

fn normalize_row(
    metric: &MetricSpec,
    period: &ReportPeriod,
    mut row: SeriesRow,
    side: Side,
) -> SeriesRow {
    match metric.kind {
        BucketKind::Weekday => row.sub_key = weekday_label(&row.sub_key),
        BucketKind::Calendar if side == Side::Previous => {
            if let Ok(date) = NaiveDate::parse_from_str(&row.sub_key, "%Y-%m-%d") {
                row.sub_key = period.previous_date_bucket(date);
            } else if let Ok(month) =
                NaiveDate::parse_from_str(&format!("{}-01", row.sub_key), "%Y-%m-%d")
            {
                row.sub_key = one_year_forward(month).format("%Y-%m").to_string();
            }
        }
        _ => {}
    }
    row
}

/// `{ <key>: { label, datasets: { <metric>: { title, data } } } }`.
///
/// Dimension keys survive when any of their datasets has a non-zero entry;
/// the aggregate key of an overview report is always kept. A key missing from
/// one dataset gets that dataset's buckets zero-filled.
pub fn compose_envelope(dimension: Dimension, datasets: &[Dataset]) -> Value {
    let retained = datasets
        .iter()
        .flat_map(|dataset| {
            if dimension == Dimension::Overview {
                dataset.series.clone()
            } else {
                filter_all_zero(dataset.series.clone())
            }
            .into_keys()
        })
        .collect::<BTreeSet<_>>();

    let mut data = Map::new();
    for key in retained {
        let mut sets = Map::new();
        for dataset in datasets {
            let entries = dataset
                .series
                .get(&key)
                .cloned()
                .unwrap_or_else(|| zero_entries(&dataset.series));
            sets.insert(
                dataset.metric.key.to_string(),
                json!({
                    "title": dataset.metric.title,
                    "data": entries,
                }),
            );
        }
        data.insert(
            key.clone(),
            json!({
                "label": dimension.display_label(&key),
                "datasets": sets,
            }),
        );
    }
    Value::Object(data)
}

fn zero_entries(series: &ReconciledSeries) -> Vec<ReconciledEntry> {
    series
        .values()
        .next()
        .map(|entries| {
            entries
                .iter()
                .map(|entry| ReconciledEntry::zero(&entry.sub_key))
                .collect()
        })
        .unwrap_or_default()
}

pub async fn build_breakdown_report(
    source: &ReportSource,
    period: &ReportPeriod,
    metrics: &[MetricSpec],
    dimension: Dimension,
    property: Option<&str>,
) -> AppResult<Value> {
    let datasets = fetch_datasets(source, period, metrics, dimension, property).await?;
    Ok(json!({
        "period": period_json(period),
        "data": compose_envelope(dimension, &datasets),
    }))
}

pub async fn build_overview_report(
    source: &ReportSource,
    period: &ReportPeriod,
    property: Option<&str>,
) -> AppResult<Value> {
    let metrics = calendar_metrics(period, DAILY_OVERVIEW_METRICS);
    let (datasets, current_rooms, previous_rooms) = tokio::try_join!(
        fetch_datasets(source, period, &metrics, Dimension::Overview, property),
        source.fetch_available_rooms(period.business_date, property),
        source.fetch_available_rooms(period.previous.business_date, property),
    )?;
    Ok(overview_from_datasets(
        period,
        &datasets,
        current_rooms,
        previous_rooms,
    ))
}

/// Year views chart calendar metrics per month; everything else per day.
pub fn calendar_metrics(period: &ReportPeriod, metrics: &[MetricSpec]) -> Vec<MetricSpec> {
    let monthly = period.period_type == PeriodType::Year && !period.custom_range;
    metrics
        .iter()
        .map(|metric| if monthly { metric.monthly() } else { *metric })
        .collect()
}

/// KPI comparison plus the daily fluctuation series behind it.
pub fn overview_from_datasets(
    period: &ReportPeriod,
    datasets: &[Dataset],
    current_rooms: f64,
    previous_rooms: f64,
) -> Value {
    let mut current = PeriodTotals {
        available_rooms: current_rooms,
        ..PeriodTotals::default()
    };
    let mut previous = PeriodTotals {
        available_rooms: previous_rooms,
        ..PeriodTotals::default()
    };

    let mut fluctuation = Map::new();
    for dataset in datasets {
        let entries = dataset
            .series
            .get(AGGREGATE_KEY)
            .cloned()
            .unwrap_or_default();
        let (current_total, previous_total) = series_totals(&entries);
        if let Some(slot) = totals_slot(&mut current, dataset.metric.key) {
            *slot = current_total;
        }
        if let Some(slot) = totals_slot(&mut previous, dataset.metric.key) {
            *slot = previous_total;
        }
        fluctuation.insert(
            dataset.metric.key.to_string(),
            json!({
                "title": dataset.metric.title,
                "data": entries,
            }),
        );
    }

    let current_kpis = derive_kpis(&current, period.current.days());
    let previous_kpis = derive_kpis(&previous, period.previous.window.days());
    let kpis = compare(&current_kpis, &previous_kpis)
        .into_iter()
        .map(|(name, comparison)| (name.to_string(), json!(comparison)))
        .collect::<Map<String, Value>>();

    json!({
        "period": period_json(period),
        "kpis": kpis,
        "totals": {
            "current": current,
            "previous": previous,
        },
        "fluctuation": fluctuation,
    })
}

fn totals_slot<'a>(totals: &'a mut PeriodTotals, metric_key: &str) -> Option<&'a mut f64> {
    match metric_key {
        "rooms_sold" => Some(&mut totals.rooms_sold),
        "room_revenue" => Some(&mut totals.room_revenue),
        "fb_revenue" => Some(&mut totals.fb_revenue),
        "other_revenue" => Some(&mut totals.other_revenue),
        "total_revenue" => Some(&mut totals.total_revenue),
        _ => None,
    }
}

pub async fn build_cancellations_report(
    source: &ReportSource,
    period: &ReportPeriod,
    property: Option<&str>,
) -> AppResult<Value> {
    let metrics = calendar_metrics(period, CANCELLATION_METRICS);
    let datasets = fetch_datasets(source, period, &metrics, Dimension::Overview, property).await?;
    Ok(summary_from_datasets(period, &datasets))
}

/// Per-metric totals with their movement, plus the series they were summed from.
pub fn summary_from_datasets(period: &ReportPeriod, datasets: &[Dataset]) -> Value {
    let mut totals = Map::new();
    let mut fluctuation = Map::new();
    for dataset in datasets {
        let entries = dataset
            .series
            .get(AGGREGATE_KEY)
            .cloned()
            .unwrap_or_default();
        let (current, previous) = series_totals(&entries);
        totals.insert(
            dataset.metric.key.to_string(),
            json!(MetricDelta::new(current, previous)),
        );
        fluctuation.insert(
            dataset.metric.key.to_string(),
            json!({
                "title": dataset.metric.title,
                "data": entries,
            }),
        );
    }

    json!({
        "period": period_json(period),
        "totals": totals,
        "fluctuation": fluctuation,
    })
}

pub async fn build_distribution_report(
    source: &ReportSource,
    period: &ReportPeriod,
    dimension: Dimension,
    property: Option<&str>,
) -> AppResult<Value> {
    let metrics = calendar_metrics(period, DISTRIBUTION_METRICS);
    let datasets = fetch_datasets(source, period, &metrics, dimension, property).await?;
    Ok(distribution_from_datasets(period, dimension, &datasets))
}

#[derive(Debug, Clone, Serialize)]
struct ShareRow {
    key: String,
    label: String,
    #[serde(flatten)]
    delta: MetricDelta,
}

/// Revenue, rooms sold and ADR per dimension key, largest current revenue
/// first, plus total revenue per date with every key side by side.
pub fn distribution_from_datasets(
    period: &ReportPeriod,
    dimension: Dimension,
    datasets: &[Dataset],
) -> Value {
    let series_of = |metric: &MetricSpec| {
        datasets
            .iter()
            .find(|dataset| dataset.metric.key == metric.key)
            .map(|dataset| dataset.series.clone())
            .unwrap_or_default()
    };
    let revenue = series_of(&TOTAL_REVENUE_DAILY);
    let rooms_sold = series_of(&ROOMS_SOLD_DAILY);
    let room_revenue = series_of(&ROOM_REVENUE_DAILY);

    let retained = datasets
        .iter()
        .flat_map(|dataset| {
            if dimension == Dimension::Overview {
                dataset.series.clone()
            } else {
                filter_all_zero(dataset.series.clone())
            }
            .into_keys()
        })
        .collect::<BTreeSet<_>>();

    let totals_for = |series: &ReconciledSeries, key: &str| {
        series
            .get(key)
            .map(|entries| series_totals(entries))
            .unwrap_or((0.0, 0.0))
    };
    let mut keys = retained.into_iter().collect::<Vec<_>>();
    keys.sort_by(|left, right| {
        let left_revenue = totals_for(&revenue, left).0;
        let right_revenue = totals_for(&revenue, right).0;
        right_revenue
            .total_cmp(&left_revenue)
            .then_with(|| left.cmp(right))
    });

    let share_row = |key: &str, delta: MetricDelta| ShareRow {
        key: key.to_string(),
        label: dimension.display_label(key),
        delta,
    };
    let mut revenue_rows = Vec::with_capacity(keys.len());
    let mut rooms_rows = Vec::with_capacity(keys.len());
    let mut adr_rows = Vec::with_capacity(keys.len());
    for key in &keys {
        let (current_revenue, previous_revenue) = totals_for(&revenue, key);
        let (current_rooms, previous_rooms) = totals_for(&rooms_sold, key);
        let (current_room_revenue, previous_room_revenue) = totals_for(&room_revenue, key);
        revenue_rows.push(share_row(key, MetricDelta::new(current_revenue, previous_revenue)));
        rooms_rows.push(share_row(key, MetricDelta::new(current_rooms, previous_rooms)));
        adr_rows.push(share_row(
            key,
            MetricDelta::new(
                average_daily_rate(current_room_revenue, current_rooms),
                average_daily_rate(previous_room_revenue, previous_rooms),
            ),
        ));
    }

    let mut by_date: BTreeMap<String, Map<String, Value>> = BTreeMap::new();
    for key in &keys {
        for entry in revenue.get(key).into_iter().flatten() {
            by_date.entry(entry.sub_key.clone()).or_default().insert(
                key.clone(),
                json!({
                    "current": entry.current,
                    "previous": entry.previous,
                }),
            );
        }
    }
    let time_series = by_date
        .into_iter()
        .map(|(date, categories)| json!({ "date": date, "categories": categories }))
        .collect::<Vec<_>>();

    json!({
        "period": period_json(period),
        "distribution": {
            "revenue": revenue_rows,
            "rooms_sold": rooms_rows,
            "adr": adr_rows,
        },
        "time_series": time_series,
    })
}

pub fn period_json(period: &ReportPeriod) -> Value {
    let period_type = if period.custom_range {
        "Custom"
    } else {
        period.period_type.as_str()
    };
    json!({
        "business_date": period.business_date,
        "period_type": period_type,
        "view_type": period.view_type.as_str(),
        "comparison": period.comparison.label(),
        "current": period.current,
        "previous": period.previous,
        "previous_business_date": period.previous.business_date,
    })
}
