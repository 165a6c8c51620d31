use std::time::Instant;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde_json::Value;

use crate::{
    error::{AppError, AppResult},
    repository::catalog::{
        Dimension, MetricSpec, LEAD_TIME_METRICS, LENGTH_OF_STAY_METRICS,
        RESERVATION_TREND_METRICS,
    },
    schemas::{validate_input, ReportQuery},
    services::{
        period::ReportPeriod,
        report::{
            build_breakdown_report, build_cancellations_report, build_distribution_report,
            build_overview_report,
        },
    },
    state::AppState,
};

#[derive(Debug, Clone, Copy)]
enum ReportKind {
    Breakdown(&'static [MetricSpec]),
    Overview,
    Cancellations,
    Distribution,
}

impl ReportKind {
    fn overview_only(self) -> bool {
        matches!(self, Self::Overview | Self::Cancellations)
    }
}

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route("/{dimension}/lead-times", axum::routing::get(lead_times))
        .route(
            "/{dimension}/length-of-stay",
            axum::routing::get(length_of_stay),
        )
        .route(
            "/{dimension}/reservation-trends",
            axum::routing::get(reservation_trends),
        )
        .route("/{dimension}/general", axum::routing::get(general_overview))
        .route("/{dimension}/cancellations", axum::routing::get(cancellations))
        .route("/{dimension}/distribution", axum::routing::get(distribution))
}

async fn lead_times(
    State(state): State<AppState>,
    Path(dimension): Path<String>,
    Query(query): Query<ReportQuery>,
) -> AppResult<Json<Value>> {
    run_report(
        &state,
        "lead-times",
        &dimension,
        &query,
        ReportKind::Breakdown(LEAD_TIME_METRICS),
    )
    .await
}

async fn length_of_stay(
    State(state): State<AppState>,
    Path(dimension): Path<String>,
    Query(query): Query<ReportQuery>,
) -> AppResult<Json<Value>> {
    run_report(
        &state,
        "length-of-stay",
        &dimension,
        &query,
        ReportKind::Breakdown(LENGTH_OF_STAY_METRICS),
    )
    .await
}

async fn reservation_trends(
    State(state): State<AppState>,
    Path(dimension): Path<String>,
    Query(query): Query<ReportQuery>,
) -> AppResult<Json<Value>> {
    run_report(
        &state,
        "reservation-trends",
        &dimension,
        &query,
        ReportKind::Breakdown(RESERVATION_TREND_METRICS),
    )
    .await
}

async fn general_overview(
    State(state): State<AppState>,
    Path(dimension): Path<String>,
    Query(query): Query<ReportQuery>,
) -> AppResult<Json<Value>> {
    run_report(&state, "general", &dimension, &query, ReportKind::Overview).await
}

async fn cancellations(
    State(state): State<AppState>,
    Path(dimension): Path<String>,
    Query(query): Query<ReportQuery>,
) -> AppResult<Json<Value>> {
    run_report(
        &state,
        "cancellations",
        &dimension,
        &query,
        ReportKind::Cancellations,
    )
    .await
}

async fn distribution(
    State(state): State<AppState>,
    Path(dimension): Path<String>,
    Query(query): Query<ReportQuery>,
) -> AppResult<Json<Value>> {
    run_report(
        &state,
        "distribution",
        &dimension,
        &query,
        ReportKind::Distribution,
    )
    .await
}

async fn run_report(
    state: &AppState,
    endpoint: &'static str,
    dimension: &str,
    query: &ReportQuery,
    kind: ReportKind,
) -> AppResult<Json<Value>> {
    let dimension = Dimension::from_slug(dimension)
        .ok_or_else(|| AppError::NotFound(format!("Unknown report dimension '{dimension}'.")))?;
    if kind.overview_only() && dimension != Dimension::Overview {
        return Err(AppError::NotFound(format!(
            "The {endpoint} report is only available for '{}'.",
            Dimension::Overview.slug()
        )));
    }

    validate_input(query)?;
    let period = query.resolve_period(state.config.hotel_today())?;
    let property = query.property_filter();

    let key = cache_key(endpoint, dimension, &period, property);
    if let Some(cached) = state.report_cache.get(&key).await {
        tracing::debug!(endpoint, dimension = dimension.slug(), "Report cache hit");
        return Ok(Json(cached));
    }

    let started = Instant::now();
    let body = match kind {
        ReportKind::Breakdown(metrics) => {
            build_breakdown_report(&state.source, &period, metrics, dimension, property).await?
        }
        ReportKind::Overview => build_overview_report(&state.source, &period, property).await?,
        ReportKind::Cancellations => {
            build_cancellations_report(&state.source, &period, property).await?
        }
        ReportKind::Distribution => {
            build_distribution_report(&state.source, &period, dimension, property).await?
        }
    };

    tracing::info!(
        endpoint,
        dimension = dimension.slug(),
        current_start = %period.current.start,
        current_end = %period.current.end,
        previous_start = %period.previous.window.start,
        previous_end = %period.previous.window.end,
        comparison = %period.comparison.label(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Report built"
    );

    state.report_cache.insert(key, body.clone()).await;
    Ok(Json(body))
}

fn cache_key(
    endpoint: &str,
    dimension: Dimension,
    period: &ReportPeriod,
    property: Option<&str>,
) -> String {
    format!(
        "{endpoint}|{}|{}|{}|{}|{}|{}|{}..{}|{}..{}|{}|{}",
        dimension.slug(),
        period.period_type.as_str(),
        period.custom_range,
        period.view_type.as_str(),
        period.comparison.label(),
        period.business_date,
        period.current.start,
        period.current.end,
        period.previous.window.start,
        period.previous.window.end,
        period.previous.business_date,
        property.unwrap_or("*"),
    )
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    use crate::{
        config::test_config,
        repository::{snapshots::SnapshotStore, ReportSource},
        routes::v1_router,
        state::AppState,
    };

    use super::*;

    const LEAD_HEADER: &str =
        "booking_channel,bucket,occupancy_date,scd_valid_from,scd_valid_to,property";

    fn write_csv(dir: &std::path::Path, table: &str, header: &str, rows: &[&str]) {
        let mut file = std::fs::File::create(dir.join(format!("{table}.csv"))).unwrap();
        writeln!(file, "{header}").unwrap();
        for row in rows {
            writeln!(file, "{row}").unwrap();
        }
    }

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        write_csv(
            dir.path(),
            "booking_lead_time",
            &format!("{LEAD_HEADER},booking_lead_num"),
            &[
                "direct,0-7 days,2024-03-02,2023-01-01,2025-01-01,HTL1,3",
                "direct,8-14 days,2023-03-05,2023-01-01,2025-01-01,HTL1,2",
                "expedia,0-7 days,2024-03-20,2023-01-01,2025-01-01,HTL1,9",
            ],
        );
        write_csv(
            dir.path(),
            "cancellation_lead_time",
            &format!("{LEAD_HEADER},cancellation_lead_num"),
            &["direct,>30 days,2024-03-03,2023-01-01,2025-01-01,HTL1,1"],
        );
        write_csv(
            dir.path(),
            "insights",
            "occupancy_date,booking_date,scd_valid_from,scd_valid_to,property,booking_channel,sold_rooms,roomRevenue,fbRevenue,otherRevenue,totalRevenue,cancelled_rooms,no_show_rooms,totalRevenue_lost",
            &[
                "2024-03-01,2024-02-01,2023-01-01,2025-01-01,HTL1,direct,10,1000,100,0,1100,2,0,250",
                "2023-03-01,2023-02-01,2023-01-01,2025-01-01,HTL1,expedia,5,400,0,0,400,1,1,100",
            ],
        );
        write_csv(
            dir.path(),
            "room_type_details",
            "room_type,physicalRooms,scd_valid_from,scd_valid_to,property",
            &["DBL,2,2023-01-01,2025-01-01,HTL1"],
        );
        dir
    }

    fn app(dir: &tempfile::TempDir) -> axum::Router {
        let source = ReportSource::Snapshots(SnapshotStore::new(dir.path()));
        v1_router().with_state(AppState::with_source(test_config(), source))
    }

    async fn get_json(app: axum::Router, uri: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn lead_times_reconcile_both_sides() {
        let dir = fixture();
        let (status, body) = get_json(
            app(&dir),
            "/booking-channels/lead-times?businessDate=2024-03-15&comparison=Last%20year%20-%20Actual",
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");

        assert_eq!(body["period"]["current"]["start_date"], "2024-03-01");
        assert_eq!(body["period"]["previous"]["end_date"], "2023-03-15");
        assert_eq!(body["period"]["previous_business_date"], "2024-03-15");

        let data = body["data"].as_object().unwrap();
        assert_eq!(data.keys().collect::<Vec<_>>(), vec!["direct"]);
        let booking = &data["direct"]["datasets"]["booking_lead_time"]["data"];
        assert_eq!(booking[0]["range"], "0-7 days");
        assert_eq!(booking[0]["current"], 3.0);
        assert_eq!(booking[0]["previous"], 0.0);
        assert_eq!(booking[1]["range"], "8-14 days");
        assert_eq!(booking[1]["current"], 0.0);
        assert_eq!(booking[1]["previous"], 2.0);
        let cancellation = &data["direct"]["datasets"]["cancellation_lead_time"]["data"];
        assert_eq!(cancellation[0]["range"], ">30 days");
        assert_eq!(cancellation[0]["current"], 1.0);
    }

    #[tokio::test]
    async fn general_overview_reports_kpis() {
        let dir = fixture();
        let (status, body) = get_json(
            app(&dir),
            "/overview/general?businessDate=2024-03-15&periodType=month&viewType=actual&comparison=Last%20year%20-%20Actual&property=HTL1",
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["kpis"]["rooms_sold"]["current"], 10.0);
        assert_eq!(body["kpis"]["rooms_sold"]["previous"], 5.0);
        assert_eq!(body["kpis"]["rooms_sold"]["change"], 100.0);
        assert_eq!(body["kpis"]["adr"]["current"], 100.0);
        assert_eq!(body["kpis"]["adr"]["previous"], 80.0);
        assert_eq!(body["kpis"]["fb_revenue"]["change"], 100.0);
        let daily = body["fluctuation"]["rooms_sold"]["data"].as_array().unwrap();
        assert_eq!(daily.len(), 1);
        assert_eq!(daily[0]["range"], "2024-03-01");
        assert_eq!(daily[0]["previous"], 5.0);
    }

    #[tokio::test]
    async fn cancellations_total_lost_business() {
        let dir = fixture();
        let (status, body) = get_json(
            app(&dir),
            "/overview/cancellations?businessDate=2024-03-15&comparison=Last%20year%20-%20Actual",
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["totals"]["cancelled_rooms"]["current"], 2.0);
        assert_eq!(body["totals"]["cancelled_rooms"]["previous"], 1.0);
        assert_eq!(body["totals"]["cancelled_rooms"]["change"], 100.0);
        assert_eq!(body["totals"]["no_show_rooms"]["change"], -100.0);
        assert_eq!(body["totals"]["revenue_lost"]["difference"], 150.0);
        assert_eq!(
            body["fluctuation"]["revenue_lost"]["data"][0]["range"],
            "2024-03-01"
        );

        let (status, _) = get_json(app(&dir), "/booking-channels/cancellations").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn distribution_splits_revenue_per_channel() {
        let dir = fixture();
        let (status, body) = get_json(
            app(&dir),
            "/booking-channels/distribution?businessDate=2024-03-15&comparison=Last%20year%20-%20Actual",
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");

        let revenue = body["distribution"]["revenue"].as_array().unwrap();
        assert_eq!(revenue.len(), 2);
        assert_eq!(revenue[0]["key"], "direct");
        assert_eq!(revenue[0]["current"], 1100.0);
        assert_eq!(revenue[0]["previous"], 0.0);
        assert_eq!(revenue[1]["key"], "expedia");
        assert_eq!(revenue[1]["previous"], 400.0);
        assert_eq!(revenue[1]["change"], -100.0);
        assert_eq!(body["distribution"]["adr"][0]["current"], 100.0);
        assert_eq!(body["distribution"]["adr"][1]["previous"], 80.0);

        let series = body["time_series"].as_array().unwrap();
        assert_eq!(series.len(), 1);
        assert_eq!(series[0]["date"], "2024-03-01");
        assert_eq!(series[0]["categories"]["direct"]["current"], 1100.0);
        assert_eq!(series[0]["categories"]["expedia"]["previous"], 400.0);
    }

    #[tokio::test]
    async fn same_windows_with_different_period_types_are_cached_apart() {
        let dir = fixture();
        let app = app(&dir);

        let (status, year) = get_json(
            app.clone(),
            "/overview/general?businessDate=2024-06-30&periodType=Year",
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{year}");
        assert_eq!(year["period"]["period_type"], "Year");
        assert_eq!(year["fluctuation"]["rooms_sold"]["data"][0]["range"], "2024-03");

        let (status, custom) = get_json(
            app.clone(),
            "/overview/general?businessDate=2024-06-30&periodType=Custom&customStartDate=2024-01-01&customEndDate=2024-06-30",
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{custom}");
        assert_eq!(custom["period"]["current"], year["period"]["current"]);
        assert_eq!(custom["period"]["period_type"], "Custom");
        assert_eq!(
            custom["fluctuation"]["rooms_sold"]["data"][0]["range"],
            "2024-03-01"
        );

        let (_, otb) = get_json(
            app.clone(),
            "/overview/general?businessDate=2024-03-01&periodType=Day&viewType=OTB",
        )
        .await;
        let (_, projected) = get_json(
            app,
            "/overview/general?businessDate=2024-03-01&periodType=Day&viewType=Projected",
        )
        .await;
        assert_eq!(otb["period"]["current"], projected["period"]["current"]);
        assert_eq!(otb["period"]["view_type"], "OTB");
        assert_eq!(projected["period"]["view_type"], "Projected");
    }

    #[tokio::test]
    async fn rejects_unknown_dimensions_and_bad_periods() {
        let dir = fixture();
        let (status, _) = get_json(app(&dir), "/guests/lead-times").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = get_json(app(&dir), "/room-types/general").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = get_json(
            app(&dir),
            "/overview/lead-times?periodType=Custom&customStartDate=2024-03-10&customEndDate=2024-03-01",
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["error"].as_str().unwrap().contains("after"));
    }

    #[tokio::test]
    async fn missing_snapshot_is_a_dependency_failure() {
        let dir = tempfile::tempdir().unwrap();
        let (status, body) = get_json(app(&dir), "/room-types/length-of-stay").await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn health_reports_source() {
        let dir = fixture();
        let (status, body) = get_json(app(&dir), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["source"], "snapshots");
    }

    #[test]
    fn cache_key_separates_properties_and_period_settings() {
        let today = chrono::NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        let period = ReportQuery::default().resolve_period(today).unwrap();
        assert_ne!(
            cache_key("lead-times", Dimension::RoomType, &period, Some("HTL1")),
            cache_key("lead-times", Dimension::RoomType, &period, None)
        );

        let year = ReportQuery {
            business_date: Some("2024-06-30".to_string()),
            period_type: "Year".to_string(),
            ..ReportQuery::default()
        }
        .resolve_period(today)
        .unwrap();
        let custom = ReportQuery {
            business_date: Some("2024-06-30".to_string()),
            period_type: "Custom".to_string(),
            custom_start_date: Some("2024-01-01".to_string()),
            custom_end_date: Some("2024-06-30".to_string()),
            ..ReportQuery::default()
        }
        .resolve_period(today)
        .unwrap();
        assert_eq!(year.current, custom.current);
        assert_ne!(
            cache_key("general", Dimension::Overview, &year, None),
            cache_key("general", Dimension::Overview, &custom, None)
        );
    }
}
