use serde::Serialize;

use super::reconcile::ReconciledEntry;

const MAX_CHANGE_PCT: f64 = 1000.0;

/// Raw sums for one side of the overview report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PeriodTotals {
    pub available_rooms: f64,
    pub rooms_sold: f64,
    pub room_revenue: f64,
    pub fb_revenue: f64,
    pub other_revenue: f64,
    pub total_revenue: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct KpiSnapshot {
    pub occupancy_rate: f64,
    pub adr: f64,
    pub revpar: f64,
    pub trevpar: f64,
    pub rooms_sold: f64,
    pub room_revenue: f64,
    pub fb_revenue: f64,
    pub other_revenue: f64,
    pub total_revenue: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct KpiComparison {
    pub current: f64,
    pub previous: f64,
    pub change: Option<f64>,
}

/// `available_rooms` is daily capacity; room nights scale it by `days`.
pub fn derive_kpis(totals: &PeriodTotals, days: i64) -> KpiSnapshot {
    let room_nights = totals.available_rooms * days.max(0) as f64;
    KpiSnapshot {
        occupancy_rate: round2(ratio(totals.rooms_sold, room_nights) * 100.0),
        adr: average_daily_rate(totals.room_revenue, totals.rooms_sold),
        revpar: round2(ratio(totals.room_revenue, room_nights)),
        trevpar: round2(ratio(totals.total_revenue, room_nights)),
        rooms_sold: round2(totals.rooms_sold),
        room_revenue: round2(totals.room_revenue),
        fb_revenue: round2(totals.fb_revenue),
        other_revenue: round2(totals.other_revenue),
        total_revenue: round2(totals.total_revenue),
    }
}

/// Relative change in percent, clamped to ±1000.
///
/// `None` when both sides are zero. A move away from zero reads as ±100
/// following the sign of `current`; a move down to zero reads as -100.
pub fn percentage_change(current: f64, previous: f64) -> Option<f64> {
    let current = if current.is_finite() { current } else { 0.0 };
    let previous = if previous.is_finite() { previous } else { 0.0 };

    if previous == 0.0 {
        if current == 0.0 {
            return None;
        }
        return Some(current.signum() * 100.0);
    }
    if current == 0.0 {
        return Some(-100.0);
    }

    let change = ((current - previous) / previous * 100.0).clamp(-MAX_CHANGE_PCT, MAX_CHANGE_PCT);
    // Avoid -0.0.
    Some(round2(change) + 0.0)
}

pub fn compare(current: &KpiSnapshot, previous: &KpiSnapshot) -> Vec<(&'static str, KpiComparison)> {
    let pairs = [
        ("occupancy_rate", current.occupancy_rate, previous.occupancy_rate),
        ("adr", current.adr, previous.adr),
        ("revpar", current.revpar, previous.revpar),
        ("trevpar", current.trevpar, previous.trevpar),
        ("rooms_sold", current.rooms_sold, previous.rooms_sold),
        ("room_revenue", current.room_revenue, previous.room_revenue),
        ("fb_revenue", current.fb_revenue, previous.fb_revenue),
        ("other_revenue", current.other_revenue, previous.other_revenue),
        ("total_revenue", current.total_revenue, previous.total_revenue),
    ];
    pairs
        .into_iter()
        .map(|(name, current, previous)| {
            (
                name,
                KpiComparison {
                    current,
                    previous,
                    change: percentage_change(current, previous),
                },
            )
        })
        .collect()
}

/// Side-by-side figure with its absolute and relative movement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricDelta {
    pub current: f64,
    pub previous: f64,
    pub difference: f64,
    pub change: Option<f64>,
}

impl MetricDelta {
    pub fn new(current: f64, previous: f64) -> Self {
        let current = round2(current);
        let previous = round2(previous);
        Self {
            current,
            previous,
            difference: round2(current - previous) + 0.0,
            change: percentage_change(current, previous),
        }
    }
}

pub fn average_daily_rate(room_revenue: f64, rooms_sold: f64) -> f64 {
    round2(ratio(room_revenue, rooms_sold))
}

/// Column sums of a reconciled series: `(current, previous)`.
pub fn series_totals(entries: &[ReconciledEntry]) -> (f64, f64) {
    entries.iter().fold((0.0, 0.0), |(current, previous), entry| {
        (current + entry.current, previous + entry.previous)
    })
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
