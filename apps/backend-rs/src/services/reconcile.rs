use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use serde_json::Value;

/// Primary key used when a report has no dimension breakdown.
pub const AGGREGATE_KEY: &str = "all";

/// One observation from one side of a query.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesRow {
    pub primary_key: Option<String>,
    pub sub_key: String,
    pub value: f64,
}

impl SeriesRow {
    pub fn new(primary_key: Option<&str>, sub_key: &str, value: f64) -> Self {
        Self {
            primary_key: primary_key.map(ToOwned::to_owned),
            sub_key: sub_key.to_string(),
            value,
        }
    }

    /// Reads `primary_key`, `sub_key` and `value` from a fetched row.
    ///
    /// `None` when the row has no usable sub key.
    pub fn from_json(row: &Value) -> Option<Self> {
        Some(Self {
            primary_key: key_value(row.get("primary_key")),
            sub_key: key_value(row.get("sub_key"))?,
            value: metric_value(row.get("value")),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconciledEntry {
    #[serde(rename = "range")]
    pub sub_key: String,
    pub current: f64,
    pub previous: f64,
}

impl ReconciledEntry {
    pub fn zero(sub_key: &str) -> Self {
        Self {
            sub_key: sub_key.to_string(),
            current: 0.0,
            previous: 0.0,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.current == 0.0 && self.previous == 0.0
    }
}

pub type ReconciledSeries = BTreeMap<String, Vec<ReconciledEntry>>;

/// Cross-joins a current and a comparison row list into one gap-filled series
/// per primary key.
///
/// Every primary key seen on either side ends up with exactly one entry for
/// every sub-key seen anywhere in the two lists. Rows sharing a
/// `(primary key, sub-key)` pair on the same side are summed. Entries come out
/// in sub-key order; callers apply the canonical bucket order afterwards.
pub fn reconcile<R, K, S, V>(
    current: &[R],
    previous: &[R],
    key_fn: K,
    sub_key_fn: S,
    value_fn: V,
) -> ReconciledSeries
where
    K: Fn(&R) -> Option<String>,
    S: Fn(&R) -> String,
    V: Fn(&R) -> f64,
{
    let primary_key = |row: &R| key_fn(row).unwrap_or_else(|| AGGREGATE_KEY.to_string());
    let value = |row: &R| finite_or_zero(value_fn(row));

    let mut previous_lookup: BTreeMap<(String, String), f64> = BTreeMap::new();
    for row in previous {
        *previous_lookup
            .entry((primary_key(row), sub_key_fn(row)))
            .or_insert(0.0) += value(row);
    }

    let mut cells: BTreeMap<String, BTreeMap<String, (f64, f64)>> = BTreeMap::new();
    let mut seen_sub_keys: BTreeSet<String> = BTreeSet::new();

    for row in current {
        let key = primary_key(row);
        let sub_key = sub_key_fn(row);
        let previous_value = previous_lookup
            .get(&(key.clone(), sub_key.clone()))
            .copied()
            .unwrap_or(0.0);
        let cell = cells
            .entry(key)
            .or_default()
            .entry(sub_key.clone())
            .or_insert((0.0, previous_value));
        cell.0 += value(row);
        seen_sub_keys.insert(sub_key);
    }

    for ((key, sub_key), previous_value) in &previous_lookup {
        cells
            .entry(key.clone())
            .or_default()
            .entry(sub_key.clone())
            .or_insert((0.0, *previous_value));
        seen_sub_keys.insert(sub_key.clone());
    }

    cells
        .into_iter()
        .map(|(key, buckets)| {
            let entries = seen_sub_keys
                .iter()
                .map(|sub_key| {
                    let (current, previous) = buckets.get(sub_key).copied().unwrap_or((0.0, 0.0));
                    ReconciledEntry {
                        sub_key: sub_key.clone(),
                        current,
                        previous,
                    }
                })
                .collect::<Vec<_>>();
            (key, entries)
        })
        .collect()
}

pub fn reconcile_rows(current: &[SeriesRow], previous: &[SeriesRow]) -> ReconciledSeries {
    reconcile(
        current,
        previous,
        |row| row.primary_key.clone(),
        |row| row.sub_key.clone(),
        |row| row.value,
    )
}

/// Numeric coercion for fetched values: numbers, numeric strings, anything
/// else is 0. Never yields NaN or infinity.
pub fn metric_value(value: Option<&Value>) -> f64 {
    let parsed = match value {
        Some(Value::Number(number)) => number.as_f64().unwrap_or(0.0),
        Some(Value::String(text)) => text.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };
    finite_or_zero(parsed)
}

/// Keys may arrive as strings or as numbers (e.g. weekday numbers).
pub fn key_value(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::String(text)) => Some(text.trim())
            .filter(|item| !item.is_empty())
            .map(ToOwned::to_owned),
        Some(Value::Number(number)) => Some(number.to_string()),
        _ => None,
    }
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}
