use std::cmp::Ordering;

use super::reconcile::{ReconciledEntry, ReconciledSeries};

/// Inner-axis family of a series, which decides its canonical order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketKind {
    LeadTime,
    CancellationLeadTime,
    StayLength,
    Weekday,
    /// ISO dates or months; lexical order is chronological.
    Calendar,
}

// `181-365 days` and `>180 days` are alternative labels for the same slot.
const LEAD_TIME_ORDER: &[(&str, usize)] = &[
    ("0-7 days", 0),
    ("8-14 days", 1),
    ("15-30 days", 2),
    ("31-60 days", 3),
    ("61-90 days", 4),
    ("91-180 days", 5),
    ("181-365 days", 6),
    (">180 days", 6),
    ("365+ days", 7),
];

const CANCELLATION_LEAD_TIME_ORDER: &[&str] = &[
    "0-5 days",
    "6-10 days",
    "11-15 days",
    "16-20 days",
    "21-25 days",
    "26-30 days",
    ">30 days",
];

const STAY_LENGTH_ORDER: &[&str] = &[
    "1 night",
    "2 nights",
    "3 nights",
    "4 nights",
    "5 nights",
    "6 nights",
    "7+ nights",
];

/// Monday is day 1, matching the analytical store's `toDayOfWeek`.
pub const WEEKDAYS: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

pub fn canonical_index(kind: BucketKind, sub_key: &str) -> Option<usize> {
    match kind {
        BucketKind::LeadTime => LEAD_TIME_ORDER
            .iter()
            .find(|(label, _)| *label == sub_key)
            .map(|(_, index)| *index),
        BucketKind::CancellationLeadTime => position(CANCELLATION_LEAD_TIME_ORDER, sub_key),
        BucketKind::StayLength => position(STAY_LENGTH_ORDER, sub_key),
        BucketKind::Weekday => position(&WEEKDAYS, sub_key),
        BucketKind::Calendar => None,
    }
}

fn position(order: &[&str], sub_key: &str) -> Option<usize> {
    order.iter().position(|label| *label == sub_key)
}

fn compare_sub_keys(kind: BucketKind, left: &str, right: &str) -> Ordering {
    let rank = |sub_key: &str| canonical_index(kind, sub_key).unwrap_or(usize::MAX);
    rank(left)
        .cmp(&rank(right))
        .then_with(|| left.cmp(right))
}

/// Listed buckets first in canonical order, then the rest alphabetically.
pub fn sort_entries(entries: &[ReconciledEntry], kind: BucketKind) -> Vec<ReconciledEntry> {
    let mut sorted = entries.to_vec();
    sorted.sort_by(|left, right| compare_sub_keys(kind, &left.sub_key, &right.sub_key));
    sorted
}

pub fn sort_series(series: ReconciledSeries, kind: BucketKind) -> ReconciledSeries {
    series
        .into_iter()
        .map(|(key, entries)| {
            let sorted = sort_entries(&entries, kind);
            (key, sorted)
        })
        .collect()
}

/// Drops primary keys whose entries are all zero on both sides.
pub fn filter_all_zero(series: ReconciledSeries) -> ReconciledSeries {
    series
        .into_iter()
        .filter(|(_, entries)| !entries.iter().all(ReconciledEntry::is_zero))
        .collect()
}

/// Weekday numbers 1..=7 become names; anything else passes through.
pub fn weekday_label(sub_key: &str) -> String {
    sub_key
        .trim()
        .parse::<usize>()
        .ok()
        .and_then(weekday_name)
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| sub_key.to_string())
}

pub fn weekday_name(day_number: usize) -> Option<&'static str> {
    day_number
        .checked_sub(1)
        .and_then(|index| WEEKDAYS.get(index))
        .copied()
}

/// Adds zero entries for weekdays a series never reported.
pub fn with_full_week(series: ReconciledSeries) -> ReconciledSeries {
    series
        .into_iter()
        .map(|(key, mut entries)| {
            for day in WEEKDAYS {
                if !entries.iter().any(|entry| entry.sub_key == day) {
                    entries.push(ReconciledEntry::zero(day));
                }
            }
            (key, entries)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(labels: &[&str]) -> Vec<ReconciledEntry> {
        labels
            .iter()
            .enumerate()
            .map(|(index, label)| ReconciledEntry {
                sub_key: (*label).to_string(),
                current: index as f64 + 1.0,
                previous: 0.0,
            })
            .collect()
    }

    fn labels(entries: &[ReconciledEntry]) -> Vec<&str> {
        entries.iter().map(|entry| entry.sub_key.as_str()).collect()
    }

    #[test]
    fn sorts_weekdays_from_monday() {
        let sorted = sort_entries(
            &entries(&["Sunday", "Monday", "Wednesday"]),
            BucketKind::Weekday,
        );
        assert_eq!(labels(&sorted), vec!["Monday", "Wednesday", "Sunday"]);
    }

    #[test]
    fn sorts_lead_time_buckets_canonically() {
        let sorted = sort_entries(
            &entries(&["365+ days", "8-14 days", "181-365 days", "0-7 days", "91-180 days"]),
            BucketKind::LeadTime,
        );
        assert_eq!(
            labels(&sorted),
            vec!["0-7 days", "8-14 days", "91-180 days", "181-365 days", "365+ days"]
        );

        let legacy = sort_entries(&entries(&[">180 days", "61-90 days"]), BucketKind::LeadTime);
        assert_eq!(labels(&legacy), vec!["61-90 days", ">180 days"]);
    }

    #[test]
    fn sorts_cancellation_and_stay_buckets() {
        let cancellations = sort_entries(
            &entries(&[">30 days", "11-15 days", "0-5 days", "6-10 days"]),
            BucketKind::CancellationLeadTime,
        );
        assert_eq!(
            labels(&cancellations),
            vec!["0-5 days", "6-10 days", "11-15 days", ">30 days"]
        );

        let stays = sort_entries(
            &entries(&["7+ nights", "10 nights", "2 nights", "1 night"]),
            BucketKind::StayLength,
        );
        assert_eq!(
            labels(&stays),
            vec!["1 night", "2 nights", "7+ nights", "10 nights"]
        );
    }

    #[test]
    fn unlisted_buckets_trail_alphabetically() {
        let sorted = sort_entries(
            &entries(&["zeta", "Tuesday", "alpha", "Monday"]),
            BucketKind::Weekday,
        );
        assert_eq!(labels(&sorted), vec!["Monday", "Tuesday", "alpha", "zeta"]);
    }

    #[test]
    fn calendar_buckets_sort_chronologically() {
        let sorted = sort_entries(
            &entries(&["2024-03-10", "2024-02-28", "2024-03-01"]),
            BucketKind::Calendar,
        );
        assert_eq!(labels(&sorted), vec!["2024-02-28", "2024-03-01", "2024-03-10"]);
    }

    #[test]
    fn sorting_twice_changes_nothing() {
        let once = sort_entries(
            &entries(&["6 nights", "foo", "1 night", "3 nights", "bar"]),
            BucketKind::StayLength,
        );
        let twice = sort_entries(&once, BucketKind::StayLength);
        assert_eq!(once, twice);
    }

    #[test]
    fn filters_all_zero_keys() {
        let mut series = ReconciledSeries::new();
        series.insert("a".to_string(), vec![ReconciledEntry::zero("x")]);
        series.insert(
            "b".to_string(),
            vec![
                ReconciledEntry::zero("x"),
                ReconciledEntry {
                    sub_key: "y".to_string(),
                    current: 0.0,
                    previous: 2.0,
                },
            ],
        );

        let filtered = filter_all_zero(series);
        assert!(!filtered.contains_key("a"));
        assert!(filtered.contains_key("b"));
        assert!(filtered
            .values()
            .all(|entries| !entries.iter().all(ReconciledEntry::is_zero)));
    }

    #[test]
    fn labels_weekday_numbers() {
        assert_eq!(weekday_label("1"), "Monday");
        assert_eq!(weekday_label("7"), "Sunday");
        assert_eq!(weekday_label("0"), "0");
        assert_eq!(weekday_label("8"), "8");
        assert_eq!(weekday_label("Friday"), "Friday");
    }

    #[test]
    fn fills_missing_weekdays() {
        let mut series = ReconciledSeries::new();
        series.insert("all".to_string(), entries(&["Friday"]));
        let filled = sort_series(with_full_week(series), BucketKind::Weekday);
        assert_eq!(labels(&filled["all"]), WEEKDAYS.to_vec());
        assert_eq!(filled["all"][4].current, 1.0);
    }
}
