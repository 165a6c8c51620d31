use chrono::{Datelike, Duration, Months, NaiveDate};
use serde::Serialize;

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PeriodType {
    Day,
    #[default]
    Month,
    Year,
}

impl PeriodType {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "day" => Some(Self::Day),
            "month" => Some(Self::Month),
            "year" => Some(Self::Year),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Day => "Day",
            Self::Month => "Month",
            Self::Year => "Year",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewType {
    #[default]
    Actual,
    Otb,
    Projected,
}

impl ViewType {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "actual" => Some(Self::Actual),
            "otb" => Some(Self::Otb),
            "projected" => Some(Self::Projected),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Actual => "Actual",
            Self::Otb => "OTB",
            Self::Projected => "Projected",
        }
    }
}

/// How comparison dates are derived from the current window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
    /// Same month/day one year earlier.
    Calendar,
    /// One year earlier, then moved to the nearest date with the same weekday.
    DayOfWeek,
}

/// Which date drives SCD validity filtering on the comparison side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusinessDateSource {
    /// The comparison window's start date.
    Otb,
    /// The current business date, reused verbatim.
    Mirrored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComparisonMode {
    pub alignment: Alignment,
    pub business_date_source: BusinessDateSource,
}

impl Default for ComparisonMode {
    fn default() -> Self {
        Self {
            alignment: Alignment::Calendar,
            business_date_source: BusinessDateSource::Otb,
        }
    }
}

impl ComparisonMode {
    /// Decodes dashboard labels such as `Last year - OTB` or
    /// `Last year (match day of week) - Actual`.
    pub fn from_label(label: &str) -> Option<Self> {
        let normalized = label.trim().to_ascii_lowercase();
        if !normalized.starts_with("last year") {
            return None;
        }
        let alignment = if normalized.contains("match day of week") {
            Alignment::DayOfWeek
        } else {
            Alignment::Calendar
        };
        let business_date_source = if normalized.contains("- otb") {
            BusinessDateSource::Otb
        } else {
            BusinessDateSource::Mirrored
        };
        Some(Self {
            alignment,
            business_date_source,
        })
    }

    pub fn label(self) -> String {
        let base = match self.alignment {
            Alignment::Calendar => "Last year",
            Alignment::DayOfWeek => "Last year (match day of week)",
        };
        let suffix = match self.business_date_source {
            BusinessDateSource::Otb => "OTB",
            BusinessDateSource::Mirrored => "Actual",
        };
        format!("{base} - {suffix}")
    }
}

/// Inclusive occupancy-date bounds. `start > end` means the window is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OccupancyWindow {
    #[serde(rename = "start_date")]
    pub start: NaiveDate,
    #[serde(rename = "end_date")]
    pub end: NaiveDate,
}

impl OccupancyWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn is_empty(&self) -> bool {
        self.start > self.end
    }

    pub fn days(&self) -> i64 {
        if self.is_empty() {
            return 0;
        }
        (self.end - self.start).num_days() + 1
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    pub fn require_non_empty(self) -> AppResult<Self> {
        if self.is_empty() {
            return Err(AppError::InvalidPeriodConfiguration(format!(
                "Period start {} is after period end {}.",
                self.start, self.end
            )));
        }
        Ok(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ComparisonWindow {
    #[serde(flatten)]
    pub window: OccupancyWindow,
    pub business_date: NaiveDate,
}

/// Occupancy window for the current side of a report.
///
/// Custom bounds win over the period/view selection. Otherwise the calendar
/// period holding `business_date` is sliced by `view_type`; `Day` ignores the
/// view. OTB and Projected windows may come out empty when the business date
/// closes the period, and callers are expected to treat that as "no rows".
pub fn compute_current_window(
    business_date: NaiveDate,
    period_type: PeriodType,
    view_type: ViewType,
    custom: Option<OccupancyWindow>,
) -> OccupancyWindow {
    if let Some(window) = custom {
        return window;
    }
    if period_type == PeriodType::Day {
        return OccupancyWindow::new(business_date, business_date);
    }

    let (first, last) = period_bounds(business_date, period_type);
    match view_type {
        ViewType::Actual => OccupancyWindow::new(first, business_date),
        ViewType::Otb => OccupancyWindow::new(next_day(business_date), last),
        ViewType::Projected => OccupancyWindow::new(next_day(first), last),
    }
}

/// Comparison window plus the business date used for its SCD filter.
pub fn compute_comparison_window(
    current: OccupancyWindow,
    business_date: NaiveDate,
    mode: ComparisonMode,
) -> ComparisonWindow {
    let shift = |date: NaiveDate| match mode.alignment {
        Alignment::Calendar => one_year_back(date),
        Alignment::DayOfWeek => matching_weekday_last_year(date),
    };

    let start = shift(current.start);
    let mut end = shift(current.end);
    // Weekday slides can differ between the two endpoints around Feb 29.
    if current.is_empty() && start <= end {
        end = start.pred_opt().unwrap_or(start);
    }

    let business_date = match mode.business_date_source {
        BusinessDateSource::Otb => start,
        BusinessDateSource::Mirrored => business_date,
    };

    ComparisonWindow {
        window: OccupancyWindow::new(start, end),
        business_date,
    }
}

/// Same month and day one year earlier. Feb 29 lands on Feb 28.
pub fn one_year_back(date: NaiveDate) -> NaiveDate {
    date.checked_sub_months(Months::new(12)).unwrap_or(date)
}

/// Same month and day one year later. Feb 29 lands on Feb 28.
pub fn one_year_forward(date: NaiveDate) -> NaiveDate {
    date.checked_add_months(Months::new(12)).unwrap_or(date)
}

/// One year back, then slid by at most three days to restore the weekday.
pub fn matching_weekday_last_year(date: NaiveDate) -> NaiveDate {
    let shifted = one_year_back(date);
    let original = i64::from(date.weekday().num_days_from_monday());
    let target = i64::from(shifted.weekday().num_days_from_monday());
    let mut offset = (original - target).rem_euclid(7);
    if offset > 3 {
        offset -= 7;
    }
    shifted + Duration::days(offset)
}

/// Everything a report needs to know about its two sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportPeriod {
    pub business_date: NaiveDate,
    pub period_type: PeriodType,
    pub view_type: ViewType,
    pub comparison: ComparisonMode,
    pub custom_range: bool,
    pub current: OccupancyWindow,
    pub previous: ComparisonWindow,
}

impl ReportPeriod {
    pub fn resolve(
        business_date: NaiveDate,
        period_type: PeriodType,
        view_type: ViewType,
        comparison: ComparisonMode,
        custom: Option<OccupancyWindow>,
    ) -> Self {
        let current = compute_current_window(business_date, period_type, view_type, custom);
        let previous = compute_comparison_window(current, business_date, comparison);
        Self {
            business_date,
            period_type,
            view_type,
            comparison,
            custom_range: custom.is_some(),
            current,
            previous,
        }
    }

    /// Moves a comparison-side occupancy date onto the current window so both
    /// sides share a calendar sub-bucket.
    pub fn align_previous_date(&self, date: NaiveDate) -> NaiveDate {
        match self.comparison.alignment {
            Alignment::Calendar => one_year_forward(date),
            Alignment::DayOfWeek => date + (self.current.start - self.previous.window.start),
        }
    }

    /// Calendar sub-bucket of a comparison-side date.
    ///
    /// A leap day aligned onto a non-leap year keeps its own `-02-29` bucket
    /// instead of merging into Feb 28.
    pub fn previous_date_bucket(&self, date: NaiveDate) -> String {
        let aligned = self.align_previous_date(date);
        let leap_day = date.month() == 2 && date.day() == 29;
        if self.comparison.alignment == Alignment::Calendar && leap_day && aligned.day() == 28 {
            return format!("{:04}-02-29", aligned.year());
        }
        aligned.to_string()
    }
}

fn period_bounds(date: NaiveDate, period_type: PeriodType) -> (NaiveDate, NaiveDate) {
    match period_type {
        PeriodType::Day => (date, date),
        PeriodType::Month => {
            let first = date.with_day(1).unwrap_or(date);
            let last = first
                .checked_add_months(Months::new(1))
                .and_then(|next| next.pred_opt())
                .unwrap_or(date);
            (first, last)
        }
        PeriodType::Year => {
            let first = date.with_ordinal(1).unwrap_or(date);
            let last = NaiveDate::from_ymd_opt(date.year(), 12, 31).unwrap_or(date);
            (first, last)
        }
    }
}

fn next_day(date: NaiveDate) -> NaiveDate {
    date.succ_opt().unwrap_or(date)
}
