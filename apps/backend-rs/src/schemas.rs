use chrono::NaiveDate;
use serde::Deserialize;
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    services::period::{ComparisonMode, OccupancyWindow, PeriodType, ReportPeriod, ViewType},
};

pub fn validate_input<T: Validate>(input: &T) -> Result<(), AppError> {
    input
        .validate()
        .map_err(|errors| AppError::UnprocessableEntity(format!("Validation failed: {errors}")))
}

fn default_period_type() -> String {
    "Month".to_string()
}
fn default_view_type() -> String {
    "Actual".to_string()
}
fn default_comparison() -> String {
    "Last year - OTB".to_string()
}

/// Query string shared by every report endpoint.
#[derive(Debug, Clone, Deserialize, serde::Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ReportQuery {
    pub business_date: Option<String>,
    #[serde(default = "default_period_type")]
    #[validate(length(min = 1, max = 16))]
    pub period_type: String,
    #[serde(default = "default_view_type")]
    #[validate(length(min = 1, max = 16))]
    pub view_type: String,
    #[serde(default = "default_comparison")]
    #[validate(length(min = 1, max = 64))]
    pub comparison: String,
    pub custom_start_date: Option<String>,
    pub custom_end_date: Option<String>,
    #[validate(length(min = 1, max = 64))]
    pub property: Option<String>,
}

impl Default for ReportQuery {
    fn default() -> Self {
        Self {
            business_date: None,
            period_type: default_period_type(),
            view_type: default_view_type(),
            comparison: default_comparison(),
            custom_start_date: None,
            custom_end_date: None,
            property: None,
        }
    }
}

impl ReportQuery {
    /// Decodes the raw parameters into a fully resolved period pair.
    /// `today` stands in for a missing `businessDate`.
    pub fn resolve_period(&self, today: NaiveDate) -> AppResult<ReportPeriod> {
        let business_date = match non_empty(self.business_date.as_deref()) {
            Some(raw) => parse_date(raw)?,
            None => today,
        };

        let custom_requested = self.period_type.trim().eq_ignore_ascii_case("custom");
        let period_type = if custom_requested {
            PeriodType::default()
        } else {
            PeriodType::parse(&self.period_type).ok_or_else(|| {
                AppError::BadRequest(format!("Unknown periodType '{}'.", self.period_type))
            })?
        };
        let view_type = ViewType::parse(&self.view_type).ok_or_else(|| {
            AppError::BadRequest(format!("Unknown viewType '{}'.", self.view_type))
        })?;
        let comparison = ComparisonMode::from_label(&self.comparison).ok_or_else(|| {
            AppError::BadRequest(format!("Unknown comparison '{}'.", self.comparison))
        })?;

        let custom = match (
            non_empty(self.custom_start_date.as_deref()),
            non_empty(self.custom_end_date.as_deref()),
        ) {
            (Some(start), Some(end)) => {
                Some(OccupancyWindow::new(parse_date(start)?, parse_date(end)?).require_non_empty()?)
            }
            (None, None) if !custom_requested => None,
            _ => {
                return Err(AppError::BadRequest(
                    "Custom periods need both customStartDate and customEndDate.".to_string(),
                ))
            }
        };

        Ok(ReportPeriod::resolve(
            business_date,
            period_type,
            view_type,
            comparison,
            custom,
        ))
    }

    pub fn property_filter(&self) -> Option<&str> {
        non_empty(self.property.as_deref())
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|item| !item.is_empty())
}

fn parse_date(value: &str) -> AppResult<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| AppError::BadRequest("Invalid ISO date.".to_string()))
}
