use chrono::NaiveDate;

use crate::services::{buckets::BucketKind, period::OccupancyWindow};

/// Breakdown axis of a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    Overview,
    BookingChannel,
    MarketSegment,
    RoomType,
}

impl Dimension {
    pub fn from_slug(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "overview" => Some(Self::Overview),
            "booking-channels" => Some(Self::BookingChannel),
            "market-segments" => Some(Self::MarketSegment),
            "room-types" => Some(Self::RoomType),
            _ => None,
        }
    }

    pub fn slug(self) -> &'static str {
        match self {
            Self::Overview => "overview",
            Self::BookingChannel => "booking-channels",
            Self::MarketSegment => "market-segments",
            Self::RoomType => "room-types",
        }
    }

    /// Source column holding the dimension value; `None` for aggregate reports.
    pub fn column(self) -> Option<&'static str> {
        match self {
            Self::Overview => None,
            Self::BookingChannel => Some("booking_channel"),
            Self::MarketSegment => Some("market_group_code"),
            Self::RoomType => Some("room_type"),
        }
    }

    pub fn display_label(self, key: &str) -> String {
        if self != Self::BookingChannel {
            return key.to_string();
        }
        match key {
            "direct" => "Direct Bookings",
            "booking_com" => "Booking.com",
            "expedia" => "Expedia",
            "gds" => "GDS",
            "wholesalers" => "Wholesalers",
            other => other,
        }
        .to_string()
    }
}

/// How a row's sub-bucket is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketSource {
    /// A pre-bucketed label column.
    Column(&'static str),
    /// ISO weekday number (Monday = 1) of a date column.
    WeekdayOf(&'static str),
    /// `YYYY-MM-DD` of a date column.
    DateOf(&'static str),
    /// `YYYY-MM` of a date column.
    MonthOf(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricSpec {
    pub key: &'static str,
    pub title: &'static str,
    pub table: &'static str,
    pub value_column: &'static str,
    pub bucket: BucketSource,
    pub kind: BucketKind,
}

impl MetricSpec {
    /// Same metric bucketed by calendar month instead of by day.
    pub fn monthly(self) -> Self {
        let bucket = match self.bucket {
            BucketSource::DateOf(column) => BucketSource::MonthOf(column),
            other => other,
        };
        Self { bucket, ..self }
    }
}

pub const OCCUPANCY_DATE_COLUMN: &str = "occupancy_date";
pub const SCD_VALID_FROM_COLUMN: &str = "scd_valid_from";
pub const SCD_VALID_TO_COLUMN: &str = "scd_valid_to";
pub const PROPERTY_COLUMN: &str = "property";

pub const ROOM_INVENTORY_TABLE: &str = "room_type_details";
pub const ROOM_INVENTORY_COLUMN: &str = "physicalRooms";

pub const BOOKING_LEAD_TIME: MetricSpec = MetricSpec {
    key: "booking_lead_time",
    title: "Lead Time",
    table: "booking_lead_time",
    value_column: "booking_lead_num",
    bucket: BucketSource::Column("bucket"),
    kind: BucketKind::LeadTime,
};

pub const CANCELLATION_LEAD_TIME: MetricSpec = MetricSpec {
    key: "cancellation_lead_time",
    title: "Cancellation Lead Time",
    table: "cancellation_lead_time",
    value_column: "cancellation_lead_num",
    bucket: BucketSource::Column("bucket"),
    kind: BucketKind::CancellationLeadTime,
};

pub const LENGTH_OF_STAY: MetricSpec = MetricSpec {
    key: "length_of_stay",
    title: "Length of Stay",
    table: "lenght_of_stay_distribution",
    value_column: "num",
    bucket: BucketSource::Column("bucket"),
    kind: BucketKind::StayLength,
};

pub const OCCUPANCY_BY_WEEKDAY: MetricSpec = MetricSpec {
    key: "occupancy_by_weekday",
    title: "Occupancy by Day of Week",
    table: "insights",
    value_column: "sold_rooms",
    bucket: BucketSource::WeekdayOf("occupancy_date"),
    kind: BucketKind::Weekday,
};

pub const BOOKINGS_BY_WEEKDAY: MetricSpec = MetricSpec {
    key: "bookings_by_weekday",
    title: "Bookings by Day of Week",
    table: "insights",
    value_column: "sold_rooms",
    bucket: BucketSource::WeekdayOf("booking_date"),
    kind: BucketKind::Weekday,
};

const fn daily(key: &'static str, title: &'static str, value_column: &'static str) -> MetricSpec {
    MetricSpec {
        key,
        title,
        table: "insights",
        value_column,
        bucket: BucketSource::DateOf(OCCUPANCY_DATE_COLUMN),
        kind: BucketKind::Calendar,
    }
}

pub const ROOMS_SOLD_DAILY: MetricSpec = daily("rooms_sold", "Rooms Sold", "sold_rooms");
pub const ROOM_REVENUE_DAILY: MetricSpec = daily("room_revenue", "Room Revenue", "roomRevenue");
pub const FB_REVENUE_DAILY: MetricSpec = daily("fb_revenue", "F&B Revenue", "fbRevenue");
pub const OTHER_REVENUE_DAILY: MetricSpec =
    daily("other_revenue", "Other Revenue", "otherRevenue");
pub const TOTAL_REVENUE_DAILY: MetricSpec =
    daily("total_revenue", "Total Revenue", "totalRevenue");

pub const CANCELLED_ROOMS_DAILY: MetricSpec =
    daily("cancelled_rooms", "Cancelled Rooms", "cancelled_rooms");
pub const NO_SHOW_ROOMS_DAILY: MetricSpec = daily("no_show_rooms", "No-Show Rooms", "no_show_rooms");
pub const REVENUE_LOST_DAILY: MetricSpec =
    daily("revenue_lost", "Revenue Lost", "totalRevenue_lost");

pub const LEAD_TIME_METRICS: &[MetricSpec] = &[BOOKING_LEAD_TIME, CANCELLATION_LEAD_TIME];
pub const LENGTH_OF_STAY_METRICS: &[MetricSpec] = &[LENGTH_OF_STAY];
pub const RESERVATION_TREND_METRICS: &[MetricSpec] = &[OCCUPANCY_BY_WEEKDAY, BOOKINGS_BY_WEEKDAY];
pub const DAILY_OVERVIEW_METRICS: &[MetricSpec] = &[
    ROOMS_SOLD_DAILY,
    ROOM_REVENUE_DAILY,
    FB_REVENUE_DAILY,
    OTHER_REVENUE_DAILY,
    TOTAL_REVENUE_DAILY,
];
pub const CANCELLATION_METRICS: &[MetricSpec] =
    &[CANCELLED_ROOMS_DAILY, NO_SHOW_ROOMS_DAILY, REVENUE_LOST_DAILY];
/// Fetched per dimension key; totals are summed from the daily series.
pub const DISTRIBUTION_METRICS: &[MetricSpec] =
    &[TOTAL_REVENUE_DAILY, ROOMS_SOLD_DAILY, ROOM_REVENUE_DAILY];

/// One side of one metric fetch.
#[derive(Debug, Clone, Copy)]
pub struct BucketQuery<'a> {
    pub metric: &'a MetricSpec,
    pub dimension: Dimension,
    pub window: OccupancyWindow,
    pub business_date: NaiveDate,
    pub property: Option<&'a str>,
}
