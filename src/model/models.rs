use std::str::FromStr;

use chrono::{DateTime, TimeDelta, Utc};

use crate::model::apperror::{ApplicationError, ErrorType};

/**
 * Rounds to one decimal place, the precision every metric is reported with.
 */
pub fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/**
 * Occupancy percentage derived from the raw space counts. `None` when the zone has no capacity.
 */
#[allow(clippy::cast_precision_loss)]
pub fn occupancy_rate(occupied_spaces: i64, total_spaces: i64) -> Option<f64> {
    if total_spaces <= 0 {
        return None;
    }
    Some(round_one_decimal(occupied_spaces as f64 * 100.0 / total_spaces as f64))
}

/**
 * Converts a stored unix timestamp into a UTC datetime.
 */
pub fn from_epoch_seconds(seconds: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(seconds, 0).unwrap_or_default()
}

/***************** Trend models *********************/

/**
 * The trend series that can be queried.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrendKind {
    Population,
    Congestion,
    CarOwnership,
    Combined,
}

impl TrendKind {
    /**
     * Name reported as `data_type` in trend responses.
     */
    pub fn data_type(self) -> &'static str {
        match self {
            TrendKind::Population => "population",
            TrendKind::Congestion => "congestion",
            TrendKind::CarOwnership => "car_ownership",
            TrendKind::Combined => "combined",
        }
    }

    /**
     * Human readable name used in not found messages.
     */
    pub fn description(self) -> &'static str {
        match self {
            TrendKind::Population => "population",
            TrendKind::Congestion => "congestion",
            TrendKind::CarOwnership => "car ownership",
            TrendKind::Combined => "combined",
        }
    }
}

impl FromStr for TrendKind {
    type Err = ApplicationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "population" => Ok(TrendKind::Population),
            "congestion" => Ok(TrendKind::Congestion),
            "car-ownership" => Ok(TrendKind::CarOwnership),
            "combined" => Ok(TrendKind::Combined),
            other => Err(ApplicationError::new(
                ErrorType::Validation,
                format!("Invalid trend type '{other}'. Expected one of population, congestion, car-ownership, combined"),
            )),
        }
    }
}

/**
 * Inclusive year bounds for trend queries. A missing bound is open.
 */
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct YearRangeInput {
    pub start_year: Option<i64>,
    pub end_year: Option<i64>,
}

impl YearRangeInput {
    /**
     * Range covering every year.
     */
    pub fn all() -> Self {
        YearRangeInput::default()
    }

    pub fn validate(self) -> Result<Self, ApplicationError> {
        if let (Some(start_year), Some(end_year)) = (self.start_year, self.end_year) {
            if start_year > end_year {
                return Err(ApplicationError::new(ErrorType::Validation, format!("start_year ({start_year}) must not be greater than end_year ({end_year})")));
            }
        }
        Ok(self)
    }
}

pub struct PopulationRecordType {
    pub year: i64,
    pub population: i64,
}

impl From<(i64, i64)> for PopulationRecordType {
    fn from((year, population): (i64, i64)) -> Self {
        PopulationRecordType { year, population }
    }
}

pub struct CongestionRecordType {
    pub year: i64,
    pub congestion_index: f64,
}

impl From<(i64, f64)> for CongestionRecordType {
    fn from((year, congestion_index): (i64, f64)) -> Self {
        CongestionRecordType { year, congestion_index }
    }
}

pub struct CarOwnershipRecordType {
    pub year: i64,
    pub cars_per_100_households: f64,
}

impl From<(i64, f64)> for CarOwnershipRecordType {
    fn from((year, cars_per_100_households): (i64, f64)) -> Self {
        CarOwnershipRecordType { year, cars_per_100_households }
    }
}

/**
 * One year of a trend series. Only the metrics of the queried series are set.
 */
#[derive(Debug, Clone, PartialEq)]
pub struct TrendPointType {
    pub year: i64,
    /**
     * Population in thousands.
     */
    pub population: Option<f64>,
    pub congestion: Option<f64>,
    pub car: Option<f64>,
}

/**
 * A year ordered trend series.
 */
#[derive(Debug)]
pub struct TrendSeriesOutputType {
    pub kind: TrendKind,
    pub points: Vec<TrendPointType>,
}

impl TrendSeriesOutputType {
    pub fn new(kind: TrendKind, points: Vec<TrendPointType>) -> Self {
        TrendSeriesOutputType { kind, points }
    }

    /**
     * The covered years formatted as `first–last`.
     */
    pub fn date_range(&self) -> String {
        match (self.points.first(), self.points.last()) {
            (Some(first), Some(last)) => format!("{}–{}", first.year, last.year),
            _ => "No data".to_string(),
        }
    }
}

#[derive(Debug)]
pub struct YearsOutputType {
    pub years: Vec<i64>,
}

/***************** Parking models *********************/

/**
 * An active zone with the occupancy of its most recent usage sample.
 */
#[derive(Debug)]
pub struct ZoneOverviewType {
    pub id: i64,
    pub zone_name: String,
    pub zone_code: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub total_spaces: i64,
    pub hourly_rate: f64,
    pub current_occupancy: Option<f64>,
}

/**
 * Database response type for the active zones query. The last two columns are the counts of the latest sample.
 */
pub type QueryZoneOverviewDbResp = (i64, String, String, Option<f64>, Option<f64>, i64, f64, Option<i64>, Option<i64>);

impl From<QueryZoneOverviewDbResp> for ZoneOverviewType {
    fn from((id, zone_name, zone_code, latitude, longitude, total_spaces, hourly_rate, occupied, sampled_total): QueryZoneOverviewDbResp) -> Self {
        let current_occupancy = occupied.zip(sampled_total).and_then(|(occupied, total)| occupancy_rate(occupied, total));
        ZoneOverviewType { id, zone_name, zone_code, latitude, longitude, total_spaces, hourly_rate, current_occupancy }
    }
}

#[derive(Debug)]
pub struct ZoneType {
    pub id: i64,
    pub zone_name: String,
    pub zone_code: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub total_spaces: i64,
    pub hourly_rate: f64,
    pub max_duration_hours: Option<i64>,
}

pub type QueryZoneDbResp = (i64, String, String, Option<f64>, Option<f64>, i64, f64, Option<i64>);

impl From<QueryZoneDbResp> for ZoneType {
    fn from((id, zone_name, zone_code, latitude, longitude, total_spaces, hourly_rate, max_duration_hours): QueryZoneDbResp) -> Self {
        ZoneType { id, zone_name, zone_code, latitude, longitude, total_spaces, hourly_rate, max_duration_hours }
    }
}

#[derive(Debug)]
pub struct UsageSampleType {
    pub timestamp: DateTime<Utc>,
    pub occupied_spaces: i64,
    pub total_spaces: i64,
    pub occupancy_rate: Option<f64>,
}

impl From<(i64, i64, i64)> for UsageSampleType {
    fn from((timestamp, occupied_spaces, total_spaces): (i64, i64, i64)) -> Self {
        UsageSampleType { timestamp: from_epoch_seconds(timestamp), occupied_spaces, total_spaces, occupancy_rate: occupancy_rate(occupied_spaces, total_spaces) }
    }
}

/**
 * Zone attributes with its latest usage samples, newest first.
 */
#[derive(Debug)]
pub struct ZoneDetailOutputType {
    pub zone: ZoneType,
    pub recent_usage: Vec<UsageSampleType>,
}

/**
 * A usage sample joined with the name of its zone.
 */
#[derive(Debug)]
pub struct LiveUsageType {
    pub timestamp: DateTime<Utc>,
    pub zone_name: String,
    pub occupied_spaces: i64,
    pub total_spaces: i64,
    pub occupancy_rate: Option<f64>,
}

impl From<(i64, String, i64, i64)> for LiveUsageType {
    fn from((timestamp, zone_name, occupied_spaces, total_spaces): (i64, String, i64, i64)) -> Self {
        LiveUsageType { timestamp: from_epoch_seconds(timestamp), zone_name, occupied_spaces, total_spaces, occupancy_rate: occupancy_rate(occupied_spaces, total_spaces) }
    }
}

/**
 * Trailing window for live usage queries.
 */
#[derive(Debug, Clone, Copy)]
pub struct LiveWindowInput {
    pub hours_back: i64,
}

impl LiveWindowInput {
    pub const DEFAULT_HOURS_BACK: i64 = 24;
    pub const MAX_ROWS: i64 = 100;

    pub fn new(hours_back: Option<i64>) -> Self {
        LiveWindowInput { hours_back: hours_back.unwrap_or(Self::DEFAULT_HOURS_BACK) }
    }

    /**
     * Resolves the window into the earliest timestamp, in epoch seconds, that falls inside it.
     */
    pub fn cutoff(self, now: DateTime<Utc>) -> Result<i64, ApplicationError> {
        if self.hours_back < 0 {
            return Err(ApplicationError::new(ErrorType::Validation, format!("hours_back must not be negative, got {}", self.hours_back)));
        }
        TimeDelta::try_hours(self.hours_back)
            .and_then(|window| now.checked_sub_signed(window))
            .map(|cutoff| cutoff.timestamp())
            .ok_or_else(|| ApplicationError::new(ErrorType::Validation, format!("hours_back {} is out of range", self.hours_back)))
    }
}

/***************** Environmental models *********************/

#[derive(Debug)]
pub struct EnvironmentalRecordType {
    pub year: i64,
    pub month: i64,
    pub co2_emissions_tonnes: Option<f64>,
    pub air_quality_index: Option<f64>,
    pub noise_level_db: Option<f64>,
    pub green_transport_percentage: Option<f64>,
}

pub type QueryEnvironmentalDbResp = (i64, i64, Option<f64>, Option<f64>, Option<f64>, Option<f64>);

impl From<QueryEnvironmentalDbResp> for EnvironmentalRecordType {
    fn from((year, month, co2_emissions_tonnes, air_quality_index, noise_level_db, green_transport_percentage): QueryEnvironmentalDbResp) -> Self {
        EnvironmentalRecordType { year, month, co2_emissions_tonnes, air_quality_index, noise_level_db, green_transport_percentage }
    }
}

/***************** Analytics models *********************/

/**
 * Dashboard snapshot. Every field is collected independently and is `None` when unavailable.
 */
pub struct AnalyticsSummaryOutputType {
    pub latest_population: Option<PopulationRecordType>,
    pub latest_congestion: Option<CongestionRecordType>,
    pub total_zones: Option<i64>,
    pub avg_occupancy_24h: Option<f64>,
    pub last_updated: DateTime<Utc>,
}

/**
 * Result of the storage connectivity check.
 */
pub enum HealthOutputType {
    Healthy { population_trends: i64, parking_zones: i64, timestamp: DateTime<Utc> },
    Unhealthy { error: String, timestamp: DateTime<Utc> },
}

/***************** Seed models *********************/

pub struct CongestionAddInputType {
    pub year: i64,
    pub congestion_index: f64,
    pub average_speed_kmh: f64,
    pub peak_hour_delay_minutes: f64,
}

pub struct CarOwnershipAddInputType {
    pub year: i64,
    pub cars_per_100_households: f64,
    pub total_registered_vehicles: i64,
}

pub struct ZoneAddInputType {
    pub zone_name: &'static str,
    pub zone_code: &'static str,
    pub latitude: f64,
    pub longitude: f64,
    pub total_spaces: i64,
    pub hourly_rate: f64,
    pub max_duration_hours: i64,
}

#[derive(Debug)]
pub struct UsageAddInputType {
    pub zone_id: i64,
    pub timestamp: DateTime<Utc>,
    pub occupied_spaces: i64,
    pub total_spaces: i64,
    pub hour_of_day: i64,
    pub day_of_week: i64,
}

pub struct EnvironmentalAddInputType {
    pub year: i64,
    pub month: i64,
    pub co2_emissions_tonnes: f64,
    pub air_quality_index: f64,
    pub noise_level_db: f64,
    pub green_transport_percentage: f64,
}

/**
 * Rows inserted by one seeding run and the resulting table sizes.
 */
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SeedOutputType {
    pub inserted: TableCounts,
    pub totals: TableCounts,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TableCounts {
    pub population_trends: u64,
    pub congestion_trends: u64,
    pub car_ownership_trends: u64,
    pub parking_zones: u64,
    pub parking_usage: u64,
    pub environmental_data: u64,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_round_one_decimal() {
        assert!((round_one_decimal(55.399) - 55.4).abs() < f64::EPSILON);
        assert!((round_one_decimal(170.78) - 170.8).abs() < f64::EPSILON);
        assert!((round_one_decimal(-1.04) + 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_occupancy_rate() {
        assert_eq!(occupancy_rate(75, 150), Some(50.0));
        assert_eq!(occupancy_rate(1, 3), Some(33.3));
        assert_eq!(occupancy_rate(10, 0), None);
    }

    #[test]
    fn test_trend_kind_from_str() {
        assert_eq!(TrendKind::from_str("population").unwrap(), TrendKind::Population);
        assert_eq!(TrendKind::from_str("car-ownership").unwrap(), TrendKind::CarOwnership);
        assert_eq!(TrendKind::CarOwnership.data_type(), "car_ownership");
        let err = TrendKind::from_str("weather").unwrap_err();
        assert_eq!(err.error_type, ErrorType::Validation);
    }

    #[test]
    fn test_year_range_validation() {
        assert!(YearRangeInput { start_year: Some(2010), end_year: Some(2010) }.validate().is_ok());
        assert!(YearRangeInput { start_year: Some(2010), end_year: None }.validate().is_ok());
        let err = YearRangeInput { start_year: Some(2015), end_year: Some(2010) }.validate().unwrap_err();
        assert_eq!(err.error_type, ErrorType::Validation);
    }

    #[test]
    fn test_date_range() {
        let point = |year| TrendPointType { year, population: None, congestion: Some(1.0), car: None };
        let series = TrendSeriesOutputType::new(TrendKind::Congestion, vec![point(2001), point(2002), point(2021)]);
        assert_eq!(series.date_range(), "2001–2021");
        assert_eq!(TrendSeriesOutputType::new(TrendKind::Combined, vec![]).date_range(), "No data");
    }

    #[test]
    fn test_live_window_cutoff() {
        let now = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        assert_eq!(LiveWindowInput::new(None).cutoff(now).unwrap(), 1_700_000_000 - 24 * 3600);
        assert_eq!(LiveWindowInput::new(Some(1)).cutoff(now).unwrap(), 1_700_000_000 - 3600);
        assert_eq!(LiveWindowInput::new(Some(-1)).cutoff(now).unwrap_err().error_type, ErrorType::Validation);
        assert_eq!(LiveWindowInput::new(Some(i64::MAX)).cutoff(now).unwrap_err().error_type, ErrorType::Validation);
    }
}
