use std::collections::BTreeMap;

use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    apperror::{ApplicationError, ErrorType},
    models::{
        AnalyticsSummaryOutputType, EnvironmentalRecordType, HealthOutputType, LiveUsageType, TrendPointType, TrendSeriesOutputType, UsageSampleType, YearRangeInput,
        YearsOutputType, ZoneDetailOutputType, ZoneOverviewType,
    },
};

/**
 * Name reported by the root and health endpoints.
 */
pub const SERVICE_NAME: &str = "melbourne-parking-api";

/***************** Trends models *********************/

/**
 * Query parameters for the ranged trend endpoint. Both bounds are inclusive and optional.
 */
#[derive(Debug, Deserialize)]
pub struct RangeQuery {
    pub start_year: Option<i64>,
    pub end_year: Option<i64>,
}

impl From<RangeQuery> for YearRangeInput {
    fn from(query: RangeQuery) -> Self {
        YearRangeInput { start_year: query.start_year, end_year: query.end_year }
    }
}

/**
 * Response structure for every trend series.
 */
#[derive(Debug, Serialize, Deserialize)]
pub struct TrendsResponse {
    pub data: Vec<TrendData>,
    pub total_records: usize,
    pub data_type: String,
    /**
     * First and last year joined by an en dash.
     */
    pub date_range: String,
}

impl From<TrendSeriesOutputType> for TrendsResponse {
    fn from(output: TrendSeriesOutputType) -> Self {
        let date_range = output.date_range();
        let data_type = output.kind.data_type().to_string();
        let data: Vec<TrendData> = output.points.into_iter().map(TrendData::from).collect();
        TrendsResponse { total_records: data.len(), data, data_type, date_range }
    }
}

/**
 * One year of a trend series. Metrics that do not belong to the series are left out.
 */
#[derive(Debug, Serialize, Deserialize)]
pub struct TrendData {
    /**
     * The year as a string, e.g. "2001".
     */
    pub year: String,
    /**
     * Population in thousands.
     */
    #[serde(skip_serializing_if = "Option::is_none")]
    pub population: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub congestion: Option<f64>,
    /**
     * Cars per 100 households.
     */
    #[serde(skip_serializing_if = "Option::is_none")]
    pub car: Option<f64>,
}

impl From<TrendPointType> for TrendData {
    fn from(point: TrendPointType) -> Self {
        TrendData { year: point.year.to_string(), population: point.population, congestion: point.congestion, car: point.car }
    }
}

#[derive(Debug, Serialize)]
pub struct YearsResponse {
    pub years: Vec<i64>,
    pub start_year: Option<i64>,
    pub end_year: Option<i64>,
    pub total_years: usize,
}

impl From<YearsOutputType> for YearsResponse {
    fn from(output: YearsOutputType) -> Self {
        YearsResponse { start_year: output.years.first().copied(), end_year: output.years.last().copied(), total_years: output.years.len(), years: output.years }
    }
}

/***************** Parking models *********************/

/**
 * An active zone with the occupancy of its latest sample.
 */
#[derive(Debug, Serialize)]
pub struct ParkingZoneInfo {
    pub id: i64,
    pub zone_name: String,
    pub zone_code: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub total_spaces: i64,
    pub hourly_rate: f64,
    pub current_occupancy: Option<f64>,
}

impl From<ZoneOverviewType> for ParkingZoneInfo {
    fn from(zone: ZoneOverviewType) -> Self {
        ParkingZoneInfo {
            id: zone.id,
            zone_name: zone.zone_name,
            zone_code: zone.zone_code,
            latitude: zone.latitude,
            longitude: zone.longitude,
            total_spaces: zone.total_spaces,
            hourly_rate: zone.hourly_rate,
            current_occupancy: zone.current_occupancy,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ZoneDetailResponse {
    pub zone_info: ZoneInfo,
    /**
     * Latest samples, newest first.
     */
    pub recent_usage: Vec<RecentUsage>,
}

#[derive(Debug, Serialize)]
pub struct ZoneInfo {
    pub id: i64,
    pub name: String,
    pub code: String,
    pub location: Location,
    pub total_spaces: i64,
    pub hourly_rate: f64,
    pub max_duration_hours: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct Location {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct RecentUsage {
    pub timestamp: DateTime<Utc>,
    pub occupancy_rate: Option<f64>,
    pub occupied_spaces: i64,
}

impl From<UsageSampleType> for RecentUsage {
    fn from(sample: UsageSampleType) -> Self {
        RecentUsage { timestamp: sample.timestamp, occupancy_rate: sample.occupancy_rate, occupied_spaces: sample.occupied_spaces }
    }
}

impl From<ZoneDetailOutputType> for ZoneDetailResponse {
    fn from(output: ZoneDetailOutputType) -> Self {
        let zone = output.zone;
        ZoneDetailResponse {
            zone_info: ZoneInfo {
                id: zone.id,
                name: zone.zone_name,
                code: zone.zone_code,
                location: Location { lat: zone.latitude, lng: zone.longitude },
                total_spaces: zone.total_spaces,
                hourly_rate: zone.hourly_rate,
                max_duration_hours: zone.max_duration_hours,
            },
            recent_usage: output.recent_usage.into_iter().map(RecentUsage::from).collect(),
        }
    }
}

/**
 * Query parameters for live usage.
 */
#[derive(Debug, Deserialize)]
pub struct LiveQuery {
    pub hours_back: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ParkingUsageData {
    pub timestamp: DateTime<Utc>,
    pub zone_name: String,
    pub occupied_spaces: i64,
    pub total_spaces: i64,
    pub occupancy_rate: Option<f64>,
}

impl From<LiveUsageType> for ParkingUsageData {
    fn from(usage: LiveUsageType) -> Self {
        ParkingUsageData { timestamp: usage.timestamp, zone_name: usage.zone_name, occupied_spaces: usage.occupied_spaces, total_spaces: usage.total_spaces, occupancy_rate: usage.occupancy_rate }
    }
}

/***************** Environmental models *********************/

#[derive(Debug, Deserialize)]
pub struct EnvironmentalQuery {
    pub year: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct EnvironmentalMetrics {
    pub year: i64,
    pub month: i64,
    pub co2_emissions_tonnes: Option<f64>,
    pub air_quality_index: Option<f64>,
    pub noise_level_db: Option<f64>,
    pub green_transport_percentage: Option<f64>,
}

impl From<EnvironmentalRecordType> for EnvironmentalMetrics {
    fn from(record: EnvironmentalRecordType) -> Self {
        EnvironmentalMetrics {
            year: record.year,
            month: record.month,
            co2_emissions_tonnes: record.co2_emissions_tonnes,
            air_quality_index: record.air_quality_index,
            noise_level_db: record.noise_level_db,
            green_transport_percentage: record.green_transport_percentage,
        }
    }
}

/***************** Analytics models *********************/

/**
 * Dashboard snapshot. Every leaf is null when it could not be read.
 */
#[derive(Debug, Serialize)]
pub struct AnalyticsSummaryResponse {
    pub population: PopulationSummary,
    pub congestion: CongestionSummary,
    pub parking: ParkingSummary,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct PopulationSummary {
    pub current: Option<i64>,
    pub year: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct CongestionSummary {
    pub current_index: Option<f64>,
    pub year: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ParkingSummary {
    pub total_zones: Option<i64>,
    pub avg_occupancy_24h: Option<f64>,
}

impl From<AnalyticsSummaryOutputType> for AnalyticsSummaryResponse {
    fn from(output: AnalyticsSummaryOutputType) -> Self {
        let (current, population_year) = output.latest_population.map_or((None, None), |record| (Some(record.population), Some(record.year)));
        let (current_index, congestion_year) = output.latest_congestion.map_or((None, None), |record| (Some(record.congestion_index), Some(record.year)));
        AnalyticsSummaryResponse {
            population: PopulationSummary { current, year: population_year },
            congestion: CongestionSummary { current_index, year: congestion_year },
            parking: ParkingSummary { total_zones: output.total_zones, avg_occupancy_24h: output.avg_occupancy_24h },
            last_updated: output.last_updated,
        }
    }
}

/***************** Service models *********************/

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub database: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_records: Option<DataRecords>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct DataRecords {
    pub population_trends: i64,
    pub parking_zones: i64,
}

impl HealthResponse {
    pub fn is_healthy(&self) -> bool {
        self.error.is_none()
    }
}

impl From<HealthOutputType> for HealthResponse {
    fn from(output: HealthOutputType) -> Self {
        match output {
            HealthOutputType::Healthy { population_trends, parking_zones, timestamp } => HealthResponse {
                status: "healthy",
                service: SERVICE_NAME,
                database: "connected",
                data_records: Some(DataRecords { population_trends, parking_zones }),
                error: None,
                timestamp,
            },
            HealthOutputType::Unhealthy { error, timestamp } => {
                HealthResponse { status: "unhealthy", service: SERVICE_NAME, database: "disconnected", data_records: None, error: Some(error), timestamp }
            }
        }
    }
}

/**
 * Service metadata and an index of the public endpoints.
 */
#[derive(Debug, Serialize)]
pub struct RootResponse {
    pub message: &'static str,
    pub database: &'static str,
    pub status: &'static str,
    pub endpoints: BTreeMap<&'static str, &'static str>,
}

impl Default for RootResponse {
    fn default() -> Self {
        RootResponse {
            message: "Melbourne CBD Parking System API",
            database: "SQLite",
            status: "operational",
            endpoints: BTreeMap::from([
                ("population_trends", "/api/trends/population"),
                ("congestion_trends", "/api/trends/congestion"),
                ("car_ownership_trends", "/api/trends/car-ownership"),
                ("combined_trends", "/api/trends/combined"),
                ("trend_range", "/api/trends/{type}/range"),
                ("trend_years", "/api/trends/years"),
                ("parking_zones", "/api/parking/zones"),
                ("live_parking", "/api/parking/live"),
                ("environmental", "/api/environmental"),
                ("analytics_summary", "/api/analytics/summary"),
                ("metrics", "/metrics"),
            ]),
        }
    }
}

/***************** Error models *********************/

/**
 * Custom error response for the application.
 */
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /**
     * The error code associated with the error type.
     */
    pub code: u16,
    /**
     * A human-readable message describing the error.
     */
    pub message: String,
}

impl ResponseError for ApplicationError {
    fn status_code(&self) -> StatusCode {
        get_statuscode(&self.error_type)
    }

    /**
     * Generates an error response for the application error.
     */
    fn error_response(&self) -> HttpResponse {
        let error_response = ErrorResponse { code: get_error_code(&self.error_type), message: self.message.clone() };
        HttpResponse::build(get_statuscode(&self.error_type)).json(&error_response)
    }
}

/**
* Maps application errors to HTTP status codes.
*
* # Arguments
* `application_error`: The type of error that occurred.
*
* # Returns
* The corresponding HTTP status code.
*/
fn get_statuscode(application_error: &ErrorType) -> StatusCode {
    match application_error {
        ErrorType::Initialization | ErrorType::DatabaseError => StatusCode::INTERNAL_SERVER_ERROR,
        ErrorType::NotFound => StatusCode::NOT_FOUND,
        ErrorType::Validation => StatusCode::BAD_REQUEST,
    }
}

/**
 * Maps application errors to error codes.
 *
 * # Arguments
 * `application_error`: The type of error that occurred.
 *
 * # Returns
 * The corresponding error code.
 */
fn get_error_code(application_error: &ErrorType) -> u16 {
    match application_error {
        ErrorType::Initialization => 1001,
        ErrorType::DatabaseError => 1003,
        ErrorType::NotFound => 1004,
        ErrorType::Validation => 1005,
    }
}
