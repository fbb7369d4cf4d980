use std::str::FromStr;

use actix_web::{
    HttpRequest, HttpResponse, get,
    web::{self, Path},
};
use tracing::{Instrument, instrument};

use crate::{
    api::{
        rest::{
            AnalyticsSummaryResponse, EnvironmentalMetrics, EnvironmentalQuery, HealthResponse, LiveQuery, ParkingUsageData, ParkingZoneInfo, RangeQuery, RootResponse, TrendsResponse,
            YearsResponse, ZoneDetailResponse,
        },
        state::AppState,
    },
    model::{
        apperror::ApplicationError,
        models::{LiveWindowInput, TrendKind, YearRangeInput},
    },
};

/**
 * Service metadata and the endpoint index.
 */
#[get("/")]
pub async fn root() -> HttpResponse {
    HttpResponse::Ok().json(RootResponse::default())
}

/**
 * Storage connectivity check. Answers 503 when the store cannot be read.
 */
#[instrument(skip(http_request, app_state), fields(service = "health", trace_id = get_trace_id(&http_request)))]
#[get("/health")]
pub async fn health(http_request: HttpRequest, app_state: web::Data<AppState>) -> HttpResponse {
    let span = tracing::Span::current();
    let response = HealthResponse::from(app_state.analytics_service.get_health().instrument(span).await);
    if response.is_healthy() { HttpResponse::Ok().json(response) } else { HttpResponse::ServiceUnavailable().json(response) }
}

/**
 * Loads a trend series and maps it to the response body.
 */
async fn trend_response(app_state: &AppState, kind: TrendKind, range: YearRangeInput) -> Result<HttpResponse, ApplicationError> {
    let span = tracing::Span::current();
    let series = app_state.trends_service.get_trend(kind, range).instrument(span).await?;
    Ok(HttpResponse::Ok().json(TrendsResponse::from(series)))
}

/**
 * Population by year, in thousands.
 */
#[instrument(skip(http_request, app_state), fields(service = "populationTrends", trace_id = get_trace_id(&http_request)))]
#[get("/api/trends/population")]
pub async fn trends_population(http_request: HttpRequest, app_state: web::Data<AppState>) -> Result<HttpResponse, ApplicationError> {
    trend_response(&app_state, TrendKind::Population, YearRangeInput::all()).await
}

#[instrument(skip(http_request, app_state), fields(service = "congestionTrends", trace_id = get_trace_id(&http_request)))]
#[get("/api/trends/congestion")]
pub async fn trends_congestion(http_request: HttpRequest, app_state: web::Data<AppState>) -> Result<HttpResponse, ApplicationError> {
    trend_response(&app_state, TrendKind::Congestion, YearRangeInput::all()).await
}

#[instrument(skip(http_request, app_state), fields(service = "carOwnershipTrends", trace_id = get_trace_id(&http_request)))]
#[get("/api/trends/car-ownership")]
pub async fn trends_car_ownership(http_request: HttpRequest, app_state: web::Data<AppState>) -> Result<HttpResponse, ApplicationError> {
    trend_response(&app_state, TrendKind::CarOwnership, YearRangeInput::all()).await
}

/**
 * Population and congestion for the years present in both series.
 */
#[instrument(skip(http_request, app_state), fields(service = "combinedTrends", trace_id = get_trace_id(&http_request)))]
#[get("/api/trends/combined")]
pub async fn trends_combined(http_request: HttpRequest, app_state: web::Data<AppState>) -> Result<HttpResponse, ApplicationError> {
    trend_response(&app_state, TrendKind::Combined, YearRangeInput::all()).await
}

/**
 * Any trend series restricted to an inclusive year range.
 */
#[instrument(skip(http_request, app_state), fields(service = "rangeTrends", trace_id = get_trace_id(&http_request)))]
#[get("/api/trends/{trendType}/range")]
pub async fn trends_range(path: Path<String>, query: web::Query<RangeQuery>, http_request: HttpRequest, app_state: web::Data<AppState>) -> Result<HttpResponse, ApplicationError> {
    let kind = TrendKind::from_str(&path.into_inner())?;
    trend_response(&app_state, kind, YearRangeInput::from(query.into_inner())).await
}

/**
 * Years with population data.
 */
#[instrument(skip(http_request, app_state), fields(service = "trendYears", trace_id = get_trace_id(&http_request)))]
#[get("/api/trends/years")]
pub async fn trends_years(http_request: HttpRequest, app_state: web::Data<AppState>) -> Result<HttpResponse, ApplicationError> {
    let span = tracing::Span::current();
    let years = app_state.trends_service.get_years().instrument(span).await?;
    Ok(HttpResponse::Ok().json(YearsResponse::from(years)))
}

/**
 * Active parking zones with their current occupancy.
 */
#[instrument(skip(http_request, app_state), fields(service = "parkingZones", trace_id = get_trace_id(&http_request)))]
#[get("/api/parking/zones")]
pub async fn parking_zones(http_request: HttpRequest, app_state: web::Data<AppState>) -> Result<HttpResponse, ApplicationError> {
    let span = tracing::Span::current();
    let zones = app_state.parking_service.get_zones().instrument(span).await?;
    Ok(HttpResponse::Ok().json(zones.into_iter().map(ParkingZoneInfo::from).collect::<Vec<_>>()))
}

#[instrument(skip(http_request, app_state), fields(service = "parkingZone", trace_id = get_trace_id(&http_request)))]
#[get("/api/parking/zones/{zoneId}")]
pub async fn parking_zone(path: Path<i64>, http_request: HttpRequest, app_state: web::Data<AppState>) -> Result<HttpResponse, ApplicationError> {
    let span = tracing::Span::current();
    let zone_id = path.into_inner();
    let detail = app_state.parking_service.get_zone_detail(zone_id).instrument(span).await?;
    Ok(HttpResponse::Ok().json(ZoneDetailResponse::from(detail)))
}

/**
 * Recent usage samples across all zones.
 */
#[instrument(skip(http_request, app_state), fields(service = "parkingLive", trace_id = get_trace_id(&http_request)))]
#[get("/api/parking/live")]
pub async fn parking_live(query: web::Query<LiveQuery>, http_request: HttpRequest, app_state: web::Data<AppState>) -> Result<HttpResponse, ApplicationError> {
    let span = tracing::Span::current();
    let window = LiveWindowInput::new(query.hours_back);
    let usage = app_state.parking_service.get_live_usage(window).instrument(span).await?;
    Ok(HttpResponse::Ok().json(usage.into_iter().map(ParkingUsageData::from).collect::<Vec<_>>()))
}

#[instrument(skip(http_request, app_state), fields(service = "environmental", trace_id = get_trace_id(&http_request)))]
#[get("/api/environmental")]
pub async fn environmental(query: web::Query<EnvironmentalQuery>, http_request: HttpRequest, app_state: web::Data<AppState>) -> Result<HttpResponse, ApplicationError> {
    let span = tracing::Span::current();
    let records = app_state.environmental_service.get_environmental(query.year).instrument(span).await?;
    Ok(HttpResponse::Ok().json(records.into_iter().map(EnvironmentalMetrics::from).collect::<Vec<_>>()))
}

/**
 * Dashboard snapshot. Always answers 200, with nulls for what could not be read.
 */
#[instrument(skip(http_request, app_state), fields(service = "analyticsSummary", trace_id = get_trace_id(&http_request)))]
#[get("/api/analytics/summary")]
pub async fn analytics_summary(http_request: HttpRequest, app_state: web::Data<AppState>) -> HttpResponse {
    let span = tracing::Span::current();
    let summary = app_state.analytics_service.get_summary().instrument(span).await;
    HttpResponse::Ok().json(AnalyticsSummaryResponse::from(summary))
}

/**
 * Registers every endpoint on a service config.
 */
pub fn configure(config: &mut web::ServiceConfig) {
    config
        .service(root)
        .service(health)
        .service(trends_population)
        .service(trends_congestion)
        .service(trends_car_ownership)
        .service(trends_combined)
        .service(trends_years)
        .service(trends_range)
        .service(parking_zones)
        .service(parking_zone)
        .service(parking_live)
        .service(environmental)
        .service(analytics_summary);
}

/**
 * Retrieves the trace ID from the HTTP request headers.
 * If the trace ID is not present, a new UUID is generated.
 */
fn get_trace_id(http_request: &HttpRequest) -> String {
    http_request.headers().get("X-Trace-ID").and_then(|v| v.to_str().ok().map(std::string::ToString::to_string)).unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

#[cfg(test)]
mod test {
    use actix_web::{
        App,
        http::StatusCode,
        test::{self, TestRequest},
    };
    use chrono::{TimeDelta, Utc};
    use serde_json::Value;
    use sqlx::SqlitePool;

    use super::*;
    use crate::{
        api::rest::ErrorResponse,
        dao::{parking::ParkingDao, test_support::init_db, trends::TrendsDao},
        model::models::{CongestionAddInputType, UsageAddInputType, ZoneAddInputType},
    };

    async fn seed_sample_data(pool: &SqlitePool) {
        let mut connection = pool.acquire().await.unwrap();
        let trends_dao = TrendsDao::new();
        for (year, population, congestion_index) in [(2001, 55399, 15.3), (2002, 60592, 17.1), (2003, 66149, 19.2)] {
            trends_dao.add_population(&mut connection, year, population).await.unwrap();
            let congestion = CongestionAddInputType { year, congestion_index, average_speed_kmh: 25.0, peak_hour_delay_minutes: 12.0 };
            trends_dao.add_congestion(&mut connection, &congestion).await.unwrap();
        }
        let parking_dao = ParkingDao::new();
        let zone = ZoneAddInputType { zone_name: "Collins Street East", zone_code: "CSE", latitude: -37.8136, longitude: 144.9631, total_spaces: 150, hourly_rate: 8.5, max_duration_hours: 4 };
        parking_dao.add_zone(&mut connection, &zone).await.unwrap();
        let usage = UsageAddInputType { zone_id: 1, timestamp: Utc::now() - TimeDelta::minutes(30), occupied_spaces: 75, total_spaces: 150, hour_of_day: 8, day_of_week: 1 };
        parking_dao.add_usage(&mut connection, &usage).await.unwrap();
    }

    async fn call(pool: &SqlitePool, uri: &str) -> (StatusCode, Value) {
        let app = test::init_service(App::new().app_data(web::Data::new(AppState::from_pool(pool))).configure(configure)).await;
        let response = test::call_service(&app, TestRequest::get().uri(uri).to_request()).await;
        let status = response.status();
        let body: Value = test::read_body_json(response).await;
        (status, body)
    }

    #[actix_web::test]
    async fn test_get_trace_id_exists() {
        let request = TestRequest::default().insert_header(("X-Trace-ID", "test")).to_http_request();
        let trace_id = get_trace_id(&request);
        assert_eq!(trace_id, "test");
    }

    #[actix_web::test]
    async fn test_get_trace_id_not_exists() {
        let request = TestRequest::default().to_http_request();
        let trace_id = get_trace_id(&request);
        assert!(!trace_id.is_empty());
    }

    #[actix_web::test]
    async fn test_combined_trend() {
        let pool = init_db().await;
        seed_sample_data(&pool).await;
        let (status, body) = call(&pool, "/api/trends/combined").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total_records"], 3);
        assert_eq!(body["data_type"], "combined");
        assert_eq!(body["date_range"], "2001–2003");
        assert_eq!(body["data"][0]["population"], 55.4);
        assert_eq!(body["data"][0]["congestion"], 15.3);
    }

    #[actix_web::test]
    async fn test_range_filters_years() {
        let pool = init_db().await;
        seed_sample_data(&pool).await;
        let (status, body) = call(&pool, "/api/trends/population/range?start_year=2002").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total_records"], 2);
        assert_eq!(body["data"][0]["year"], "2002");
    }

    #[actix_web::test]
    async fn test_range_rejects_inverted_bounds() {
        let pool = init_db().await;
        seed_sample_data(&pool).await;
        for trend_type in ["population", "congestion", "car-ownership", "combined"] {
            let (status, body) = call(&pool, &format!("/api/trends/{trend_type}/range?start_year=2010&end_year=2005")).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            let error: ErrorResponse = serde_json::from_value(body).unwrap();
            assert_eq!(error.code, 1005);
        }
    }

    #[actix_web::test]
    async fn test_range_rejects_unknown_type() {
        let pool = init_db().await;
        let (status, _) = call(&pool, "/api/trends/weather/range").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_empty_trend_not_found() {
        let pool = init_db().await;
        let (status, body) = call(&pool, "/api/trends/car-ownership").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], 1004);
    }

    #[actix_web::test]
    async fn test_years() {
        let pool = init_db().await;
        seed_sample_data(&pool).await;
        let (status, body) = call(&pool, "/api/trends/years").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["start_year"], 2001);
        assert_eq!(body["end_year"], 2003);
        assert_eq!(body["total_years"], 3);
    }

    #[actix_web::test]
    async fn test_parking_endpoints() {
        let pool = init_db().await;
        seed_sample_data(&pool).await;
        let (status, body) = call(&pool, "/api/parking/zones").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["zone_code"], "CSE");
        assert_eq!(body[0]["current_occupancy"], 50.0);

        let (status, body) = call(&pool, "/api/parking/zones/1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["zone_info"]["location"]["lat"], -37.8136);
        assert_eq!(body["recent_usage"][0]["occupied_spaces"], 75);

        let (status, _) = call(&pool, "/api/parking/zones/42").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = call(&pool, "/api/parking/live?hours_back=1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().map(Vec::len), Some(1));
        assert_eq!(body[0]["zone_name"], "Collins Street East");

        let (status, _) = call(&pool, "/api/parking/live?hours_back=-1").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_environmental_empty_list() {
        let pool = init_db().await;
        let (status, body) = call(&pool, "/api/environmental?year=2019").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().map(Vec::len), Some(0));
    }

    #[actix_web::test]
    async fn test_summary_and_health() {
        let pool = init_db().await;
        let (status, body) = call(&pool, "/api/analytics/summary").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["population"]["current"].is_null());
        assert_eq!(body["parking"]["total_zones"], 0);

        let (status, body) = call(&pool, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["data_records"]["parking_zones"], 0);

        pool.close().await;
        let (status, body) = call(&pool, "/health").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["database"], "disconnected");
    }
}
