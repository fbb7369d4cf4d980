use chrono::{TimeDelta, Utc};
use sqlx::SqlitePool;
use tracing::warn;

use crate::{
    dao::{Table, count_rows, parking::ParkingDao, trends::TrendsDao},
    model::{
        apperror::ApplicationError,
        models::{AnalyticsSummaryOutputType, HealthOutputType, round_one_decimal},
    },
    service::acquire,
};

/**
 * Keeps a field's value, or logs the failure and reports the field as missing.
 */
fn degrade<T>(field: &str, result: Result<T, ApplicationError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(field, "Analytics field unavailable: {err}");
            None
        }
    }
}

/**
 * Represents the service for the dashboard snapshot and the health check.
 */
pub struct AnalyticsService {
    trends_dao: TrendsDao,
    parking_dao: ParkingDao,
    connection_pool: SqlitePool,
}

impl AnalyticsService {
    pub fn new(trends_dao: TrendsDao, parking_dao: ParkingDao, connection_pool: SqlitePool) -> Self {
        AnalyticsService { trends_dao, parking_dao, connection_pool }
    }

    /**
     * Collects the dashboard snapshot. Never fails: each metric that cannot be read is reported as `None`.
     */
    pub async fn get_summary(&self) -> AnalyticsSummaryOutputType {
        let now = Utc::now();
        let mut summary = AnalyticsSummaryOutputType { latest_population: None, latest_congestion: None, total_zones: None, avg_occupancy_24h: None, last_updated: now };
        let Some(mut connection) = degrade("connection", acquire(&self.connection_pool).await) else {
            return summary;
        };
        summary.latest_population = degrade("population", self.trends_dao.get_latest_population(&mut connection).await).flatten();
        summary.latest_congestion = degrade("congestion", self.trends_dao.get_latest_congestion(&mut connection).await).flatten();
        summary.total_zones = degrade("total_zones", self.parking_dao.count_active_zones(&mut connection).await);
        let cutoff = (now - TimeDelta::hours(24)).timestamp();
        summary.avg_occupancy_24h = degrade("avg_occupancy_24h", self.parking_dao.get_average_occupancy(&mut connection, cutoff).await).flatten().map(round_one_decimal);
        summary
    }

    /**
     * Checks storage connectivity and reports the sizes of the core tables.
     */
    pub async fn get_health(&self) -> HealthOutputType {
        let timestamp = Utc::now();
        match self.count_core_tables().await {
            Ok((population_trends, parking_zones)) => HealthOutputType::Healthy { population_trends, parking_zones, timestamp },
            Err(err) => {
                warn!("Health check failed: {err}");
                HealthOutputType::Unhealthy { error: err.message, timestamp }
            }
        }
    }

    async fn count_core_tables(&self) -> Result<(i64, i64), ApplicationError> {
        let mut connection = acquire(&self.connection_pool).await?;
        let population_trends = count_rows(&mut connection, Table::PopulationTrends).await?;
        let parking_zones = count_rows(&mut connection, Table::ParkingZones).await?;
        Ok((population_trends, parking_zones))
    }
}
