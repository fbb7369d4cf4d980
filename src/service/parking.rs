use chrono::Utc;
use sqlx::SqlitePool;

use crate::{
    dao::parking::ParkingDao,
    model::{
        apperror::{ApplicationError, ErrorType},
        models::{LiveUsageType, LiveWindowInput, ZoneDetailOutputType, ZoneOverviewType},
    },
    service::acquire,
};

/**
 * Number of usage samples returned with a zone's details.
 */
const RECENT_USAGE_LIMIT: i64 = 24;

/**
 * Represents the service for parking zones and occupancy.
 */
pub struct ParkingService {
    /**
     * The DAO for parking operations.
     */
    parking_dao: ParkingDao,
    /**
     * Connection pool for database operations.
     */
    connection_pool: SqlitePool,
}

impl ParkingService {
    pub fn new(parking_dao: ParkingDao, connection_pool: SqlitePool) -> Self {
        ParkingService { parking_dao, connection_pool }
    }

    /**
     * Retrieves every active zone with the occupancy of its latest sample.
     */
    pub async fn get_zones(&self) -> Result<Vec<ZoneOverviewType>, ApplicationError> {
        let mut connection = acquire(&self.connection_pool).await?;
        self.parking_dao.get_active_zones(&mut connection).await
    }

    /**
     * Retrieves a zone and its most recent usage samples.
     *
     * # Arguments
     * `zone_id`: The ID of the zone.
     *
     * # Returns
     * A Result containing `ZoneDetailOutputType` or an `ApplicationError`. An unknown zone is `NotFound`.
     */
    pub async fn get_zone_detail(&self, zone_id: i64) -> Result<ZoneDetailOutputType, ApplicationError> {
        let mut connection = acquire(&self.connection_pool).await?;
        let Some(zone) = self.parking_dao.get_zone(&mut connection, zone_id).await? else {
            tracing::debug!("Parking zone with ID {} not found", zone_id);
            return Err(ApplicationError::new(ErrorType::NotFound, "Parking zone not found".to_string()));
        };
        let recent_usage = self.parking_dao.get_recent_usage(&mut connection, zone_id, RECENT_USAGE_LIMIT).await?;
        Ok(ZoneDetailOutputType { zone, recent_usage })
    }

    /**
     * Retrieves up to 100 usage samples inside the trailing window, newest first.
     *
     * # Arguments
     * `window`: How many hours back to look.
     *
     * # Returns
     * A Result containing the samples or an `ApplicationError`.
     */
    pub async fn get_live_usage(&self, window: LiveWindowInput) -> Result<Vec<LiveUsageType>, ApplicationError> {
        let cutoff = window.cutoff(Utc::now())?;
        let mut connection = acquire(&self.connection_pool).await?;
        self.parking_dao.get_live_usage(&mut connection, cutoff, LiveWindowInput::MAX_ROWS).await
    }
}

#[cfg(test)]
mod test {
    use chrono::{DateTime, TimeDelta, Utc};

    use super::*;
    use crate::{
        dao::test_support::init_db,
        model::models::{UsageAddInputType, ZoneAddInputType},
    };

    async fn service_with_zone() -> (ParkingService, SqlitePool) {
        let pool = init_db().await;
        let dao = ParkingDao::new();
        {
            let mut connection = pool.acquire().await.unwrap();
            let zone = ZoneAddInputType { zone_name: "Spring Street", zone_code: "SS", latitude: -37.8136, longitude: 144.9742, total_spaces: 90, hourly_rate: 6.5, max_duration_hours: 8 };
            dao.add_zone(&mut connection, &zone).await.unwrap();
        }
        (ParkingService::new(ParkingDao::new(), pool.clone()), pool)
    }

    async fn add_sample(pool: &SqlitePool, timestamp: DateTime<Utc>, occupied_spaces: i64) {
        let mut connection = pool.acquire().await.unwrap();
        let usage = UsageAddInputType { zone_id: 1, timestamp, occupied_spaces, total_spaces: 90, hour_of_day: 8, day_of_week: 2 };
        ParkingDao::new().add_usage(&mut connection, &usage).await.unwrap();
    }

    #[tokio::test]
    async fn test_zone_detail_not_found() {
        let (service, _pool) = service_with_zone().await;
        let err = service.get_zone_detail(99).await.unwrap_err();
        assert_eq!(err.error_type, ErrorType::NotFound);
    }

    #[tokio::test]
    async fn test_zone_detail_limits_recent_usage() {
        let (service, pool) = service_with_zone().await;
        let start = DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap();
        for hour in 0..30 {
            add_sample(&pool, start + TimeDelta::hours(hour), hour).await;
        }
        let detail = service.get_zone_detail(1).await.unwrap();
        assert_eq!(detail.zone.zone_code, "SS");
        assert_eq!(detail.zone.max_duration_hours, Some(8));
        assert_eq!(detail.recent_usage.len(), 24);
        assert_eq!(detail.recent_usage[0].timestamp, start + TimeDelta::hours(29));
        assert!(detail.recent_usage.windows(2).all(|pair| pair[0].timestamp > pair[1].timestamp));
    }

    #[tokio::test]
    async fn test_live_usage_window() {
        let (service, pool) = service_with_zone().await;
        let now = Utc::now();
        add_sample(&pool, now - TimeDelta::minutes(10), 45).await;
        add_sample(&pool, now - TimeDelta::minutes(50), 30).await;
        add_sample(&pool, now - TimeDelta::hours(3), 60).await;

        let last_hour = service.get_live_usage(LiveWindowInput::new(Some(1))).await.unwrap();
        assert_eq!(last_hour.len(), 2);
        assert!(last_hour[0].timestamp > last_hour[1].timestamp);
        assert_eq!(last_hour[0].occupancy_rate, Some(50.0));
        assert!(last_hour.iter().all(|usage| usage.timestamp >= now - TimeDelta::hours(1)));

        let default_window = service.get_live_usage(LiveWindowInput::new(None)).await.unwrap();
        assert_eq!(default_window.len(), 3);

        let err = service.get_live_usage(LiveWindowInput::new(Some(-2))).await.unwrap_err();
        assert_eq!(err.error_type, ErrorType::Validation);
    }

    #[tokio::test]
    async fn test_live_usage_capped() {
        let (service, pool) = service_with_zone().await;
        let now = Utc::now();
        for minute in 0..120 {
            add_sample(&pool, now - TimeDelta::seconds(minute * 20), 10).await;
        }
        let live = service.get_live_usage(LiveWindowInput::new(Some(1))).await.unwrap();
        assert_eq!(live.len(), 100);
    }
}
