use sqlx::SqliteConnection;
use tracing::{Instrument, instrument};

use crate::model::{
    apperror::ApplicationError,
    models::{LiveUsageType, QueryZoneDbResp, QueryZoneOverviewDbResp, UsageAddInputType, UsageSampleType, ZoneAddInputType, ZoneOverviewType, ZoneType},
};

/**
 * SQL query to retrieve active zones with the counts of their most recent usage sample.
 * Samples with equal timestamps resolve to the last one written.
 */
const QUERY_ACTIVE_ZONES: &str = "SELECT z.id, z.zone_name, z.zone_code, z.latitude, z.longitude, z.total_spaces, z.hourly_rate, u.occupied_spaces, u.total_spaces
                                  FROM parking_zones z
                                  LEFT JOIN parking_usage u ON u.id = (
                                      SELECT l.id FROM parking_usage l WHERE l.zone_id = z.id ORDER BY l.timestamp DESC, l.id DESC LIMIT 1
                                  )
                                  WHERE z.is_active = 1
                                  ORDER BY z.id";

const QUERY_ZONE: &str = "SELECT id, zone_name, zone_code, latitude, longitude, total_spaces, hourly_rate, max_duration_hours FROM parking_zones WHERE id = ?1";

const QUERY_ALL_ZONES: &str = "SELECT id, zone_name, zone_code, latitude, longitude, total_spaces, hourly_rate, max_duration_hours FROM parking_zones ORDER BY id";

/**
 * SQL query to retrieve the most recent usage samples of a zone, newest first.
 */
const QUERY_RECENT_USAGE: &str = "SELECT timestamp, occupied_spaces, total_spaces FROM parking_usage WHERE zone_id = ?1 ORDER BY timestamp DESC, id DESC LIMIT ?2";

/**
 * SQL query to retrieve usage samples newer than a cutoff joined with the zone name, newest first.
 */
const QUERY_LIVE_USAGE: &str = "SELECT u.timestamp, z.zone_name, u.occupied_spaces, u.total_spaces
                                FROM parking_usage u JOIN parking_zones z ON z.id = u.zone_id
                                WHERE u.timestamp >= ?1
                                ORDER BY u.timestamp DESC, u.id DESC
                                LIMIT ?2";

const QUERY_ACTIVE_ZONE_COUNT: &str = "SELECT COUNT(*) FROM parking_zones WHERE is_active = 1";

/**
 * Mean derived occupancy of samples newer than a cutoff. NULL when there are none.
 */
const QUERY_AVERAGE_OCCUPANCY: &str = "SELECT AVG(occupied_spaces * 100.0 / NULLIF(total_spaces, 0)) FROM parking_usage WHERE timestamp >= ?1";

/**
 * Inserts skip zones whose code already exists.
 */
const ADD_ZONE: &str = "INSERT INTO parking_zones (zone_name, zone_code, latitude, longitude, total_spaces, hourly_rate, max_duration_hours, is_active)
                        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1) ON CONFLICT (zone_code) DO NOTHING";

/**
 * Inserts skip samples already recorded for the zone at that timestamp.
 */
const ADD_USAGE: &str = "INSERT INTO parking_usage (zone_id, timestamp, occupied_spaces, total_spaces, hour_of_day, day_of_week)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6) ON CONFLICT (zone_id, timestamp) DO NOTHING";

/**
 * DAO for parking zones and their usage samples.
 */
pub struct ParkingDao {}

impl ParkingDao {
    /**
     * Creates a new instance of `ParkingDao`.
     *
     * # Returns
     * A new instance of `ParkingDao`.
     */
    pub fn new() -> Self {
        ParkingDao {}
    }

    /**
     * Retrieves all active zones with their current occupancy.
     *
     * # Arguments
     * `connection`: The database connection.
     *
     * # Returns
     * A Result containing the zones ordered by id or an `ApplicationError`.
     */
    #[instrument(skip(self, connection), fields(result))]
    pub async fn get_active_zones(&self, connection: &mut SqliteConnection) -> Result<Vec<ZoneOverviewType>, ApplicationError> {
        let span = tracing::Span::current();
        let results: Vec<QueryZoneOverviewDbResp> = sqlx::query_as(QUERY_ACTIVE_ZONES)
            .fetch_all(connection)
            .instrument(span)
            .await
            .map_err(|err| ApplicationError::database("Failed to execute query to get parking zones", err))?;
        Ok(results.into_iter().map(ZoneOverviewType::from).collect())
    }

    /**
     * Retrieves every zone, active or not.
     */
    #[instrument(skip(self, connection), fields(result))]
    pub async fn get_all_zones(&self, connection: &mut SqliteConnection) -> Result<Vec<ZoneType>, ApplicationError> {
        let span = tracing::Span::current();
        let results: Vec<QueryZoneDbResp> = sqlx::query_as(QUERY_ALL_ZONES)
            .fetch_all(connection)
            .instrument(span)
            .await
            .map_err(|err| ApplicationError::database("Failed to execute query to get all parking zones", err))?;
        Ok(results.into_iter().map(ZoneType::from).collect())
    }

    /**
     * Retrieves a zone by its ID.
     *
     * # Arguments
     * `connection`: The database connection.
     * `zone_id`: The ID of the zone.
     *
     * # Returns
     * A Result containing the zone, `None` if it does not exist, or an `ApplicationError`.
     */
    #[instrument(skip(self, connection), fields(result))]
    pub async fn get_zone(&self, connection: &mut SqliteConnection, zone_id: i64) -> Result<Option<ZoneType>, ApplicationError> {
        let span = tracing::Span::current();
        let result: Option<QueryZoneDbResp> = sqlx::query_as(QUERY_ZONE)
            .bind(zone_id)
            .fetch_optional(connection)
            .instrument(span)
            .await
            .map_err(|err| ApplicationError::database("Failed to execute query to get parking zone", err))?;
        Ok(result.map(ZoneType::from))
    }

    /**
     * Retrieves the latest usage samples of a zone.
     *
     * # Arguments
     * `connection`: The database connection.
     * `zone_id`: The ID of the zone.
     * `limit`: Maximum number of samples.
     *
     * # Returns
     * A Result containing the samples, newest first, or an `ApplicationError`.
     */
    #[instrument(skip(self, connection), fields(result))]
    pub async fn get_recent_usage(&self, connection: &mut SqliteConnection, zone_id: i64, limit: i64) -> Result<Vec<UsageSampleType>, ApplicationError> {
        let span = tracing::Span::current();
        let results: Vec<(i64, i64, i64)> = sqlx::query_as(QUERY_RECENT_USAGE)
            .bind(zone_id)
            .bind(limit)
            .fetch_all(connection)
            .instrument(span)
            .await
            .map_err(|err| ApplicationError::database("Failed to execute query to get recent usage", err))?;
        Ok(results.into_iter().map(UsageSampleType::from).collect())
    }

    /**
     * Retrieves usage samples recorded at or after a cutoff.
     *
     * # Arguments
     * `connection`: The database connection.
     * `cutoff`: Earliest timestamp to include, in epoch seconds.
     * `limit`: Maximum number of samples.
     *
     * # Returns
     * A Result containing the samples, newest first, or an `ApplicationError`.
     */
    #[instrument(skip(self, connection), fields(result))]
    pub async fn get_live_usage(&self, connection: &mut SqliteConnection, cutoff: i64, limit: i64) -> Result<Vec<LiveUsageType>, ApplicationError> {
        let span = tracing::Span::current();
        let results: Vec<(i64, String, i64, i64)> = sqlx::query_as(QUERY_LIVE_USAGE)
            .bind(cutoff)
            .bind(limit)
            .fetch_all(connection)
            .instrument(span)
            .await
            .map_err(|err| ApplicationError::database("Failed to execute query to get live usage", err))?;
        Ok(results.into_iter().map(LiveUsageType::from).collect())
    }

    #[instrument(skip(self, connection), fields(result))]
    pub async fn count_active_zones(&self, connection: &mut SqliteConnection) -> Result<i64, ApplicationError> {
        let span = tracing::Span::current();
        sqlx::query_scalar(QUERY_ACTIVE_ZONE_COUNT)
            .fetch_one(connection)
            .instrument(span)
            .await
            .map_err(|err| ApplicationError::database("Failed to execute query to count active zones", err))
    }

    /**
     * Mean occupancy percentage of the samples recorded at or after a cutoff, `None` when there are none.
     */
    #[instrument(skip(self, connection), fields(result))]
    pub async fn get_average_occupancy(&self, connection: &mut SqliteConnection, cutoff: i64) -> Result<Option<f64>, ApplicationError> {
        let span = tracing::Span::current();
        sqlx::query_scalar(QUERY_AVERAGE_OCCUPANCY)
            .bind(cutoff)
            .fetch_one(connection)
            .instrument(span)
            .await
            .map_err(|err| ApplicationError::database("Failed to execute query to get average occupancy", err))
    }

    /**
     * Adds a zone unless its code already exists.
     *
     * # Returns
     * The number of inserted rows.
     */
    #[instrument(skip(self, transaction, zone_add_input), fields(zone_code = zone_add_input.zone_code, result))]
    pub async fn add_zone(&self, transaction: &mut SqliteConnection, zone_add_input: &ZoneAddInputType) -> Result<u64, ApplicationError> {
        let span = tracing::Span::current();
        let result = sqlx::query(ADD_ZONE)
            .bind(zone_add_input.zone_name)
            .bind(zone_add_input.zone_code)
            .bind(zone_add_input.latitude)
            .bind(zone_add_input.longitude)
            .bind(zone_add_input.total_spaces)
            .bind(zone_add_input.hourly_rate)
            .bind(zone_add_input.max_duration_hours)
            .execute(transaction)
            .instrument(span)
            .await
            .map_err(|err| ApplicationError::database("Failed to add parking zone", err))?;
        Ok(result.rows_affected())
    }

    /**
     * Adds a usage sample unless the zone already has one at that timestamp.
     *
     * # Returns
     * The number of inserted rows.
     */
    #[instrument(level = "trace", skip(self, transaction), fields(result))]
    pub async fn add_usage(&self, transaction: &mut SqliteConnection, usage_add_input: &UsageAddInputType) -> Result<u64, ApplicationError> {
        let span = tracing::Span::current();
        let result = sqlx::query(ADD_USAGE)
            .bind(usage_add_input.zone_id)
            .bind(usage_add_input.timestamp.timestamp())
            .bind(usage_add_input.occupied_spaces)
            .bind(usage_add_input.total_spaces)
            .bind(usage_add_input.hour_of_day)
            .bind(usage_add_input.day_of_week)
            .execute(transaction)
            .instrument(span)
            .await
            .map_err(|err| ApplicationError::database("Failed to add parking usage", err))?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod test {
    use chrono::{DateTime, Utc};

    use super::*;
    use crate::dao::test_support::init_db;

    fn zone(zone_name: &'static str, zone_code: &'static str, total_spaces: i64) -> ZoneAddInputType {
        ZoneAddInputType { zone_name, zone_code, latitude: -37.8136, longitude: 144.9631, total_spaces, hourly_rate: 8.5, max_duration_hours: 4 }
    }

    fn usage(zone_id: i64, timestamp: i64, occupied_spaces: i64, total_spaces: i64) -> UsageAddInputType {
        let timestamp = DateTime::<Utc>::from_timestamp(timestamp, 0).unwrap();
        UsageAddInputType { zone_id, timestamp, occupied_spaces, total_spaces, hour_of_day: 8, day_of_week: 0 }
    }

    #[tokio::test]
    async fn test_active_zones_with_latest_occupancy() {
        let pool = init_db().await;
        let dao = ParkingDao::new();
        let mut connection = pool.acquire().await.unwrap();
        dao.add_zone(&mut connection, &zone("Collins Street East", "CSE", 100)).await.unwrap();
        dao.add_zone(&mut connection, &zone("Bourke Street Mall", "BSM", 200)).await.unwrap();
        dao.add_usage(&mut connection, &usage(1, 1_000, 10, 100)).await.unwrap();
        dao.add_usage(&mut connection, &usage(1, 3_000, 75, 100)).await.unwrap();
        dao.add_usage(&mut connection, &usage(1, 2_000, 50, 100)).await.unwrap();

        let zones = dao.get_active_zones(&mut connection).await.unwrap();
        assert_eq!(zones.len(), 2);
        assert_eq!(zones[0].zone_code, "CSE");
        assert_eq!(zones[0].current_occupancy, Some(75.0));
        assert_eq!(zones[1].current_occupancy, None);
    }

    #[tokio::test]
    async fn test_add_zone_and_usage_skip_duplicates() {
        let pool = init_db().await;
        let dao = ParkingDao::new();
        let mut connection = pool.acquire().await.unwrap();
        assert_eq!(dao.add_zone(&mut connection, &zone("Queen Street", "QS", 120)).await.unwrap(), 1);
        assert_eq!(dao.add_zone(&mut connection, &zone("Queen Street", "QS", 120)).await.unwrap(), 0);
        assert_eq!(dao.add_usage(&mut connection, &usage(1, 1_000, 10, 120)).await.unwrap(), 1);
        assert_eq!(dao.add_usage(&mut connection, &usage(1, 1_000, 99, 120)).await.unwrap(), 0);
        let samples = dao.get_recent_usage(&mut connection, 1, 24).await.unwrap();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].occupied_spaces, 10);
    }

    #[tokio::test]
    async fn test_usage_requires_existing_zone() {
        let pool = init_db().await;
        let dao = ParkingDao::new();
        let mut connection = pool.acquire().await.unwrap();
        assert!(dao.add_usage(&mut connection, &usage(42, 1_000, 10, 100)).await.is_err());
    }

    #[tokio::test]
    async fn test_live_usage_and_average() {
        let pool = init_db().await;
        let dao = ParkingDao::new();
        let mut connection = pool.acquire().await.unwrap();
        dao.add_zone(&mut connection, &zone("Flinders Street", "FS", 100)).await.unwrap();
        dao.add_usage(&mut connection, &usage(1, 1_000, 20, 100)).await.unwrap();
        dao.add_usage(&mut connection, &usage(1, 5_000, 40, 100)).await.unwrap();
        dao.add_usage(&mut connection, &usage(1, 6_000, 80, 100)).await.unwrap();

        let live = dao.get_live_usage(&mut connection, 5_000, 100).await.unwrap();
        assert_eq!(live.iter().map(|u| u.timestamp.timestamp()).collect::<Vec<_>>(), vec![6_000, 5_000]);
        assert_eq!(live[0].zone_name, "Flinders Street");
        assert_eq!(dao.get_live_usage(&mut connection, 0, 1).await.unwrap().len(), 1);

        let average = dao.get_average_occupancy(&mut connection, 5_000).await.unwrap().unwrap();
        assert!((average - 60.0).abs() < 1e-9);
        assert_eq!(dao.get_average_occupancy(&mut connection, 10_000).await.unwrap(), None);
        assert_eq!(dao.count_active_zones(&mut connection).await.unwrap(), 1);
    }
}
