pub mod environmental;
pub mod parking;
pub mod trends;

use sqlx::{SqliteConnection, SqlitePool, migrate::Migrator};
use tracing::{Instrument, instrument};

use crate::model::apperror::{ApplicationError, ErrorType};

/**
 * Schema migrations embedded at compile time.
 */
static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/**
 * Creates every table that does not exist yet.
 *
 * # Arguments
 * `connection_pool`: The database connection pool.
 *
 * # Returns
 * A result indicating success or failure of the operation.
 */
pub async fn apply_schema(connection_pool: &SqlitePool) -> Result<(), ApplicationError> {
    MIGRATOR
        .run(connection_pool)
        .await
        .map_err(|err| ApplicationError::new(ErrorType::Initialization, format!("Failed to create database schema: {err}")))
}

/**
 * Tables whose sizes are reported by health checks and seeding.
 */
#[derive(Debug, Clone, Copy)]
pub enum Table {
    PopulationTrends,
    CongestionTrends,
    CarOwnershipTrends,
    ParkingZones,
    ParkingUsage,
    EnvironmentalData,
}

impl Table {
    fn count_query(self) -> &'static str {
        match self {
            Table::PopulationTrends => "SELECT COUNT(*) FROM population_trends",
            Table::CongestionTrends => "SELECT COUNT(*) FROM congestion_trends",
            Table::CarOwnershipTrends => "SELECT COUNT(*) FROM car_ownership_trends",
            Table::ParkingZones => "SELECT COUNT(*) FROM parking_zones",
            Table::ParkingUsage => "SELECT COUNT(*) FROM parking_usage",
            Table::EnvironmentalData => "SELECT COUNT(*) FROM environmental_data",
        }
    }
}

/**
 * Counts the rows of a table.
 *
 * # Arguments
 * `connection`: The database connection.
 * `table`: The table to count.
 *
 * # Returns
 * A Result containing the number of rows or an `ApplicationError`.
 */
#[instrument(skip(connection))]
pub async fn count_rows(connection: &mut SqliteConnection, table: Table) -> Result<i64, ApplicationError> {
    let span = tracing::Span::current();
    sqlx::query_scalar(table.count_query())
        .fetch_one(connection)
        .instrument(span)
        .await
        .map_err(|err| ApplicationError::database("Failed to count rows", err))
}

#[cfg(test)]
pub mod test_support {
    use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};

    /**
     * In-memory database with the schema applied. A single connection keeps every query on the same database.
     */
    pub async fn init_db() -> SqlitePool {
        let pool = SqlitePoolOptions::new().max_connections(1).connect("sqlite::memory:").await.unwrap();
        super::apply_schema(&pool).await.unwrap();
        pool
    }
}
