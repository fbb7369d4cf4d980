use sqlx::SqliteConnection;
use tracing::{Instrument, instrument};

use crate::model::{
    apperror::ApplicationError,
    models::{CarOwnershipAddInputType, CarOwnershipRecordType, CongestionAddInputType, CongestionRecordType, PopulationRecordType, YearRangeInput},
};

/**
 * SQL query to retrieve population figures within an optional year range.
 */
const QUERY_POPULATION: &str = "SELECT year, population FROM population_trends WHERE (?1 IS NULL OR year >= ?1) AND (?2 IS NULL OR year <= ?2) ORDER BY year";

/**
 * SQL query to retrieve congestion indexes within an optional year range.
 */
const QUERY_CONGESTION: &str = "SELECT year, congestion_index FROM congestion_trends WHERE (?1 IS NULL OR year >= ?1) AND (?2 IS NULL OR year <= ?2) ORDER BY year";

/**
 * SQL query to retrieve car ownership figures within an optional year range.
 */
const QUERY_CAR_OWNERSHIP: &str = "SELECT year, cars_per_100_households FROM car_ownership_trends WHERE (?1 IS NULL OR year >= ?1) AND (?2 IS NULL OR year <= ?2) ORDER BY year";

/**
 * SQL query joining population and congestion on year. Only years present in both tables are returned.
 */
const QUERY_COMBINED: &str = "SELECT p.year, p.population, c.congestion_index
                              FROM population_trends p JOIN congestion_trends c ON c.year = p.year
                              WHERE (?1 IS NULL OR p.year >= ?1) AND (?2 IS NULL OR p.year <= ?2)
                              ORDER BY p.year";

const QUERY_YEARS: &str = "SELECT year FROM population_trends ORDER BY year";

const QUERY_LATEST_POPULATION: &str = "SELECT year, population FROM population_trends ORDER BY year DESC LIMIT 1";

const QUERY_LATEST_CONGESTION: &str = "SELECT year, congestion_index FROM congestion_trends ORDER BY year DESC LIMIT 1";

/**
 * Inserts skip years that already exist.
 */
const ADD_POPULATION: &str = "INSERT INTO population_trends (year, population) VALUES (?1, ?2) ON CONFLICT (year) DO NOTHING";

const ADD_CONGESTION: &str =
    "INSERT INTO congestion_trends (year, congestion_index, average_speed_kmh, peak_hour_delay_minutes) VALUES (?1, ?2, ?3, ?4) ON CONFLICT (year) DO NOTHING";

const ADD_CAR_OWNERSHIP: &str =
    "INSERT INTO car_ownership_trends (year, cars_per_100_households, total_registered_vehicles) VALUES (?1, ?2, ?3) ON CONFLICT (year) DO NOTHING";

/**
 * Database response type for the combined query.
 */
pub type QueryCombinedDbResp = (i64, i64, f64);

/**
 * DAO for the year indexed trend tables.
 */
pub struct TrendsDao {}

impl TrendsDao {
    /**
     * Creates a new instance of `TrendsDao`.
     *
     * # Returns
     * A new instance of `TrendsDao`.
     */
    pub fn new() -> Self {
        TrendsDao {}
    }

    /**
     * Retrieves population figures ordered by year.
     *
     * # Arguments
     * `connection`: The database connection.
     * `range`: Inclusive year bounds.
     *
     * # Returns
     * A Result containing the records or an `ApplicationError`.
     */
    #[instrument(skip(self, connection), fields(result))]
    pub async fn get_population(&self, connection: &mut SqliteConnection, range: YearRangeInput) -> Result<Vec<PopulationRecordType>, ApplicationError> {
        let span = tracing::Span::current();
        let results: Vec<(i64, i64)> = sqlx::query_as(QUERY_POPULATION)
            .bind(range.start_year)
            .bind(range.end_year)
            .fetch_all(connection)
            .instrument(span)
            .await
            .map_err(|err| ApplicationError::database("Failed to execute query to get population trends", err))?;
        Ok(results.into_iter().map(PopulationRecordType::from).collect())
    }

    /**
     * Retrieves congestion indexes ordered by year.
     *
     * # Arguments
     * `connection`: The database connection.
     * `range`: Inclusive year bounds.
     *
     * # Returns
     * A Result containing the records or an `ApplicationError`.
     */
    #[instrument(skip(self, connection), fields(result))]
    pub async fn get_congestion(&self, connection: &mut SqliteConnection, range: YearRangeInput) -> Result<Vec<CongestionRecordType>, ApplicationError> {
        let span = tracing::Span::current();
        let results: Vec<(i64, f64)> = sqlx::query_as(QUERY_CONGESTION)
            .bind(range.start_year)
            .bind(range.end_year)
            .fetch_all(connection)
            .instrument(span)
            .await
            .map_err(|err| ApplicationError::database("Failed to execute query to get congestion trends", err))?;
        Ok(results.into_iter().map(CongestionRecordType::from).collect())
    }

    /**
     * Retrieves car ownership figures ordered by year.
     *
     * # Arguments
     * `connection`: The database connection.
     * `range`: Inclusive year bounds.
     *
     * # Returns
     * A Result containing the records or an `ApplicationError`.
     */
    #[instrument(skip(self, connection), fields(result))]
    pub async fn get_car_ownership(&self, connection: &mut SqliteConnection, range: YearRangeInput) -> Result<Vec<CarOwnershipRecordType>, ApplicationError> {
        let span = tracing::Span::current();
        let results: Vec<(i64, f64)> = sqlx::query_as(QUERY_CAR_OWNERSHIP)
            .bind(range.start_year)
            .bind(range.end_year)
            .fetch_all(connection)
            .instrument(span)
            .await
            .map_err(|err| ApplicationError::database("Failed to execute query to get car ownership trends", err))?;
        Ok(results.into_iter().map(CarOwnershipRecordType::from).collect())
    }

    /**
     * Retrieves population and congestion for the years present in both tables.
     *
     * # Arguments
     * `connection`: The database connection.
     * `range`: Inclusive year bounds.
     *
     * # Returns
     * A Result containing `(year, population, congestion_index)` rows ordered by year or an `ApplicationError`.
     */
    #[instrument(skip(self, connection), fields(result))]
    pub async fn get_combined(&self, connection: &mut SqliteConnection, range: YearRangeInput) -> Result<Vec<QueryCombinedDbResp>, ApplicationError> {
        let span = tracing::Span::current();
        sqlx::query_as(QUERY_COMBINED)
            .bind(range.start_year)
            .bind(range.end_year)
            .fetch_all(connection)
            .instrument(span)
            .await
            .map_err(|err| ApplicationError::database("Failed to execute query to get combined trends", err))
    }

    /**
     * Retrieves the years covered by the population table.
     */
    #[instrument(skip(self, connection), fields(result))]
    pub async fn get_years(&self, connection: &mut SqliteConnection) -> Result<Vec<i64>, ApplicationError> {
        let span = tracing::Span::current();
        sqlx::query_scalar(QUERY_YEARS)
            .fetch_all(connection)
            .instrument(span)
            .await
            .map_err(|err| ApplicationError::database("Failed to execute query to get years", err))
    }

    /**
     * Retrieves the population record of the most recent year, if any.
     */
    #[instrument(skip(self, connection), fields(result))]
    pub async fn get_latest_population(&self, connection: &mut SqliteConnection) -> Result<Option<PopulationRecordType>, ApplicationError> {
        let span = tracing::Span::current();
        let result: Option<(i64, i64)> = sqlx::query_as(QUERY_LATEST_POPULATION)
            .fetch_optional(connection)
            .instrument(span)
            .await
            .map_err(|err| ApplicationError::database("Failed to execute query to get latest population", err))?;
        Ok(result.map(PopulationRecordType::from))
    }

    /**
     * Retrieves the congestion record of the most recent year, if any.
     */
    #[instrument(skip(self, connection), fields(result))]
    pub async fn get_latest_congestion(&self, connection: &mut SqliteConnection) -> Result<Option<CongestionRecordType>, ApplicationError> {
        let span = tracing::Span::current();
        let result: Option<(i64, f64)> = sqlx::query_as(QUERY_LATEST_CONGESTION)
            .fetch_optional(connection)
            .instrument(span)
            .await
            .map_err(|err| ApplicationError::database("Failed to execute query to get latest congestion", err))?;
        Ok(result.map(CongestionRecordType::from))
    }

    /**
     * Adds a population figure unless the year already exists.
     *
     * # Arguments
     * `transaction`: The database transaction to execute the query within.
     * `year`: The year of the figure.
     * `population`: The population count.
     *
     * # Returns
     * The number of inserted rows, 0 when the year was already present.
     */
    #[instrument(skip(self, transaction), fields(result))]
    pub async fn add_population(&self, transaction: &mut SqliteConnection, year: i64, population: i64) -> Result<u64, ApplicationError> {
        let span = tracing::Span::current();
        let result = sqlx::query(ADD_POPULATION)
            .bind(year)
            .bind(population)
            .execute(transaction)
            .instrument(span)
            .await
            .map_err(|err| ApplicationError::database("Failed to add population", err))?;
        Ok(result.rows_affected())
    }

    /**
     * Adds a congestion record unless the year already exists.
     */
    #[instrument(skip(self, transaction, congestion_add_input), fields(year = congestion_add_input.year, result))]
    pub async fn add_congestion(&self, transaction: &mut SqliteConnection, congestion_add_input: &CongestionAddInputType) -> Result<u64, ApplicationError> {
        let span = tracing::Span::current();
        let result = sqlx::query(ADD_CONGESTION)
            .bind(congestion_add_input.year)
            .bind(congestion_add_input.congestion_index)
            .bind(congestion_add_input.average_speed_kmh)
            .bind(congestion_add_input.peak_hour_delay_minutes)
            .execute(transaction)
            .instrument(span)
            .await
            .map_err(|err| ApplicationError::database("Failed to add congestion", err))?;
        Ok(result.rows_affected())
    }

    /**
     * Adds a car ownership record unless the year already exists.
     */
    #[instrument(skip(self, transaction, car_ownership_add_input), fields(year = car_ownership_add_input.year, result))]
    pub async fn add_car_ownership(&self, transaction: &mut SqliteConnection, car_ownership_add_input: &CarOwnershipAddInputType) -> Result<u64, ApplicationError> {
        let span = tracing::Span::current();
        let result = sqlx::query(ADD_CAR_OWNERSHIP)
            .bind(car_ownership_add_input.year)
            .bind(car_ownership_add_input.cars_per_100_households)
            .bind(car_ownership_add_input.total_registered_vehicles)
            .execute(transaction)
            .instrument(span)
            .await
            .map_err(|err| ApplicationError::database("Failed to add car ownership", err))?;
        Ok(result.rows_affected())
    }
}
