use sqlx::SqliteConnection;
use tracing::{Instrument, instrument};

use crate::model::{
    apperror::ApplicationError,
    models::{EnvironmentalAddInputType, EnvironmentalRecordType, QueryEnvironmentalDbResp},
};

/**
 * SQL query to retrieve monthly environmental metrics, optionally for a single year.
 */
const QUERY_ENVIRONMENTAL: &str = "SELECT year, month, co2_emissions_tonnes, air_quality_index, noise_level_db, green_transport_percentage
                                   FROM environmental_data
                                   WHERE (?1 IS NULL OR year = ?1)
                                   ORDER BY year, month";

const ADD_ENVIRONMENTAL: &str = "INSERT INTO environmental_data (year, month, co2_emissions_tonnes, air_quality_index, noise_level_db, green_transport_percentage)
                                 VALUES (?1, ?2, ?3, ?4, ?5, ?6) ON CONFLICT (year, month) DO NOTHING";

/**
 * DAO for monthly environmental metrics.
 */
pub struct EnvironmentalDao {}

impl EnvironmentalDao {
    pub fn new() -> Self {
        EnvironmentalDao {}
    }

    /**
     * Retrieves environmental metrics ordered by year and month.
     *
     * # Arguments
     * `connection`: The database connection.
     * `year`: Restricts the result to one year when set.
     *
     * # Returns
     * A Result containing the records or an `ApplicationError`.
     */
    #[instrument(skip(self, connection), fields(result))]
    pub async fn get_environmental(&self, connection: &mut SqliteConnection, year: Option<i64>) -> Result<Vec<EnvironmentalRecordType>, ApplicationError> {
        let span = tracing::Span::current();
        let results: Vec<QueryEnvironmentalDbResp> = sqlx::query_as(QUERY_ENVIRONMENTAL)
            .bind(year)
            .fetch_all(connection)
            .instrument(span)
            .await
            .map_err(|err| ApplicationError::database("Failed to execute query to get environmental data", err))?;
        Ok(results.into_iter().map(EnvironmentalRecordType::from).collect())
    }

    /**
     * Adds a month of environmental metrics unless that month already exists.
     *
     * # Returns
     * The number of inserted rows.
     */
    #[instrument(skip(self, transaction, environmental_add_input), fields(year = environmental_add_input.year, month = environmental_add_input.month, result))]
    pub async fn add_environmental(&self, transaction: &mut SqliteConnection, environmental_add_input: &EnvironmentalAddInputType) -> Result<u64, ApplicationError> {
        let span = tracing::Span::current();
        let result = sqlx::query(ADD_ENVIRONMENTAL)
            .bind(environmental_add_input.year)
            .bind(environmental_add_input.month)
            .bind(environmental_add_input.co2_emissions_tonnes)
            .bind(environmental_add_input.air_quality_index)
            .bind(environmental_add_input.noise_level_db)
            .bind(environmental_add_input.green_transport_percentage)
            .execute(transaction)
            .instrument(span)
            .await
            .map_err(|err| ApplicationError::database("Failed to add environmental data", err))?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::dao::test_support::init_db;

    fn month(year: i64, month: i64) -> EnvironmentalAddInputType {
        EnvironmentalAddInputType { year, month, co2_emissions_tonnes: 1500.0, air_quality_index: 45.0, noise_level_db: 65.0, green_transport_percentage: 35.0 }
    }

    #[tokio::test]
    async fn test_environmental_ordering_and_filter() {
        let pool = init_db().await;
        let dao = EnvironmentalDao::new();
        let mut connection = pool.acquire().await.unwrap();
        for (year, m) in [(2016, 2), (2015, 12), (2016, 1), (2015, 1)] {
            assert_eq!(dao.add_environmental(&mut connection, &month(year, m)).await.unwrap(), 1);
        }
        assert_eq!(dao.add_environmental(&mut connection, &month(2015, 1)).await.unwrap(), 0);

        let all = dao.get_environmental(&mut connection, None).await.unwrap();
        assert_eq!(all.iter().map(|r| (r.year, r.month)).collect::<Vec<_>>(), vec![(2015, 1), (2015, 12), (2016, 1), (2016, 2)]);
        let only_2016 = dao.get_environmental(&mut connection, Some(2016)).await.unwrap();
        assert_eq!(only_2016.len(), 2);
        assert!(dao.get_environmental(&mut connection, Some(1999)).await.unwrap().is_empty());
    }
}
