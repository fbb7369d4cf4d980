use sqlx::SqlitePool;

use crate::{
    dao::environmental::EnvironmentalDao,
    model::{apperror::ApplicationError, models::EnvironmentalRecordType},
    service::acquire,
};

/**
 * Represents the service for monthly environmental metrics.
 */
pub struct EnvironmentalService {
    environmental_dao: EnvironmentalDao,
    connection_pool: SqlitePool,
}

impl EnvironmentalService {
    pub fn new(environmental_dao: EnvironmentalDao, connection_pool: SqlitePool) -> Self {
        EnvironmentalService { environmental_dao, connection_pool }
    }

    /**
     * Retrieves environmental metrics ordered by year then month. An empty list is a valid answer.
     *
     * # Arguments
     * `year`: Restricts the result to one calendar year when set.
     */
    pub async fn get_environmental(&self, year: Option<i64>) -> Result<Vec<EnvironmentalRecordType>, ApplicationError> {
        let mut connection = acquire(&self.connection_pool).await?;
        self.environmental_dao.get_environmental(&mut connection, year).await
    }
}
