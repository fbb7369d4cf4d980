pub mod analytics;
pub mod environmental;
pub mod parking;
pub mod seed;
pub mod trends;

use sqlx::{Sqlite, SqlitePool, pool::PoolConnection};

use crate::model::apperror::ApplicationError;

/**
 * Acquires a pooled connection for the duration of one request. The connection returns to the pool when dropped.
 */
pub(crate) async fn acquire(connection_pool: &SqlitePool) -> Result<PoolConnection<Sqlite>, ApplicationError> {
    connection_pool.acquire().await.map_err(|err| ApplicationError::database("Failed to acquire connection", err))
}
