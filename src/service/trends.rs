use sqlx::SqlitePool;

use crate::{
    dao::trends::TrendsDao,
    model::{
        apperror::{ApplicationError, ErrorType},
        models::{TrendKind, TrendPointType, TrendSeriesOutputType, YearRangeInput, YearsOutputType, round_one_decimal},
    },
    service::acquire,
};

/**
 * Population is reported in thousands.
 */
#[allow(clippy::cast_precision_loss)]
fn population_in_thousands(population: i64) -> f64 {
    round_one_decimal(population as f64 / 1000.0)
}

/**
 * Represents the service for the year indexed trend series.
 */
pub struct TrendsService {
    /**
     * The DAO for trend queries.
     */
    trends_dao: TrendsDao,
    /**
     * Connection pool for database operations.
     */
    connection_pool: SqlitePool,
}

impl TrendsService {
    /**
     * Creates a new instance of `TrendsService`.
     *
     * # Arguments
     * `trends_dao`: The DAO for trend queries.
     * `connection_pool`: Connection pool for database operations.
     */
    pub fn new(trends_dao: TrendsDao, connection_pool: SqlitePool) -> Self {
        TrendsService { trends_dao, connection_pool }
    }

    /**
     * Retrieves a trend series ordered by year.
     *
     * # Arguments
     * `kind`: Which series to return.
     * `range`: Inclusive year bounds, validated here.
     *
     * # Returns
     * A Result containing `TrendSeriesOutputType` or an `ApplicationError`. An empty series is `NotFound`.
     */
    pub async fn get_trend(&self, kind: TrendKind, range: YearRangeInput) -> Result<TrendSeriesOutputType, ApplicationError> {
        let range = range.validate()?;
        let mut connection = acquire(&self.connection_pool).await?;
        let points: Vec<TrendPointType> = match kind {
            TrendKind::Population => self
                .trends_dao
                .get_population(&mut connection, range)
                .await?
                .into_iter()
                .map(|record| TrendPointType { year: record.year, population: Some(population_in_thousands(record.population)), congestion: None, car: None })
                .collect(),
            TrendKind::Congestion => self
                .trends_dao
                .get_congestion(&mut connection, range)
                .await?
                .into_iter()
                .map(|record| TrendPointType { year: record.year, population: None, congestion: Some(record.congestion_index), car: None })
                .collect(),
            TrendKind::CarOwnership => self
                .trends_dao
                .get_car_ownership(&mut connection, range)
                .await?
                .into_iter()
                .map(|record| TrendPointType { year: record.year, population: None, congestion: None, car: Some(record.cars_per_100_households) })
                .collect(),
            TrendKind::Combined => self
                .trends_dao
                .get_combined(&mut connection, range)
                .await?
                .into_iter()
                .map(|(year, population, congestion)| TrendPointType { year, population: Some(population_in_thousands(population)), congestion: Some(congestion), car: None })
                .collect(),
        };
        if points.is_empty() {
            let message = match kind {
                TrendKind::Combined => "Insufficient data for combined view".to_string(),
                other => format!("No {} data found", other.description()),
            };
            return Err(ApplicationError::new(ErrorType::NotFound, message));
        }
        Ok(TrendSeriesOutputType::new(kind, points))
    }

    /**
     * Retrieves the years for which population data exists.
     *
     * # Returns
     * A Result containing `YearsOutputType` or an `ApplicationError`. No years is `NotFound`.
     */
    pub async fn get_years(&self) -> Result<YearsOutputType, ApplicationError> {
        let mut connection = acquire(&self.connection_pool).await?;
        let years = self.trends_dao.get_years(&mut connection).await?;
        if years.is_empty() {
            return Err(ApplicationError::new(ErrorType::NotFound, "No years available".to_string()));
        }
        Ok(YearsOutputType { years })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{dao::test_support::init_db, model::models::CongestionAddInputType};

    async fn service_with(population: &[(i64, i64)], congestion: &[(i64, f64)]) -> TrendsService {
        let pool = init_db().await;
        let dao = TrendsDao::new();
        {
            let mut connection = pool.acquire().await.unwrap();
            for (year, value) in population {
                dao.add_population(&mut connection, *year, *value).await.unwrap();
            }
            for (year, congestion_index) in congestion {
                let input = CongestionAddInputType { year: *year, congestion_index: *congestion_index, average_speed_kmh: 25.0, peak_hour_delay_minutes: 10.0 };
                dao.add_congestion(&mut connection, &input).await.unwrap();
            }
        }
        TrendsService::new(dao, pool)
    }

    #[test]
    fn test_population_in_thousands() {
        assert!((population_in_thousands(55399) - 55.4).abs() < f64::EPSILON);
        assert!((population_in_thousands(146099) - 146.1).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_population_trend_scaled() {
        let service = service_with(&[(2001, 55399), (2002, 60592)], &[]).await;
        let series = service.get_trend(TrendKind::Population, YearRangeInput::all()).await.unwrap();
        assert_eq!(series.points.len(), 2);
        assert_eq!(series.points[0].population, Some(55.4));
        assert_eq!(series.points[1].population, Some(60.6));
        assert_eq!(series.points[0].congestion, None);
        assert_eq!(series.date_range(), "2001–2002");
    }

    #[tokio::test]
    async fn test_combined_trend_intersection() {
        let service = service_with(&[(2000, 50000), (2001, 55399), (2002, 60592), (2003, 66149)], &[(2003, 19.2), (2001, 15.3), (2002, 17.1), (2004, 20.0)]).await;
        let series = service.get_trend(TrendKind::Combined, YearRangeInput::all()).await.unwrap();
        assert_eq!(series.points.iter().map(|p| p.year).collect::<Vec<_>>(), vec![2001, 2002, 2003]);
        assert_eq!(series.points[0].population, Some(55.4));
        assert_eq!(series.points[0].congestion, Some(15.3));
        assert_eq!(series.kind.data_type(), "combined");
    }

    #[tokio::test]
    async fn test_empty_trend_is_not_found() {
        let service = service_with(&[(2001, 55399)], &[]).await;
        let err = service.get_trend(TrendKind::Congestion, YearRangeInput::all()).await.unwrap_err();
        assert_eq!(err.error_type, ErrorType::NotFound);
        let err = service.get_trend(TrendKind::Combined, YearRangeInput::all()).await.unwrap_err();
        assert_eq!(err.error_type, ErrorType::NotFound);
    }

    #[tokio::test]
    async fn test_inverted_range_rejected_for_every_kind() {
        let service = service_with(&[(2001, 55399)], &[(2001, 15.0)]).await;
        let range = YearRangeInput { start_year: Some(2010), end_year: Some(2005) };
        for kind in [TrendKind::Population, TrendKind::Congestion, TrendKind::CarOwnership, TrendKind::Combined] {
            let err = service.get_trend(kind, range).await.unwrap_err();
            assert_eq!(err.error_type, ErrorType::Validation);
        }
    }

    #[tokio::test]
    async fn test_years() {
        let service = service_with(&[(2002, 60592), (2001, 55399)], &[]).await;
        assert_eq!(service.get_years().await.unwrap().years, vec![2001, 2002]);
        let empty = service_with(&[], &[]).await;
        assert_eq!(empty.get_years().await.unwrap_err().error_type, ErrorType::NotFound);
    }
}
