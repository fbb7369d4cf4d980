use sqlx::SqlitePool;

use crate::{
    dao::{environmental::EnvironmentalDao, parking::ParkingDao, trends::TrendsDao},
    service::{analytics::AnalyticsService, environmental::EnvironmentalService, parking::ParkingService, trends::TrendsService},
};

/**
* Represents the application state shared across the Actix web application.
*/
pub struct AppState {
    /**
     * Service for the year indexed trend series.
     */
    pub trends_service: TrendsService,
    /**
     * Service for parking zones and occupancy.
     */
    pub parking_service: ParkingService,
    pub environmental_service: EnvironmentalService,
    /**
     * Service for the dashboard snapshot and the health check.
     */
    pub analytics_service: AnalyticsService,
}

impl AppState {
    pub fn new(trends_service: TrendsService, parking_service: ParkingService, environmental_service: EnvironmentalService, analytics_service: AnalyticsService) -> Self {
        AppState { trends_service, parking_service, environmental_service, analytics_service }
    }

    /**
     * Wires every service onto one connection pool.
     *
     * # Arguments
     * `connection_pool`: Connection pool shared by the services.
     */
    pub fn from_pool(connection_pool: &SqlitePool) -> Self {
        AppState::new(
            TrendsService::new(TrendsDao::new(), connection_pool.clone()),
            ParkingService::new(ParkingDao::new(), connection_pool.clone()),
            EnvironmentalService::new(EnvironmentalDao::new(), connection_pool.clone()),
            AnalyticsService::new(TrendsDao::new(), ParkingDao::new(), connection_pool.clone()),
        )
    }
}
