use chrono::{DateTime, Datelike, Days, TimeZone, Timelike, Utc};
use rand::Rng;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::info;

use crate::{
    dao::{Table, count_rows, environmental::EnvironmentalDao, parking::ParkingDao, trends::TrendsDao},
    model::{
        apperror::ApplicationError,
        models::{
            CarOwnershipAddInputType, CongestionAddInputType, EnvironmentalAddInputType, SeedOutputType, TableCounts, UsageAddInputType, ZoneAddInputType, ZoneType,
            round_one_decimal,
        },
    },
    service::acquire,
};

/**
 * Historical city-center population by year.
 */
pub const POPULATION_HISTORY: [(i64, i64); 21] = [
    (2001, 55399),
    (2002, 60592),
    (2003, 66149),
    (2004, 71532),
    (2005, 76197),
    (2006, 80154),
    (2007, 85141),
    (2008, 89792),
    (2009, 94330),
    (2010, 97578),
    (2011, 100228),
    (2012, 107573),
    (2013, 118707),
    (2014, 127975),
    (2015, 136873),
    (2016, 146099),
    (2017, 155992),
    (2018, 163449),
    (2019, 169106),
    (2020, 170785),
    (2021, 153655),
];

/**
 * Years whose synthetic values get the pandemic adjustment.
 */
const PANDEMIC_YEARS: [i64; 2] = [2020, 2021];

const FIRST_TREND_YEAR: i64 = 2001;

const ENVIRONMENTAL_YEARS: std::ops::RangeInclusive<i64> = 2015..=2021;

/**
 * Hours of the day that get a usage sample.
 */
pub const USAGE_HOURS: [u32; 9] = [7, 8, 9, 12, 13, 14, 17, 18, 19];

/**
 * Days of usage history generated before "now".
 */
const USAGE_HISTORY_DAYS: u64 = 30;

pub const PARKING_ZONES: [ZoneAddInputType; 8] = [
    ZoneAddInputType { zone_name: "Collins Street East", zone_code: "CSE", latitude: -37.8136, longitude: 144.9631, total_spaces: 150, hourly_rate: 8.50, max_duration_hours: 4 },
    ZoneAddInputType { zone_name: "Bourke Street Mall", zone_code: "BSM", latitude: -37.8140, longitude: 144.9633, total_spaces: 200, hourly_rate: 10.00, max_duration_hours: 2 },
    ZoneAddInputType { zone_name: "Flinders Street", zone_code: "FS", latitude: -37.8183, longitude: 144.9671, total_spaces: 180, hourly_rate: 7.50, max_duration_hours: 8 },
    ZoneAddInputType { zone_name: "Queen Street", zone_code: "QS", latitude: -37.8136, longitude: 144.9613, total_spaces: 120, hourly_rate: 9.00, max_duration_hours: 4 },
    ZoneAddInputType { zone_name: "Elizabeth Street", zone_code: "ES", latitude: -37.8118, longitude: 144.9618, total_spaces: 160, hourly_rate: 8.00, max_duration_hours: 6 },
    ZoneAddInputType { zone_name: "Spring Street", zone_code: "SS", latitude: -37.8136, longitude: 144.9742, total_spaces: 90, hourly_rate: 6.50, max_duration_hours: 8 },
    ZoneAddInputType { zone_name: "Lonsdale Street", zone_code: "LS", latitude: -37.8118, longitude: 144.9648, total_spaces: 140, hourly_rate: 7.00, max_duration_hours: 6 },
    ZoneAddInputType { zone_name: "Little Collins", zone_code: "LC", latitude: -37.8118, longitude: 144.9648, total_spaces: 100, hourly_rate: 9.50, max_duration_hours: 3 },
];

fn pandemic_factor(year: i64, factor: f64) -> f64 {
    if PANDEMIC_YEARS.contains(&year) { factor } else { 1.0 }
}

/**
 * Congestion rises 1.5 points a year from 15 in 2001 and drops by 30% in pandemic years.
 */
#[allow(clippy::cast_precision_loss)]
pub fn generate_congestion<R: Rng>(year: i64, rng: &mut R) -> CongestionAddInputType {
    let base = (15.0 + (year - FIRST_TREND_YEAR) as f64 * 1.5) * pandemic_factor(year, 0.7);
    let congestion_index = round_one_decimal(base + rng.gen_range(-2.0..=2.0));
    let average_speed_kmh = round_one_decimal(25.0 + rng.gen_range(-5.0..=10.0));
    let peak_hour_delay_minutes = round_one_decimal(congestion_index * 0.8 + rng.gen_range(-2.0..=3.0));
    CongestionAddInputType { year, congestion_index, average_speed_kmh, peak_hour_delay_minutes }
}

/**
 * Car ownership falls 0.8 cars per 100 households a year from 65 in 2001 and rises by 10% in pandemic years.
 */
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
pub fn generate_car_ownership<R: Rng>(year: i64, population: i64, rng: &mut R) -> CarOwnershipAddInputType {
    let base = (65.0 - (year - FIRST_TREND_YEAR) as f64 * 0.8) * pandemic_factor(year, 1.1);
    let cars_per_100_households = round_one_decimal(base + rng.gen_range(-3.0..=3.0));
    let total_registered_vehicles = (population as f64 * (cars_per_100_households / 100.0) * rng.gen_range(0.8..=1.2)) as i64;
    CarOwnershipAddInputType { year, cars_per_100_households, total_registered_vehicles }
}

/**
 * Expected share of occupied spaces for an hour of the day.
 */
pub fn base_occupancy(hour: u32, is_weekday: bool) -> f64 {
    if !is_weekday {
        return 0.4;
    }
    match hour {
        8 | 13 | 18 => 0.85,
        7 | 9 | 12 | 14 | 17 | 19 => 0.75,
        _ => 0.6,
    }
}

/**
 * Occupancy percentage for one sample, always within [0, 100].
 */
pub fn generate_occupancy_rate<R: Rng>(hour: u32, is_weekday: bool, rng: &mut R) -> f64 {
    (base_occupancy(hour, is_weekday) * 100.0 + rng.gen_range(-15.0..=15.0)).clamp(0.0, 100.0)
}

/**
 * Sample instants for the usage history: the listed hours of each of the last 30 days and today, none later than `now`.
 */
pub fn usage_timestamps(now: DateTime<Utc>) -> Vec<DateTime<Utc>> {
    let Some(first_day) = now.date_naive().checked_sub_days(Days::new(USAGE_HISTORY_DAYS)) else {
        return vec![];
    };
    first_day
        .iter_days()
        .take_while(|day| *day <= now.date_naive())
        .flat_map(|day| USAGE_HOURS.iter().filter_map(move |hour| day.and_hms_opt(*hour, 0, 0)))
        .map(|naive| Utc.from_utc_datetime(&naive))
        .filter(|timestamp| *timestamp <= now)
        .collect()
}

#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
pub fn generate_usage<R: Rng>(zone: &ZoneType, timestamp: DateTime<Utc>, rng: &mut R) -> UsageAddInputType {
    let day_of_week = timestamp.weekday().num_days_from_monday();
    let hour = timestamp.hour();
    let occupancy_rate = generate_occupancy_rate(hour, day_of_week < 5, rng);
    let occupied_spaces = (occupancy_rate / 100.0 * zone.total_spaces as f64) as i64;
    UsageAddInputType { zone_id: zone.id, timestamp, occupied_spaces, total_spaces: zone.total_spaces, hour_of_day: i64::from(hour), day_of_week: i64::from(day_of_week) }
}

/**
 * Emissions rise 50 tonnes a year from 1500 in 2015 and drop by 20% in pandemic years.
 */
#[allow(clippy::cast_precision_loss)]
pub fn generate_environmental<R: Rng>(year: i64, month: i64, rng: &mut R) -> EnvironmentalAddInputType {
    let base_co2 = (1500.0 + (year - ENVIRONMENTAL_YEARS.start()) as f64 * 50.0) * pandemic_factor(year, 0.8);
    EnvironmentalAddInputType {
        year,
        month,
        co2_emissions_tonnes: round_one_decimal(base_co2 + rng.gen_range(-200.0..=200.0)),
        air_quality_index: round_one_decimal(45.0 + rng.gen_range(-10.0..=25.0)),
        noise_level_db: round_one_decimal(65.0 + rng.gen_range(-5.0..=10.0)),
        green_transport_percentage: round_one_decimal(35.0 + rng.gen_range(-5.0..=15.0)),
    }
}

/**
 * Represents the service populating the store with historical and synthetic data.
 */
pub struct SeedService {
    trends_dao: TrendsDao,
    parking_dao: ParkingDao,
    environmental_dao: EnvironmentalDao,
    connection_pool: SqlitePool,
}

impl SeedService {
    pub fn new(trends_dao: TrendsDao, parking_dao: ParkingDao, environmental_dao: EnvironmentalDao, connection_pool: SqlitePool) -> Self {
        SeedService { trends_dao, parking_dao, environmental_dao, connection_pool }
    }

    /**
     * Populates every table in one transaction. Rows whose natural key already exists are left untouched, so running
     * it again only fills gaps.
     *
     * # Arguments
     * `rng`: Source of the synthetic noise.
     * `now`: End of the usage history.
     *
     * # Returns
     * A Result containing the inserted row counts and table sizes, or an `ApplicationError`.
     */
    pub async fn seed<R: Rng>(&self, rng: &mut R, now: DateTime<Utc>) -> Result<SeedOutputType, ApplicationError> {
        let mut transaction = self.connection_pool.begin().await.map_err(|err| ApplicationError::database("Failed to begin transaction", err))?;
        let inserted = match self.seed_tables(&mut transaction, rng, now).await {
            Ok(inserted) => {
                transaction.commit().await.map_err(|err| ApplicationError::database("Failed to commit transaction", err))?;
                inserted
            }
            Err(err) => {
                transaction.rollback().await.map_err(|err| ApplicationError::database("Failed to rollback transaction", err))?;
                return Err(err);
            }
        };
        let totals = self.table_counts().await?;
        info!(
            population_trends = inserted.population_trends,
            congestion_trends = inserted.congestion_trends,
            car_ownership_trends = inserted.car_ownership_trends,
            parking_zones = inserted.parking_zones,
            parking_usage = inserted.parking_usage,
            environmental_data = inserted.environmental_data,
            "Seeding inserted rows"
        );
        info!(
            population_trends = totals.population_trends,
            congestion_trends = totals.congestion_trends,
            parking_zones = totals.parking_zones,
            parking_usage = totals.parking_usage,
            "Data summary"
        );
        Ok(SeedOutputType { inserted, totals })
    }

    async fn seed_tables<R: Rng>(&self, connection: &mut SqliteConnection, rng: &mut R, now: DateTime<Utc>) -> Result<TableCounts, ApplicationError> {
        let mut inserted = TableCounts::default();
        for (year, population) in POPULATION_HISTORY {
            inserted.population_trends += self.trends_dao.add_population(connection, year, population).await?;
        }
        for (year, population) in POPULATION_HISTORY {
            inserted.congestion_trends += self.trends_dao.add_congestion(connection, &generate_congestion(year, rng)).await?;
            inserted.car_ownership_trends += self.trends_dao.add_car_ownership(connection, &generate_car_ownership(year, population, rng)).await?;
        }
        for zone in &PARKING_ZONES {
            inserted.parking_zones += self.parking_dao.add_zone(connection, zone).await?;
        }
        let zones = self.parking_dao.get_all_zones(connection).await?;
        for timestamp in usage_timestamps(now) {
            for zone in &zones {
                inserted.parking_usage += self.parking_dao.add_usage(connection, &generate_usage(zone, timestamp, rng)).await?;
            }
        }
        for year in ENVIRONMENTAL_YEARS {
            for month in 1..=12 {
                inserted.environmental_data += self.environmental_dao.add_environmental(connection, &generate_environmental(year, month, rng)).await?;
            }
        }
        Ok(inserted)
    }

    #[allow(clippy::cast_sign_loss)]
    async fn table_counts(&self) -> Result<TableCounts, ApplicationError> {
        let mut connection = acquire(&self.connection_pool).await?;
        Ok(TableCounts {
            population_trends: count_rows(&mut connection, Table::PopulationTrends).await? as u64,
            congestion_trends: count_rows(&mut connection, Table::CongestionTrends).await? as u64,
            car_ownership_trends: count_rows(&mut connection, Table::CarOwnershipTrends).await? as u64,
            parking_zones: count_rows(&mut connection, Table::ParkingZones).await? as u64,
            parking_usage: count_rows(&mut connection, Table::ParkingUsage).await? as u64,
            environmental_data: count_rows(&mut connection, Table::EnvironmentalData).await? as u64,
        })
    }
}
