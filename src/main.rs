mod api;
mod dao;
mod model;
mod service;

use std::path::Path;
use std::thread;
use std::time::Duration;

use crate::api::endpoints::configure;
use crate::api::middleware::timing_middleware;
use crate::api::state::AppState;
use crate::dao::environmental::EnvironmentalDao;
use crate::dao::parking::ParkingDao;
use crate::dao::trends::TrendsDao;
use crate::model::apperror::{ApplicationError, ErrorType};
use crate::model::config::{ApplicationArguments, Command, Config, CorsConfig, DatabaseType, HttpsConfig, LoggingConfig};
use crate::service::seed::SeedService;

use actix_cors::Cors;
use actix_web::middleware::from_fn;
use actix_web::{App, HttpServer, web};
use actix_web_prom::{PrometheusMetrics, PrometheusMetricsBuilder};
use chrono::Utc;
use clap::Parser;
use prometheus::IntGauge;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rustls::pki_types::PrivateKeyDer;
use rustls::{ServerConfig, SupportedProtocolVersion};
use rustls_pemfile::{certs, pkcs8_private_keys};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let args = ApplicationArguments::parse();

    let config = get_config(&args.config_file)?;

    init_tracing(&config.logging)?;

    let connection_pool = create_pool(&config.database.db_type).await?;

    dao::apply_schema(&connection_pool).await.map_err(|err| std::io::Error::other(err.to_string()))?;

    match args.command.unwrap_or(Command::Serve) {
        Command::Seed => seed(connection_pool).await,
        Command::Serve => serve(config, connection_pool).await,
    }
}

/**
 * Populates the database and logs the resulting table sizes.
 *
 * #Arguments
 * `connection_pool`: The connection pool to seed through.
 */
async fn seed(connection_pool: SqlitePool) -> std::io::Result<()> {
    let seed_service = SeedService::new(TrendsDao::new(), ParkingDao::new(), EnvironmentalDao::new(), connection_pool.clone());
    let mut rng = StdRng::from_entropy();
    let output = seed_service.seed(&mut rng, Utc::now()).await.map_err(|err| std::io::Error::other(format!("Seeding failed: {err}")))?;
    info!(
        population_trends = output.totals.population_trends,
        congestion_trends = output.totals.congestion_trends,
        car_ownership_trends = output.totals.car_ownership_trends,
        parking_zones = output.totals.parking_zones,
        parking_usage = output.totals.parking_usage,
        environmental_data = output.totals.environmental_data,
        "Database seeded"
    );
    connection_pool.close().await;
    Ok(())
}

/**
 * Starts the HTTP(S) server.
 *
 * #Arguments
 * `config`: The application configuration.
 * `connection_pool`: The connection pool shared by the services.
 */
async fn serve(config: Config, connection_pool: SqlitePool) -> std::io::Result<()> {
    let state = web::Data::new(AppState::from_pool(&connection_pool));

    let prometheus = PrometheusMetricsBuilder::new("")
        .endpoint("/metrics")
        .mask_unmatched_patterns("UNKNOWN")
        .build()
        .map_err(|err| std::io::Error::other(format!("Failed to create Prometheus metrics: {err}")))?;

    let max_connections_gauge = IntGauge::new("max_connections", "Connection pool maximum").map_err(|err| std::io::Error::other(format!("Failed to create max_connections gauge: {err}")))?;
    let min_connections_gauge = IntGauge::new("min_connections", "Connection pool minimum").map_err(|err| std::io::Error::other(format!("Failed to create min_connections gauge: {err}")))?;
    let active_connections_gauge = IntGauge::new("active_connections", "Connection pool active").map_err(|err| std::io::Error::other(format!("Failed to create active_connections gauge: {err}")))?;
    let idle_connections_gauge = IntGauge::new("idle_connections", "Connection pool idle").map_err(|err| std::io::Error::other(format!("Failed to create idle_connections gauge: {err}")))?;
    register_prometheus_metrics(&prometheus, &max_connections_gauge)?;
    register_prometheus_metrics(&prometheus, &min_connections_gauge)?;
    register_prometheus_metrics(&prometheus, &active_connections_gauge)?;
    register_prometheus_metrics(&prometheus, &idle_connections_gauge)?;

    gather_db_metrics(max_connections_gauge, min_connections_gauge, active_connections_gauge, idle_connections_gauge, connection_pool);

    let cors_config = config.cors.clone();
    let server_init = HttpServer::new(move || {
        App::new()
            .wrap(from_fn(timing_middleware))
            .wrap(prometheus.clone())
            .wrap(cors(&cors_config))
            .app_data(state.clone())
            .configure(configure)
    });

    let host = config.server.host.as_str();
    let server_init = if let Some(http_port) = config.server.http_port {
        info!(host, http_port, "Binding HTTP listener");
        server_init.bind((host, http_port))?
    } else {
        server_init
    };
    let server_init = if let Some(https_config) = &config.server.https_config {
        let ssl_builder = ssl_builder(https_config).map_err(|err| std::io::Error::other(format!("Failed to create SSL/TLS configuration: {err}")))?;
        info!(host, https_port = https_config.port, "Binding HTTPS listener");
        server_init.bind_rustls_0_23((host, https_config.port), ssl_builder).map_err(|err| std::io::Error::other(format!("Failed to bind HTTPS server: {err}")))?
    } else {
        server_init
    };

    server_init.workers(config.server.workers).run().await
}

/**
 * Builds the cross-origin policy for the dashboard frontends.
 *
 * #Arguments
 * `cors_config`: Origins allowed to call the API.
 */
fn cors(cors_config: &CorsConfig) -> Cors {
    cors_config
        .allowed_origins
        .iter()
        .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
        .allowed_methods(vec!["GET", "POST", "PUT", "DELETE"])
        .allow_any_header()
        .supports_credentials()
}

/**
 * Initializes structured logging. `RUST_LOG` takes precedence over the configured directives.
 *
 * #Arguments
 * `logging_config`: Formatting options and fallback filter directives.
 *
 * #Returns
 * A `Result` indicating success or failure.
 */
fn init_tracing(logging_config: &LoggingConfig) -> Result<(), std::io::Error> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(env_filter) => env_filter,
        Err(_) => EnvFilter::try_new(logging_config.directives.join(",")).map_err(|err| std::io::Error::other(format!("Invalid logging directives: {err}")))?,
    };
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(logging_config.target)
        .with_thread_ids(logging_config.thread_ids)
        .with_thread_names(logging_config.thread_names)
        .with_line_number(logging_config.line_number)
        .with_level(logging_config.level)
        .with_ansi(logging_config.ansi);
    tracing_subscriber::registry().with(env_filter).with(fmt_layer).try_init().map_err(|err| std::io::Error::other(format!("Failed to initialize logging: {err}")))
}

/**
 * Opens the SQLite connection pool, creating the database file and its directory if missing.
 *
 * #Arguments
 * `db_type`: The database configuration.
 *
 * #Returns
 * A `Result` containing the pool or an `std::io::Error`.
 */
async fn create_pool(db_type: &DatabaseType) -> Result<SqlitePool, std::io::Error> {
    let DatabaseType::Sqlite { file, max_connections, min_connections, acquire_timeout, idle_timeout, max_lifetime } = db_type;
    if let Some(parent) = Path::new(file).parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|err| std::io::Error::other(format!("Failed to create database directory: {err}")))?;
    }
    let connect_options = SqliteConnectOptions::new()
        .filename(file)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(*acquire_timeout))
        .foreign_keys(true);
    info!(%file, "Opening database");
    SqlitePoolOptions::new()
        .max_connections(*max_connections)
        .min_connections(*min_connections)
        .acquire_timeout(Duration::from_millis(*acquire_timeout))
        .idle_timeout(Duration::from_millis(*idle_timeout))
        .max_lifetime(Duration::from_millis(*max_lifetime))
        .connect_with(connect_options)
        .await
        .map_err(|err| std::io::Error::other(format!("Failed to create database pool: {err}")))
}

/**
 * Registers custom Prometheus metrics.
 *
 * #Arguments
 * `prometheus_metrics`: The Prometheus metrics instance to register the gauge with.
 * `gauge`: The gauge to register.
 */
fn register_prometheus_metrics(prometheus_metrics: &PrometheusMetrics, gauge: &IntGauge) -> Result<(), std::io::Error> {
    prometheus_metrics.registry.register(Box::new(gauge.clone())).map_err(|err| std::io::Error::other(format!("Failed to register Prometheus gauge: {err}")))?;
    Ok(())
}

/**
 * Refreshes the connection pool gauges every second on a background thread.
 */
fn gather_db_metrics(max_connections_gauge: IntGauge, min_connections_gauge: IntGauge, active_connections_gauge: IntGauge, idle_connections_gauge: IntGauge, connection_pool: SqlitePool) {
    thread::spawn(move || {
        loop {
            max_connections_gauge.set(i64::from(connection_pool.options().get_max_connections()));
            min_connections_gauge.set(i64::from(connection_pool.options().get_min_connections()));
            active_connections_gauge.set(i64::from(connection_pool.size()));
            #[allow(clippy::cast_possible_wrap)]
            idle_connections_gauge.set(connection_pool.num_idle() as i64);
            thread::sleep(Duration::from_secs(1));
        }
    });
}

/**
 * Initializes the SSL/TLS configuration for the server.
 *
 * #Arguments
 * `https_config`: The HTTPS configuration containing the certificate and private key files.
 *
 * #Returns
 * A `Result` containing the initialized `ServerConfig` or an `ApplicationError` if initialization fails.
 */
fn ssl_builder(https_config: &HttpsConfig) -> Result<ServerConfig, ApplicationError> {
    let config_builder = ServerConfig::builder_with_protocol_versions(&get_protocol_versions());
    let cert_file = &mut std::io::BufReader::new(
        std::fs::File::open(&https_config.certificate_file).map_err(|err| ApplicationError::new(ErrorType::Initialization, format!("Failed to read certificate file: {err}")))?,
    );
    let key_file = &mut std::io::BufReader::new(
        std::fs::File::open(&https_config.private_key_file).map_err(|err| ApplicationError::new(ErrorType::Initialization, format!("Failed to read private key file: {err}")))?,
    );
    let cert_chain = certs(cert_file).collect::<Result<Vec<_>, _>>().map_err(|err| ApplicationError::new(ErrorType::Initialization, format!("Failed to convert certificate to der: {err}")))?;
    let private_key = pkcs8_private_keys(key_file)
        .next()
        .ok_or_else(|| ApplicationError::new(ErrorType::Initialization, "No private key found in private key file".to_string()))?
        .map(PrivateKeyDer::Pkcs8)
        .map_err(|err| ApplicationError::new(ErrorType::Initialization, format!("Failed to convert private key to der: {err}")))?;
    config_builder
        .with_no_client_auth()
        .with_single_cert(cert_chain, private_key)
        .map_err(|err| ApplicationError::new(ErrorType::Initialization, format!("Failed to create server config: {err}")))
}

/**
 * Returns the supported TLS protocol versions.
 */
fn get_protocol_versions() -> Vec<&'static SupportedProtocolVersion> {
    vec![&rustls::version::TLS13]
}

/**
 * Reads the configuration from the specified file.
 *
 * #Arguments
 * `config_file`: The path to the configuration file.
 *
 * #Returns
 * A `Result` containing the parsed `Config` or an `std::io::Error` if reading or parsing fails.
*/
fn get_config(config_file: &str) -> Result<Config, std::io::Error> {
    let config_str: String = std::fs::read_to_string(config_file).map_err(|err| std::io::Error::other(format!("Failed to read config file: {err}")))?;
    let config: Config = toml::from_str(&config_str).map_err(|err| std::io::Error::other(format!("Failed to parse config file: {err}")))?;
    Ok(config)
}
