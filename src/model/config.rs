use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

/**
 * Command-line arguments for the application.
 */
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct ApplicationArguments {
    /**
     * Path to the configuration file.
     */
    #[arg(short, long)]
    pub config_file: String,
    /**
     * What to run. Defaults to serving the API.
     */
    #[command(subcommand)]
    pub command: Option<Command>,
}

/**
 * Commands supported by the binary.
 */
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /**
     * Create the schema if missing and serve the HTTP API.
     */
    Serve,
    /**
     * Create the schema if missing and populate it with historical and synthetic data.
     */
    Seed,
}

/**
 * Represents the configuration for the application.
 */
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /**
     * Logging configuration for the application.
     */
    pub logging: LoggingConfig,
    /**
     * Server configuration for the application.
     */
    pub server: Server,
    /**
     * Database configuration for the application.
     */
    pub database: Database,
    /**
     * Cross-origin configuration. Defaults to the dashboard origins.
     */
    #[serde(default)]
    pub cors: CorsConfig,
}

#[allow(clippy::struct_excessive_bools)]
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggingConfig {
    /**
     * Whether to log the target of the log message.
     */
    pub target: bool,
    /**
     * Whether to log thread IDs .
     */
    pub thread_ids: bool,
    /**
     * Whether to log thread names.
     */
    pub thread_names: bool,
    /**
     * Whether to log line numbers.
     */
    pub line_number: bool,
    /**
     * Whether to log the log level.
     */
    pub level: bool,
    /**
     * Whether to use ANSI colors in logs.
     */
    pub ansi: bool,
    /**
     * Filter directives used when `RUST_LOG` is not set, e.g. `urban_metrics_api=debug`.
     */
    pub directives: Vec<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig { target: true, thread_ids: false, thread_names: false, line_number: false, level: true, ansi: true, directives: vec!["info".to_string()] }
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Database {
    /**
     * Type of the database (e.g., `SQLite`).
     */
    pub db_type: DatabaseType,
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DatabaseType {
    /**
     * File backed `SQLite` database. The file is created if it does not exist.
     * Timeouts are in milliseconds.
     */
    #[serde(rename_all = "camelCase")]
    Sqlite { file: String, max_connections: u32, min_connections: u32, acquire_timeout: u64, idle_timeout: u64, max_lifetime: u64 },
}

/**
 * Cross-origin resource sharing configuration.
 */
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorsConfig {
    /**
     * Origins allowed to call the API.
     */
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        CorsConfig {
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:5173".to_string(),
                "http://localhost:3001".to_string(),
                "http://127.0.0.1:3000".to_string(),
                "http://127.0.0.1:5173".to_string(),
                "https://fit5120-tp31-1.onrender.com".to_string(),
            ],
        }
    }
}

/**
 * Represents the server configuration for the application.
 */
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Server {
    /**
     * Number of worker threads for the server.
     */
    pub workers: usize,
    /**
     * Address to bind to. Defaults to localhost.
     */
    #[serde(default = "default_host")]
    pub host: String,
    /**
     * HTTP port for the server.
     */
    pub http_port: Option<u16>,
    /**
     * HTTPS configuration for the server.
     */
    pub https_config: Option<HttpsConfig>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

/**
 * Represents the HTTPS configuration for the server.
 */
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpsConfig {
    /**
     * Port for the HTTPS server.
     */
    pub port: u16,
    /**
     * Path to the certificate file.
     */
    pub certificate_file: String,
    /**
     * Path to the private key file.
     */
    pub private_key_file: String,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_config_serialization() {
        let config = Config {
            logging: LoggingConfig::default(),
            database: Database {
                db_type: DatabaseType::Sqlite { file: "./data/urban_metrics.db".to_string(), max_connections: 5, min_connections: 1, acquire_timeout: 30, idle_timeout: 300, max_lifetime: 3600 },
            },
            server: Server { workers: 4, host: default_host(), http_port: Some(8000), https_config: None },
            cors: CorsConfig::default(),
        };
        let serialized = toml::to_string(&config).unwrap();
        let deserialized: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(config.logging.target, deserialized.logging.target);
        assert_eq!(config.logging.thread_ids, deserialized.logging.thread_ids);
        assert_eq!(config.logging.line_number, deserialized.logging.line_number);
        assert_eq!(config.logging.level, deserialized.logging.level);
        assert_eq!(config.logging.ansi, deserialized.logging.ansi);
        assert_eq!(config.logging.directives, deserialized.logging.directives);
        assert_eq!(config.server.workers, deserialized.server.workers);
        assert_eq!(config.server.http_port, deserialized.server.http_port);
        assert!(deserialized.server.https_config.is_none());
        assert_eq!(deserialized.cors.allowed_origins.len(), 6);
        let DatabaseType::Sqlite { file, max_connections, .. } = deserialized.database.db_type;
        assert_eq!(file, "./data/urban_metrics.db");
        assert_eq!(max_connections, 5);
    }

    #[test]
    fn test_config_defaults_when_sections_missing() {
        let config_str = r#"
            [logging]
            target = false
            threadIds = false
            threadNames = false
            lineNumber = false
            level = true
            ansi = false
            directives = ["debug"]

            [server]
            workers = 2
            httpPort = 8000

            [database.dbType.sqlite]
            file = "urban.db"
            maxConnections = 4
            minConnections = 1
            acquireTimeout = 1000
            idleTimeout = 60000
            maxLifetime = 600000
        "#;
        let config: Config = toml::from_str(config_str).unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert!(config.cors.allowed_origins.contains(&"http://localhost:5173".to_string()));
        assert_eq!(config.logging.directives, vec!["debug".to_string()]);
    }

    #[test]
    fn test_arguments_subcommand() {
        let args = ApplicationArguments::parse_from(["urban_metrics_api", "-c", "config.toml", "seed"]);
        assert_eq!(args.config_file, "config.toml");
        assert_eq!(args.command, Some(Command::Seed));
        let args = ApplicationArguments::parse_from(["urban_metrics_api", "--config-file", "config.toml"]);
        assert_eq!(args.command, None);
    }
}
