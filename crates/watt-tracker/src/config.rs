use config::{Config, ConfigError, Environment};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServiceConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    // NATS configuration
    /// NATS server URL
    #[serde(default = "default_nats_url")]
    pub nats_url: String,

    /// JetStream stream carrying raw usage samples
    #[serde(default = "default_usage_stream")]
    pub usage_stream: String,

    /// JetStream stream carrying threshold alerts
    #[serde(default = "default_alert_stream")]
    pub alert_stream: String,

    /// Durable consumer name for the usage sample stream
    #[serde(default = "default_usage_consumer_name")]
    pub usage_consumer_name: String,

    /// Batch size for the usage sample consumer
    #[serde(default = "default_nats_batch_size")]
    pub nats_batch_size: usize,

    /// Max wait time for batches in seconds
    #[serde(default = "default_nats_batch_wait_secs")]
    pub nats_batch_wait_secs: u64,

    /// Startup timeout for initialization operations in seconds
    #[serde(default = "default_startup_timeout_secs")]
    pub startup_timeout_secs: u64,

    // ClickHouse configuration
    /// ClickHouse HTTP URL
    #[serde(default = "default_clickhouse_url")]
    pub clickhouse_url: String,

    /// ClickHouse database name
    #[serde(default = "default_clickhouse_database")]
    pub clickhouse_database: String,

    /// ClickHouse username
    #[serde(default = "default_clickhouse_username")]
    pub clickhouse_username: String,

    /// ClickHouse password
    #[serde(default = "default_clickhouse_password")]
    pub clickhouse_password: String,

    /// Table holding the energy usage measurement
    #[serde(default = "default_clickhouse_table")]
    pub clickhouse_table: String,

    // Directory configuration
    /// Base URL of the device service
    #[serde(default = "default_device_service_url")]
    pub device_service_url: String,

    /// Base URL of the user service
    #[serde(default = "default_user_service_url")]
    pub user_service_url: String,

    /// Connect timeout for directory calls in milliseconds
    #[serde(default = "default_directory_connect_timeout_ms")]
    pub directory_connect_timeout_ms: u64,

    /// Request timeout for directory calls in milliseconds
    #[serde(default = "default_directory_request_timeout_ms")]
    pub directory_request_timeout_ms: u64,

    // Aggregation configuration
    /// Seconds between aggregation runs
    #[serde(default = "default_aggregation_interval_secs")]
    pub aggregation_interval_secs: u64,

    /// Hours of usage history each run sums over
    #[serde(default = "default_aggregation_lookback_hours")]
    pub aggregation_lookback_hours: i64,

    // HTTP configuration
    /// HTTP server host
    #[serde(default = "default_http_host")]
    pub http_host: String,

    /// HTTP server port
    #[serde(default = "default_http_port")]
    pub http_port: u16,
}

fn default_log_level() -> String {
    "info".to_string()
}

// NATS defaults
fn default_nats_url() -> String {
    "nats://localhost:4222".to_string()
}

fn default_usage_stream() -> String {
    "energy-usage".to_string()
}

fn default_alert_stream() -> String {
    "energy-alerts".to_string()
}

fn default_usage_consumer_name() -> String {
    "usage-tracker-consumer".to_string()
}

fn default_nats_batch_size() -> usize {
    30
}

fn default_nats_batch_wait_secs() -> u64 {
    5
}

fn default_startup_timeout_secs() -> u64 {
    30
}

// ClickHouse defaults
fn default_clickhouse_url() -> String {
    "http://localhost:8123".to_string()
}

fn default_clickhouse_database() -> String {
    "watt".to_string()
}

fn default_clickhouse_username() -> String {
    "default".to_string()
}

fn default_clickhouse_password() -> String {
    "".to_string()
}

fn default_clickhouse_table() -> String {
    "energy_usage".to_string()
}

// Directory defaults
fn default_device_service_url() -> String {
    "http://localhost:8082".to_string()
}

fn default_user_service_url() -> String {
    "http://localhost:8081".to_string()
}

fn default_directory_connect_timeout_ms() -> u64 {
    500
}

fn default_directory_request_timeout_ms() -> u64 {
    2_000
}

// Aggregation defaults
fn default_aggregation_interval_secs() -> u64 {
    10
}

fn default_aggregation_lookback_hours() -> i64 {
    24
}

// HTTP defaults
fn default_http_host() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    8080
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let config: Self = Config::builder()
            .add_source(Environment::with_prefix("WATT"))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that would only fail later, mid-cycle.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.nats_url.is_empty() {
            return Err(ConfigError::Message("nats_url must not be empty".into()));
        }
        if self.clickhouse_url.is_empty() {
            return Err(ConfigError::Message(
                "clickhouse_url must not be empty".into(),
            ));
        }
        if self.device_service_url.is_empty() || self.user_service_url.is_empty() {
            return Err(ConfigError::Message(
                "directory service URLs must not be empty".into(),
            ));
        }
        if self.usage_stream.is_empty() || self.alert_stream.is_empty() {
            return Err(ConfigError::Message(
                "stream names must not be empty".into(),
            ));
        }
        if self.nats_batch_size == 0 {
            return Err(ConfigError::Message(
                "nats_batch_size must be greater than zero".into(),
            ));
        }
        if self.aggregation_interval_secs == 0 {
            return Err(ConfigError::Message(
                "aggregation_interval_secs must be greater than zero".into(),
            ));
        }
        if self.aggregation_lookback_hours <= 0 {
            return Err(ConfigError::Message(
                "aggregation_lookback_hours must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}
