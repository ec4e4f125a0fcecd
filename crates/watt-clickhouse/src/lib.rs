mod client;
mod config;
mod models;
mod usage_store;

pub use client::ClickHouseClient;
pub use config::ClickHouseConfig;
pub use models::EnergyUsageRow;
pub use usage_store::ClickHouseUsageStore;
