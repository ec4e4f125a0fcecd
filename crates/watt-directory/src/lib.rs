mod config;
mod device_client;
mod models;
mod user_client;

pub use config::DirectoryConfig;
pub use device_client::HttpDeviceDirectory;
pub use user_client::HttpUserDirectory;
