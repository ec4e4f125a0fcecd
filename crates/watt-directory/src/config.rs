use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Settings for the external directory HTTP clients.
///
/// Both timeouts are deliberately short: one unresponsive directory call must
/// be treated as a failed lookup, not stall a whole aggregation cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    pub device_service_url: String,
    pub user_service_url: String,
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
}

impl DirectoryConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}
