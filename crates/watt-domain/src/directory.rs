use crate::error::DomainResult;
use crate::types::{Device, UserAccount};
use async_trait::async_trait;

/// Port for the external device directory.
/// Resolves a device to its owning user and static metadata.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait DeviceDirectory: Send + Sync {
    /// Resolve a device by id. `Ok(None)` means the directory answered but
    /// knows no such device.
    async fn get_device(&self, device_id: i64) -> DomainResult<Option<Device>>;

    /// All devices registered to a user. Empty vec, never an error, when the
    /// user has no devices.
    async fn list_devices_for_user(&self, user_id: i64) -> DomainResult<Vec<Device>>;
}

/// Port for the external user directory.
/// Resolves a user to their alerting preferences and contact address.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn get_user(&self, user_id: i64) -> DomainResult<Option<UserAccount>>;
}
