use serde::Deserialize;
use watt_domain::{Device, UserAccount};

/// Device payload as served by the device directory.
/// Field names follow the collaborator's JSON contract.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceDto {
    pub id: i64,
    pub user_id: Option<i64>,
    pub name: String,
    #[serde(rename = "type")]
    pub device_type: String,
    pub location: String,
}

impl DeviceDto {
    /// A device without an owner is treated the same as an unknown device;
    /// downstream aggregation must never see an unowned aggregate.
    pub fn into_domain(self) -> Option<Device> {
        let user_id = self.user_id?;
        Some(Device {
            id: self.id,
            user_id,
            name: self.name,
            device_type: self.device_type,
            location: self.location,
        })
    }
}

/// User payload as served by the user directory.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDto {
    pub id: i64,
    pub email: Option<String>,
    pub alerting: bool,
    pub energy_alerting_threshold: f64,
}

impl From<UserDto> for UserAccount {
    fn from(dto: UserDto) -> Self {
        UserAccount {
            id: dto.id,
            email: dto.email,
            alerting: dto.alerting,
            energy_alerting_threshold: dto.energy_alerting_threshold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_dto_decodes_collaborator_json() {
        let json = r#"{
            "id": 7,
            "userId": 42,
            "name": "Fridge",
            "type": "APPLIANCE",
            "location": "Kitchen"
        }"#;

        let dto: DeviceDto = serde_json::from_str(json).unwrap();
        let device = dto.into_domain().unwrap();

        assert_eq!(device.id, 7);
        assert_eq!(device.user_id, 42);
        assert_eq!(device.device_type, "APPLIANCE");
    }

    #[test]
    fn test_unowned_device_maps_to_none() {
        let json = r#"{
            "id": 7,
            "userId": null,
            "name": "Fridge",
            "type": "APPLIANCE",
            "location": "Kitchen"
        }"#;

        let dto: DeviceDto = serde_json::from_str(json).unwrap();

        assert!(dto.into_domain().is_none());
    }

    #[test]
    fn test_user_dto_decodes_collaborator_json() {
        let json = r#"{
            "id": 42,
            "email": "a@x.com",
            "alerting": true,
            "energyAlertingThreshold": 25.0
        }"#;

        let dto: UserDto = serde_json::from_str(json).unwrap();
        let user: UserAccount = dto.into();

        assert_eq!(user.id, 42);
        assert!(user.alerting);
        assert_eq!(user.energy_alerting_threshold, 25.0);
        assert_eq!(user.email.as_deref(), Some("a@x.com"));
    }
}
