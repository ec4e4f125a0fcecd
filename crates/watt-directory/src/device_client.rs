use anyhow::Context;
use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::debug;
use watt_domain::{Device, DeviceDirectory, DomainResult};

use crate::config::DirectoryConfig;
use crate::models::DeviceDto;

/// HTTP implementation of [`DeviceDirectory`] against the device service.
#[derive(Clone)]
pub struct HttpDeviceDirectory {
    client: reqwest::Client,
    base_url: String,
}

impl HttpDeviceDirectory {
    pub fn new(config: &DirectoryConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.request_timeout())
            .build()
            .context("failed to build device directory HTTP client")?;

        Ok(Self {
            client,
            base_url: config.device_service_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl DeviceDirectory for HttpDeviceDirectory {
    async fn get_device(&self, device_id: i64) -> DomainResult<Option<Device>> {
        let url = format!("{}/api/v1/device/{}", self.base_url, device_id);
        debug!(device_id, %url, "resolving device");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("device directory request failed")?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let dto: DeviceDto = response
            .error_for_status()
            .context("device directory returned an error status")?
            .json()
            .await
            .context("failed to decode device directory response")?;

        Ok(dto.into_domain())
    }

    async fn list_devices_for_user(&self, user_id: i64) -> DomainResult<Vec<Device>> {
        let url = format!("{}/api/v1/device/user/{}", self.base_url, user_id);
        debug!(user_id, %url, "listing devices for user");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("device directory request failed")?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }

        let dtos: Vec<DeviceDto> = response
            .error_for_status()
            .context("device directory returned an error status")?
            .json()
            .await
            .context("failed to decode device list response")?;

        Ok(dtos.into_iter().filter_map(DeviceDto::into_domain).collect())
    }
}
