use anyhow::Context;
use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::debug;
use watt_domain::{DomainResult, UserAccount, UserDirectory};

use crate::config::DirectoryConfig;
use crate::models::UserDto;

/// HTTP implementation of [`UserDirectory`] against the user service.
#[derive(Clone)]
pub struct HttpUserDirectory {
    client: reqwest::Client,
    base_url: String,
}

impl HttpUserDirectory {
    pub fn new(config: &DirectoryConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.request_timeout())
            .build()
            .context("failed to build user directory HTTP client")?;

        Ok(Self {
            client,
            base_url: config.user_service_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl UserDirectory for HttpUserDirectory {
    async fn get_user(&self, user_id: i64) -> DomainResult<Option<UserAccount>> {
        let url = format!("{}/api/v1/user/{}", self.base_url, user_id);
        debug!(user_id, %url, "resolving user");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("user directory request failed")?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let dto: UserDto = response
            .error_for_status()
            .context("user directory returned an error status")?
            .json()
            .await
            .context("failed to decode user directory response")?;

        Ok(Some(dto.into()))
    }
}
