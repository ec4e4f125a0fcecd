use anyhow::Context;
use async_nats::jetstream;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;
use watt_domain::{AlertEvent, AlertProducer, DomainResult};

/// Wire form of an alert event. Field names follow the contract consumed by
/// the downstream notification service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertEventMessage {
    pub user_id: i64,
    pub message: String,
    pub threshold: f64,
    pub energy_consumed: f64,
    pub email: Option<String>,
}

impl From<&AlertEvent> for AlertEventMessage {
    fn from(alert: &AlertEvent) -> Self {
        AlertEventMessage {
            user_id: alert.user_id,
            message: alert.message.clone(),
            threshold: alert.threshold,
            energy_consumed: alert.energy_consumed,
            email: alert.email.clone(),
        }
    }
}

/// JetStream implementation of [`AlertProducer`]: JSON payloads on the alert
/// subject, publish acknowledged before returning.
pub struct NatsAlertProducer {
    jetstream: jetstream::Context,
    subject: String,
}

impl NatsAlertProducer {
    pub fn new(jetstream: jetstream::Context, subject: String) -> Self {
        Self { jetstream, subject }
    }
}

#[async_trait]
impl AlertProducer for NatsAlertProducer {
    async fn publish_alert(&self, alert: &AlertEvent) -> DomainResult<()> {
        let message: AlertEventMessage = alert.into();
        let payload = serde_json::to_vec(&message).context("failed to encode alert event")?;

        debug!(
            subject = %self.subject,
            user_id = alert.user_id,
            "publishing alert event"
        );

        let ack = self
            .jetstream
            .publish(self.subject.clone(), payload.into())
            .await
            .context("failed to publish alert event")?;

        ack.await
            .context("failed to receive JetStream acknowledgment")?;

        Ok(())
    }
}
