use crate::error::DomainResult;
use crate::types::AlertEvent;
use async_trait::async_trait;

/// Port for publishing alert events onto the bus.
/// Delivery is fire-and-forget; suppression of repeated alerts for a
/// sustained breach is the downstream consumer's concern.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait AlertProducer: Send + Sync {
    async fn publish_alert(&self, alert: &AlertEvent) -> DomainResult<()>;
}
