use crate::error::DomainResult;
use crate::store::UsageStore;
use crate::types::UsageSample;
use std::sync::Arc;
use tracing::{debug, error, instrument};

/// Domain service that persists inbound usage samples.
///
/// Ingestion is deliberately at-most-once: when the store is unhealthy or a
/// write fails, the sample is dropped and the inbound message is still acked.
/// This trades data completeness for pipeline liveness so a down store can
/// never stall the consumer.
pub struct UsageIngestService {
    store: Arc<dyn UsageStore>,
}

impl UsageIngestService {
    pub fn new(store: Arc<dyn UsageStore>) -> Self {
        Self { store }
    }

    /// Persist one sample. Returns `Ok` even when the write is abandoned;
    /// only the logs tell the difference.
    #[instrument(skip(self), fields(device_id = sample.device_id))]
    pub async fn ingest(&self, sample: UsageSample) -> DomainResult<()> {
        if let Err(e) = self.store.ping().await {
            error!(
                error = %e,
                device_id = sample.device_id,
                "usage store health check failed, dropping sample"
            );
            return Ok(());
        }

        match self.store.write_sample(&sample).await {
            Ok(()) => {
                debug!(
                    device_id = sample.device_id,
                    energy_consumed = sample.energy_consumed,
                    "wrote usage sample"
                );
            }
            Err(e) => {
                error!(
                    error = %e,
                    device_id = sample.device_id,
                    "failed to write usage sample, dropping"
                );
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DomainError;
    use crate::store::MockUsageStore;
    use chrono::Utc;

    fn sample(device_id: i64, energy: f64) -> UsageSample {
        UsageSample {
            device_id,
            energy_consumed: energy,
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_ingest_writes_one_point() {
        let mut mock_store = MockUsageStore::new();

        mock_store.expect_ping().times(1).return_once(|| Ok(()));
        mock_store
            .expect_write_sample()
            .withf(|s: &UsageSample| s.device_id == 7 && s.energy_consumed == 12.5)
            .times(1)
            .return_once(|_| Ok(()));

        let service = UsageIngestService::new(Arc::new(mock_store));

        let result = service.ingest(sample(7, 12.5)).await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_ingest_skips_write_when_store_unhealthy() {
        let mut mock_store = MockUsageStore::new();

        mock_store
            .expect_ping()
            .times(1)
            .return_once(|| Err(DomainError::StoreUnavailable("connection refused".into())));
        // write_sample must not be called
        mock_store.expect_write_sample().times(0);

        let service = UsageIngestService::new(Arc::new(mock_store));

        // The attempt is abandoned but the outcome is still Ok so the
        // inbound message gets acked.
        let result = service.ingest(sample(7, 12.5)).await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_ingest_swallows_write_errors() {
        let mut mock_store = MockUsageStore::new();

        mock_store.expect_ping().times(1).return_once(|| Ok(()));
        mock_store
            .expect_write_sample()
            .times(1)
            .return_once(|_| Err(DomainError::RepositoryError(anyhow::anyhow!("insert failed"))));

        let service = UsageIngestService::new(Arc::new(mock_store));

        let result = service.ingest(sample(3, 0.4)).await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_ingest_accepts_negative_energy() {
        let mut mock_store = MockUsageStore::new();

        mock_store.expect_ping().times(1).return_once(|| Ok(()));
        mock_store
            .expect_write_sample()
            .withf(|s: &UsageSample| s.energy_consumed == -1.0)
            .times(1)
            .return_once(|_| Ok(()));

        let service = UsageIngestService::new(Arc::new(mock_store));

        let result = service.ingest(sample(9, -1.0)).await;

        assert!(result.is_ok());
    }
}
