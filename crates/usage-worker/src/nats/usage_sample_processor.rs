use async_nats::jetstream::Message;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error};
use watt_domain::{DomainError, UsageIngestService, UsageSample};
use watt_nats::{BatchProcessor, ProcessingResult};

/// Wire form of an inbound usage sample. Field names follow the producer's
/// JSON contract; the timestamp is epoch milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnergyUsageMessage {
    pub device_id: i64,
    pub energy_consumed: f64,
    pub timestamp: i64,
}

impl EnergyUsageMessage {
    fn into_sample(self) -> Result<UsageSample, DomainError> {
        let timestamp = chrono::DateTime::from_timestamp_millis(self.timestamp).ok_or_else(|| {
            DomainError::InvalidSample(format!("timestamp out of range: {}", self.timestamp))
        })?;
        Ok(UsageSample {
            device_id: self.device_id,
            energy_consumed: self.energy_consumed,
            timestamp,
        })
    }
}

/// Build a [`BatchProcessor`] that feeds usage samples into the ingest
/// service.
///
/// Only malformed payloads are nak'd; ingestion itself never fails a message
/// (store outages drop the sample and still ack, keeping the consumer live).
pub fn create_usage_sample_processor(service: Arc<UsageIngestService>) -> BatchProcessor {
    Box::new(move |messages: &[Message]| {
        let service = Arc::clone(&service);

        // Copy payloads out of the batch; Message borrows from the slice.
        let message_data: Vec<(usize, Vec<u8>)> = messages
            .iter()
            .enumerate()
            .map(|(idx, msg)| (idx, msg.payload.to_vec()))
            .collect();

        Box::pin(async move { Ok(process_payloads(&service, message_data).await) })
    })
}

async fn process_payloads(
    service: &UsageIngestService,
    payloads: Vec<(usize, Vec<u8>)>,
) -> ProcessingResult {
    let mut ack = Vec::new();
    let mut nak = Vec::new();

    for (idx, payload) in payloads {
        let message: EnergyUsageMessage = match serde_json::from_slice(&payload) {
            Ok(message) => message,
            Err(e) => {
                error!(error = %e, index = idx, "failed to decode usage sample message");
                nak.push((idx, Some(format!("decode error: {e}"))));
                continue;
            }
        };

        let sample = match message.into_sample() {
            Ok(sample) => sample,
            Err(e) => {
                error!(error = %e, index = idx, "invalid usage sample message");
                nak.push((idx, Some(e.to_string())));
                continue;
            }
        };

        match service.ingest(sample).await {
            Ok(()) => {
                debug!(index = idx, "usage sample processed");
                ack.push(idx);
            }
            Err(e) => {
                // Ingest is at-most-once by contract; even an unexpected
                // failure must not hold the message.
                error!(error = %e, index = idx, "unexpected ingest failure, acking anyway");
                ack.push(idx);
            }
        }
    }

    ProcessingResult { ack, nak }
}
