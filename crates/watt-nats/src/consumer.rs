use anyhow::{Context, Result};
use async_nats::jetstream::{self, consumer::PullConsumer, Message};
use futures::{future::BoxFuture, StreamExt};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Per-batch acknowledgment decision made by a [`BatchProcessor`].
///
/// Indices refer to positions in the batch slice. Acked messages are done;
/// nak'd messages are redelivered by JetStream.
#[derive(Debug)]
pub struct ProcessingResult {
    pub ack: Vec<usize>,
    pub nak: Vec<(usize, Option<String>)>,
}

impl ProcessingResult {
    pub fn ack_all(count: usize) -> Self {
        Self {
            ack: (0..count).collect(),
            nak: Vec::new(),
        }
    }

    pub fn nak_all(count: usize, error: Option<String>) -> Self {
        Self {
            ack: Vec::new(),
            nak: (0..count).map(|i| (i, error.clone())).collect(),
        }
    }
}

/// Batch processor function: deserialization and business logic live here,
/// the consumer only handles fetching and acknowledgment.
pub type BatchProcessor =
    Box<dyn Fn(&[Message]) -> BoxFuture<'static, Result<ProcessingResult>> + Send + Sync>;

/// Generic JetStream pull consumer processing batches of messages through a
/// [`BatchProcessor`]. One consumer instance runs as one long-lived process.
pub struct NatsConsumer {
    consumer: PullConsumer,
    batch_size: usize,
    max_wait: Duration,
    processor: BatchProcessor,
}

impl NatsConsumer {
    pub async fn new(
        jetstream: &jetstream::Context,
        stream_name: &str,
        consumer_name: &str,
        subject_filter: &str,
        batch_size: usize,
        max_wait_secs: u64,
        processor: BatchProcessor,
    ) -> Result<Self> {
        let consumer = jetstream
            .create_consumer_on_stream(
                jetstream::consumer::pull::Config {
                    name: Some(consumer_name.to_string()),
                    durable_name: Some(consumer_name.to_string()),
                    filter_subject: subject_filter.to_string(),
                    ack_policy: jetstream::consumer::AckPolicy::Explicit,
                    ..Default::default()
                },
                stream_name,
            )
            .await
            .context("failed to create consumer")?;

        info!(
            stream = stream_name,
            consumer = consumer_name,
            subject = subject_filter,
            "created durable consumer"
        );

        Ok(Self {
            consumer,
            batch_size,
            max_wait: Duration::from_secs(max_wait_secs),
            processor,
        })
    }

    pub async fn run(&self, ctx: CancellationToken) -> Result<()> {
        info!("starting consumer loop");

        loop {
            tokio::select! {
                _ = ctx.cancelled() => {
                    info!("shutdown signal received, stopping consumer");
                    break;
                }
                result = self.fetch_and_process_batch() => {
                    if let Err(e) = result {
                        error!(error = %e, "error processing batch");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        }

        Ok(())
    }

    async fn fetch_and_process_batch(&self) -> Result<()> {
        let mut messages = self
            .consumer
            .fetch()
            .max_messages(self.batch_size)
            .expires(self.max_wait)
            .messages()
            .await
            .context("failed to fetch messages")?;

        let mut batch = Vec::new();
        while let Some(result) = messages.next().await {
            match result {
                Ok(msg) => batch.push(msg),
                Err(e) => warn!(error = %e, "error receiving message from batch"),
            }
        }

        if batch.is_empty() {
            return Ok(());
        }

        debug!(message_count = batch.len(), "processing message batch");

        let outcome = match (self.processor)(&batch).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(error = %e, "processor failed, rejecting whole batch");
                ProcessingResult::nak_all(batch.len(), Some(e.to_string()))
            }
        };

        for idx in outcome.ack {
            match batch.get(idx) {
                Some(msg) => {
                    if let Err(e) = msg.ack().await {
                        error!(error = %e, message_index = idx, "failed to ack message");
                    }
                }
                None => warn!(message_index = idx, "ack index out of range"),
            }
        }

        for (idx, reason) in outcome.nak {
            match batch.get(idx) {
                Some(msg) => {
                    if let Some(reason) = reason {
                        warn!(
                            message_index = idx,
                            subject = %msg.subject,
                            reason = %reason,
                            "rejecting message for redelivery"
                        );
                    }
                    if let Err(e) = msg.ack_with(jetstream::AckKind::Nak(None)).await {
                        error!(error = %e, message_index = idx, "failed to nak message");
                    }
                }
                None => warn!(message_index = idx, "nak index out of range"),
            }
        }

        Ok(())
    }
}
