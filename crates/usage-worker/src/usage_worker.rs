use crate::nats::create_usage_sample_processor;
use crate::scheduler::{AggregationScheduler, SchedulerHandle};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;
use watt_domain::{AggregationService, UsageIngestService};
use watt_nats::{NatsClient, NatsConsumer};

pub struct UsageWorkerConfig {
    pub usage_stream: String,
    pub usage_subject: String,
    pub consumer_name: String,
    pub nats_batch_size: usize,
    pub nats_batch_wait_secs: u64,
    pub aggregation_interval: Duration,
}

/// Long-running side of the pipeline: the usage-sample consumer and the
/// aggregation scheduler, packaged as runner processes.
pub struct UsageWorker {
    consumer: NatsConsumer,
    scheduler: AggregationScheduler,
}

impl UsageWorker {
    pub async fn new(
        ingest_service: Arc<UsageIngestService>,
        aggregation_service: Arc<AggregationService>,
        nats_client: &NatsClient,
        config: UsageWorkerConfig,
    ) -> anyhow::Result<Self> {
        info!("initializing usage worker");

        let processor = create_usage_sample_processor(ingest_service);
        let consumer = NatsConsumer::new(
            nats_client.jetstream(),
            &config.usage_stream,
            &config.consumer_name,
            &config.usage_subject,
            config.nats_batch_size,
            config.nats_batch_wait_secs,
            processor,
        )
        .await?;

        let scheduler =
            AggregationScheduler::new(aggregation_service, config.aggregation_interval);

        info!("usage worker initialized");

        Ok(Self {
            consumer,
            scheduler,
        })
    }

    /// Handle for manual aggregation triggers, safe to hand to the HTTP
    /// surface before the worker is consumed by the runner.
    pub fn scheduler_handle(&self) -> SchedulerHandle {
        self.scheduler.handle()
    }

    pub fn into_runner_processes(
        self,
    ) -> Vec<
        Box<
            dyn FnOnce(
                    CancellationToken,
                ) -> std::pin::Pin<
                    Box<dyn std::future::Future<Output = anyhow::Result<()>> + Send>,
                > + Send,
        >,
    > {
        vec![
            Box::new({
                let consumer = self.consumer;
                move |ctx| Box::pin(async move { consumer.run(ctx).await })
            }),
            Box::new({
                let scheduler = self.scheduler;
                move |ctx| Box::pin(async move { scheduler.run(ctx).await })
            }),
        ]
    }
}
