mod config;
mod telemetry;

use chrono::Duration as ChronoDuration;
use config::ServiceConfig;
use std::sync::Arc;
use std::time::Duration;
use telemetry::init_telemetry;
use tracing::{error, info, warn};
use usage_worker::usage_worker::{UsageWorker, UsageWorkerConfig};
use watt_api::{HttpConfig, WattApi};
use watt_clickhouse::{ClickHouseClient, ClickHouseConfig, ClickHouseUsageStore};
use watt_directory::{DirectoryConfig, HttpDeviceDirectory, HttpUserDirectory};
use watt_domain::{AggregationService, UsageIngestService, UsageReportService};
use watt_nats::{NatsAlertProducer, NatsClient};
use watt_runner::Runner;

#[tokio::main]
async fn main() {
    let config = match ServiceConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = init_telemetry(&config.log_level) {
        eprintln!("Failed to initialize telemetry: {}", e);
        std::process::exit(1);
    }

    info!("Starting watt-tracker service");

    // ClickHouse: an unreachable store is survivable. Ingestion drops samples
    // until it recovers and aggregation fails per cycle, so start anyway.
    let clickhouse_config = ClickHouseConfig {
        url: config.clickhouse_url.clone(),
        database: config.clickhouse_database.clone(),
        username: config.clickhouse_username.clone(),
        password: config.clickhouse_password.clone(),
        table: config.clickhouse_table.clone(),
    };
    let clickhouse_client = ClickHouseClient::new(
        &clickhouse_config.url,
        &clickhouse_config.database,
        &clickhouse_config.username,
        &clickhouse_config.password,
    );
    if let Err(e) = clickhouse_client.ping().await {
        warn!(error = %e, "ClickHouse unreachable at startup, continuing degraded");
    }

    // NATS is the backbone of the pipeline; without it there is nothing to do.
    let nats_client = match initialize_nats(&config).await {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to initialize NATS: {:#}", e);
            std::process::exit(1);
        }
    };

    let (usage_worker, watt_api) =
        match initialize_modules(&config, &clickhouse_config, clickhouse_client, &nats_client).await
        {
            Ok(modules) => modules,
            Err(e) => {
                error!("Failed to initialize application modules: {:#}", e);
                std::process::exit(1);
            }
        };

    let mut runner = Runner::new();

    runner = runner.with_named_process("watt_api", watt_api.into_runner_process());

    for (i, process) in usage_worker.into_runner_processes().into_iter().enumerate() {
        runner = runner.with_named_process(format!("usage_worker_{}", i), process);
    }

    runner = runner
        .with_closer({
            let nats_for_close = nats_client;
            move || {
                Box::pin(async move {
                    info!("Running cleanup tasks...");
                    if let Ok(client) = Arc::try_unwrap(nats_for_close) {
                        client.close().await;
                    }
                    info!("Cleanup complete");
                    Ok(())
                })
            }
        })
        .with_closer_timeout(Duration::from_secs(10));

    runner.run().await;
}

async fn initialize_nats(config: &ServiceConfig) -> anyhow::Result<Arc<NatsClient>> {
    let nats_client = Arc::new(
        NatsClient::connect(
            &config.nats_url,
            Duration::from_secs(config.startup_timeout_secs),
        )
        .await?,
    );
    nats_client.ensure_stream(&config.usage_stream).await?;
    nats_client.ensure_stream(&config.alert_stream).await?;
    Ok(nats_client)
}

async fn initialize_modules(
    config: &ServiceConfig,
    clickhouse_config: &ClickHouseConfig,
    clickhouse_client: ClickHouseClient,
    nats_client: &NatsClient,
) -> anyhow::Result<(UsageWorker, WattApi)> {
    let directory_config = DirectoryConfig {
        device_service_url: config.device_service_url.clone(),
        user_service_url: config.user_service_url.clone(),
        connect_timeout_ms: config.directory_connect_timeout_ms,
        request_timeout_ms: config.directory_request_timeout_ms,
    };

    // Port adapters
    let usage_store = Arc::new(ClickHouseUsageStore::new(
        clickhouse_client,
        clickhouse_config.table.clone(),
    ));
    let device_directory = Arc::new(HttpDeviceDirectory::new(&directory_config)?);
    let user_directory = Arc::new(HttpUserDirectory::new(&directory_config)?);
    let alert_producer = Arc::new(NatsAlertProducer::new(
        nats_client.jetstream().clone(),
        config.alert_stream.clone(),
    ));

    // Domain services
    let ingest_service = Arc::new(UsageIngestService::new(usage_store.clone()));
    let aggregation_service = Arc::new(AggregationService::new(
        usage_store.clone(),
        device_directory.clone(),
        user_directory,
        alert_producer,
        ChronoDuration::hours(config.aggregation_lookback_hours),
    ));
    let report_service = Arc::new(UsageReportService::new(usage_store, device_directory));

    let usage_worker = UsageWorker::new(
        ingest_service,
        aggregation_service,
        nats_client,
        UsageWorkerConfig {
            usage_stream: config.usage_stream.clone(),
            usage_subject: config.usage_stream.clone(),
            consumer_name: config.usage_consumer_name.clone(),
            nats_batch_size: config.nats_batch_size,
            nats_batch_wait_secs: config.nats_batch_wait_secs,
            aggregation_interval: Duration::from_secs(config.aggregation_interval_secs),
        },
    )
    .await?;

    let watt_api = WattApi::new(
        report_service,
        usage_worker.scheduler_handle(),
        HttpConfig {
            host: config.http_host.clone(),
            port: config.http_port,
        },
    );

    Ok((usage_worker, watt_api))
}
