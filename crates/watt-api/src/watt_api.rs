use crate::http::{router, AppState};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use usage_worker::scheduler::SchedulerHandle;
use watt_domain::UsageReportService;

#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
}

/// HTTP surface of the service: usage reports, manual aggregation trigger,
/// and the health probe.
pub struct WattApi {
    state: AppState,
    config: HttpConfig,
}

impl WattApi {
    pub fn new(
        report_service: Arc<UsageReportService>,
        scheduler: SchedulerHandle,
        config: HttpConfig,
    ) -> Self {
        Self {
            state: AppState {
                report_service,
                scheduler,
            },
            config,
        }
    }

    pub fn into_runner_process(
        self,
    ) -> Box<
        dyn FnOnce(
                CancellationToken,
            ) -> std::pin::Pin<
                Box<dyn std::future::Future<Output = anyhow::Result<()>> + Send>,
            > + Send,
    > {
        Box::new(move |ctx| Box::pin(async move { self.serve(ctx).await }))
    }

    async fn serve(self, ctx: CancellationToken) -> anyhow::Result<()> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        info!(%addr, "http server listening");

        axum::serve(listener, router(self.state))
            .with_graceful_shutdown(ctx.cancelled_owned())
            .await?;

        info!("http server stopped");
        Ok(())
    }
}
