use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use watt_domain::{AggregationOutcome, AggregationService, DomainResult};

/// Result of a manual aggregation trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    Completed(AggregationOutcome),
    /// A scheduled or manual run already holds the single-flight guard.
    AlreadyRunning,
}

/// Drives [`AggregationService`] on a fixed cadence.
///
/// Runs are single-flight: a tick that finds a run still in progress skips
/// instead of overlapping, and a manual trigger shares the same guard. A run
/// publishes alerts, so two overlapping runs could double-alert.
pub struct AggregationScheduler {
    service: Arc<AggregationService>,
    interval: Duration,
    in_flight: Arc<Mutex<()>>,
}

/// Cheap handle for triggering an aggregation run outside the schedule,
/// observing the scheduler's single-flight guard.
#[derive(Clone)]
pub struct SchedulerHandle {
    service: Arc<AggregationService>,
    in_flight: Arc<Mutex<()>>,
}

impl AggregationScheduler {
    pub fn new(service: Arc<AggregationService>, interval: Duration) -> Self {
        Self {
            service,
            interval,
            in_flight: Arc::new(Mutex::new(())),
        }
    }

    pub fn handle(&self) -> SchedulerHandle {
        SchedulerHandle {
            service: Arc::clone(&self.service),
            in_flight: Arc::clone(&self.in_flight),
        }
    }

    pub async fn run(&self, ctx: CancellationToken) -> anyhow::Result<()> {
        info!(interval_secs = self.interval.as_secs(), "starting aggregation scheduler");

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ctx.cancelled() => {
                    info!("shutdown signal received, stopping aggregation scheduler");
                    break;
                }
                _ = ticker.tick() => {
                    self.tick().await;
                }
            }
        }

        Ok(())
    }

    async fn tick(&self) {
        // try_lock keeps an overrunning cycle from stacking up behind itself.
        let Ok(_guard) = self.in_flight.try_lock() else {
            warn!("previous aggregation run still in progress, skipping tick");
            return;
        };

        if let Err(e) = self.service.run_aggregation().await {
            // The failure only ends this run; the next tick starts fresh.
            error!(error = %e, "aggregation run failed");
        }
    }
}

impl SchedulerHandle {
    /// Run an aggregation pass now unless one is already in flight.
    pub async fn trigger_now(&self) -> DomainResult<TriggerOutcome> {
        let Ok(_guard) = self.in_flight.try_lock() else {
            info!("manual trigger rejected, aggregation already running");
            return Ok(TriggerOutcome::AlreadyRunning);
        };

        let outcome = self.service.run_aggregation().await?;
        Ok(TriggerOutcome::Completed(outcome))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use watt_domain::{
        MockAlertProducer, MockDeviceDirectory, MockUsageStore, MockUserDirectory,
    };

    fn idle_service() -> Arc<AggregationService> {
        let mut mock_store = MockUsageStore::new();
        mock_store
            .expect_sum_by_device()
            .returning(|_| Ok(Vec::new()));

        Arc::new(AggregationService::new(
            Arc::new(mock_store),
            Arc::new(MockDeviceDirectory::new()),
            Arc::new(MockUserDirectory::new()),
            Arc::new(MockAlertProducer::new()),
            ChronoDuration::hours(24),
        ))
    }

    fn slow_service() -> Arc<AggregationService> {
        let mut mock_store = MockUsageStore::new();
        mock_store.expect_sum_by_device().returning(|_| {
            // keep the run in flight long enough for the second trigger
            std::thread::sleep(Duration::from_millis(200));
            Ok(Vec::new())
        });

        Arc::new(AggregationService::new(
            Arc::new(mock_store),
            Arc::new(MockDeviceDirectory::new()),
            Arc::new(MockUserDirectory::new()),
            Arc::new(MockAlertProducer::new()),
            ChronoDuration::hours(24),
        ))
    }

    #[tokio::test]
    async fn test_manual_trigger_completes() {
        let scheduler = AggregationScheduler::new(idle_service(), Duration::from_secs(3600));
        let handle = scheduler.handle();

        let outcome = handle.trigger_now().await.unwrap();

        assert!(matches!(outcome, TriggerOutcome::Completed(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_triggers_do_not_overlap() {
        let scheduler = AggregationScheduler::new(slow_service(), Duration::from_secs(3600));
        let first = scheduler.handle();
        let second = scheduler.handle();

        let running = tokio::spawn(async move { first.trigger_now().await });

        // Give the first trigger time to take the guard.
        tokio::time::sleep(Duration::from_millis(50)).await;
        let rejected = second.trigger_now().await.unwrap();

        assert_eq!(rejected, TriggerOutcome::AlreadyRunning);
        assert!(matches!(
            running.await.unwrap().unwrap(),
            TriggerOutcome::Completed(_)
        ));
    }

    #[tokio::test]
    async fn test_scheduler_stops_on_cancellation() {
        let scheduler = AggregationScheduler::new(idle_service(), Duration::from_millis(10));
        let ctx = CancellationToken::new();

        let token = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            token.cancel();
        });

        let result = tokio::time::timeout(Duration::from_secs(2), scheduler.run(ctx)).await;

        assert!(result.is_ok());
    }
}
