use crate::directory::{DeviceDirectory, UserDirectory};
use crate::error::DomainResult;
use crate::producer::AlertProducer;
use crate::store::UsageStore;
use crate::types::{AlertEvent, DeviceEnergyAggregate, UsageWindowQuery};
use chrono::{Duration, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

pub const ALERT_MESSAGE: &str = "Energy consumption threshold exceeded";

/// Summary of one aggregation run, used for logging and as the manual
/// trigger's response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregationOutcome {
    pub devices_seen: usize,
    pub users_evaluated: usize,
    pub alerts_published: usize,
}

/// Domain service that runs one complete aggregation pass:
///
/// 1. Sum consumption per device over the lookback window
/// 2. Resolve device ownership through the device directory
/// 3. Group aggregates per user
/// 4. Resolve thresholds through the user directory
/// 5. Publish an alert for every user whose total strictly exceeds
///    their threshold
///
/// Each run builds its working state from scratch; nothing is carried across
/// cycles, and a failed lookup only ever excludes the entity it was for.
pub struct AggregationService {
    store: Arc<dyn UsageStore>,
    device_directory: Arc<dyn DeviceDirectory>,
    user_directory: Arc<dyn UserDirectory>,
    alert_producer: Arc<dyn AlertProducer>,
    lookback: Duration,
}

impl AggregationService {
    pub fn new(
        store: Arc<dyn UsageStore>,
        device_directory: Arc<dyn DeviceDirectory>,
        user_directory: Arc<dyn UserDirectory>,
        alert_producer: Arc<dyn AlertProducer>,
        lookback: Duration,
    ) -> Self {
        Self {
            store,
            device_directory,
            user_directory,
            alert_producer,
            lookback,
        }
    }

    /// Run one aggregation pass over `[now - lookback, now)`.
    ///
    /// A store query failure aborts the run; directory or publish failures
    /// only exclude the affected device or user.
    #[instrument(skip(self))]
    pub async fn run_aggregation(&self) -> DomainResult<AggregationOutcome> {
        let now = Utc::now();
        let start = now - self.lookback;

        debug!(%start, %now, "querying summed usage per device");
        let rows = self
            .store
            .sum_by_device(UsageWindowQuery {
                start,
                end: now,
                device_filter: None,
            })
            .await?;

        let devices_seen = rows.len();

        // Resolve ownership; a failed or empty lookup drops the device.
        let mut aggregates = Vec::with_capacity(rows.len());
        for row in rows {
            if row.energy_consumed == 0.0 {
                continue;
            }

            match self.device_directory.get_device(row.device_id).await {
                Ok(Some(device)) => aggregates.push(DeviceEnergyAggregate {
                    device_id: row.device_id,
                    energy_consumed: row.energy_consumed,
                    user_id: Some(device.user_id),
                }),
                Ok(None) => {
                    warn!(device_id = row.device_id, "device not found, dropping aggregate");
                }
                Err(e) => {
                    warn!(
                        device_id = row.device_id,
                        error = %e,
                        "device lookup failed, dropping aggregate"
                    );
                }
            }
        }

        // Group per resolved owner. BTreeMap keeps evaluation order stable.
        let mut by_user: BTreeMap<i64, Vec<DeviceEnergyAggregate>> = BTreeMap::new();
        for aggregate in aggregates {
            if let Some(user_id) = aggregate.user_id {
                by_user.entry(user_id).or_default().push(aggregate);
            }
        }

        debug!(user_count = by_user.len(), "grouped aggregates per user");

        let mut users_evaluated = 0;
        let mut alerts_published = 0;

        for (user_id, devices) in &by_user {
            let user = match self.user_directory.get_user(*user_id).await {
                Ok(Some(user)) if user.alerting => user,
                Ok(Some(_)) => {
                    warn!(user_id, "alerting disabled, skipping user");
                    continue;
                }
                Ok(None) => {
                    warn!(user_id, "user not found, skipping");
                    continue;
                }
                Err(e) => {
                    warn!(user_id, error = %e, "user lookup failed, skipping");
                    continue;
                }
            };

            users_evaluated += 1;

            let total: f64 = devices.iter().map(|d| d.energy_consumed).sum();
            let threshold = user.energy_alerting_threshold;

            if total > threshold {
                info!(
                    user_id,
                    total_consumption = total,
                    threshold,
                    "user exceeded energy threshold, publishing alert"
                );

                let alert = AlertEvent {
                    user_id: *user_id,
                    message: ALERT_MESSAGE.to_string(),
                    threshold,
                    energy_consumed: total,
                    email: user.email,
                };

                match self.alert_producer.publish_alert(&alert).await {
                    Ok(()) => alerts_published += 1,
                    Err(e) => {
                        warn!(user_id, error = %e, "failed to publish alert event");
                    }
                }
            } else {
                info!(
                    user_id,
                    total_consumption = total,
                    threshold,
                    "user within energy threshold"
                );
            }
        }

        let outcome = AggregationOutcome {
            devices_seen,
            users_evaluated,
            alerts_published,
        };
        info!(
            devices_seen = outcome.devices_seen,
            users_evaluated = outcome.users_evaluated,
            alerts_published = outcome.alerts_published,
            "aggregation run complete"
        );

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::{MockDeviceDirectory, MockUserDirectory};
    use crate::error::DomainError;
    use crate::producer::MockAlertProducer;
    use crate::store::MockUsageStore;
    use crate::types::{Device, DeviceUsageRow, UserAccount};

    fn device(id: i64, user_id: i64) -> Device {
        Device {
            id,
            user_id,
            name: format!("device-{id}"),
            device_type: "meter".to_string(),
            location: "kitchen".to_string(),
        }
    }

    fn user(id: i64, threshold: f64, alerting: bool, email: &str) -> UserAccount {
        UserAccount {
            id,
            email: Some(email.to_string()),
            alerting,
            energy_alerting_threshold: threshold,
        }
    }

    fn service(
        store: MockUsageStore,
        devices: MockDeviceDirectory,
        users: MockUserDirectory,
        producer: MockAlertProducer,
    ) -> AggregationService {
        AggregationService::new(
            Arc::new(store),
            Arc::new(devices),
            Arc::new(users),
            Arc::new(producer),
            Duration::hours(24),
        )
    }

    #[tokio::test]
    async fn test_breach_publishes_one_alert() {
        // Device 7 accumulated 10 + 15 + 5 kWh; user 42 has threshold 25.
        let mut mock_store = MockUsageStore::new();
        let mut mock_devices = MockDeviceDirectory::new();
        let mut mock_users = MockUserDirectory::new();
        let mut mock_producer = MockAlertProducer::new();

        mock_store
            .expect_sum_by_device()
            .withf(|q: &UsageWindowQuery| q.device_filter.is_none() && q.start < q.end)
            .times(1)
            .return_once(|_| {
                Ok(vec![DeviceUsageRow {
                    device_id: 7,
                    energy_consumed: 30.0,
                }])
            });
        mock_devices
            .expect_get_device()
            .withf(|id: &i64| *id == 7)
            .times(1)
            .return_once(|_| Ok(Some(device(7, 42))));
        mock_users
            .expect_get_user()
            .withf(|id: &i64| *id == 42)
            .times(1)
            .return_once(|_| Ok(Some(user(42, 25.0, true, "a@x.com"))));
        mock_producer
            .expect_publish_alert()
            .withf(|alert: &AlertEvent| {
                alert.user_id == 42
                    && alert.threshold == 25.0
                    && alert.energy_consumed == 30.0
                    && alert.email.as_deref() == Some("a@x.com")
                    && alert.message == ALERT_MESSAGE
            })
            .times(1)
            .return_once(|_| Ok(()));

        let service = service(mock_store, mock_devices, mock_users, mock_producer);

        let outcome = service.run_aggregation().await.unwrap();

        assert_eq!(outcome.devices_seen, 1);
        assert_eq!(outcome.users_evaluated, 1);
        assert_eq!(outcome.alerts_published, 1);
    }

    #[tokio::test]
    async fn test_total_equal_to_threshold_does_not_alert() {
        // Strict inequality: 30 is not > 30.
        let mut mock_store = MockUsageStore::new();
        let mut mock_devices = MockDeviceDirectory::new();
        let mut mock_users = MockUserDirectory::new();
        let mock_producer = MockAlertProducer::new();

        mock_store.expect_sum_by_device().times(1).return_once(|_| {
            Ok(vec![DeviceUsageRow {
                device_id: 7,
                energy_consumed: 30.0,
            }])
        });
        mock_devices
            .expect_get_device()
            .times(1)
            .return_once(|_| Ok(Some(device(7, 42))));
        mock_users
            .expect_get_user()
            .times(1)
            .return_once(|_| Ok(Some(user(42, 30.0, true, "a@x.com"))));
        // publish_alert must not be called

        let service = service(mock_store, mock_devices, mock_users, mock_producer);

        let outcome = service.run_aggregation().await.unwrap();

        assert_eq!(outcome.users_evaluated, 1);
        assert_eq!(outcome.alerts_published, 0);
    }

    #[tokio::test]
    async fn test_orphaned_device_is_excluded() {
        // Device 9's owner lookup returns not-found; device 7 still alerts.
        let mut mock_store = MockUsageStore::new();
        let mut mock_devices = MockDeviceDirectory::new();
        let mut mock_users = MockUserDirectory::new();
        let mut mock_producer = MockAlertProducer::new();

        mock_store.expect_sum_by_device().times(1).return_once(|_| {
            Ok(vec![
                DeviceUsageRow {
                    device_id: 9,
                    energy_consumed: 100.0,
                },
                DeviceUsageRow {
                    device_id: 7,
                    energy_consumed: 30.0,
                },
            ])
        });
        mock_devices
            .expect_get_device()
            .withf(|id: &i64| *id == 9)
            .times(1)
            .return_once(|_| Ok(None));
        mock_devices
            .expect_get_device()
            .withf(|id: &i64| *id == 7)
            .times(1)
            .return_once(|_| Ok(Some(device(7, 42))));
        mock_users
            .expect_get_user()
            .withf(|id: &i64| *id == 42)
            .times(1)
            .return_once(|_| Ok(Some(user(42, 25.0, true, "a@x.com"))));
        mock_producer
            .expect_publish_alert()
            .withf(|alert: &AlertEvent| alert.user_id == 42 && alert.energy_consumed == 30.0)
            .times(1)
            .return_once(|_| Ok(()));

        let service = service(mock_store, mock_devices, mock_users, mock_producer);

        let outcome = service.run_aggregation().await.unwrap();

        assert_eq!(outcome.devices_seen, 2);
        assert_eq!(outcome.alerts_published, 1);
    }

    #[tokio::test]
    async fn test_device_lookup_error_drops_only_that_device() {
        let mut mock_store = MockUsageStore::new();
        let mut mock_devices = MockDeviceDirectory::new();
        let mut mock_users = MockUserDirectory::new();
        let mut mock_producer = MockAlertProducer::new();

        mock_store.expect_sum_by_device().times(1).return_once(|_| {
            Ok(vec![
                DeviceUsageRow {
                    device_id: 1,
                    energy_consumed: 50.0,
                },
                DeviceUsageRow {
                    device_id: 2,
                    energy_consumed: 40.0,
                },
            ])
        });
        mock_devices
            .expect_get_device()
            .withf(|id: &i64| *id == 1)
            .times(1)
            .return_once(|_| {
                Err(DomainError::RepositoryError(anyhow::anyhow!(
                    "directory timed out"
                )))
            });
        mock_devices
            .expect_get_device()
            .withf(|id: &i64| *id == 2)
            .times(1)
            .return_once(|_| Ok(Some(device(2, 5))));
        mock_users
            .expect_get_user()
            .withf(|id: &i64| *id == 5)
            .times(1)
            .return_once(|_| Ok(Some(user(5, 10.0, true, "b@x.com"))));
        mock_producer
            .expect_publish_alert()
            .withf(|alert: &AlertEvent| alert.user_id == 5 && alert.energy_consumed == 40.0)
            .times(1)
            .return_once(|_| Ok(()));

        let service = service(mock_store, mock_devices, mock_users, mock_producer);

        let outcome = service.run_aggregation().await.unwrap();

        assert_eq!(outcome.alerts_published, 1);
    }

    #[tokio::test]
    async fn test_alerting_disabled_user_never_alerted() {
        let mut mock_store = MockUsageStore::new();
        let mut mock_devices = MockDeviceDirectory::new();
        let mut mock_users = MockUserDirectory::new();
        let mock_producer = MockAlertProducer::new();

        mock_store.expect_sum_by_device().times(1).return_once(|_| {
            Ok(vec![DeviceUsageRow {
                device_id: 7,
                energy_consumed: 1000.0,
            }])
        });
        mock_devices
            .expect_get_device()
            .times(1)
            .return_once(|_| Ok(Some(device(7, 42))));
        mock_users
            .expect_get_user()
            .times(1)
            .return_once(|_| Ok(Some(user(42, 1.0, false, "a@x.com"))));

        let service = service(mock_store, mock_devices, mock_users, mock_producer);

        let outcome = service.run_aggregation().await.unwrap();

        assert_eq!(outcome.users_evaluated, 0);
        assert_eq!(outcome.alerts_published, 0);
    }

    #[tokio::test]
    async fn test_multiple_devices_summed_per_user() {
        let mut mock_store = MockUsageStore::new();
        let mut mock_devices = MockDeviceDirectory::new();
        let mut mock_users = MockUserDirectory::new();
        let mut mock_producer = MockAlertProducer::new();

        mock_store.expect_sum_by_device().times(1).return_once(|_| {
            Ok(vec![
                DeviceUsageRow {
                    device_id: 1,
                    energy_consumed: 12.0,
                },
                DeviceUsageRow {
                    device_id: 2,
                    energy_consumed: 18.5,
                },
            ])
        });
        mock_devices
            .expect_get_device()
            .withf(|id: &i64| *id == 1)
            .times(1)
            .return_once(|_| Ok(Some(device(1, 42))));
        mock_devices
            .expect_get_device()
            .withf(|id: &i64| *id == 2)
            .times(1)
            .return_once(|_| Ok(Some(device(2, 42))));
        mock_users
            .expect_get_user()
            .withf(|id: &i64| *id == 42)
            .times(1)
            .return_once(|_| Ok(Some(user(42, 30.0, true, "a@x.com"))));
        mock_producer
            .expect_publish_alert()
            .withf(|alert: &AlertEvent| alert.energy_consumed == 30.5)
            .times(1)
            .return_once(|_| Ok(()));

        let service = service(mock_store, mock_devices, mock_users, mock_producer);

        let outcome = service.run_aggregation().await.unwrap();

        assert_eq!(outcome.users_evaluated, 1);
        assert_eq!(outcome.alerts_published, 1);
    }

    #[tokio::test]
    async fn test_zero_aggregates_skip_directory_lookups() {
        let mut mock_store = MockUsageStore::new();
        let mock_devices = MockDeviceDirectory::new();
        let mock_users = MockUserDirectory::new();
        let mock_producer = MockAlertProducer::new();

        mock_store.expect_sum_by_device().times(1).return_once(|_| {
            Ok(vec![DeviceUsageRow {
                device_id: 7,
                energy_consumed: 0.0,
            }])
        });
        // no directory or producer calls expected

        let service = service(mock_store, mock_devices, mock_users, mock_producer);

        let outcome = service.run_aggregation().await.unwrap();

        assert_eq!(outcome.devices_seen, 1);
        assert_eq!(outcome.users_evaluated, 0);
    }

    #[tokio::test]
    async fn test_store_failure_aborts_run() {
        let mut mock_store = MockUsageStore::new();
        let mock_devices = MockDeviceDirectory::new();
        let mock_users = MockUserDirectory::new();
        let mock_producer = MockAlertProducer::new();

        mock_store
            .expect_sum_by_device()
            .times(1)
            .return_once(|_| Err(DomainError::RepositoryError(anyhow::anyhow!("query failed"))));

        let service = service(mock_store, mock_devices, mock_users, mock_producer);

        let result = service.run_aggregation().await;

        assert!(matches!(result, Err(DomainError::RepositoryError(_))));
    }

    #[tokio::test]
    async fn test_publish_failure_does_not_abort_run() {
        let mut mock_store = MockUsageStore::new();
        let mut mock_devices = MockDeviceDirectory::new();
        let mut mock_users = MockUserDirectory::new();
        let mut mock_producer = MockAlertProducer::new();

        mock_store.expect_sum_by_device().times(1).return_once(|_| {
            Ok(vec![
                DeviceUsageRow {
                    device_id: 1,
                    energy_consumed: 50.0,
                },
                DeviceUsageRow {
                    device_id: 2,
                    energy_consumed: 60.0,
                },
            ])
        });
        mock_devices
            .expect_get_device()
            .withf(|id: &i64| *id == 1)
            .times(1)
            .return_once(|_| Ok(Some(device(1, 10))));
        mock_devices
            .expect_get_device()
            .withf(|id: &i64| *id == 2)
            .times(1)
            .return_once(|_| Ok(Some(device(2, 20))));
        mock_users
            .expect_get_user()
            .withf(|id: &i64| *id == 10)
            .times(1)
            .return_once(|_| Ok(Some(user(10, 1.0, true, "u10@x.com"))));
        mock_users
            .expect_get_user()
            .withf(|id: &i64| *id == 20)
            .times(1)
            .return_once(|_| Ok(Some(user(20, 1.0, true, "u20@x.com"))));
        // First publish fails, second succeeds; the run completes either way.
        mock_producer
            .expect_publish_alert()
            .withf(|alert: &AlertEvent| alert.user_id == 10)
            .times(1)
            .return_once(|_| {
                Err(DomainError::RepositoryError(anyhow::anyhow!(
                    "publish failed"
                )))
            });
        mock_producer
            .expect_publish_alert()
            .withf(|alert: &AlertEvent| alert.user_id == 20)
            .times(1)
            .return_once(|_| Ok(()));

        let service = service(mock_store, mock_devices, mock_users, mock_producer);

        let outcome = service.run_aggregation().await.unwrap();

        assert_eq!(outcome.users_evaluated, 2);
        assert_eq!(outcome.alerts_published, 1);
    }

    #[tokio::test]
    async fn test_empty_window_publishes_nothing() {
        let mut mock_store = MockUsageStore::new();
        let mock_devices = MockDeviceDirectory::new();
        let mock_users = MockUserDirectory::new();
        let mock_producer = MockAlertProducer::new();

        mock_store
            .expect_sum_by_device()
            .times(1)
            .return_once(|_| Ok(Vec::new()));

        let service = service(mock_store, mock_devices, mock_users, mock_producer);

        let outcome = service.run_aggregation().await.unwrap();

        assert_eq!(
            outcome,
            AggregationOutcome {
                devices_seen: 0,
                users_evaluated: 0,
                alerts_published: 0,
            }
        );
    }
}
