use crate::directory::DeviceDirectory;
use crate::store::UsageStore;
use crate::types::{DeviceUsage, UsageReport, UsageWindowQuery};
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, instrument};

/// Domain service for the synchronous read path: a user's per-device usage
/// breakdown over the past N days.
///
/// This is a pure read; it never errors towards the caller. A failing store
/// or directory degrades the response to a report with an empty device list.
pub struct UsageReportService {
    store: Arc<dyn UsageStore>,
    device_directory: Arc<dyn DeviceDirectory>,
}

impl UsageReportService {
    pub fn new(store: Arc<dyn UsageStore>, device_directory: Arc<dyn DeviceDirectory>) -> Self {
        Self {
            store,
            device_directory,
        }
    }

    #[instrument(skip(self))]
    pub async fn report(&self, user_id: i64, days: u32) -> UsageReport {
        let devices = match self.device_directory.list_devices_for_user(user_id).await {
            Ok(devices) => devices,
            Err(e) => {
                error!(user_id, error = %e, "device directory lookup failed, returning degraded report");
                return UsageReport {
                    user_id,
                    devices: Vec::new(),
                };
            }
        };

        if devices.is_empty() {
            debug!(user_id, "user has no registered devices");
            return UsageReport {
                user_id,
                devices: Vec::new(),
            };
        }

        let device_ids: Vec<i64> = devices.iter().map(|d| d.id).collect();
        let now = Utc::now();
        let start = now - Duration::days(i64::from(days));

        let rows = match self
            .store
            .sum_by_device(UsageWindowQuery {
                start,
                end: now,
                device_filter: Some(device_ids),
            })
            .await
        {
            Ok(rows) => rows,
            Err(e) => {
                error!(user_id, days, error = %e, "usage query failed, returning degraded report");
                return UsageReport {
                    user_id,
                    devices: Vec::new(),
                };
            }
        };

        let sums: HashMap<i64, f64> = rows
            .into_iter()
            .map(|row| (row.device_id, row.energy_consumed))
            .collect();

        // Merge sums onto static metadata, keeping the directory's order.
        // Devices with no rows in the window report zero consumption.
        let devices = devices
            .into_iter()
            .map(|device| DeviceUsage {
                energy_consumed: sums.get(&device.id).copied().unwrap_or(0.0),
                device_id: device.id,
                name: device.name,
                device_type: device.device_type,
                location: device.location,
            })
            .collect();

        UsageReport { user_id, devices }
    }
}
