use chrono::{DateTime, Utc};

/// A single raw energy-usage reading produced by a device.
///
/// Samples are written once to the usage store and never mutated. Values are
/// stored as-is; validation of negative or zero readings is deliberately not
/// done here.
#[derive(Debug, Clone, PartialEq)]
pub struct UsageSample {
    pub device_id: i64,
    /// Energy consumed in kWh.
    pub energy_consumed: f64,
    pub timestamp: DateTime<Utc>,
}

/// Per-device summed consumption for one aggregation cycle.
///
/// `user_id` is populated only after a successful directory lookup; aggregates
/// that never resolve an owner are excluded from all downstream evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceEnergyAggregate {
    pub device_id: i64,
    pub energy_consumed: f64,
    pub user_id: Option<i64>,
}

/// Device metadata as resolved by the device directory.
#[derive(Debug, Clone, PartialEq)]
pub struct Device {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub device_type: String,
    pub location: String,
}

/// Alerting preferences as resolved by the user directory.
#[derive(Debug, Clone, PartialEq)]
pub struct UserAccount {
    pub id: i64,
    pub email: Option<String>,
    pub alerting: bool,
    pub energy_alerting_threshold: f64,
}

/// Event published when a user's summed consumption exceeds their threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertEvent {
    pub user_id: i64,
    pub message: String,
    pub threshold: f64,
    pub energy_consumed: f64,
    pub email: Option<String>,
}

/// Per-device usage line in a [`UsageReport`].
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceUsage {
    pub device_id: i64,
    pub name: String,
    pub device_type: String,
    pub location: String,
    pub energy_consumed: f64,
}

/// Read model returned to callers; derived per request, never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct UsageReport {
    pub user_id: i64,
    pub devices: Vec<DeviceUsage>,
}

/// Typed range-aggregation query over the half-open window `[start, end)`.
///
/// The store adapter owns translating this into its native query syntax, so
/// the aggregation logic stays store-agnostic and no query text is assembled
/// outside the adapter.
#[derive(Debug, Clone, PartialEq)]
pub struct UsageWindowQuery {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// When set, restrict the query to these device ids.
    pub device_filter: Option<Vec<i64>>,
}

/// One result row of a grouped-sum query.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceUsageRow {
    pub device_id: i64,
    pub energy_consumed: f64,
}
