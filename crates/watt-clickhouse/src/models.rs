use chrono::{DateTime, Utc};
use clickhouse::Row;
use serde::{Deserialize, Serialize};
use watt_domain::UsageSample;

/// One stored usage point. `recorded_at` maps to a DateTime64(3) column so
/// sample timestamps keep their millisecond precision.
#[derive(Debug, Clone, Row, Serialize, Deserialize)]
pub struct EnergyUsageRow {
    pub device_id: i64,
    pub energy_consumed: f64,
    #[serde(with = "clickhouse::serde::chrono::datetime64::millis")]
    pub recorded_at: DateTime<Utc>,
}

impl From<&UsageSample> for EnergyUsageRow {
    fn from(sample: &UsageSample) -> Self {
        EnergyUsageRow {
            device_id: sample.device_id,
            energy_consumed: sample.energy_consumed,
            recorded_at: sample.timestamp,
        }
    }
}

/// Result row of the grouped-sum query.
#[derive(Debug, Row, Deserialize)]
pub struct DeviceSumRow {
    pub device_id: i64,
    pub energy_consumed: f64,
}
