use crate::error::DomainResult;
use crate::types::{DeviceUsageRow, UsageSample, UsageWindowQuery};
use async_trait::async_trait;

/// Port for the time-series usage store.
/// Infrastructure layer (e.g. watt-clickhouse) implements this trait.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait UsageStore: Send + Sync {
    /// Lightweight liveness probe against the store.
    async fn ping(&self) -> DomainResult<()>;

    /// Append a single usage point, tagged by device id, at millisecond
    /// precision.
    async fn write_sample(&self, sample: &UsageSample) -> DomainResult<()>;

    /// Sum consumption per device over the query window. Rows without a
    /// usable device id or value are skipped by the adapter.
    async fn sum_by_device(&self, query: UsageWindowQuery) -> DomainResult<Vec<DeviceUsageRow>>;
}
