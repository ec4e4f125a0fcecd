use async_trait::async_trait;
use tracing::{debug, error, warn};
use watt_domain::{
    DeviceUsageRow, DomainError, DomainResult, UsageSample, UsageStore, UsageWindowQuery,
};

use crate::client::ClickHouseClient;
use crate::models::{DeviceSumRow, EnergyUsageRow};

/// ClickHouse implementation of [`UsageStore`].
///
/// Owns the translation of the typed window query into SQL; window bounds and
/// the device filter are bound parameters, only the configured table name is
/// interpolated.
#[derive(Clone)]
pub struct ClickHouseUsageStore {
    client: ClickHouseClient,
    table: String,
}

impl ClickHouseUsageStore {
    pub fn new(client: ClickHouseClient, table: String) -> Self {
        Self { client, table }
    }
}

fn grouped_sum_sql(table: &str, with_device_filter: bool) -> String {
    let mut sql = format!(
        "SELECT device_id, sum(energy_consumed) AS energy_consumed \
         FROM {table} \
         WHERE recorded_at >= fromUnixTimestamp64Milli(?) \
         AND recorded_at < fromUnixTimestamp64Milli(?)"
    );
    if with_device_filter {
        sql.push_str(" AND device_id IN ?");
    }
    sql.push_str(" GROUP BY device_id");
    sql
}

#[async_trait]
impl UsageStore for ClickHouseUsageStore {
    async fn ping(&self) -> DomainResult<()> {
        self.client
            .ping()
            .await
            .map_err(|e| DomainError::StoreUnavailable(e.to_string()))
    }

    async fn write_sample(&self, sample: &UsageSample) -> DomainResult<()> {
        let row: EnergyUsageRow = sample.into();

        let mut insert = self
            .client
            .get_client()
            .insert::<EnergyUsageRow>(&self.table)
            .map_err(|e| {
                error!("failed to create ClickHouse inserter: {}", e);
                DomainError::RepositoryError(e.into())
            })?;

        insert.write(&row).await.map_err(|e| {
            error!("failed to write usage row to ClickHouse: {}", e);
            DomainError::RepositoryError(e.into())
        })?;

        insert.end().await.map_err(|e| {
            error!("failed to finalize ClickHouse insert: {}", e);
            DomainError::RepositoryError(e.into())
        })?;

        debug!(
            device_id = row.device_id,
            table = %self.table,
            "stored usage sample"
        );

        Ok(())
    }

    async fn sum_by_device(&self, query: UsageWindowQuery) -> DomainResult<Vec<DeviceUsageRow>> {
        let sql = grouped_sum_sql(&self.table, query.device_filter.is_some());

        debug!(
            start = %query.start,
            end = %query.end,
            filtered = query.device_filter.is_some(),
            "running grouped-sum query"
        );

        let mut ch_query = self
            .client
            .get_client()
            .query(&sql)
            .bind(query.start.timestamp_millis())
            .bind(query.end.timestamp_millis());

        if let Some(device_ids) = &query.device_filter {
            ch_query = ch_query.bind(device_ids.as_slice());
        }

        let rows = ch_query.fetch_all::<DeviceSumRow>().await.map_err(|e| {
            error!("grouped-sum query failed: {}", e);
            DomainError::RepositoryError(e.into())
        })?;

        // A sum can only come back non-finite from corrupt points; skip the
        // row rather than poisoning downstream aggregation.
        let rows = rows
            .into_iter()
            .filter(|row| {
                if row.energy_consumed.is_finite() {
                    true
                } else {
                    warn!(
                        device_id = row.device_id,
                        "skipping row with non-finite energy sum"
                    );
                    false
                }
            })
            .map(|row| DeviceUsageRow {
                device_id: row.device_id,
                energy_consumed: row.energy_consumed,
            })
            .collect();

        Ok(rows)
    }
}
