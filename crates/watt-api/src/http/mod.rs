use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;
use usage_worker::scheduler::{SchedulerHandle, TriggerOutcome};
use watt_domain::{UsageReport, UsageReportService};

#[derive(Clone)]
pub struct AppState {
    pub report_service: Arc<UsageReportService>,
    pub scheduler: SchedulerHandle,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/v1/usage/{user_id}", get(get_usage))
        .route("/api/v1/usage/check-alerts", post(check_alerts))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct UsageParams {
    pub days: Option<u32>,
}

/// Response body for the usage read path. Field names follow the contract the
/// frontend and insight service already consume.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageReportDto {
    pub user_id: i64,
    pub devices: Vec<DeviceUsageDto>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceUsageDto {
    pub id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub device_type: String,
    pub location: String,
    pub energy_consumed: f64,
}

impl From<UsageReport> for UsageReportDto {
    fn from(report: UsageReport) -> Self {
        UsageReportDto {
            user_id: report.user_id,
            devices: report
                .devices
                .into_iter()
                .map(|device| DeviceUsageDto {
                    id: device.device_id,
                    name: device.name,
                    device_type: device.device_type,
                    location: device.location,
                    energy_consumed: device.energy_consumed,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregationRunDto {
    pub devices_seen: usize,
    pub users_evaluated: usize,
    pub alerts_published: usize,
}

pub async fn healthz() -> &'static str {
    "ok"
}

/// Per-device usage breakdown for a user over the past N days (default 3).
/// Degraded results (store or directory outage) still return 200 with an
/// empty device list.
pub async fn get_usage(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Query(params): Query<UsageParams>,
) -> Json<UsageReportDto> {
    let days = params.days.unwrap_or(3);
    let report = state.report_service.report(user_id, days).await;
    Json(report.into())
}

/// Manual alert check: runs one aggregation pass on demand. Respects the
/// scheduler's single-flight guard: 409 when a run is already in progress.
pub async fn check_alerts(State(state): State<AppState>) -> Response {
    match state.scheduler.trigger_now().await {
        Ok(TriggerOutcome::Completed(outcome)) => (
            StatusCode::OK,
            Json(AggregationRunDto {
                devices_seen: outcome.devices_seen,
                users_evaluated: outcome.users_evaluated,
                alerts_published: outcome.alerts_published,
            }),
        )
            .into_response(),
        Ok(TriggerOutcome::AlreadyRunning) => (
            StatusCode::CONFLICT,
            Json(serde_json::json!({ "error": "aggregation already running" })),
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "manual aggregation run failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    }
}
