//! HTTP request handlers.

use super::AppState;
use crate::store::{AggregateStats, HealthSample, HealthState, ServiceId, UnknownService};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::BTreeMap;
use thiserror::Error;

const DEFAULT_HISTORY_HOURS: f64 = 24.0;

/// Client-facing request errors.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    UnknownService(#[from] UnknownService),
    #[error("no probe registered for {0}")]
    NoProbe(ServiceId),
    #[error("invalid hours: {0:?}")]
    InvalidHours(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::UnknownService(_) | ApiError::NoProbe(_) => StatusCode::NOT_FOUND,
            ApiError::InvalidHours(_) => StatusCode::BAD_REQUEST,
        };
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

/// Response for a handler that panicked. This is a fault in the server
/// itself, so it is reported as 500 rather than as a dependency being down.
pub fn handle_panic(panic: Box<dyn Any + Send + 'static>) -> Response {
    let details = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!("Handler panicked: {}", details);

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({ "error": "internal server error" })),
    )
        .into_response()
}

// ============================================================================
// Health
// ============================================================================

/// Probe every service now and record the results.
pub async fn handle_health(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.sampler.run_cycle().await)
}

/// Last recorded state of every service, without probing.
pub async fn handle_status(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.store.snapshot())
}

#[derive(Debug, Serialize)]
pub struct ProbeResult {
    pub status: HealthState,
    pub latency: Option<u64>,
    pub message: Option<String>,
}

/// Probe a single service. 503 when it isn't healthy, 500 when it has no
/// configuration to probe with.
pub async fn handle_health_service(
    State(state): State<AppState>,
    Path(service): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id: ServiceId = service.parse()?;
    let (sample, configured) = state.sampler.check_one(id).await.ok_or(ApiError::NoProbe(id))?;

    let code = if !configured {
        StatusCode::INTERNAL_SERVER_ERROR
    } else if sample.status.is_healthy() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let body = ProbeResult {
        status: sample.status,
        latency: sample.latency,
        message: sample.message,
    };
    Ok((code, Json(body)))
}

// ============================================================================
// History
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default)]
    pub service: Option<String>,
    #[serde(default)]
    pub hours: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceHistory {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_name: Option<ServiceId>,
    pub history: Vec<HealthSample>,
    #[serde(flatten)]
    pub stats: AggregateStats,
}

pub async fn handle_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Response, ApiError> {
    let hours = parse_hours(query.hours.as_deref())?;

    match query.service.as_deref() {
        Some(service) => {
            let id: ServiceId = service.parse()?;
            let (history, stats) = state.store.history_with_stats(id, hours);
            Ok(Json(ServiceHistory {
                service_name: Some(id),
                history,
                stats,
            })
            .into_response())
        }
        None => {
            let now = Utc::now();
            let all: BTreeMap<ServiceId, ServiceHistory> = state
                .store
                .get_all_historical_data()
                .into_iter()
                .map(|(id, window)| {
                    let history = window.since(hours, now);
                    let stats = AggregateStats::from_samples(&history);
                    (
                        id,
                        ServiceHistory {
                            service_name: None,
                            history,
                            stats,
                        },
                    )
                })
                .collect();
            Ok(Json(all).into_response())
        }
    }
}

fn parse_hours(raw: Option<&str>) -> Result<f64, ApiError> {
    let Some(raw) = raw else {
        return Ok(DEFAULT_HISTORY_HOURS);
    };

    match raw.trim().parse::<f64>() {
        Ok(hours) if hours.is_finite() && hours >= 0.0 => Ok(hours),
        _ => Err(ApiError::InvalidHours(raw.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::probe::{HttpProbe, Probe, RegisteredProbe};
    use crate::scheduler::Sampler;
    use crate::store::Store;
    use async_trait::async_trait;
    use axum::body::to_bytes;
    use chrono::{Duration as ChronoDuration, Utc};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio_test::{assert_err, assert_ok};

    struct Fixed(HealthState);

    #[async_trait]
    impl Probe for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        fn is_configured(&self) -> bool {
            true
        }

        async fn check(&self) -> HealthSample {
            HealthSample::new(self.0, Some(Duration::from_millis(3)), "fixed")
        }
    }

    fn test_state() -> AppState {
        let store = Arc::new(Store::default());
        let probes = vec![
            RegisteredProbe::new(ServiceId::Mongodb, Fixed(HealthState::Healthy)),
            RegisteredProbe::new(ServiceId::Redis, Fixed(HealthState::Degraded)),
            RegisteredProbe::new(ServiceId::Frontend, HttpProbe::get("Frontend", None, Duration::from_secs(1))),
        ];
        let sampler = Arc::new(Sampler::new(store.clone(), probes, Duration::from_secs(1)));
        AppState {
            config: ServerConfig::default(),
            store,
            sampler,
        }
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_runs_cycle() {
        let state = test_state();
        let response = handle_health(State(state.clone())).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["overallStatus"], "down");
        assert_eq!(json["services"]["mongodb"]["status"], "healthy");
        assert_eq!(json["services"]["redis"]["status"], "degraded");
        assert_eq!(json["services"]["frontend"]["message"], "Frontend URL not configured");
        assert!(json["lastUpdate"].is_string());

        assert_eq!(state.store.get_historical_data(ServiceId::Mongodb, 24.0).len(), 1);
    }

    #[tokio::test]
    async fn test_health_service_status_codes() {
        let state = test_state();

        let ok = handle_health_service(State(state.clone()), Path("mongodb".to_string()))
            .await
            .into_response();
        assert_eq!(ok.status(), StatusCode::OK);
        let json = body_json(ok).await;
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["latency"], 3);

        let degraded = handle_health_service(State(state.clone()), Path("redis".to_string()))
            .await
            .into_response();
        assert_eq!(degraded.status(), StatusCode::SERVICE_UNAVAILABLE);

        let unconfigured = handle_health_service(State(state.clone()), Path("frontend".to_string()))
            .await
            .into_response();
        assert_eq!(unconfigured.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(unconfigured).await;
        assert_eq!(json["status"], "down");
        assert!(json["latency"].is_null());

        let unknown = handle_health_service(State(state.clone()), Path("gemini".to_string()))
            .await
            .into_response();
        assert_eq!(unknown.status(), StatusCode::NOT_FOUND);

        // Per-service checks are not recorded
        assert!(state.store.get_historical_data(ServiceId::Mongodb, 24.0).is_empty());
    }

    #[tokio::test]
    async fn test_status_before_first_cycle() {
        let state = test_state();
        let json = body_json(handle_status(State(state)).await.into_response()).await;

        assert_eq!(json["overallStatus"], "down");
        assert_eq!(json["services"]["llm"]["message"], "Not yet checked");
    }

    #[tokio::test]
    async fn test_history_single_service() {
        let state = test_state();
        let t0 = Utc::now() - ChronoDuration::hours(2);
        state.store.update_service_status(
            ServiceId::Redis,
            HealthSample::healthy(Duration::from_millis(10), "ok").with_timestamp(t0),
        );
        state.store.update_service_status(
            ServiceId::Redis,
            HealthSample::down(None, "refused").with_timestamp(t0 + ChronoDuration::hours(1)),
        );
        state.store.update_service_status(
            ServiceId::Redis,
            HealthSample::healthy(Duration::from_millis(20), "ok").with_timestamp(t0 + ChronoDuration::hours(2)),
        );

        let query = HistoryQuery {
            service: Some("redis".to_string()),
            hours: Some("24".to_string()),
        };
        let response = handle_history(State(state), Query(query)).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["serviceName"], "redis");
        assert_eq!(json["history"].as_array().unwrap().len(), 3);
        assert_eq!(json["averageLatency"], 15.0);
        let uptime = json["uptime"].as_f64().unwrap();
        assert!((uptime - 66.67).abs() < 0.01);
    }

    #[tokio::test]
    async fn test_history_all_services() {
        let state = test_state();
        let query = HistoryQuery {
            service: None,
            hours: None,
        };
        let json = body_json(handle_history(State(state), Query(query)).await.into_response()).await;

        let map = json.as_object().unwrap();
        assert_eq!(map.len(), ServiceId::ALL.len());
        assert_eq!(json["crons"]["uptime"], 0.0);
        assert!(json["crons"]["averageLatency"].is_null());
        assert!(json["crons"].get("serviceName").is_none());
    }

    #[tokio::test]
    async fn test_history_all_services_applies_lookback() {
        let state = test_state();
        let now = Utc::now();
        state.store.update_service_status(
            ServiceId::Redis,
            HealthSample::down(None, "refused").with_timestamp(now - ChronoDuration::hours(3)),
        );
        state.store.update_service_status(
            ServiceId::Redis,
            HealthSample::healthy(Duration::from_millis(8), "ok").with_timestamp(now),
        );

        let query = HistoryQuery {
            service: None,
            hours: Some("1".to_string()),
        };
        let json = body_json(handle_history(State(state), Query(query)).await.into_response()).await;

        assert_eq!(json["redis"]["history"].as_array().unwrap().len(), 1);
        assert_eq!(json["redis"]["uptime"], 100.0);
        assert_eq!(json["redis"]["averageLatency"], 8.0);
    }

    #[tokio::test]
    async fn test_history_rejects_bad_input() {
        let state = test_state();

        let bad_hours = HistoryQuery {
            service: None,
            hours: Some("soon".to_string()),
        };
        let response = handle_history(State(state.clone()), Query(bad_hours)).await.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let bad_service = HistoryQuery {
            service: Some("nope".to_string()),
            hours: None,
        };
        let response = handle_history(State(state), Query(bad_service)).await.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_parse_hours() {
        assert_eq!(assert_ok!(parse_hours(None)), 24.0);
        assert_eq!(assert_ok!(parse_hours(Some("48"))), 48.0);
        assert_eq!(assert_ok!(parse_hours(Some(" 0.5 "))), 0.5);
        assert_err!(parse_hours(Some("-1")));
        assert_err!(parse_hours(Some("NaN")));
        assert_err!(parse_hours(Some("inf")));
    }
}
