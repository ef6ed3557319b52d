use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

use crate::state::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    timestamp: chrono::DateTime<chrono::Utc>,
    checks: HealthChecks,
}

/// Individual health checks
#[derive(Debug, Serialize)]
pub struct HealthChecks {
    catalog: ComponentHealth,
}

/// Health status of a component
#[derive(Debug, Serialize)]
pub struct ComponentHealth {
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    entries: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl ComponentHealth {
    fn healthy(entries: usize) -> Self {
        Self {
            status: "healthy".to_string(),
            entries: Some(entries),
            error: None,
        }
    }

    fn unhealthy(error: String) -> Self {
        Self {
            status: "unhealthy".to_string(),
            entries: None,
            error: Some(error),
        }
    }
}

/// GET /api/v1/healthz - liveness
pub async fn healthz() -> impl IntoResponse {
    StatusCode::OK
}

/// GET /api/v1/health - catalog readiness
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let catalog = state.engine.catalog();
    let catalog_health = if catalog.is_empty() {
        ComponentHealth::unhealthy("rate catalog is empty".to_string())
    } else {
        ComponentHealth::healthy(catalog.len())
    };

    let healthy = catalog_health.status == "healthy";
    let response = HealthResponse {
        status: if healthy { "healthy" } else { "degraded" }.to_string(),
        timestamp: chrono::Utc::now(),
        checks: HealthChecks {
            catalog: catalog_health,
        },
    };

    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(response))
}
