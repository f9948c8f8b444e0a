//! HTTP API: dashboard pages, workload actions, health checks and Prometheus metrics

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Json, Router,
};
use dashboard_lib::{
    health::{ComponentStatus, HealthRegistry},
    monitor::AlertToggle,
    observability::StructuredLogger,
    Dashboard, DashboardError,
};
use prometheus::{Encoder, TextEncoder};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::views;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub dashboard: Dashboard,
    pub toggle: AlertToggle,
    pub health_registry: HealthRegistry,
    pub logger: StructuredLogger,
}

impl AppState {
    pub fn new(
        dashboard: Dashboard,
        toggle: AlertToggle,
        health_registry: HealthRegistry,
        logger: StructuredLogger,
    ) -> Self {
        Self {
            dashboard,
            toggle,
            health_registry,
            logger,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ScaleForm {
    pub namespace: String,
    pub deployment_name: String,
    /// Kept as text so a malformed count is answered with 400
    pub replicas: String,
}

#[derive(Debug, Deserialize)]
pub struct RestartForm {
    pub namespace: String,
    pub deployment_name: String,
}

#[derive(Debug, Deserialize)]
pub struct LogsForm {
    pub namespace: String,
    pub pod_name: String,
    #[serde(default)]
    pub container_name: Option<String>,
}

impl LogsForm {
    /// Browsers submit empty fields; treat them as "no container given"
    fn container(&self) -> Option<&str> {
        self.container_name
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }
}

async fn index(State(state): State<Arc<AppState>>) -> Html<String> {
    let overview = state.dashboard.overview().await;
    Html(views::render_index(&overview, state.toggle.is_enabled()))
}

async fn scale(State(state): State<Arc<AppState>>, Form(form): Form<ScaleForm>) -> Response {
    let replicas = match form.replicas.trim().parse::<i32>() {
        Ok(n) => n,
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                format!("invalid replica count: {}", form.replicas),
            )
                .into_response()
        }
    };

    match state
        .dashboard
        .scale(&form.namespace, &form.deployment_name, replicas)
        .await
    {
        Err(DashboardError::InvalidReplicas(n)) => (
            StatusCode::BAD_REQUEST,
            format!("replica count must not be negative: {}", n),
        )
            .into_response(),
        // Control-plane failures are already logged and counted.
        _ => Redirect::to("/").into_response(),
    }
}

async fn restart(State(state): State<Arc<AppState>>, Form(form): Form<RestartForm>) -> Redirect {
    let _ = state
        .dashboard
        .restart(&form.namespace, &form.deployment_name)
        .await;
    Redirect::to("/")
}

async fn delete_failed_pods(State(state): State<Arc<AppState>>) -> Redirect {
    match state.dashboard.delete_failed_pods().await {
        Ok(report) => info!(
            attempted = report.attempted(),
            deleted = report.deleted.len(),
            failed = report.failed.len(),
            "Failed pod cleanup finished"
        ),
        Err(e) => warn!(error = %e, "Failed pod cleanup aborted"),
    }
    Redirect::to("/")
}

async fn logs(State(state): State<Arc<AppState>>, Form(form): Form<LogsForm>) -> Html<String> {
    let text = state
        .dashboard
        .pod_logs(&form.namespace, &form.pod_name, form.container())
        .await;
    Html(views::render_logs(
        &form.namespace,
        &form.pod_name,
        text.as_deref(),
    ))
}

async fn fetch_logs(State(state): State<Arc<AppState>>, Form(form): Form<LogsForm>) -> Response {
    let text = state
        .dashboard
        .pod_logs(&form.namespace, &form.pod_name, form.container())
        .await
        .unwrap_or_default();

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        text,
    )
        .into_response()
}

async fn node_metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.dashboard.node_metrics().await)
}

async fn toggle_error_check(State(state): State<Arc<AppState>>) -> Redirect {
    let enabled = state.toggle.toggle();
    state.logger.log_toggle(enabled);
    Redirect::to("/")
}

/// Health check response - returns 200 if healthy, 503 if unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy => StatusCode::OK,
        ComponentStatus::Degraded => StatusCode::OK, // Pages still render
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Readiness check response - returns 200 if ready, 503 if not ready
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> Response {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        warn!(error = %e, "Failed to encode metrics");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        buffer,
    )
        .into_response()
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/scale", post(scale))
        .route("/restart", post(restart))
        .route("/delete-error-completed-pods", post(delete_failed_pods))
        .route("/logs", post(logs))
        .route("/fetch_logs", post(fetch_logs))
        .route("/node_metrics", get(node_metrics))
        .route("/toggle-error-check", post(toggle_error_check))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Start the API server and run until `shutdown` resolves
pub async fn serve<F>(port: u16, state: Arc<AppState>, shutdown: F) -> anyhow::Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
