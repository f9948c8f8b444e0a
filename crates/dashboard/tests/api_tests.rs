//! Integration tests for the dashboard HTTP endpoints

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use dashboard_lib::{
    cache::ReadCache,
    health::{components, HealthRegistry},
    monitor::AlertToggle,
    observability::{DashboardMetrics, StructuredLogger},
    testing::{app_labels, pod, waiting_pod, workload, FakeControlPlane, Write},
    Dashboard, PodPhase,
};
use kube_dashboard::api::{create_router, AppState};
use std::sync::Arc;
use tower::ServiceExt;

struct TestApp {
    router: Router,
    state: Arc<AppState>,
    fake: Arc<FakeControlPlane>,
}

impl TestApp {
    async fn send(&self, request: Request<Body>) -> axum::response::Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    async fn get(&self, uri: &str) -> axum::response::Response {
        self.send(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
    }

    async fn post_form(&self, uri: &str, form: &str) -> axum::response::Response {
        self.send(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(form.to_string()))
                .unwrap(),
        )
        .await
    }
}

async fn setup_test_app() -> TestApp {
    let fake = Arc::new(FakeControlPlane::new());
    fake.add_workload(workload("shop", "web", 2));
    fake.add_pod(pod("shop", "web-1", PodPhase::Running), app_labels("web"));
    fake.add_pod(
        waiting_pod("shop", "web-2", "CrashLoopBackOff"),
        app_labels("web"),
    );
    fake.add_node("node-1", "500000000n", "1048576Ki", Some("2097152Ki"));
    fake.set_log("shop", "web-1", "GET /healthz 200\n<b>done</b>\n");

    let health_registry = HealthRegistry::new();
    health_registry.register(components::CONTROL_PLANE).await;
    health_registry.register(components::MONITOR).await;

    let metrics = DashboardMetrics::new();
    let logger = StructuredLogger::new("test");
    let dashboard = Dashboard::new(
        fake.clone(),
        Arc::new(ReadCache::new(metrics.clone())),
        health_registry.clone(),
        metrics,
        logger.clone(),
    );

    let state = Arc::new(AppState::new(
        dashboard,
        AlertToggle::new(true),
        health_registry,
        logger,
    ));
    let router = create_router(state.clone());

    TestApp {
        router,
        state,
        fake,
    }
}

async fn body_text(response: axum::response::Response) -> String {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(body.to_vec()).unwrap()
}

fn assert_redirects_home(response: &axum::response::Response) {
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/");
}

#[tokio::test]
async fn test_index_renders_workloads_pods_and_nodes() {
    let app = setup_test_app().await;

    let response = app.get("/").await;
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers().get(header::CONTENT_TYPE).unwrap();
    assert!(content_type.to_str().unwrap().contains("text/html"));

    let html = body_text(response).await;
    assert!(html.contains("shop/web"));
    assert!(html.contains("web-1"));
    assert!(html.contains("waiting (CrashLoopBackOff)"));
    assert!(html.contains("500m"));
    assert!(html.contains("50.00%"));
}

#[tokio::test]
async fn test_index_reads_are_cached() {
    let app = setup_test_app().await;

    app.get("/").await;
    app.get("/").await;

    assert_eq!(app.fake.calls("list_workloads"), 1);
    assert_eq!(app.fake.calls("list_pods_by_selector"), 1);
    assert_eq!(app.fake.calls("list_node_metrics"), 1);
}

#[tokio::test]
async fn test_index_renders_when_control_plane_is_down() {
    let app = setup_test_app().await;
    app.fake.fail_operation("list_workloads");
    app.fake.fail_operation("list_node_metrics");

    let response = app.get("/").await;
    assert_eq!(response.status(), StatusCode::OK);

    let html = body_text(response).await;
    assert!(html.contains("No deployments found."));
    assert!(html.contains("No node metrics available."));
}

#[tokio::test]
async fn test_scale_patches_and_redirects() {
    let app = setup_test_app().await;

    let response = app
        .post_form("/scale", "namespace=shop&deployment_name=web&replicas=5")
        .await;

    assert_redirects_home(&response);
    assert_eq!(
        app.fake.writes(),
        vec![Write::Scale {
            namespace: "shop".to_string(),
            name: "web".to_string(),
            replicas: 5,
        }]
    );
}

#[tokio::test]
async fn test_scale_invalidates_cached_reads() {
    let app = setup_test_app().await;

    app.get("/").await;
    app.post_form("/scale", "namespace=shop&deployment_name=web&replicas=3")
        .await;
    let html = body_text(app.get("/").await).await;

    assert_eq!(app.fake.calls("list_workloads"), 2);
    assert!(html.contains("Replicas: 2/3 ready"));
}

#[tokio::test]
async fn test_scale_rejects_negative_replicas() {
    let app = setup_test_app().await;

    let response = app
        .post_form("/scale", "namespace=shop&deployment_name=web&replicas=-1")
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(app.fake.writes().is_empty());
}

#[tokio::test]
async fn test_scale_rejects_non_numeric_replicas() {
    let app = setup_test_app().await;

    let response = app
        .post_form("/scale", "namespace=shop&deployment_name=web&replicas=many")
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(app.fake.calls("patch_workload_replicas"), 0);
}

#[tokio::test]
async fn test_scale_failure_still_redirects() {
    let app = setup_test_app().await;
    app.fake.fail_operation("patch_workload_replicas");

    let response = app
        .post_form("/scale", "namespace=shop&deployment_name=web&replicas=4")
        .await;

    assert_redirects_home(&response);
    assert_eq!(app.fake.calls("patch_workload_replicas"), 1);
}

#[tokio::test]
async fn test_restart_sets_timestamp_and_redirects() {
    let app = setup_test_app().await;

    let response = app
        .post_form("/restart", "namespace=shop&deployment_name=web")
        .await;

    assert_redirects_home(&response);
    let writes = app.fake.writes();
    assert_eq!(writes.len(), 1);
    match &writes[0] {
        Write::Restart {
            namespace,
            name,
            timestamp,
        } => {
            assert_eq!(namespace, "shop");
            assert_eq!(name, "web");
            assert!(timestamp.ends_with('Z'));
        }
        other => panic!("unexpected write: {:?}", other),
    }
}

#[tokio::test]
async fn test_delete_error_completed_pods() {
    let app = setup_test_app().await;
    app.fake
        .add_pod(pod("shop", "job-1", PodPhase::Succeeded), app_labels("job"));
    app.fake
        .add_pod(pod("shop", "job-2", PodPhase::Failed), app_labels("job"));

    let response = app.post_form("/delete-error-completed-pods", "").await;

    assert_redirects_home(&response);
    let mut remaining = app.fake.pod_names();
    remaining.sort();
    assert_eq!(remaining, vec!["web-1", "web-2"]);
}

#[tokio::test]
async fn test_logs_page_escapes_output() {
    let app = setup_test_app().await;

    let response = app
        .post_form("/logs", "namespace=shop&pod_name=web-1&container_name=")
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("Logs: shop/web-1"));
    assert!(html.contains("&lt;b&gt;done&lt;/b&gt;"));
}

#[tokio::test]
async fn test_fetch_logs_returns_plain_text() {
    let app = setup_test_app().await;

    let response = app
        .post_form("/fetch_logs", "namespace=shop&pod_name=web-1")
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers().get(header::CONTENT_TYPE).unwrap();
    assert!(content_type.to_str().unwrap().starts_with("text/plain"));
    assert_eq!(
        body_text(response).await,
        "GET /healthz 200\n<b>done</b>\n"
    );
}

#[tokio::test]
async fn test_fetch_logs_empty_when_unavailable() {
    let app = setup_test_app().await;
    app.fake.fail_operation("read_pod_log");

    let response = app
        .post_form("/fetch_logs", "namespace=shop&pod_name=web-1")
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.is_empty());
}

#[tokio::test]
async fn test_node_metrics_returns_json() {
    let app = setup_test_app().await;

    let response = app.get("/node_metrics").await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let metrics: serde_json::Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(metrics[0]["name"], "node-1");
    assert_eq!(metrics[0]["cpuUsage"], "500m");
    assert_eq!(metrics[0]["cpuUsagePercent"], "50%");
    assert_eq!(metrics[0]["memoryUsage"], "1024Mi");
    assert_eq!(metrics[0]["memoryUsagePercent"], "50.00%");
}

#[tokio::test]
async fn test_toggle_error_check_flips_flag() {
    let app = setup_test_app().await;
    assert!(app.state.toggle.is_enabled());

    let response = app.post_form("/toggle-error-check", "").await;
    assert_redirects_home(&response);
    assert!(!app.state.toggle.is_enabled());

    let html = body_text(app.get("/").await).await;
    assert!(html.contains("Error alerting is <strong>disabled</strong>"));

    app.post_form("/toggle-error-check", "").await;
    assert!(app.state.toggle.is_enabled());
}

#[tokio::test]
async fn test_healthz_reports_degraded_control_plane() {
    let app = setup_test_app().await;
    app.fake.fail_operation("list_node_metrics");
    app.get("/node_metrics").await;

    let response = app.get("/healthz").await;

    // Degraded still returns 200
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let health: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(health["status"], "degraded");
    assert!(health["components"]["control_plane"].is_object());
}

#[tokio::test]
async fn test_healthz_returns_503_when_unhealthy() {
    let app = setup_test_app().await;
    app.state
        .health_registry
        .set_unhealthy(components::MONITOR, "Scan task crashed")
        .await;

    let response = app.get("/healthz").await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_readyz_follows_ready_flag() {
    let app = setup_test_app().await;

    let response = app.get("/readyz").await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    app.state.health_registry.set_ready(true).await;
    let response = app.get("/readyz").await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let readiness: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(readiness["ready"], true);
}

#[tokio::test]
async fn test_metrics_endpoint_returns_prometheus_format() {
    let app = setup_test_app().await;

    app.get("/").await;
    app.post_form("/scale", "namespace=shop&deployment_name=web&replicas=1")
        .await;

    let response = app.get("/metrics").await;
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers().get(header::CONTENT_TYPE).unwrap();
    assert!(content_type.to_str().unwrap().contains("text/plain"));

    let text = body_text(response).await;
    assert!(text.contains("kube_dashboard_cache_misses_total"));
    assert!(text.contains("kube_dashboard_mutations_total"));
}
