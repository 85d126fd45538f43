pub mod assets;
pub mod health;
pub mod routes;
pub mod sse;

use std::sync::Arc;
use std::time::Instant;

use axum::routing::{get, post};
use axum::Router;
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::daemon::events::TelemetryEvent;
use crate::daemon::refresh::RefreshPipeline;
use crate::daemon::views::DashboardViews;
use crate::models::TrackerConfig;
use crate::telemetry::TelemetryApi;

/// Shared application state for the Axum server.
pub struct AppState {
    pub api: Arc<dyn TelemetryApi>,
    pub event_tx: broadcast::Sender<TelemetryEvent>,
    pub config: Arc<TrackerConfig>,
    pub start_time: Instant,
    pub views: Arc<DashboardViews>,
    pub pipeline: Arc<RefreshPipeline>,
}

impl AppState {
    /// Wire the event channel, the dashboard views and the refresh pipeline
    /// around an existing telemetry API.
    pub fn new(api: Arc<dyn TelemetryApi>, config: Arc<TrackerConfig>) -> Self {
        let (event_tx, _) = broadcast::channel(config.broadcast_capacity.max(1));
        let views = Arc::new(DashboardViews::new(config.activity_feed_size));

        let mut pipeline = RefreshPipeline::new(Arc::clone(&api), config.recent_jobs);
        for subscriber in views.subscribers() {
            pipeline.register(subscriber);
        }

        Self {
            api,
            event_tx,
            config,
            start_time: Instant::now(),
            views,
            pipeline: Arc::new(pipeline),
        }
    }
}

/// Create the Axum router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/api/stats", get(routes::get_stats))
        .route("/api/jobs", get(routes::list_jobs).post(routes::submit_job))
        .route("/api/jobs/{id}", get(routes::get_job))
        .route("/api/jobs/{id}/cancel", post(routes::cancel_job))
        .route("/api/machines", get(routes::list_machines))
        .route("/api/dashboard", get(routes::get_dashboard))
        .route("/api/dashboard/refresh", post(routes::refresh_dashboard))
        .route("/api/events", get(sse::sse_handler))
        .with_state(state)
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .fallback(assets::serve_embedded)
}

// ===========================================================================
// Tests
// ===========================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LatencyConfig;
    use crate::telemetry::MockTelemetry;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    // -----------------------------------------------------------------------
    // Test helper: build AppState and Router
    // -----------------------------------------------------------------------

    fn test_config() -> Arc<TrackerConfig> {
        Arc::new(TrackerConfig {
            seed: Some(1234),
            latency: LatencyConfig::none(),
            ..TrackerConfig::default()
        })
    }

    async fn make_test_state() -> Arc<AppState> {
        let config = test_config();
        let api = Arc::new(MockTelemetry::new(Arc::clone(&config)));
        api.initialize().await.expect("initialize");
        Arc::new(AppState::new(api, config))
    }

    fn make_uninitialized_state() -> Arc<AppState> {
        let config = test_config();
        let api = Arc::new(MockTelemetry::new(Arc::clone(&config)));
        Arc::new(AppState::new(api, config))
    }

    /// Helper to read the full body from a response.
    async fn body_string(body: Body) -> String {
        let bytes = body.collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = body_string(response.into_body()).await;
        (status, serde_json::from_str(&body).unwrap())
    }

    async fn post_json(app: Router, uri: &str, body: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let body = body_string(response.into_body()).await;
        (status, serde_json::from_str(&body).unwrap())
    }

    // =======================================================================
    // Health and stats
    // =======================================================================

    #[tokio::test]
    async fn test_health_returns_200_with_expected_fields() {
        let app = create_router(make_test_state().await);
        let (status, json) = get_json(app, "/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
        assert_eq!(json["connection"], "online");
        assert!(json["uptime_seconds"].is_number());
        assert_eq!(json["total_jobs"], 50);
        assert_eq!(json["total_machines"], 8);
        assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn test_health_reports_offline_before_initialize() {
        let app = create_router(make_uninitialized_state());
        let (status, json) = get_json(app, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["connection"], "offline");
        assert_eq!(json["total_jobs"], 0);
    }

    #[tokio::test]
    async fn test_stats_before_initialize_returns_503() {
        let app = create_router(make_uninitialized_state());
        let (status, json) = get_json(app, "/api/stats").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json["error"], "not_initialized");
        assert!(json["message"].is_string());
    }

    #[tokio::test]
    async fn test_stats_counts_all_jobs() {
        let app = create_router(make_test_state().await);
        let (status, json) = get_json(app, "/api/stats").await;
        assert_eq!(status, StatusCode::OK);
        let total: u64 = [
            "running_jobs",
            "queued_jobs",
            "completed_jobs",
            "failed_jobs",
            "cancelled_jobs",
        ]
        .iter()
        .map(|k| json[*k].as_u64().unwrap())
        .sum();
        assert_eq!(total, 50);
        assert_eq!(json["total_machines"], 8);
    }

    // =======================================================================
    // Jobs
    // =======================================================================

    #[tokio::test]
    async fn test_list_jobs_with_limit() {
        let app = create_router(make_test_state().await);
        let (status, json) = get_json(app, "/api/jobs?limit=5").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json.as_array().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_list_jobs_status_filter() {
        let app = create_router(make_test_state().await);
        let (status, json) = get_json(app, "/api/jobs?status=completed").await;
        assert_eq!(status, StatusCode::OK);
        let jobs = json.as_array().unwrap();
        assert!(!jobs.is_empty());
        assert!(jobs.iter().all(|j| j["status"] == "completed"));
    }

    #[tokio::test]
    async fn test_list_jobs_search_is_case_insensitive() {
        let state = make_test_state().await;
        let (_, submitted) = post_json(
            create_router(Arc::clone(&state)),
            "/api/jobs",
            r#"{"backend":"ibm_SearchTarget"}"#,
        )
        .await;

        let (status, json) =
            get_json(create_router(state), "/api/jobs?search=searchTARGET").await;
        assert_eq!(status, StatusCode::OK);
        let jobs = json.as_array().unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0]["id"], submitted["id"]);
    }

    #[tokio::test]
    async fn test_list_jobs_unknown_status_returns_400() {
        let app = create_router(make_test_state().await);
        let (status, json) = get_json(app, "/api/jobs?status=paused").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "validation_error");
    }

    #[tokio::test]
    async fn test_submit_job_returns_201_and_broadcasts() {
        let state = make_test_state().await;
        let mut rx = state.event_tx.subscribe();
        let app = create_router(Arc::clone(&state));

        let (status, json) = post_json(app, "/api/jobs", r#"{"backend":"ibm_test"}"#).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(json["backend"], "ibm_test");
        assert_eq!(json["status"], "queued");
        assert!(json["duration"].is_null());

        match rx.try_recv().expect("event") {
            TelemetryEvent::JobChanged { job_id, change, .. } => {
                assert_eq!(job_id, json["id"].as_str().unwrap());
                assert_eq!(change, crate::daemon::events::JobChangeKind::Submitted);
            }
            other => panic!("Expected JobChanged, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_submit_zero_shots_returns_400() {
        let app = create_router(make_test_state().await);
        let (status, json) = post_json(app, "/api/jobs", r#"{"shots":0}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "validation_error");
    }

    #[tokio::test]
    async fn test_get_unknown_job_returns_404() {
        let app = create_router(make_test_state().await);
        let (status, json) = get_json(app, "/api/jobs/zzzzzzzz").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"], "not_found");
    }

    #[tokio::test]
    async fn test_cancel_twice_returns_409() {
        let state = make_test_state().await;
        let (_, submitted) =
            post_json(create_router(Arc::clone(&state)), "/api/jobs", "{}").await;
        let id = submitted["id"].as_str().unwrap();
        let uri = format!("/api/jobs/{}/cancel", id);

        let (status, json) = post_json(create_router(Arc::clone(&state)), &uri, "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "cancelled");

        let (status, json) = post_json(create_router(Arc::clone(&state)), &uri, "").await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["error"], "invalid_transition");

        let (status, json) = get_json(create_router(state), &format!("/api/jobs/{}", id)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "cancelled");
    }

    #[tokio::test]
    async fn test_list_machines() {
        let app = create_router(make_test_state().await);
        let (status, json) = get_json(app, "/api/machines").await;
        assert_eq!(status, StatusCode::OK);
        let machines = json.as_array().unwrap();
        assert_eq!(machines.len(), 8);
        assert!(machines[0]["name"].is_string());
        assert!(machines[0]["fidelity"].is_number());
    }

    // =======================================================================
    // Dashboard
    // =======================================================================

    #[tokio::test]
    async fn test_dashboard_empty_until_refreshed() {
        let state = make_test_state().await;
        let (status, json) = get_json(create_router(Arc::clone(&state)), "/api/dashboard").await;
        assert_eq!(status, StatusCode::OK);
        assert!(json["stat_cards"].is_null());

        let (status, report) =
            post_json(create_router(Arc::clone(&state)), "/api/dashboard/refresh", "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(report["rendered"].as_array().unwrap().len(), 5);
        assert!(report["failed"].as_array().unwrap().is_empty());

        let (_, json) = get_json(create_router(state), "/api/dashboard").await;
        assert!(json["stat_cards"]["running_jobs"].is_number());
        assert_eq!(json["charts"]["timeline"].as_array().unwrap().len(), 24);
        assert_eq!(json["jobs_table"].as_array().unwrap().len(), 50);
        assert_eq!(json["machine_cards"].as_array().unwrap().len(), 8);
        assert_eq!(json["activity"].as_array().unwrap().len(), 10);
    }

    #[tokio::test]
    async fn test_dashboard_refresh_before_initialize_returns_503() {
        let app = create_router(make_uninitialized_state());
        let (status, json) = post_json(app, "/api/dashboard/refresh", "").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json["error"], "not_initialized");
    }

    #[tokio::test]
    async fn test_unknown_path_falls_back_to_assets() {
        let app = create_router(make_test_state().await);
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/does-not-exist.txt")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
