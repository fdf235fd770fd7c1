pub mod events;
pub mod hooks;
pub mod job;
pub mod notices;
pub mod response;
pub mod state;

pub use response::ApiResponse;

use axum::{
    Router,
    http::{Method, header},
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use events::{fire_event, observe_serial, report_progress, test_hooks};
use state::AppState;

#[derive(serde::Serialize)]
struct Health {
    status: String,
}

async fn health() -> axum::Json<Health> {
    axum::Json(Health {
        status: "printhook is working!".to_string(),
    })
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Router::new()
        .route("/health", get(health))
        // Printer host events
        .route("/api/events", post(fire_event))
        .route("/api/progress", post(report_progress))
        .route("/api/serial", post(observe_serial))
        .route("/api/job", get(job::get_job).put(job::update_job))
        // Hook configuration
        .route("/api/hooks", get(hooks::list_hooks).put(hooks::replace_hooks))
        .route("/api/hooks/test", post(test_hooks))
        .route("/api/notices", get(notices::list_notices))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::state::AppContext;
    use crate::notices::RecentNotices;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use printhook_core::hooks::{
        DispatcherConfig, EventPipeline, HookRegistry, SharedJobInfo, WebhookDispatcher,
    };
    use printhook_core::storage::HookStorage;
    use serde_json::{Value, json};
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::{TempDir, tempdir};
    use tower::ServiceExt;

    fn create_test_state() -> (AppState, TempDir) {
        let temp_dir = tempdir().expect("create temp dir");
        let storage = HookStorage::new(temp_dir.path().join("hooks.json"));
        let notices = Arc::new(RecentNotices::default());
        let job_info = Arc::new(SharedJobInfo::new());
        let dispatcher = WebhookDispatcher::new(
            DispatcherConfig {
                timeout: Duration::from_millis(500),
                max_concurrent: 4,
            },
            notices.clone(),
        )
        .expect("build dispatcher");
        let pipeline = EventPipeline::new(Arc::new(HookRegistry::new(Vec::new())), dispatcher)
            .with_job_info(job_info.clone());

        let state = Arc::new(AppContext {
            pipeline,
            storage,
            job_info,
            notices,
            save_lock: tokio::sync::Mutex::new(()),
        });
        (state, temp_dir)
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("Content-Type", "application/json");
        let request = match body {
            Some(body) => request.body(Body::from(body.to_string())),
            None => request.body(Body::empty()),
        }
        .expect("build request");

        let response = app.clone().oneshot(request).await.expect("send request");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        (status, serde_json::from_slice(&bytes).expect("json body"))
    }

    #[tokio::test]
    async fn test_health() {
        let (state, _tmp_dir) = create_test_state();
        let app = router(state);

        let (status, body) = send(&app, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "printhook is working!");
    }

    #[tokio::test]
    async fn test_replace_hooks_persists_and_assigns_ids() {
        let (state, _tmp_dir) = create_test_state();
        let app = router(state.clone());

        let (_, body) = send(
            &app,
            "PUT",
            "/api/hooks",
            Some(json!([{ "name": "Slack", "url": "https://hooks.example.com/x" }])),
        )
        .await;
        assert_eq!(body["success"], true);
        let id = body["data"][0]["id"].as_str().expect("id").to_string();
        assert!(!id.is_empty());

        let (_, body) = send(&app, "GET", "/api/hooks", None).await;
        assert_eq!(body["data"][0]["name"], "Slack");
        assert_eq!(body["data"][0]["http_method"], "POST");

        let stored = state.storage.load().expect("load stored hooks");
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id, id);
    }

    #[tokio::test]
    async fn test_invalid_progress_interval_surfaces_notice() {
        let (state, _tmp_dir) = create_test_state();
        let app = router(state.clone());

        send(
            &app,
            "PUT",
            "/api/hooks",
            Some(json!([{
                "name": "Broken",
                "url": "http://127.0.0.1:9/hook",
                "events": { "print_progress": { "enabled": true, "interval": "abc" } }
            }])),
        )
        .await;

        let (_, body) = send(&app, "POST", "/api/progress", Some(json!({ "progress": 60 }))).await;
        assert_eq!(body["success"], true);
        state.pipeline.wait_idle().await;

        let (_, body) = send(&app, "GET", "/api/notices", None).await;
        let notices = body["data"].as_array().expect("notices");
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0]["hook_name"], "Broken");
        assert_eq!(notices[0]["level"], "error");
    }

    #[tokio::test]
    async fn test_progress_out_of_range_is_rejected() {
        let (state, _tmp_dir) = create_test_state();
        let app = router(state);

        let (_, body) = send(&app, "POST", "/api/progress", Some(json!({ "progress": 101 }))).await;
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_job_info_round_trip() {
        let (state, _tmp_dir) = create_test_state();
        let app = router(state);

        let job = json!({ "state": { "text": "Printing" }, "currentZ": 0.4 });
        let (_, body) = send(&app, "PUT", "/api/job", Some(job.clone())).await;
        assert_eq!(body["data"], job);

        let (_, body) = send(&app, "GET", "/api/job", None).await;
        assert_eq!(body["data"]["currentZ"], json!(0.4));
    }

    #[tokio::test]
    async fn test_serial_and_events_are_accepted() {
        let (state, _tmp_dir) = create_test_state();
        let app = router(state.clone());

        let (_, body) = send(
            &app,
            "POST",
            "/api/serial",
            Some(json!({ "line": "echo:busy: paused for user" })),
        )
        .await;
        assert_eq!(body["data"], true);

        let (_, body) = send(
            &app,
            "POST",
            "/api/events",
            Some(json!({ "event": "PrintStarted", "payload": { "name": "cube.gcode" } })),
        )
        .await;
        assert_eq!(body["success"], true);

        let (_, body) = send(&app, "POST", "/api/events", Some(json!({ "event": " " }))).await;
        assert_eq!(body["success"], false);
        state.pipeline.wait_idle().await;
    }

    #[tokio::test]
    async fn test_trigger_test_checks_hook_index() {
        let (state, _tmp_dir) = create_test_state();
        let app = router(state);

        let (_, body) = send(
            &app,
            "POST",
            "/api/hooks/test",
            Some(json!({ "event": "PrintDone", "hook_index": 3 })),
        )
        .await;
        assert_eq!(body["success"], false);
        assert!(body["message"].as_str().expect("message").contains("not found"));
    }
}
