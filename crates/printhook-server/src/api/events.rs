use crate::api::{ApiResponse, state::AppState};
use axum::{Json, extract::State};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
pub struct FireEventRequest {
    pub event: String,
    #[serde(default)]
    pub payload: Value,
}

#[derive(Debug, Deserialize)]
pub struct ProgressRequest {
    pub progress: i32,
}

#[derive(Debug, Deserialize)]
pub struct SerialLineRequest {
    pub line: String,
}

#[derive(Debug, Deserialize)]
pub struct TestEventRequest {
    pub event: String,
    #[serde(default)]
    pub hook_index: Option<usize>,
}

// POST /api/events
pub async fn fire_event(
    State(state): State<AppState>,
    Json(request): Json<FireEventRequest>,
) -> Json<ApiResponse<()>> {
    if request.event.trim().is_empty() {
        return Json(ApiResponse::error("Event name is required"));
    }

    state.pipeline.fire(&request.event, request.payload);
    Json(ApiResponse::message(format!("Event {} accepted", request.event)))
}

// POST /api/progress
pub async fn report_progress(
    State(state): State<AppState>,
    Json(request): Json<ProgressRequest>,
) -> Json<ApiResponse<()>> {
    if !(0..=100).contains(&request.progress) {
        return Json(ApiResponse::error(format!(
            "Progress {} is outside 0..=100",
            request.progress
        )));
    }

    state.pipeline.update_progress(request.progress);
    Json(ApiResponse::message("Progress recorded"))
}

// POST /api/serial
pub async fn observe_serial(
    State(state): State<AppState>,
    Json(request): Json<SerialLineRequest>,
) -> Json<ApiResponse<bool>> {
    Json(ApiResponse::ok(state.pipeline.observe_serial_line(&request.line)))
}

// POST /api/hooks/test
pub async fn test_hooks(
    State(state): State<AppState>,
    Json(request): Json<TestEventRequest>,
) -> Json<ApiResponse<()>> {
    let hook_count = state.pipeline.registry().snapshot().len();
    if let Some(index) = request.hook_index
        && index >= hook_count
    {
        return Json(ApiResponse::error(format!("Hook {} not found", index)));
    }

    state.pipeline.trigger_test(&request.event, request.hook_index);
    Json(ApiResponse::message(format!("Test event {} fired", request.event)))
}
