use crate::api::{ApiResponse, state::AppState};
use axum::{Json, extract::State};
use printhook_core::Hook;
use tracing::error;

// GET /api/hooks
pub async fn list_hooks(State(state): State<AppState>) -> Json<ApiResponse<Vec<Hook>>> {
    let hooks = state
        .pipeline
        .registry()
        .snapshot()
        .iter()
        .map(|hook| Hook::clone(hook))
        .collect();
    Json(ApiResponse::ok(hooks))
}

// PUT /api/hooks
pub async fn replace_hooks(
    State(state): State<AppState>,
    Json(hooks): Json<Vec<Hook>>,
) -> Json<ApiResponse<Vec<Hook>>> {
    let _guard = state.save_lock.lock().await;

    let previous: Vec<Hook> = state
        .pipeline
        .registry()
        .snapshot()
        .iter()
        .map(|hook| Hook::clone(hook))
        .collect();
    let saved: Vec<Hook> = state
        .pipeline
        .replace_hooks(hooks)
        .iter()
        .map(|hook| Hook::clone(hook))
        .collect();

    if let Err(e) = state.storage.save(&saved) {
        error!(error = %e, "Failed to save hooks, restoring previous list");
        state.pipeline.replace_hooks(previous);
        return Json(ApiResponse::error(format!("Failed to save hooks: {}", e)));
    }

    Json(ApiResponse::ok(saved))
}
