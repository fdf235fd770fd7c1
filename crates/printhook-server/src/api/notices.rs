use crate::api::{ApiResponse, state::AppState};
use axum::{Json, extract::State};
use printhook_core::hooks::Notice;

// GET /api/notices
pub async fn list_notices(State(state): State<AppState>) -> Json<ApiResponse<Vec<Notice>>> {
    Json(ApiResponse::ok(state.notices.recent()))
}
