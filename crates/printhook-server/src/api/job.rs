use crate::api::{ApiResponse, state::AppState};
use axum::{Json, extract::State};
use printhook_core::JobInfo;

// GET /api/job
pub async fn get_job(State(state): State<AppState>) -> Json<ApiResponse<JobInfo>> {
    Json(ApiResponse::ok(state.job_info.get()))
}

// PUT /api/job
pub async fn update_job(
    State(state): State<AppState>,
    Json(info): Json<JobInfo>,
) -> Json<ApiResponse<JobInfo>> {
    state.job_info.set(info.clone());
    Json(ApiResponse::ok(info))
}
