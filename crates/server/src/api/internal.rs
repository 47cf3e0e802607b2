//! Agent protocol: pull the next ready task, post its result.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use calc_core::{TaskEnvelope, TaskResult};
use serde::Serialize;

use crate::state::AppState;

use super::{api_error, bad_json, scheduler_error, ApiError, ErrorResponse};

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct CompleteResponse {
    pub expression_id: String,
    pub expression_completed: bool,
}

#[utoipa::path(
    get,
    path = "/internal/task",
    tag = "Agents",
    responses(
        (status = 200, description = "A ready task", body = Object),
        (status = 404, description = "No task is ready", body = ErrorResponse)
    )
)]
pub async fn next_task(State(state): State<Arc<AppState>>) -> Result<Json<TaskEnvelope>, ApiError> {
    state
        .dispatcher
        .pull()
        .map(|task| Json(TaskEnvelope { task }))
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "no task available"))
}

#[utoipa::path(
    post,
    path = "/internal/task",
    tag = "Agents",
    request_body = Object,
    responses(
        (status = 200, description = "Result accepted", body = CompleteResponse),
        (status = 400, description = "Malformed JSON body", body = ErrorResponse),
        (status = 404, description = "Unknown task", body = ErrorResponse),
        (status = 409, description = "Task already completed, not dispatched, or stale", body = ErrorResponse)
    )
)]
pub async fn complete_task(
    State(state): State<Arc<AppState>>,
    body: Result<Json<TaskResult>, JsonRejection>,
) -> Result<Json<CompleteResponse>, ApiError> {
    let Json(result) = body.map_err(bad_json)?;
    let completion = state.dispatcher.complete(result).map_err(scheduler_error)?;
    Ok(Json(CompleteResponse {
        expression_id: completion.expression_id,
        expression_completed: completion.expression_completed,
    }))
}
