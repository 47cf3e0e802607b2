//! HTTP endpoint modules.
//!
//! `expressions` serves the public client API, `internal` the agent pull/push
//! protocol, `health` readiness and scheduler counters. Shared error types and
//! the `SchedulerError` to status-code mapping live here.

pub mod doc;
mod expressions;
mod health;
mod internal;

#[cfg(test)]
mod tests;

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::Json;
use calc_compute::SchedulerError;
use serde::Serialize;

// ── Shared types ─────────────────────────────────────────────────

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub(crate) fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

/// Malformed or wrongly-typed JSON bodies are a client error, always 400.
pub(crate) fn bad_json(rejection: JsonRejection) -> ApiError {
    api_error(StatusCode::BAD_REQUEST, rejection.body_text())
}

pub(crate) fn scheduler_error(err: SchedulerError) -> ApiError {
    let status = match &err {
        SchedulerError::Parse(_) => StatusCode::UNPROCESSABLE_ENTITY,
        SchedulerError::TaskNotFound(_) => StatusCode::NOT_FOUND,
        SchedulerError::AlreadyCompleted(_)
        | SchedulerError::NotDispatched(_)
        | SchedulerError::StaleCompletion { .. } => StatusCode::CONFLICT,
        SchedulerError::QueueClosed => StatusCode::SERVICE_UNAVAILABLE,
    };
    api_error(status, err.to_string())
}

// ── Re-exports ───────────────────────────────────────────────────

pub use expressions::{calculate, get_expression, list_expressions};
pub use health::{health, scheduler_metrics};
pub use internal::{complete_task, next_task};
