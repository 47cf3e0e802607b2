//! Client API: submit an expression, list and inspect submitted ones.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use calc_compute::ExpressionSummary;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::state::AppState;

use super::{api_error, bad_json, scheduler_error, ApiError, ErrorResponse};

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct CalculateRequest {
    /// Infix arithmetic over `+ - * /`, e.g. `2+2*2`.
    pub expression: String,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct CalculateResponse {
    pub id: String,
}

#[derive(Debug, Serialize)]
pub struct ExpressionListResponse {
    pub expressions: Vec<ExpressionSummary>,
}

#[derive(Debug, Serialize)]
pub struct ExpressionResponse {
    pub expression: ExpressionSummary,
}

#[utoipa::path(
    post,
    path = "/api/v1/calculate",
    tag = "Expressions",
    request_body = CalculateRequest,
    responses(
        (status = 201, description = "Expression accepted", body = CalculateResponse),
        (status = 400, description = "Malformed JSON body", body = ErrorResponse),
        (status = 422, description = "Expression could not be parsed", body = ErrorResponse),
        (status = 503, description = "Dispatcher is shutting down", body = ErrorResponse)
    )
)]
pub async fn calculate(
    State(state): State<Arc<AppState>>,
    body: Result<Json<CalculateRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CalculateResponse>), ApiError> {
    let Json(req) = body.map_err(bad_json)?;
    match state.dispatcher.submit(&req.expression).await {
        Ok(id) => Ok((StatusCode::CREATED, Json(CalculateResponse { id }))),
        Err(e) => {
            warn!(expression = %req.expression, error = %e, "calculate rejected");
            Err(scheduler_error(e))
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/expressions",
    tag = "Expressions",
    responses(
        (status = 200, description = "All expressions, oldest first", body = Object)
    )
)]
pub async fn list_expressions(State(state): State<Arc<AppState>>) -> Json<ExpressionListResponse> {
    Json(ExpressionListResponse {
        expressions: state.dispatcher.registry().list(),
    })
}

#[utoipa::path(
    get,
    path = "/api/v1/expressions/{id}",
    tag = "Expressions",
    params(
        ("id" = String, Path, description = "Expression id returned by calculate")
    ),
    responses(
        (status = 200, description = "Expression detail", body = Object),
        (status = 404, description = "Unknown expression", body = ErrorResponse)
    )
)]
pub async fn get_expression(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ExpressionResponse>, ApiError> {
    let expression = state
        .dispatcher
        .registry()
        .get(&id)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, format!("expression not found: {id}")))?;
    Ok(Json(ExpressionResponse {
        expression: expression.summary(),
    }))
}
