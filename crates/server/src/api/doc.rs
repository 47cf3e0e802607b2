//! OpenAPI document for every annotated handler, served via Scalar UI at `/docs`.

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "calc API",
        version = "0.1.0",
        description = "Distributed arithmetic: expressions are split into binary tasks that remote agents compute.",
    ),
    tags(
        (name = "Expressions", description = "Submit expressions and read their results"),
        (name = "Agents", description = "Task pull and result push used by agent workers"),
        (name = "Health", description = "Readiness and scheduler counters"),
    ),
    paths(
        crate::api::expressions::calculate,
        crate::api::expressions::list_expressions,
        crate::api::expressions::get_expression,
        crate::api::internal::next_task,
        crate::api::internal::complete_task,
        crate::api::health::health,
        crate::api::health::scheduler_metrics,
    ),
    components(schemas(
        crate::api::ErrorResponse,
        crate::api::expressions::CalculateRequest,
        crate::api::expressions::CalculateResponse,
        crate::api::internal::CompleteResponse,
        crate::api::health::HealthResponse,
    ))
)]
pub struct ApiDoc;
