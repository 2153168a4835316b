use crate::openapi::HEALTH_TAG;
use crate::state::AppState;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

/// Basic health check response
#[derive(Debug, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct Health {
    status: String,
    /// Identity provider this instance forwards to
    provider: String,
}

/// Basic health check handler
#[utoipa::path(
    get,
    path = "/health",
    tag = HEALTH_TAG,
    responses(
        (status = 200, description = "Service is healthy", body = Health)
    )
)]
async fn health_check(State(state): State<AppState>) -> Json<Health> {
    Json(Health {
        status: "ok".to_string(),
        provider: state.provider.kind().to_string(),
    })
}

pub(super) fn router() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().routes(routes!(health_check))
}
