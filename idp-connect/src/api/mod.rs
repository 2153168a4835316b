pub(crate) mod api_products;
pub(crate) mod applications;
pub(crate) mod health;

use crate::state::AppState;
use utoipa_axum::router::OpenApiRouter;

/// Combines all API routes into a single router
pub(super) fn router() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .merge(health::router())
        .merge(applications::router())
        .merge(api_products::router())
}
