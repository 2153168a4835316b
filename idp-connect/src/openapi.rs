use utoipa::OpenApi;

pub(crate) const HEALTH_TAG: &str = "Health API";
pub(crate) const APPLICATIONS_TAG: &str = "Applications API";
pub(crate) const API_PRODUCTS_TAG: &str = "API Products API";

#[derive(OpenApi)]
#[openapi(
    tags(
        (name = HEALTH_TAG, description = "Health check endpoints"),
        (name = APPLICATIONS_TAG, description = "OAuth applications and their API products"),
        (name = API_PRODUCTS_TAG, description = "API products registered with the identity provider"),
    ),
    info(
        title = "idp-connect API",
        description = "Provider-agnostic OAuth application and API product management",
        version = "0.1.0"
    )
)]
pub(crate) struct ApiDoc;
