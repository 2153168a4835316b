use crate::config::MissingProductPolicy;
use crate::errors::PortalError;
use crate::extractors::PortalJson;
use crate::models::{ApiProduct, CreateApiProductBody, Deletion};
use crate::openapi::API_PRODUCTS_TAG;
use crate::providers::IdpHandler;
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::Json;
use http::StatusCode;
use log::debug;
use serde::Deserialize;
use utoipa::IntoParams;
use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

pub(super) fn router() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(
            list_api_products,
            create_api_product,
            delete_api_product_by_query
        ))
        .routes(routes!(delete_api_product))
        .route("/scopes", get(list_api_products))
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
struct ApiProductQuery {
    /// Name of the API product to delete
    name: Option<String>,
}

/// List API products
#[utoipa::path(
    get,
    path = "/api-products",
    tag = API_PRODUCTS_TAG,
    responses(
        (status = 200, description = "Every registered API product", body = Vec<ApiProduct>),
        (status = 500, description = "Provider failure", body = PortalError)
    )
)]
async fn list_api_products(
    State(state): State<AppState>,
) -> Result<Json<Vec<ApiProduct>>, PortalError> {
    Ok(Json(state.provider.get_api_products().await?))
}

/// Register an API product
#[utoipa::path(
    post,
    path = "/api-products",
    tag = API_PRODUCTS_TAG,
    request_body = CreateApiProductBody,
    responses(
        (status = 201, description = "API product created"),
        (status = 400, description = "Missing or empty name, or a name containing '/'", body = PortalError),
        (status = 409, description = "An API product with this name exists", body = PortalError),
        (status = 500, description = "Provider failure", body = PortalError)
    )
)]
async fn create_api_product(
    State(state): State<AppState>,
    PortalJson(body): PortalJson<CreateApiProductBody>,
) -> Result<StatusCode, PortalError> {
    let name = &body.api_product.name;
    if name.trim().is_empty() {
        return Err(PortalError::bad_request("API product name is required"));
    }
    // Names are path segments in DELETE /api-products/{name}
    if name.contains('/') {
        return Err(PortalError::bad_request(format!(
            "API product name {name} must not contain '/'"
        )));
    }
    state.provider.create_api_product(&body.api_product).await?;
    Ok(StatusCode::CREATED)
}

/// Delete an API product
///
/// The name is a single path segment. A product whose name contains `/`, such as
/// one created directly in the provider, can only be deleted with
/// `DELETE /api-products?name=`.
#[utoipa::path(
    delete,
    path = "/api-products/{name}",
    tag = API_PRODUCTS_TAG,
    params(
        ("name" = String, Path, description = "Name of the API product"),
    ),
    responses(
        (status = 204, description = "API product deleted"),
        (status = 404, description = "No such API product", body = PortalError),
        (status = 500, description = "Provider failure", body = PortalError)
    )
)]
async fn delete_api_product(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<StatusCode, PortalError> {
    remove_api_product(&state, &name).await
}

/// Delete an API product named in the query string
#[utoipa::path(
    delete,
    path = "/api-products",
    tag = API_PRODUCTS_TAG,
    params(ApiProductQuery),
    responses(
        (status = 204, description = "API product deleted"),
        (status = 400, description = "Missing name", body = PortalError),
        (status = 404, description = "No such API product", body = PortalError),
        (status = 500, description = "Provider failure", body = PortalError)
    )
)]
async fn delete_api_product_by_query(
    State(state): State<AppState>,
    Query(query): Query<ApiProductQuery>,
) -> Result<StatusCode, PortalError> {
    let name = query
        .name
        .filter(|name| !name.trim().is_empty())
        .ok_or_else(|| PortalError::bad_request("query parameter name is required"))?;
    remove_api_product(&state, &name).await
}

async fn remove_api_product(state: &AppState, name: &str) -> Result<StatusCode, PortalError> {
    match state.provider.delete_api_product(name).await? {
        Deletion::Deleted => Ok(StatusCode::NO_CONTENT),
        Deletion::Absent => {
            debug!("API product {} does not exist", name);
            match state.config.missing_product_on_delete {
                MissingProductPolicy::NotFound => Err(PortalError::not_found(format!(
                    "API product {name} does not exist"
                ))),
                MissingProductPolicy::NoContent => Ok(StatusCode::NO_CONTENT),
            }
        }
    }
}
