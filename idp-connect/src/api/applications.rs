use crate::errors::PortalError;
use crate::extractors::{log_token_header, PortalJson};
use crate::models::{
    ApplicationSummary, CreateOAuthApplicationBody, OAuthApplication, UpdateAppApiProductsBody,
};
use crate::openapi::APPLICATIONS_TAG;
use crate::providers::IdpHandler;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::routing::put;
use axum::Json;
use http::{HeaderMap, StatusCode};
use log::info;
use std::collections::BTreeSet;
use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

pub(super) fn router() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(create_application))
        .routes(routes!(get_application, delete_application))
        .routes(routes!(
            get_application_api_products,
            update_application_api_products
        ))
        // Older clients address applications as OAuth clients and products as scopes
        .route("/clients/{id}/scopes", put(update_application_api_products))
}

/// Create an OAuth application
#[utoipa::path(
    post,
    path = "/applications",
    tag = APPLICATIONS_TAG,
    request_body = CreateOAuthApplicationBody,
    params(
        ("token" = Option<String>, Header, description = "Accepted and ignored"),
    ),
    responses(
        (status = 201, description = "Application created, the secret is only returned here", body = OAuthApplication),
        (status = 400, description = "Missing or empty identifier", body = PortalError),
        (status = 500, description = "Provider failure", body = PortalError)
    )
)]
async fn create_application(
    State(state): State<AppState>,
    headers: HeaderMap,
    PortalJson(body): PortalJson<CreateOAuthApplicationBody>,
) -> Result<(StatusCode, Json<OAuthApplication>), PortalError> {
    log_token_header(&headers);
    let identifier = body
        .identifier()
        .ok_or_else(|| PortalError::bad_request("application id or name is required"))?;

    let app = state.provider.create_oauth_application(identifier).await?;
    info!("Created application {} ({})", app.client_name, app.client_id);
    Ok((StatusCode::CREATED, Json(app)))
}

/// Describe an OAuth application
#[utoipa::path(
    get,
    path = "/applications/{id}",
    tag = APPLICATIONS_TAG,
    params(
        ("id" = String, Path, description = "Application identifier"),
        ("token" = Option<String>, Header, description = "Accepted and ignored"),
    ),
    responses(
        (status = 200, description = "The application, without its secret", body = ApplicationSummary),
        (status = 404, description = "No such application", body = PortalError),
        (status = 500, description = "Provider failure", body = PortalError)
    )
)]
async fn get_application(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<ApplicationSummary>, PortalError> {
    log_token_header(&headers);
    Ok(Json(state.provider.get_oauth_application(&id).await?))
}

/// Delete an OAuth application
#[utoipa::path(
    delete,
    path = "/applications/{id}",
    tag = APPLICATIONS_TAG,
    params(
        ("id" = String, Path, description = "Application identifier"),
        ("token" = Option<String>, Header, description = "Accepted and ignored"),
    ),
    responses(
        (status = 204, description = "Application deleted"),
        (status = 404, description = "No such application", body = PortalError),
        (status = 500, description = "Provider failure", body = PortalError)
    )
)]
async fn delete_application(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<StatusCode, PortalError> {
    log_token_header(&headers);
    state.provider.delete_oauth_application(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// List the API products granted to an application
#[utoipa::path(
    get,
    path = "/applications/{id}/api-products",
    tag = APPLICATIONS_TAG,
    params(
        ("id" = String, Path, description = "Application identifier"),
    ),
    responses(
        (status = 200, description = "Names of the granted API products", body = Vec<String>),
        (status = 404, description = "No such application", body = PortalError),
        (status = 500, description = "Provider failure", body = PortalError)
    )
)]
async fn get_application_api_products(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<String>>, PortalError> {
    Ok(Json(state.provider.get_app_api_products(&id).await?))
}

/// Replace the set of API products granted to an application
#[utoipa::path(
    put,
    path = "/applications/{id}/api-products",
    tag = APPLICATIONS_TAG,
    request_body = UpdateAppApiProductsBody,
    params(
        ("id" = String, Path, description = "Application identifier"),
        ("token" = Option<String>, Header, description = "Accepted and ignored"),
    ),
    responses(
        (status = 204, description = "Grants now match the requested set"),
        (status = 400, description = "Unknown API product or malformed body", body = PortalError),
        (status = 404, description = "No such application", body = PortalError),
        (status = 500, description = "Provider failure", body = PortalError)
    )
)]
async fn update_application_api_products(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    PortalJson(body): PortalJson<UpdateAppApiProductsBody>,
) -> Result<StatusCode, PortalError> {
    log_token_header(&headers);
    if body.api_products.iter().any(|p| p.trim().is_empty()) {
        return Err(PortalError::bad_request("API product names must not be empty"));
    }

    let desired: BTreeSet<String> = body.api_products.into_iter().collect();
    state.provider.update_app_api_products(&id, &desired).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use crate::models::OAuthApplication;
    use crate::test_utils::{TestFixture, CLIENTS_PATH, POLICY_PATH, REGISTRATION_PATH, RESOURCE_PATH};
    use http::{Method, StatusCode};
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path, query_param};
    use wiremock::{Mock, ResponseTemplate};

    async fn mount_client_once_then_gone(fixture: &TestFixture, client_id: &str) {
        Mock::given(method("GET"))
            .and(path(CLIENTS_PATH))
            .and(query_param("clientId", client_id))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([{ "id": "internal-1", "clientId": client_id }])),
            )
            .up_to_n_times(1)
            .mount(&fixture.keycloak_mock)
            .await;
        Mock::given(method("GET"))
            .and(path(CLIENTS_PATH))
            .and(query_param("clientId", client_id))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&fixture.keycloak_mock)
            .await;
    }

    #[tokio::test]
    async fn test_application_create_delete_delete() {
        let fixture = TestFixture::new().await;
        fixture
            .add_keycloak_mock(
                Method::POST,
                REGISTRATION_PATH,
                json!({
                    "id": "internal-1",
                    "clientId": "test-client",
                    "name": "test-client",
                    "secret": "generated"
                }),
                StatusCode::CREATED,
                1,
            )
            .await;
        mount_client_once_then_gone(&fixture, "test-client").await;
        fixture
            .add_keycloak_mock(
                Method::DELETE,
                format!("{CLIENTS_PATH}/internal-1"),
                json!({}),
                StatusCode::NO_CONTENT,
                1,
            )
            .await;

        let response = fixture
            .post_with_headers(
                "/applications",
                &json!({ "id": "test-client" }),
                &[("token", "caller-token")],
            )
            .await;
        response.assert_status(StatusCode::CREATED);
        let app = response.json_as::<OAuthApplication>();
        assert_eq!(app.client_name, "test-client");
        assert!(!app.client_id.is_empty());
        assert!(!app.client_secret.is_empty());

        fixture
            .delete("/applications/test-client")
            .await
            .assert_status(StatusCode::NO_CONTENT);

        let response = fixture.delete("/applications/test-client").await;
        response.assert_status(StatusCode::NOT_FOUND);
        assert_eq!(response.json["code"], 404);
        assert_eq!(response.json["message"], "Resource Not Found");
    }

    #[tokio::test]
    async fn test_create_without_identifier_is_bad_request() {
        let fixture = TestFixture::new().await;
        fixture
            .add_keycloak_mock(
                Method::POST,
                REGISTRATION_PATH,
                json!({}),
                StatusCode::CREATED,
                0,
            )
            .await;

        let response = fixture.post("/applications", &json!({ "name": "  " })).await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.json["code"], 400);

        let response = fixture.send_raw(Method::POST, "/applications", "").await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.json["message"], "Bad Request");
    }

    #[tokio::test]
    async fn test_get_application() {
        let fixture = TestFixture::new().await;
        fixture
            .add_keycloak_mock(
                Method::GET,
                CLIENTS_PATH,
                json!([{ "id": "internal-1", "clientId": "billing", "name": "Billing" }]),
                StatusCode::OK,
                1,
            )
            .await;

        let response = fixture.get("/applications/billing").await;
        response.assert_ok();
        assert_eq!(
            response.json,
            json!({ "clientId": "billing", "clientName": "Billing" })
        );
    }

    #[tokio::test]
    async fn test_update_api_products_reconciles() {
        let fixture = TestFixture::new().await;
        fixture
            .add_keycloak_mock(
                Method::GET,
                CLIENTS_PATH,
                json!([{ "id": "internal-1", "clientId": "billing" }]),
                StatusCode::OK,
                1,
            )
            .await;
        for product in ["b", "c"] {
            Mock::given(method("GET"))
                .and(path(RESOURCE_PATH))
                .and(query_param("name", product))
                .respond_with(
                    ResponseTemplate::new(200).set_body_json(json!([format!("res-{product}")])),
                )
                .mount(&fixture.keycloak_mock)
                .await;
        }
        fixture
            .add_keycloak_mock(
                Method::GET,
                POLICY_PATH,
                json!([
                    { "id": "perm-a", "name": "billing/a", "clients": ["billing"] },
                    { "id": "perm-b", "name": "billing/b", "clients": ["billing"] }
                ]),
                StatusCode::OK,
                1,
            )
            .await;
        fixture
            .add_keycloak_mock(
                Method::DELETE,
                format!("{POLICY_PATH}/perm-a"),
                json!({}),
                StatusCode::NO_CONTENT,
                1,
            )
            .await;
        Mock::given(method("POST"))
            .and(path(format!("{POLICY_PATH}/res-c")))
            .and(body_string_contains("billing/c"))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&fixture.keycloak_mock)
            .await;

        fixture
            .put(
                "/applications/billing/api-products",
                &json!({ "apiProducts": ["b", "c", "c"] }),
            )
            .await
            .assert_status(StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_update_scopes_alias() {
        let fixture = TestFixture::new().await;
        fixture
            .add_keycloak_mock(
                Method::GET,
                CLIENTS_PATH,
                json!([{ "id": "internal-1", "clientId": "billing" }]),
                StatusCode::OK,
                1,
            )
            .await;
        fixture
            .add_keycloak_mock(Method::GET, POLICY_PATH, json!([]), StatusCode::OK, 1)
            .await;

        fixture
            .put("/clients/billing/scopes", &json!({ "apiProducts": [] }))
            .await
            .assert_status(StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_update_api_products_for_unknown_application() {
        let fixture = TestFixture::new().await;
        fixture
            .add_keycloak_mock(Method::GET, CLIENTS_PATH, json!([]), StatusCode::OK, 1)
            .await;

        let response = fixture
            .put(
                "/applications/ghost/api-products",
                &json!({ "apiProducts": ["a"] }),
            )
            .await;
        response.assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_list_application_api_products() {
        let fixture = TestFixture::new().await;
        fixture
            .add_keycloak_mock(
                Method::GET,
                CLIENTS_PATH,
                json!([{ "id": "internal-1", "clientId": "billing" }]),
                StatusCode::OK,
                1,
            )
            .await;
        fixture
            .add_keycloak_mock(
                Method::GET,
                POLICY_PATH,
                json!([
                    { "id": "perm-t", "name": "billing/tracks", "clients": ["billing"] },
                    { "id": "perm-o", "name": "other/albums", "clients": ["other"] }
                ]),
                StatusCode::OK,
                1,
            )
            .await;

        let response = fixture.get("/applications/billing/api-products").await;
        response.assert_ok();
        assert_eq!(response.json, json!(["tracks"]));
    }
}
