use crate::config::AppConfig;
use crate::create_app;
use crate::state::AppState;
use axum::body::Body;
use axum::Router;
use http::{Method, Request, StatusCode};
use http_body_util::BodyExt;
use log::LevelFilter;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers;
use wiremock::Mock;
use wiremock::MockServer;
use wiremock::ResponseTemplate;

pub const TOKEN_PATH: &str = "/realms/test/protocol/openid-connect/token";
pub const REGISTRATION_PATH: &str = "/realms/test/clients-registrations/default";
pub const CLIENTS_PATH: &str = "/admin/realms/test/clients";
pub const RESOURCE_PATH: &str = "/realms/test/authz/protection/resource_set";
pub const POLICY_PATH: &str = "/realms/test/authz/protection/uma-policy";

/// Test fixture running the full router against a mocked Keycloak realm.
///
/// The realm's discovery documents and token endpoint are mounted up front,
/// so tests only mock the management calls they exercise.
///
/// # Examples
///
/// ```rust
/// #[tokio::test]
/// async fn test_endpoint() {
///     let fixture = TestFixture::new().await;
///     fixture
///         .add_keycloak_mock(Method::GET, CLIENTS_PATH, json!([]), StatusCode::OK, 1)
///         .await;
///
///     let response = fixture.delete("/applications/ghost").await;
///     response.assert_status(StatusCode::NOT_FOUND);
/// }
/// ```
pub struct TestFixture {
    /// The application router
    pub app: Router,
    pub config: AppConfig,
    /// Mock server standing in for the Keycloak realm
    pub keycloak_mock: MockServer,
}

impl TestFixture {
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Creates a fixture whose configuration is adjusted by `configure` before startup
    pub async fn with_config(configure: impl FnOnce(&mut AppConfig)) -> Self {
        Self::setup_logger(LevelFilter::Debug);

        let keycloak_mock = MockServer::start().await;
        mount_realm(&keycloak_mock).await;

        let mut config = AppConfig::for_test_with_keycloak(&keycloak_mock);
        configure(&mut config);

        let state = AppState::new(config.clone())
            .await
            .expect("Failed to connect to mocked Keycloak");
        let app = create_app(state);

        Self {
            app,
            config,
            keycloak_mock,
        }
    }

    /// Initializes the test logger, ignoring repeated initialization
    pub fn setup_logger(level: LevelFilter) {
        let _ = env_logger::builder()
            .filter_level(level)
            .is_test(true)
            .try_init();
    }

    /// Creates a request builder with a JSON content type
    pub fn request_builder(&self, method: Method, uri: impl AsRef<str>) -> http::request::Builder {
        Request::builder()
            .method(method)
            .uri(uri.as_ref())
            .header("Content-Type", "application/json")
    }

    pub async fn get(&self, uri: impl AsRef<str>) -> TestResponse {
        let request = self
            .request_builder(Method::GET, uri)
            .body(Body::empty())
            .expect("Failed to build request");

        self.send(request).await
    }

    pub async fn delete(&self, uri: impl AsRef<str>) -> TestResponse {
        let request = self
            .request_builder(Method::DELETE, uri)
            .body(Body::empty())
            .expect("Failed to build request");

        self.send(request).await
    }

    pub async fn post<T: Serialize>(&self, uri: impl AsRef<str>, body: &T) -> TestResponse {
        self.post_with_headers(uri, body, &[]).await
    }

    pub async fn put<T: Serialize>(&self, uri: impl AsRef<str>, body: &T) -> TestResponse {
        let json_body = serde_json::to_vec(body).expect("Failed to serialize body to JSON");
        let request = self
            .request_builder(Method::PUT, uri)
            .body(Body::from(json_body))
            .expect("Failed to build request");

        self.send(request).await
    }

    /// Sends a POST request with a JSON body and additional headers
    pub async fn post_with_headers<T: Serialize>(
        &self,
        uri: impl AsRef<str>,
        body: &T,
        headers: &[(&str, &str)],
    ) -> TestResponse {
        let json_body = serde_json::to_vec(body).expect("Failed to serialize body to JSON");
        let mut builder = self.request_builder(Method::POST, uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }

        let request = builder
            .body(Body::from(json_body))
            .expect("Failed to build request");

        self.send(request).await
    }

    /// Sends `body` as-is, for requests that are not valid JSON
    pub async fn send_raw(
        &self,
        method: Method,
        uri: impl AsRef<str>,
        body: &'static str,
    ) -> TestResponse {
        let request = self
            .request_builder(method, uri)
            .body(Body::from(body))
            .expect("Failed to build request");

        self.send(request).await
    }

    /// Sends a request through the router and collects the response
    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .app
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body = response
            .into_body()
            .collect()
            .await
            .expect("Failed to read response body")
            .to_bytes();

        // Empty or non-JSON bodies read as an empty object
        let json = if !body.is_empty() {
            serde_json::from_slice(&body).unwrap_or_else(|_| json!({}))
        } else {
            json!({})
        };

        TestResponse { status, json }
    }

    /// Adds a mocked Keycloak route answering with `response_body` and `status_code`.
    ///
    /// 204 responses are sent without a body.
    pub async fn add_keycloak_mock(
        &self,
        method: Method,
        path: impl Into<String>,
        response_body: impl Serialize,
        status_code: StatusCode,
        expected_calls: u64,
    ) {
        let mut template = ResponseTemplate::new(status_code.as_u16());
        if status_code != StatusCode::NO_CONTENT {
            template = template.set_body_json(response_body);
        }

        Mock::given(matchers::method(method.as_str()))
            .and(matchers::path(path.into()))
            .respond_with(template)
            .expect(expected_calls)
            .mount(&self.keycloak_mock)
            .await;
    }
}

/// Mounts the discovery documents and token endpoint of the `test` realm
async fn mount_realm(server: &MockServer) {
    let uri = server.uri();
    Mock::given(matchers::method("GET"))
        .and(matchers::path(
            "/realms/test/.well-known/openid-configuration",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "issuer": format!("{uri}/realms/test"),
            "token_endpoint": format!("{uri}{TOKEN_PATH}"),
        })))
        .mount(server)
        .await;
    Mock::given(matchers::method("GET"))
        .and(matchers::path("/realms/test/.well-known/uma2-configuration"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "resource_registration_endpoint": format!("{uri}{RESOURCE_PATH}"),
            "policy_endpoint": format!("{uri}{POLICY_PATH}"),
        })))
        .mount(server)
        .await;
    Mock::given(matchers::method("POST"))
        .and(matchers::path(TOKEN_PATH))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "access_token": "mgmt-token" })),
        )
        .mount(server)
        .await;
}

/// Response from a test request with its status and JSON body
pub struct TestResponse {
    pub status: StatusCode,
    /// Response body as JSON (empty object when absent or not JSON)
    pub json: Value,
}

impl TestResponse {
    /// Asserts the status code, printing the body on mismatch
    pub fn assert_status(&self, expected: StatusCode) -> &Self {
        assert_eq!(
            self.status,
            expected,
            "Expected status {} but got {} with body: {}",
            expected,
            self.status,
            serde_json::to_string_pretty(&self.json).unwrap_or_default()
        );
        self
    }

    pub fn assert_ok(&self) -> &Self {
        self.assert_status(StatusCode::OK)
    }

    /// Deserializes the response body, panicking on failure
    pub fn json_as<T: DeserializeOwned>(&self) -> T {
        serde_json::from_value(self.json.clone()).expect("Failed to deserialize response JSON")
    }
}
