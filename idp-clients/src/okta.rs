//! Okta management facade: OIDC applications and custom authorization servers.

use async_trait::async_trait;
use log::debug;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, LINK};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use url::Url;

/// Name of the single rule kept on each client's access policy
pub const API_PRODUCTS_RULE: &str = "api-products";

/// Errors returned by the Okta facade
#[derive(Debug, Error)]
pub enum OktaError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Okta returned {status} ({code}): {summary}")]
    Api {
        status: u16,
        code: String,
        summary: String,
    },

    #[error("Failed to deserialize response: {0}")]
    Deserialization(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl OktaError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            Self::Deserialization(_) | Self::Config(_) => None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    error_code: Option<String>,
    error_summary: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct OktaApplication {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub name: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(rename = "signOnMode")]
    pub sign_on_mode: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<OktaCredentials>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct OktaCredentials {
    #[serde(rename = "oauthClient", default, skip_serializing_if = "Option::is_none")]
    pub oauth_client: Option<OktaOAuthClient>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct OktaOAuthClient {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_endpoint_auth_method: Option<String>,
}

impl OktaApplication {
    pub fn client_id(&self) -> Option<&str> {
        self.credentials
            .as_ref()
            .and_then(|c| c.oauth_client.as_ref())
            .and_then(|c| c.client_id.as_deref())
    }

    pub fn client_secret(&self) -> Option<&str> {
        self.credentials
            .as_ref()
            .and_then(|c| c.oauth_client.as_ref())
            .and_then(|c| c.client_secret.as_deref())
    }

    /// Whether `identifier` names this application by label, Okta id or OAuth client id
    pub fn matches(&self, identifier: &str) -> bool {
        self.label == identifier || self.id == identifier || self.client_id() == Some(identifier)
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct AuthorizationServer {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct OktaScope {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Built-in OIDC scopes (`openid`, `profile`, ...) that every server carries
    #[serde(default)]
    pub system: bool,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct AccessPolicy {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct PolicyRule {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub conditions: RuleConditions,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct RuleConditions {
    #[serde(default)]
    pub scopes: Option<IncludeList>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct IncludeList {
    #[serde(default)]
    pub include: Vec<String>,
}

impl PolicyRule {
    pub fn scopes(&self) -> &[String] {
        self.conditions
            .scopes
            .as_ref()
            .map(|s| s.include.as_slice())
            .unwrap_or_default()
    }
}

/// Operations the Okta adapter needs from an Okta org
#[async_trait]
pub trait OktaApi: Send + Sync {
    /// Creates an OIDC service application labelled `label`
    async fn create_application(&self, label: &str) -> Result<OktaApplication, OktaError>;

    async fn list_applications(&self) -> Result<Vec<OktaApplication>, OktaError>;

    async fn deactivate_application(&self, app_id: &str) -> Result<(), OktaError>;

    async fn delete_application(&self, app_id: &str) -> Result<(), OktaError>;

    /// Authorization server whose name matches exactly, if any
    async fn find_authorization_server(
        &self,
        name: &str,
    ) -> Result<Option<AuthorizationServer>, OktaError>;

    async fn create_authorization_server(
        &self,
        name: &str,
    ) -> Result<AuthorizationServer, OktaError>;

    async fn list_scopes(&self, server_id: &str) -> Result<Vec<OktaScope>, OktaError>;

    async fn create_scope(
        &self,
        server_id: &str,
        name: &str,
        description: Option<&str>,
    ) -> Result<OktaScope, OktaError>;

    async fn delete_scope(&self, server_id: &str, scope_id: &str) -> Result<(), OktaError>;

    /// Access policy dedicated to `client_id`, if one exists
    async fn find_client_policy(
        &self,
        server_id: &str,
        client_id: &str,
    ) -> Result<Option<AccessPolicy>, OktaError>;

    async fn create_client_policy(
        &self,
        server_id: &str,
        client_id: &str,
    ) -> Result<AccessPolicy, OktaError>;

    async fn list_policy_rules(
        &self,
        server_id: &str,
        policy_id: &str,
    ) -> Result<Vec<PolicyRule>, OktaError>;

    async fn create_policy_rule(
        &self,
        server_id: &str,
        policy_id: &str,
        scopes: &[String],
    ) -> Result<PolicyRule, OktaError>;

    async fn update_policy_rule(
        &self,
        server_id: &str,
        policy_id: &str,
        rule_id: &str,
        scopes: &[String],
    ) -> Result<(), OktaError>;

    async fn delete_policy_rule(
        &self,
        server_id: &str,
        policy_id: &str,
        rule_id: &str,
    ) -> Result<(), OktaError>;
}

/// [`OktaApi`] over the Okta management REST API, authenticated with an SSWS token
#[derive(Clone)]
pub struct OktaRestClient {
    http: Client,
    base_url: String,
}

impl std::fmt::Debug for OktaRestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OktaRestClient")
            .field("base_url", &self.base_url)
            // Skip the client, its default headers carry the API token
            .finish_non_exhaustive()
    }
}

impl OktaRestClient {
    /// Builds a client for `domain` (e.g. `https://dev-123456.okta.com`)
    pub fn new(
        domain: &str,
        api_token: &str,
        builder: reqwest::ClientBuilder,
    ) -> Result<Self, OktaError> {
        let mut auth = HeaderValue::from_str(&format!("SSWS {api_token}"))
            .map_err(|_| OktaError::Config("API token is not a valid header value".to_string()))?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let base = Url::parse(domain)
            .map_err(|e| OktaError::Config(format!("invalid Okta domain {domain}: {e}")))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(OktaError::Config(format!(
                "Okta domain {domain} must be an http(s) URL"
            )));
        }

        let http = builder.default_headers(headers).build()?;
        Ok(Self {
            http,
            base_url: base.as_str().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn servers_url(&self, server_id: &str) -> String {
        self.url(&format!("/api/v1/authorizationServers/{server_id}"))
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, OktaError> {
        let response = request.send().await?;
        check_status(response).await
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, OktaError> {
        let response = self.send(request).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| OktaError::Deserialization(e.to_string()))
    }

    /// Follows `Link: <...>; rel="next"` headers until the last page
    async fn get_paged<T: DeserializeOwned>(
        &self,
        url: String,
        query: &[(&str, &str)],
    ) -> Result<Vec<T>, OktaError> {
        let mut items = Vec::new();
        let mut request = self.http.get(url).query(query);
        loop {
            let response = self.send(request).await?;
            let next = next_link(response.headers());
            let page: Vec<T> = response
                .json()
                .await
                .map_err(|e| OktaError::Deserialization(e.to_string()))?;
            items.extend(page);
            match next {
                Some(next) => {
                    debug!("Following Okta pagination link {}", next);
                    request = self.http.get(next);
                }
                None => break,
            }
        }
        Ok(items)
    }
}

async fn check_status(response: Response) -> Result<Response, OktaError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let parsed: ErrorBody = serde_json::from_str(&body).unwrap_or_default();
    Err(OktaError::Api {
        status: status.as_u16(),
        code: parsed.error_code.unwrap_or_else(|| "unknown".to_string()),
        summary: parsed
            .error_summary
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("error").to_string()),
    })
}

/// Extracts the `rel="next"` target from Okta's Link headers
pub fn next_link(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(LINK)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .find(|link| link.contains("rel=\"next\""))
        .and_then(|link| {
            let start = link.find('<')? + 1;
            let end = link.find('>')?;
            (start < end).then(|| link[start..end].to_string())
        })
}

fn scope_rule_body(scopes: &[String]) -> serde_json::Value {
    json!({
        "type": "RESOURCE_ACCESS",
        "name": API_PRODUCTS_RULE,
        "priority": 1,
        "conditions": {
            "grantTypes": { "include": ["client_credentials"] },
            "people": { "groups": { "include": ["EVERYONE"] } },
            "scopes": { "include": scopes },
        },
        "actions": {
            "token": {
                "accessTokenLifetimeMinutes": 60,
                "refreshTokenLifetimeMinutes": 0,
                "refreshTokenWindowMinutes": 10080,
            }
        },
    })
}

#[async_trait]
impl OktaApi for OktaRestClient {
    async fn create_application(&self, label: &str) -> Result<OktaApplication, OktaError> {
        let body = json!({
            "name": "oidc_client",
            "label": label,
            "signOnMode": "OPENID_CONNECT",
            "credentials": {
                "oauthClient": { "token_endpoint_auth_method": "client_secret_basic" }
            },
            "settings": {
                "oauthClient": {
                    "grant_types": ["client_credentials"],
                    "application_type": "service",
                    "consent_method": "TRUSTED",
                    "issuer_mode": "ORG_URL",
                }
            },
        });
        self.send_json(self.http.post(self.url("/api/v1/apps")).json(&body))
            .await
    }

    async fn list_applications(&self) -> Result<Vec<OktaApplication>, OktaError> {
        self.get_paged(self.url("/api/v1/apps"), &[("limit", "200")])
            .await
    }

    async fn deactivate_application(&self, app_id: &str) -> Result<(), OktaError> {
        let url = self.url(&format!("/api/v1/apps/{app_id}/lifecycle/deactivate"));
        self.send(self.http.post(url)).await?;
        Ok(())
    }

    async fn delete_application(&self, app_id: &str) -> Result<(), OktaError> {
        let url = self.url(&format!("/api/v1/apps/{app_id}"));
        self.send(self.http.delete(url)).await?;
        Ok(())
    }

    async fn find_authorization_server(
        &self,
        name: &str,
    ) -> Result<Option<AuthorizationServer>, OktaError> {
        let servers: Vec<AuthorizationServer> = self
            .get_paged(self.url("/api/v1/authorizationServers"), &[("q", name)])
            .await?;
        Ok(servers.into_iter().find(|server| server.name == name))
    }

    async fn create_authorization_server(
        &self,
        name: &str,
    ) -> Result<AuthorizationServer, OktaError> {
        let body = json!({
            "name": name,
            "description": format!("API products registry {name}"),
            "audiences": [format!("api://{name}")],
        });
        let request = self
            .http
            .post(self.url("/api/v1/authorizationServers"))
            .json(&body);
        self.send_json(request).await
    }

    async fn list_scopes(&self, server_id: &str) -> Result<Vec<OktaScope>, OktaError> {
        self.get_paged(format!("{}/scopes", self.servers_url(server_id)), &[])
            .await
    }

    async fn create_scope(
        &self,
        server_id: &str,
        name: &str,
        description: Option<&str>,
    ) -> Result<OktaScope, OktaError> {
        let mut body = json!({ "name": name, "metadataPublish": "NO_CLIENTS" });
        if let Some(description) = description {
            body["description"] = json!(description);
        }
        let url = format!("{}/scopes", self.servers_url(server_id));
        self.send_json(self.http.post(url).json(&body)).await
    }

    async fn delete_scope(&self, server_id: &str, scope_id: &str) -> Result<(), OktaError> {
        let url = format!("{}/scopes/{scope_id}", self.servers_url(server_id));
        self.send(self.http.delete(url)).await?;
        Ok(())
    }

    async fn find_client_policy(
        &self,
        server_id: &str,
        client_id: &str,
    ) -> Result<Option<AccessPolicy>, OktaError> {
        let url = format!("{}/policies", self.servers_url(server_id));
        let policies: Vec<AccessPolicy> = self.send_json(self.http.get(url)).await?;
        Ok(policies.into_iter().find(|policy| policy.name == client_id))
    }

    async fn create_client_policy(
        &self,
        server_id: &str,
        client_id: &str,
    ) -> Result<AccessPolicy, OktaError> {
        let body = json!({
            "type": "OAUTH_AUTHORIZATION_POLICY",
            "status": "ACTIVE",
            "name": client_id,
            "description": format!("API products granted to client {client_id}"),
            "priority": 1,
            "conditions": { "clients": { "include": [client_id] } },
        });
        let url = format!("{}/policies", self.servers_url(server_id));
        self.send_json(self.http.post(url).json(&body)).await
    }

    async fn list_policy_rules(
        &self,
        server_id: &str,
        policy_id: &str,
    ) -> Result<Vec<PolicyRule>, OktaError> {
        let url = format!("{}/policies/{policy_id}/rules", self.servers_url(server_id));
        self.send_json(self.http.get(url)).await
    }

    async fn create_policy_rule(
        &self,
        server_id: &str,
        policy_id: &str,
        scopes: &[String],
    ) -> Result<PolicyRule, OktaError> {
        let url = format!("{}/policies/{policy_id}/rules", self.servers_url(server_id));
        let request = self.http.post(url).json(&scope_rule_body(scopes));
        self.send_json(request).await
    }

    async fn update_policy_rule(
        &self,
        server_id: &str,
        policy_id: &str,
        rule_id: &str,
        scopes: &[String],
    ) -> Result<(), OktaError> {
        let url = format!(
            "{}/policies/{policy_id}/rules/{rule_id}",
            self.servers_url(server_id)
        );
        self.send(self.http.put(url).json(&scope_rule_body(scopes)))
            .await?;
        Ok(())
    }

    async fn delete_policy_rule(
        &self,
        server_id: &str,
        policy_id: &str,
        rule_id: &str,
    ) -> Result<(), OktaError> {
        let url = format!(
            "{}/policies/{policy_id}/rules/{rule_id}",
            self.servers_url(server_id)
        );
        self.send(self.http.delete(url)).await?;
        Ok(())
    }
}
