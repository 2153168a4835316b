use super::discovery::{admin_root, DiscoveredEndpoints};
use super::token::{TokenCache, TokenPolicy};
use super::KeycloakError;
use async_trait::async_trait;
use log::{debug, warn};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Grant used to obtain a management token from the realm's token endpoint
const UMA_TICKET_GRANT: &str = "urn:ietf:params:oauth:grant-type:uma-ticket";

/// Connection settings for a Keycloak realm
#[derive(Clone)]
pub struct KeycloakSettings {
    /// Realm issuer, e.g. `https://kc.example.com/realms/acme`
    pub issuer: String,
    pub client_id: String,
    pub client_secret: String,
    pub token_policy: TokenPolicy,
    /// Page size for paginated list calls
    pub page_size: usize,
}

impl std::fmt::Debug for KeycloakSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeycloakSettings")
            .field("issuer", &self.issuer)
            .field("client_id", &self.client_id)
            .field("token_policy", &self.token_policy)
            .field("page_size", &self.page_size)
            .finish_non_exhaustive()
    }
}

/// Client returned by the client registration endpoint
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RegisteredClient {
    pub id: String,
    pub client_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub secret: Option<String>,
}

/// Client as listed by the admin API
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ClientRepresentation {
    /// Keycloak's internal id, used in admin URLs
    pub id: String,
    pub client_id: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Protected resource registered through the UMA protection API
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResourceRepresentation {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(
        rename = "displayName",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub display_name: Option<String>,
    #[serde(rename = "ownerManagedAccess", default)]
    pub owner_managed_access: bool,
}

/// UMA permission ticket policy tying clients to a resource
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct UmaPermission {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub clients: Vec<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct NewUmaPermission {
    pub name: String,
    pub description: String,
    pub clients: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    error: Option<String>,
    error_description: Option<String>,
    #[serde(rename = "errorMessage")]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Operations the Keycloak adapter needs from a realm
#[async_trait]
pub trait KeycloakApi: Send + Sync {
    /// Registers a confidential client through the client registration endpoint
    async fn register_client(
        &self,
        client_id: &str,
        name: &str,
    ) -> Result<RegisteredClient, KeycloakError>;

    /// Exact lookup of clients by their `clientId`
    async fn find_clients(&self, client_id: &str)
    -> Result<Vec<ClientRepresentation>, KeycloakError>;

    async fn delete_client(&self, internal_id: &str) -> Result<(), KeycloakError>;

    /// Ids of resources whose name matches exactly
    async fn find_resource_ids(&self, name: &str) -> Result<Vec<String>, KeycloakError>;

    /// Every resource of the resource server, fetched one by one
    async fn list_resources(&self) -> Result<Vec<ResourceRepresentation>, KeycloakError>;

    async fn create_resource(
        &self,
        name: &str,
        display_name: Option<&str>,
    ) -> Result<ResourceRepresentation, KeycloakError>;

    async fn delete_resource(&self, resource_id: &str) -> Result<(), KeycloakError>;

    /// Every UMA permission of the resource server, across all clients
    async fn list_permissions(&self) -> Result<Vec<UmaPermission>, KeycloakError>;

    async fn create_permission(
        &self,
        resource_id: &str,
        permission: &NewUmaPermission,
    ) -> Result<(), KeycloakError>;

    async fn delete_permission(&self, permission_id: &str) -> Result<(), KeycloakError>;
}

/// [`KeycloakApi`] over Keycloak's REST endpoints.
///
/// Every outbound call carries a bearer management token taken from the
/// [`TokenCache`], fetched with the client credentials when stale.
pub struct KeycloakRestClient {
    http: Client,
    settings: KeycloakSettings,
    endpoints: DiscoveredEndpoints,
    admin_root: String,
    tokens: TokenCache,
}

impl std::fmt::Debug for KeycloakRestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeycloakRestClient")
            .field("settings", &self.settings)
            .field("endpoints", &self.endpoints)
            .field("admin_root", &self.admin_root)
            .finish_non_exhaustive()
    }
}

impl KeycloakRestClient {
    /// Resolves the realm's endpoints and builds a client. Fails if discovery fails.
    pub async fn connect(http: Client, settings: KeycloakSettings) -> Result<Self, KeycloakError> {
        let endpoints = DiscoveredEndpoints::discover(&http, &settings.issuer).await?;
        Self::new(http, settings, endpoints)
    }

    pub fn new(
        http: Client,
        settings: KeycloakSettings,
        endpoints: DiscoveredEndpoints,
    ) -> Result<Self, KeycloakError> {
        let admin_root = admin_root(&settings.issuer)?;
        let tokens = TokenCache::new(settings.token_policy);
        Ok(Self {
            http,
            settings,
            endpoints,
            admin_root,
            tokens,
        })
    }

    pub fn endpoints(&self) -> &DiscoveredEndpoints {
        &self.endpoints
    }

    pub fn token_cache(&self) -> &TokenCache {
        &self.tokens
    }

    fn issuer(&self) -> &str {
        self.settings.issuer.trim_end_matches('/')
    }

    /// Returns the cached management token, fetching a new one when it is absent or stale
    async fn management_token(&self) -> Result<String, KeycloakError> {
        if let Some(token) = self.tokens.fresh_token() {
            return Ok(token);
        }

        debug!("Fetching Keycloak management token");
        let response = self
            .http
            .post(&self.endpoints.token)
            .basic_auth(&self.settings.client_id, Some(&self.settings.client_secret))
            .form(&[
                ("grant_type", UMA_TICKET_GRANT),
                ("audience", self.settings.client_id.as_str()),
            ])
            .send()
            .await
            .map_err(|e| KeycloakError::Token {
                status: e.status().map(|s| s.as_u16()),
                message: e.to_string(),
            })?;

        let response = match check_status(response).await {
            Ok(response) => response,
            Err(KeycloakError::Api {
                status,
                error,
                description,
            }) => {
                warn!("Keycloak token endpoint rejected management credentials: {error}");
                return Err(KeycloakError::Token {
                    status: Some(status),
                    message: description.unwrap_or(error),
                });
            }
            Err(e) => return Err(e),
        };

        let body: TokenResponse = response.json().await.map_err(|e| KeycloakError::Token {
            status: None,
            message: format!("invalid token response: {e}"),
        })?;
        self.tokens.store(body.access_token.clone());
        Ok(body.access_token)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, KeycloakError> {
        let token = self.management_token().await?;
        let response = request.bearer_auth(token).send().await?;
        check_status(response).await
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, KeycloakError> {
        let response = self.send(request).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| KeycloakError::Deserialization(e.to_string()))
    }

    /// Walks a `first`/`max` paginated list until a short page is returned
    async fn get_paged<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<Vec<T>, KeycloakError> {
        let page_size = self.settings.page_size.max(1);
        let mut items = Vec::new();
        let mut first = 0usize;
        loop {
            let request = self
                .http
                .get(url)
                .query(query)
                .query(&[("first", first), ("max", page_size)]);
            let page: Vec<T> = self.send_json(request).await?;
            let fetched = page.len();
            items.extend(page);
            if fetched < page_size {
                break;
            }
            first += fetched;
        }
        Ok(items)
    }
}

/// Converts a non-success response into [`KeycloakError::Api`]
async fn check_status(response: Response) -> Result<Response, KeycloakError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let parsed: ErrorBody = serde_json::from_str(&body).unwrap_or_default();
    let error = parsed
        .error
        .or(parsed.error_message)
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("error").to_string());
    Err(KeycloakError::Api {
        status: status.as_u16(),
        error,
        description: parsed.error_description,
    })
}

#[async_trait]
impl KeycloakApi for KeycloakRestClient {
    async fn register_client(
        &self,
        client_id: &str,
        name: &str,
    ) -> Result<RegisteredClient, KeycloakError> {
        let url = format!("{}/clients-registrations/default", self.issuer());
        let body = serde_json::json!({ "clientId": client_id, "name": name });
        self.send_json(self.http.post(url).json(&body)).await
    }

    async fn find_clients(
        &self,
        client_id: &str,
    ) -> Result<Vec<ClientRepresentation>, KeycloakError> {
        let url = format!("{}/clients", self.admin_root);
        let request = self
            .http
            .get(url)
            .query(&[("clientId", client_id), ("search", "false")]);
        self.send_json(request).await
    }

    async fn delete_client(&self, internal_id: &str) -> Result<(), KeycloakError> {
        let url = format!("{}/clients/{}", self.admin_root, internal_id);
        self.send(self.http.delete(url)).await?;
        Ok(())
    }

    async fn find_resource_ids(&self, name: &str) -> Result<Vec<String>, KeycloakError> {
        self.get_paged(
            &self.endpoints.resource_registration,
            &[("name", name), ("exactName", "true")],
        )
        .await
    }

    async fn list_resources(&self) -> Result<Vec<ResourceRepresentation>, KeycloakError> {
        let ids: Vec<String> = self
            .get_paged(&self.endpoints.resource_registration, &[])
            .await?;

        let mut resources = Vec::with_capacity(ids.len());
        for id in ids {
            let url = format!("{}/{}", self.endpoints.resource_registration, id);
            resources.push(self.send_json(self.http.get(url)).await?);
        }
        Ok(resources)
    }

    async fn create_resource(
        &self,
        name: &str,
        display_name: Option<&str>,
    ) -> Result<ResourceRepresentation, KeycloakError> {
        let resource = ResourceRepresentation {
            id: None,
            name: name.to_string(),
            display_name: display_name.map(str::to_string),
            owner_managed_access: true,
        };
        let request = self
            .http
            .post(&self.endpoints.resource_registration)
            .json(&resource);
        self.send_json(request).await
    }

    async fn delete_resource(&self, resource_id: &str) -> Result<(), KeycloakError> {
        let url = format!("{}/{}", self.endpoints.resource_registration, resource_id);
        self.send(self.http.delete(url)).await?;
        Ok(())
    }

    async fn list_permissions(&self) -> Result<Vec<UmaPermission>, KeycloakError> {
        self.get_paged(&self.endpoints.policy, &[]).await
    }

    async fn create_permission(
        &self,
        resource_id: &str,
        permission: &NewUmaPermission,
    ) -> Result<(), KeycloakError> {
        let url = format!("{}/{}", self.endpoints.policy, resource_id);
        self.send(self.http.post(url).json(permission)).await?;
        Ok(())
    }

    async fn delete_permission(&self, permission_id: &str) -> Result<(), KeycloakError> {
        let url = format!("{}/{}", self.endpoints.policy, permission_id);
        self.send(self.http.delete(url)).await?;
        Ok(())
    }
}
