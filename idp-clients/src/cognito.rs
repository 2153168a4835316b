//! Facade over the subset of the Cognito user-pool API used by the adapter.

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_cognitoidentityprovider::Client;
use aws_sdk_cognitoidentityprovider::config::http::HttpResponse;
use aws_sdk_cognitoidentityprovider::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_cognitoidentityprovider::types::{
    OAuthFlowType, ResourceServerScopeType, UserPoolClientType,
};
use log::debug;
use thiserror::Error;

/// Error code Cognito uses for a missing client or resource server
pub const RESOURCE_NOT_FOUND: &str = "ResourceNotFoundException";

/// Errors returned by the Cognito facade
#[derive(Debug, Error)]
pub enum CognitoError {
    #[error("Cognito request failed ({}): {message}", .code.as_deref().unwrap_or("unknown"))]
    Service {
        /// HTTP status of the raw response, absent for transport failures
        status: Option<u16>,
        /// Cognito exception name, e.g. `ResourceNotFoundException`
        code: Option<String>,
        message: String,
    },

    #[error("Invalid request: {0}")]
    InvalidInput(String),
}

impl CognitoError {
    /// Cognito signals missing objects by exception name rather than HTTP status
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Service { code: Some(code), .. } if code == RESOURCE_NOT_FOUND)
    }
}

impl<E> From<SdkError<E, HttpResponse>> for CognitoError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
{
    fn from(err: SdkError<E, HttpResponse>) -> Self {
        let status = err.raw_response().map(|r| r.status().as_u16());
        let code = err.code().map(str::to_string);
        let message = err
            .message()
            .map(str::to_string)
            .unwrap_or_else(|| DisplayErrorContext(&err).to_string());
        Self::Service {
            status,
            code,
            message,
        }
    }
}

/// A user-pool app client as seen by the adapter
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UserPoolClient {
    pub client_id: String,
    pub client_name: String,
    /// Only populated by the create call
    pub client_secret: Option<String>,
    pub allowed_scopes: Vec<String>,
}

impl From<&UserPoolClientType> for UserPoolClient {
    fn from(client: &UserPoolClientType) -> Self {
        Self {
            client_id: client.client_id().unwrap_or_default().to_string(),
            client_name: client.client_name().unwrap_or_default().to_string(),
            client_secret: client.client_secret().map(str::to_string),
            allowed_scopes: client.allowed_o_auth_scopes().to_vec(),
        }
    }
}

/// One scope on a resource server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeEntry {
    pub name: String,
    pub description: String,
}

/// Operations the Cognito adapter needs from a user pool
#[async_trait]
pub trait CognitoApi: Send + Sync {
    /// Creates an app client with a generated secret
    async fn create_user_pool_client(&self, name: &str) -> Result<UserPoolClient, CognitoError>;

    async fn describe_user_pool_client(
        &self,
        client_id: &str,
    ) -> Result<UserPoolClient, CognitoError>;

    async fn delete_user_pool_client(&self, client_id: &str) -> Result<(), CognitoError>;

    /// Replaces the client's allowed OAuth scopes with `scopes`
    async fn update_user_pool_client_scopes(
        &self,
        client_id: &str,
        scopes: Vec<String>,
    ) -> Result<(), CognitoError>;

    async fn create_resource_server(&self, identifier: &str) -> Result<(), CognitoError>;

    /// Returns the scopes of the resource server, failing with a not-found error when absent
    async fn describe_resource_server(
        &self,
        identifier: &str,
    ) -> Result<Vec<ScopeEntry>, CognitoError>;

    /// Replaces the full scope list of the resource server
    async fn update_resource_server(
        &self,
        identifier: &str,
        scopes: Vec<ScopeEntry>,
    ) -> Result<(), CognitoError>;
}

/// [`CognitoApi`] backed by the AWS SDK
#[derive(Clone, Debug)]
pub struct CognitoSdkClient {
    client: Client,
    user_pool_id: String,
}

impl CognitoSdkClient {
    pub fn new(client: Client, user_pool_id: impl Into<String>) -> Self {
        Self {
            client,
            user_pool_id: user_pool_id.into(),
        }
    }

    /// Builds a client from the standard AWS credential chain, optionally pinning the region
    pub async fn from_env(user_pool_id: impl Into<String>, region: Option<String>) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(Region::new(region));
        }
        let config = loader.load().await;
        Self::new(Client::new(&config), user_pool_id)
    }

    pub fn user_pool_id(&self) -> &str {
        &self.user_pool_id
    }
}

#[async_trait]
impl CognitoApi for CognitoSdkClient {
    async fn create_user_pool_client(&self, name: &str) -> Result<UserPoolClient, CognitoError> {
        let out = self
            .client
            .create_user_pool_client()
            .user_pool_id(&self.user_pool_id)
            .client_name(name)
            .generate_secret(true)
            .send()
            .await?;

        out.user_pool_client()
            .map(UserPoolClient::from)
            .ok_or_else(|| CognitoError::Service {
                status: None,
                code: None,
                message: "create response carried no user pool client".to_string(),
            })
    }

    async fn describe_user_pool_client(
        &self,
        client_id: &str,
    ) -> Result<UserPoolClient, CognitoError> {
        let out = self
            .client
            .describe_user_pool_client()
            .user_pool_id(&self.user_pool_id)
            .client_id(client_id)
            .send()
            .await?;

        out.user_pool_client()
            .map(UserPoolClient::from)
            .ok_or_else(|| CognitoError::Service {
                status: None,
                code: Some(RESOURCE_NOT_FOUND.to_string()),
                message: format!("user pool client {client_id} not found"),
            })
    }

    async fn delete_user_pool_client(&self, client_id: &str) -> Result<(), CognitoError> {
        self.client
            .delete_user_pool_client()
            .user_pool_id(&self.user_pool_id)
            .client_id(client_id)
            .send()
            .await?;
        Ok(())
    }

    async fn update_user_pool_client_scopes(
        &self,
        client_id: &str,
        scopes: Vec<String>,
    ) -> Result<(), CognitoError> {
        debug!(
            "Setting {} allowed scopes on user pool client {}",
            scopes.len(),
            client_id
        );
        let mut request = self
            .client
            .update_user_pool_client()
            .user_pool_id(&self.user_pool_id)
            .client_id(client_id);

        // Cognito rejects an OAuth flow without scopes, so the flow follows the scope set
        if scopes.is_empty() {
            request = request.allowed_o_auth_flows_user_pool_client(false);
        } else {
            request = request
                .allowed_o_auth_flows(OAuthFlowType::ClientCredentials)
                .allowed_o_auth_flows_user_pool_client(true);
        }

        request.set_allowed_o_auth_scopes(Some(scopes)).send().await?;
        Ok(())
    }

    async fn create_resource_server(&self, identifier: &str) -> Result<(), CognitoError> {
        self.client
            .create_resource_server()
            .user_pool_id(&self.user_pool_id)
            .identifier(identifier)
            .name(identifier)
            .send()
            .await?;
        Ok(())
    }

    async fn describe_resource_server(
        &self,
        identifier: &str,
    ) -> Result<Vec<ScopeEntry>, CognitoError> {
        let out = self
            .client
            .describe_resource_server()
            .user_pool_id(&self.user_pool_id)
            .identifier(identifier)
            .send()
            .await?;

        let scopes = out
            .resource_server()
            .map(|server| {
                server
                    .scopes()
                    .iter()
                    .map(|scope| ScopeEntry {
                        name: scope.scope_name().to_string(),
                        description: scope.scope_description().to_string(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(scopes)
    }

    async fn update_resource_server(
        &self,
        identifier: &str,
        scopes: Vec<ScopeEntry>,
    ) -> Result<(), CognitoError> {
        let scopes = scopes
            .into_iter()
            .map(|scope| {
                ResourceServerScopeType::builder()
                    .scope_name(scope.name)
                    .scope_description(scope.description)
                    .build()
                    .map_err(|e| CognitoError::InvalidInput(e.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        self.client
            .update_resource_server()
            .user_pool_id(&self.user_pool_id)
            .identifier(identifier)
            .name(identifier)
            .set_scopes(Some(scopes))
            .send()
            .await?;
        Ok(())
    }
}
