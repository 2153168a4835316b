use crate::config::{AppConfig, ProviderKind};
use crate::errors::PortalError;
use crate::models::{ApiProduct, ApplicationSummary, Deletion, OAuthApplication};
use async_trait::async_trait;
use idp_clients::cognito::CognitoSdkClient;
use idp_clients::keycloak::{KeycloakError, KeycloakRestClient, KeycloakSettings, TokenPolicy};
use idp_clients::okta::{OktaError, OktaRestClient};
use log::info;
use std::collections::BTreeSet;
use std::time::Duration;
use thiserror::Error;

pub mod cognito;
pub mod keycloak;
pub mod okta;

pub use cognito::CognitoHandler;
pub use keycloak::KeycloakHandler;
pub use okta::OktaHandler;

/// Errors that can occur while connecting to the configured provider
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Keycloak error: {0}")]
    Keycloak(#[from] KeycloakError),
    #[error("Okta error: {0}")]
    Okta(#[from] OktaError),
}

/// Capability set every identity provider adapter implements.
///
/// Each operation returns the normalized [`PortalError`] for its failure
/// paths; the HTTP layer only picks the success status.
#[async_trait]
pub trait IdpHandler: Send + Sync {
    /// Creates one OAuth application and returns its one-time credentials
    async fn create_oauth_application(
        &self,
        identifier: &str,
    ) -> Result<OAuthApplication, PortalError>;

    async fn get_oauth_application(&self, id: &str) -> Result<ApplicationSummary, PortalError>;

    async fn delete_oauth_application(&self, id: &str) -> Result<(), PortalError>;

    /// Names of the API products the application is currently granted
    async fn get_app_api_products(&self, id: &str) -> Result<Vec<String>, PortalError>;

    /// Makes the application's grants equal to `products`
    async fn update_app_api_products(
        &self,
        id: &str,
        products: &BTreeSet<String>,
    ) -> Result<(), PortalError>;

    async fn create_api_product(&self, product: &ApiProduct) -> Result<(), PortalError>;

    async fn delete_api_product(&self, name: &str) -> Result<Deletion, PortalError>;

    async fn get_api_products(&self) -> Result<Vec<ApiProduct>, PortalError>;
}

/// The adapter selected for this deployment.
///
/// Only one variant is constructed per process, chosen from
/// [`AppConfig::provider`] at startup.
pub enum Provider {
    Cognito(CognitoHandler),
    Keycloak(KeycloakHandler),
    Okta(OktaHandler),
}

impl Provider {
    pub fn kind(&self) -> ProviderKind {
        match self {
            Self::Cognito(_) => ProviderKind::Cognito,
            Self::Keycloak(_) => ProviderKind::Keycloak,
            Self::Okta(_) => ProviderKind::Okta,
        }
    }
}

#[async_trait]
impl IdpHandler for Provider {
    async fn create_oauth_application(
        &self,
        identifier: &str,
    ) -> Result<OAuthApplication, PortalError> {
        match self {
            Self::Cognito(h) => h.create_oauth_application(identifier).await,
            Self::Keycloak(h) => h.create_oauth_application(identifier).await,
            Self::Okta(h) => h.create_oauth_application(identifier).await,
        }
    }

    async fn get_oauth_application(&self, id: &str) -> Result<ApplicationSummary, PortalError> {
        match self {
            Self::Cognito(h) => h.get_oauth_application(id).await,
            Self::Keycloak(h) => h.get_oauth_application(id).await,
            Self::Okta(h) => h.get_oauth_application(id).await,
        }
    }

    async fn delete_oauth_application(&self, id: &str) -> Result<(), PortalError> {
        match self {
            Self::Cognito(h) => h.delete_oauth_application(id).await,
            Self::Keycloak(h) => h.delete_oauth_application(id).await,
            Self::Okta(h) => h.delete_oauth_application(id).await,
        }
    }

    async fn get_app_api_products(&self, id: &str) -> Result<Vec<String>, PortalError> {
        match self {
            Self::Cognito(h) => h.get_app_api_products(id).await,
            Self::Keycloak(h) => h.get_app_api_products(id).await,
            Self::Okta(h) => h.get_app_api_products(id).await,
        }
    }

    async fn update_app_api_products(
        &self,
        id: &str,
        products: &BTreeSet<String>,
    ) -> Result<(), PortalError> {
        match self {
            Self::Cognito(h) => h.update_app_api_products(id, products).await,
            Self::Keycloak(h) => h.update_app_api_products(id, products).await,
            Self::Okta(h) => h.update_app_api_products(id, products).await,
        }
    }

    async fn create_api_product(&self, product: &ApiProduct) -> Result<(), PortalError> {
        match self {
            Self::Cognito(h) => h.create_api_product(product).await,
            Self::Keycloak(h) => h.create_api_product(product).await,
            Self::Okta(h) => h.create_api_product(product).await,
        }
    }

    async fn delete_api_product(&self, name: &str) -> Result<Deletion, PortalError> {
        match self {
            Self::Cognito(h) => h.delete_api_product(name).await,
            Self::Keycloak(h) => h.delete_api_product(name).await,
            Self::Okta(h) => h.delete_api_product(name).await,
        }
    }

    async fn get_api_products(&self) -> Result<Vec<ApiProduct>, PortalError> {
        match self {
            Self::Cognito(h) => h.get_api_products().await,
            Self::Keycloak(h) => h.get_api_products().await,
            Self::Okta(h) => h.get_api_products().await,
        }
    }
}

/// Builds the adapter named by the configuration.
///
/// Keycloak resolves its endpoints here, so a realm without the required
/// discovery documents fails startup rather than the first request.
pub async fn create_provider(config: &AppConfig) -> Result<Provider, ProviderError> {
    let timeout = Duration::from_secs(config.client_timeout);
    let resource_server = config.resource_server.clone();

    let provider = match config.provider {
        ProviderKind::Cognito => {
            let user_pool_id = required(&config.cognito.user_pool_id, "cognito user pool id")?;
            let client =
                CognitoSdkClient::from_env(user_pool_id, config.cognito.region.clone()).await;
            Provider::Cognito(CognitoHandler::new(client, resource_server))
        }
        ProviderKind::Keycloak => {
            let http = reqwest::Client::builder()
                .timeout(timeout)
                .connect_timeout(Duration::from_secs(2))
                .build()?;
            let settings = KeycloakSettings {
                issuer: required(&config.keycloak.issuer, "keycloak issuer")?,
                client_id: required(&config.keycloak.mgmt_client_id, "keycloak client id")?,
                client_secret: required(
                    &config.keycloak.mgmt_client_secret,
                    "keycloak client secret",
                )?,
                token_policy: TokenPolicy {
                    max_age: Duration::from_secs(config.keycloak.token_max_age),
                },
                page_size: config.keycloak.page_size,
            };
            let client = KeycloakRestClient::connect(http, settings).await?;
            Provider::Keycloak(KeycloakHandler::new(client))
        }
        ProviderKind::Okta => {
            let builder = reqwest::Client::builder()
                .timeout(timeout)
                .connect_timeout(Duration::from_secs(2));
            let client = OktaRestClient::new(
                &required(&config.okta.domain, "okta domain")?,
                &required(&config.okta.api_token, "okta api token")?,
                builder,
            )?;
            Provider::Okta(OktaHandler::new(client, resource_server))
        }
    };

    info!("Using {} identity provider", provider.kind());
    Ok(provider)
}

fn required(value: &Option<String>, name: &str) -> Result<String, ProviderError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ProviderError::Config(format!("{name} is not configured")))
}
