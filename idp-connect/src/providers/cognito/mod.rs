//! Cognito adapter: app clients are applications, resource server scopes are API products.

mod errors;

pub use errors::classify_cognito_error;

use crate::errors::{PortalError, ProviderErrorKind};
use crate::models::{ApiProduct, ApplicationSummary, Deletion, OAuthApplication};
use crate::providers::IdpHandler;
use async_trait::async_trait;
use idp_clients::cognito::{CognitoApi, CognitoError, CognitoSdkClient, ScopeEntry};
use log::{debug, error, info};
use std::collections::BTreeSet;
use ProviderErrorKind::{BadRequest, NotFound};

pub struct CognitoHandler<C = CognitoSdkClient> {
    client: C,
    resource_server: String,
}

impl<C: CognitoApi> CognitoHandler<C> {
    pub fn new(client: C, resource_server: impl Into<String>) -> Self {
        Self {
            client,
            resource_server: resource_server.into(),
        }
    }

    /// Scope string Cognito expects on an app client for `product`
    fn scope_for(&self, product: &str) -> String {
        format!("{}/{}", self.resource_server, product)
    }

    /// Current scopes of the resource server, `None` when it does not exist yet
    async fn registry_scopes(&self) -> Result<Option<Vec<ScopeEntry>>, PortalError> {
        match self
            .client
            .describe_resource_server(&self.resource_server)
            .await
        {
            Ok(scopes) => Ok(Some(scopes)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(fail("describe resource server", &e, &[])),
        }
    }
}

fn fail(action: &str, err: &CognitoError, allowed: &[ProviderErrorKind]) -> PortalError {
    let portal = classify_cognito_error(err).into_portal_error(allowed);
    if portal.code >= 500 {
        error!("Cognito {} failed: {}", action, err);
    } else {
        debug!("Cognito {} rejected: {}", action, err);
    }
    portal
}

#[async_trait]
impl<C: CognitoApi> IdpHandler for CognitoHandler<C> {
    async fn create_oauth_application(
        &self,
        identifier: &str,
    ) -> Result<OAuthApplication, PortalError> {
        let client = self
            .client
            .create_user_pool_client(identifier)
            .await
            .map_err(|e| fail("create user pool client", &e, &[BadRequest]))?;

        let client_secret = client.client_secret.ok_or_else(|| {
            PortalError::internal("Cognito did not return a client secret")
        })?;
        info!("Created Cognito app client {}", client.client_id);
        Ok(OAuthApplication {
            client_id: client.client_id,
            client_secret,
            client_name: identifier.to_string(),
        })
    }

    async fn get_oauth_application(&self, id: &str) -> Result<ApplicationSummary, PortalError> {
        let client = self
            .client
            .describe_user_pool_client(id)
            .await
            .map_err(|e| fail("describe user pool client", &e, &[NotFound]))?;
        Ok(ApplicationSummary {
            client_id: id.to_string(),
            client_name: client.client_name,
        })
    }

    async fn delete_oauth_application(&self, id: &str) -> Result<(), PortalError> {
        self.client
            .delete_user_pool_client(id)
            .await
            .map_err(|e| fail("delete user pool client", &e, &[NotFound]))?;
        info!("Deleted Cognito app client {}", id);
        Ok(())
    }

    async fn get_app_api_products(&self, id: &str) -> Result<Vec<String>, PortalError> {
        let client = self
            .client
            .describe_user_pool_client(id)
            .await
            .map_err(|e| fail("describe user pool client", &e, &[NotFound]))?;

        let prefix = self.scope_for("");
        Ok(client
            .allowed_scopes
            .iter()
            .filter_map(|scope| scope.strip_prefix(&prefix))
            .map(str::to_string)
            .collect())
    }

    async fn update_app_api_products(
        &self,
        id: &str,
        products: &BTreeSet<String>,
    ) -> Result<(), PortalError> {
        let scopes: Vec<String> = products.iter().map(|p| self.scope_for(p)).collect();
        debug!("Replacing scopes of app client {} with {:?}", id, scopes);

        self.client
            .update_user_pool_client_scopes(id, scopes)
            .await
            .map_err(|e| fail("update user pool client", &e, &[NotFound, BadRequest]))
    }

    async fn create_api_product(&self, product: &ApiProduct) -> Result<(), PortalError> {
        let mut scopes = match self.registry_scopes().await? {
            Some(scopes) => scopes,
            None => {
                info!(
                    "Resource server {} does not exist, creating it",
                    self.resource_server
                );
                self.client
                    .create_resource_server(&self.resource_server)
                    .await
                    .map_err(|e| fail("create resource server", &e, &[]))?;
                Vec::new()
            }
        };

        if scopes.iter().any(|scope| scope.name == product.name) {
            return Err(PortalError::conflict("scope already exists"));
        }

        // Cognito requires a non-empty scope description
        let description = product
            .description
            .clone()
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| product.name.clone());
        scopes.push(ScopeEntry {
            name: product.name.clone(),
            description,
        });

        self.client
            .update_resource_server(&self.resource_server, scopes)
            .await
            .map_err(|e| fail("update resource server", &e, &[BadRequest]))?;
        info!("Created API product {}", product.name);
        Ok(())
    }

    async fn delete_api_product(&self, name: &str) -> Result<Deletion, PortalError> {
        let Some(scopes) = self.registry_scopes().await? else {
            return Ok(Deletion::Absent);
        };

        let before = scopes.len();
        let remaining: Vec<ScopeEntry> = scopes.into_iter().filter(|s| s.name != name).collect();
        if remaining.len() == before {
            return Ok(Deletion::Absent);
        }

        self.client
            .update_resource_server(&self.resource_server, remaining)
            .await
            .map_err(|e| fail("update resource server", &e, &[]))?;
        info!("Deleted API product {}", name);
        Ok(Deletion::Deleted)
    }

    async fn get_api_products(&self) -> Result<Vec<ApiProduct>, PortalError> {
        let scopes = self.registry_scopes().await?.unwrap_or_default();
        Ok(scopes
            .into_iter()
            .map(|scope| ApiProduct {
                name: scope.name,
                description: Some(scope.description),
            })
            .collect())
    }
}
