//! Okta adapter: service apps are applications, scopes of a custom authorization
//! server are API products, and a per-client access policy rule grants them.

mod errors;

pub use errors::classify_okta_error;

use crate::errors::{PortalError, ProviderErrorKind};
use crate::models::{ApiProduct, ApplicationSummary, Deletion, OAuthApplication};
use crate::providers::IdpHandler;
use async_trait::async_trait;
use idp_clients::okta::{
    AuthorizationServer, OktaApi, OktaApplication, OktaError, OktaRestClient, OktaScope,
    API_PRODUCTS_RULE,
};
use log::{debug, error, info, warn};
use std::collections::BTreeSet;
use ProviderErrorKind::{BadRequest, NotFound};

pub struct OktaHandler<C = OktaRestClient> {
    client: C,
    /// Name of the authorization server holding the API products
    resource_server: String,
}

impl<C: OktaApi> OktaHandler<C> {
    pub fn new(client: C, resource_server: impl Into<String>) -> Self {
        Self {
            client,
            resource_server: resource_server.into(),
        }
    }

    async fn resolve_application(&self, identifier: &str) -> Result<OktaApplication, PortalError> {
        let apps = self
            .client
            .list_applications()
            .await
            .map_err(|e| fail("list applications", &e, &[]))?;

        let mut matches: Vec<OktaApplication> =
            apps.into_iter().filter(|app| app.matches(identifier)).collect();
        match matches.len() {
            0 => Err(PortalError::not_found(format!(
                "application {identifier} does not exist"
            ))),
            1 => Ok(matches.remove(0)),
            n => {
                error!("Found {} Okta applications matching {}", n, identifier);
                Err(PortalError::internal(format!(
                    "{n} applications match {identifier}"
                )))
            }
        }
    }

    async fn registry(&self) -> Result<Option<AuthorizationServer>, PortalError> {
        self.client
            .find_authorization_server(&self.resource_server)
            .await
            .map_err(|e| fail("find authorization server", &e, &[]))
    }

    /// Custom scopes of the registry, without Okta's built-in OIDC scopes
    async fn product_scopes(
        &self,
        server: &AuthorizationServer,
    ) -> Result<Vec<OktaScope>, PortalError> {
        let scopes = self
            .client
            .list_scopes(&server.id)
            .await
            .map_err(|e| fail("list scopes", &e, &[]))?;
        Ok(scopes.into_iter().filter(|s| !s.system).collect())
    }
}

fn fail(action: &str, err: &OktaError, allowed: &[ProviderErrorKind]) -> PortalError {
    let portal = classify_okta_error(err).into_portal_error(allowed);
    if portal.code >= 500 {
        error!("Okta {} failed: {}", action, err);
    } else {
        debug!("Okta {} rejected: {}", action, err);
    }
    portal
}

/// OAuth client id of `app`, falling back to its Okta id
fn client_id_of(app: &OktaApplication) -> String {
    app.client_id().unwrap_or(app.id.as_str()).to_string()
}

#[async_trait]
impl<C: OktaApi> IdpHandler for OktaHandler<C> {
    async fn create_oauth_application(
        &self,
        identifier: &str,
    ) -> Result<OAuthApplication, PortalError> {
        let app = self
            .client
            .create_application(identifier)
            .await
            .map_err(|e| fail("create application", &e, &[BadRequest]))?;

        let (Some(client_id), Some(client_secret)) = (app.client_id(), app.client_secret()) else {
            return Err(PortalError::internal(
                "Okta did not return client credentials",
            ));
        };
        info!("Created Okta application {} ({})", app.label, app.id);
        Ok(OAuthApplication {
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            client_name: app.label.clone(),
        })
    }

    async fn get_oauth_application(&self, id: &str) -> Result<ApplicationSummary, PortalError> {
        let app = self.resolve_application(id).await?;
        Ok(ApplicationSummary {
            client_id: client_id_of(&app),
            client_name: app.label,
        })
    }

    async fn delete_oauth_application(&self, id: &str) -> Result<(), PortalError> {
        let app = self.resolve_application(id).await?;

        // Okta refuses to delete an active application
        if let Err(e) = self.client.deactivate_application(&app.id).await {
            warn!("Not deleting Okta application {}, deactivation failed", app.id);
            return Err(fail("deactivate application", &e, &[]));
        }
        self.client
            .delete_application(&app.id)
            .await
            .map_err(|e| fail("delete application", &e, &[NotFound]))?;
        info!("Deleted Okta application {} ({})", app.label, app.id);
        Ok(())
    }

    async fn get_app_api_products(&self, id: &str) -> Result<Vec<String>, PortalError> {
        let app = self.resolve_application(id).await?;
        let Some(server) = self.registry().await? else {
            return Ok(Vec::new());
        };
        let client_id = client_id_of(&app);
        let Some(policy) = self
            .client
            .find_client_policy(&server.id, &client_id)
            .await
            .map_err(|e| fail("find access policy", &e, &[]))?
        else {
            return Ok(Vec::new());
        };

        let rules = self
            .client
            .list_policy_rules(&server.id, &policy.id)
            .await
            .map_err(|e| fail("list policy rules", &e, &[]))?;
        let products: BTreeSet<&str> = rules
            .iter()
            .filter(|rule| rule.name == API_PRODUCTS_RULE)
            .flat_map(|rule| rule.scopes())
            .map(String::as_str)
            .collect();
        Ok(products.into_iter().map(str::to_string).collect())
    }

    async fn update_app_api_products(
        &self,
        id: &str,
        products: &BTreeSet<String>,
    ) -> Result<(), PortalError> {
        let app = self.resolve_application(id).await?;
        let client_id = client_id_of(&app);

        let server = match self.registry().await? {
            Some(server) => server,
            None if products.is_empty() => return Ok(()),
            None => {
                return Err(PortalError::bad_request(format!(
                    "authorization server {} does not exist",
                    self.resource_server
                )));
            }
        };

        let known: BTreeSet<String> = self
            .product_scopes(&server)
            .await?
            .into_iter()
            .map(|s| s.name)
            .collect();
        if let Some(missing) = products.difference(&known).next() {
            return Err(PortalError::bad_request(format!(
                "API product {missing} does not exist"
            )));
        }

        let policy = match self
            .client
            .find_client_policy(&server.id, &client_id)
            .await
            .map_err(|e| fail("find access policy", &e, &[]))?
        {
            Some(policy) => policy,
            None if products.is_empty() => return Ok(()),
            None => {
                info!("Creating access policy for client {}", client_id);
                self.client
                    .create_client_policy(&server.id, &client_id)
                    .await
                    .map_err(|e| fail("create access policy", &e, &[]))?
            }
        };

        let rules = self
            .client
            .list_policy_rules(&server.id, &policy.id)
            .await
            .map_err(|e| fail("list policy rules", &e, &[]))?;
        let rule = rules.into_iter().find(|rule| rule.name == API_PRODUCTS_RULE);
        let scopes: Vec<String> = products.iter().cloned().collect();

        match rule {
            None if scopes.is_empty() => Ok(()),
            None => {
                self.client
                    .create_policy_rule(&server.id, &policy.id, &scopes)
                    .await
                    .map_err(|e| fail("create policy rule", &e, &[BadRequest]))?;
                info!("Granted {:?} to client {}", scopes, client_id);
                Ok(())
            }
            Some(rule) if scopes.is_empty() => {
                self.client
                    .delete_policy_rule(&server.id, &policy.id, &rule.id)
                    .await
                    .map_err(|e| fail("delete policy rule", &e, &[]))?;
                info!("Revoked all API products of client {}", client_id);
                Ok(())
            }
            Some(rule) => {
                let current: BTreeSet<&String> = rule.scopes().iter().collect();
                let wanted: BTreeSet<&String> = products.iter().collect();
                if current == wanted {
                    debug!("API products of {} already up to date", id);
                    return Ok(());
                }
                self.client
                    .update_policy_rule(&server.id, &policy.id, &rule.id, &scopes)
                    .await
                    .map_err(|e| fail("update policy rule", &e, &[BadRequest]))?;
                info!("Granted {:?} to client {}", scopes, client_id);
                Ok(())
            }
        }
    }

    async fn create_api_product(&self, product: &ApiProduct) -> Result<(), PortalError> {
        let server = match self.registry().await? {
            Some(server) => server,
            None => {
                info!(
                    "Authorization server {} does not exist, creating it",
                    self.resource_server
                );
                self.client
                    .create_authorization_server(&self.resource_server)
                    .await
                    .map_err(|e| fail("create authorization server", &e, &[]))?
            }
        };

        let scopes = self
            .client
            .list_scopes(&server.id)
            .await
            .map_err(|e| fail("list scopes", &e, &[]))?;
        if scopes.iter().any(|s| s.name == product.name) {
            return Err(PortalError::conflict("scope already exists"));
        }

        let description = product
            .description
            .as_deref()
            .filter(|d| !d.is_empty())
            .unwrap_or(product.name.as_str());
        self.client
            .create_scope(&server.id, &product.name, Some(description))
            .await
            .map_err(|e| fail("create scope", &e, &[BadRequest]))?;
        info!("Created API product {}", product.name);
        Ok(())
    }

    async fn delete_api_product(&self, name: &str) -> Result<Deletion, PortalError> {
        let Some(server) = self.registry().await? else {
            return Ok(Deletion::Absent);
        };
        let Some(scope) = self
            .product_scopes(&server)
            .await?
            .into_iter()
            .find(|s| s.name == name)
        else {
            return Ok(Deletion::Absent);
        };

        self.client
            .delete_scope(&server.id, &scope.id)
            .await
            .map_err(|e| fail("delete scope", &e, &[]))?;
        info!("Deleted API product {}", name);
        Ok(Deletion::Deleted)
    }

    async fn get_api_products(&self) -> Result<Vec<ApiProduct>, PortalError> {
        let Some(server) = self.registry().await? else {
            return Ok(Vec::new());
        };
        Ok(self
            .product_scopes(&server)
            .await?
            .into_iter()
            .map(|s| ApiProduct {
                name: s.name,
                description: s.description,
            })
            .collect())
    }
}
