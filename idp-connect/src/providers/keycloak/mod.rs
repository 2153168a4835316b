//! Keycloak adapter: registered clients are applications, UMA resources are API
//! products, and one UMA permission per (client, product) grants access.

mod errors;
mod reconcile;

pub use errors::classify_keycloak_error;
pub use reconcile::{granted_product, permission_name, plan_permission_changes};

use crate::errors::{PortalError, ProviderErrorKind};
use crate::models::{ApiProduct, ApplicationSummary, Deletion, OAuthApplication};
use crate::providers::IdpHandler;
use async_trait::async_trait;
use idp_clients::keycloak::{
    ClientRepresentation, KeycloakApi, KeycloakError, KeycloakRestClient, NewUmaPermission,
};
use log::{debug, error, info};
use std::collections::{BTreeMap, BTreeSet};
use ProviderErrorKind::{BadRequest, Conflict, NotFound};

/// Resource every Keycloak resource server is created with
const DEFAULT_RESOURCE: &str = "Default Resource";

pub struct KeycloakHandler<C = KeycloakRestClient> {
    client: C,
}

impl<C: KeycloakApi> KeycloakHandler<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    /// Looks up the single client registered as `client_id`
    async fn resolve_client(&self, client_id: &str) -> Result<ClientRepresentation, PortalError> {
        let mut matches = self
            .client
            .find_clients(client_id)
            .await
            .map_err(|e| fail("find clients", &e, &[]))?;

        match matches.len() {
            0 => {
                debug!("No Keycloak client registered as {}", client_id);
                Err(PortalError::not_found(format!(
                    "application {client_id} does not exist"
                )))
            }
            1 => Ok(matches.remove(0)),
            n => {
                error!("Found {} Keycloak clients registered as {}", n, client_id);
                Err(PortalError::internal(format!(
                    "{n} clients share the identifier {client_id}"
                )))
            }
        }
    }

    /// Resolves each product name to the id of its UMA resource
    async fn resolve_resources(
        &self,
        products: &BTreeSet<String>,
    ) -> Result<BTreeMap<String, String>, PortalError> {
        let mut resolved = BTreeMap::new();
        for product in products {
            let mut ids = self
                .client
                .find_resource_ids(product)
                .await
                .map_err(|e| fail("find resource", &e, &[]))?;

            let resource_id = match ids.len() {
                0 => {
                    return Err(PortalError::bad_request(format!(
                        "API product {product} does not exist"
                    )));
                }
                1 => ids.remove(0),
                n => {
                    error!("Found {} Keycloak resources named {}", n, product);
                    return Err(PortalError::internal(format!(
                        "{n} resources share the name {product}"
                    )));
                }
            };
            resolved.insert(product.clone(), resource_id);
        }
        Ok(resolved)
    }
}

fn fail(action: &str, err: &KeycloakError, allowed: &[ProviderErrorKind]) -> PortalError {
    let portal = classify_keycloak_error(err).into_portal_error(allowed);
    if portal.code >= 500 {
        error!("Keycloak {} failed: {}", action, err);
    } else {
        debug!("Keycloak {} rejected: {}", action, err);
    }
    portal
}

#[async_trait]
impl<C: KeycloakApi> IdpHandler for KeycloakHandler<C> {
    async fn create_oauth_application(
        &self,
        identifier: &str,
    ) -> Result<OAuthApplication, PortalError> {
        let registered = self
            .client
            .register_client(identifier, identifier)
            .await
            .map_err(|e| fail("register client", &e, &[BadRequest]))?;

        let client_secret = registered
            .secret
            .ok_or_else(|| PortalError::internal("Keycloak did not return a client secret"))?;
        info!("Registered Keycloak client {}", registered.client_id);
        Ok(OAuthApplication {
            client_name: registered.name.unwrap_or_else(|| identifier.to_string()),
            client_id: registered.client_id,
            client_secret,
        })
    }

    async fn get_oauth_application(&self, id: &str) -> Result<ApplicationSummary, PortalError> {
        let client = self.resolve_client(id).await?;
        Ok(ApplicationSummary {
            client_name: client.name.unwrap_or_else(|| client.client_id.clone()),
            client_id: client.client_id,
        })
    }

    async fn delete_oauth_application(&self, id: &str) -> Result<(), PortalError> {
        let client = self.resolve_client(id).await?;
        self.client
            .delete_client(&client.id)
            .await
            .map_err(|e| fail("delete client", &e, &[NotFound]))?;
        info!("Deleted Keycloak client {}", id);
        Ok(())
    }

    async fn get_app_api_products(&self, id: &str) -> Result<Vec<String>, PortalError> {
        let client = self.resolve_client(id).await?;
        let permissions = self
            .client
            .list_permissions()
            .await
            .map_err(|e| fail("list permissions", &e, &[]))?;

        let products: BTreeSet<&str> = permissions
            .iter()
            .filter_map(|p| granted_product(&client.client_id, p))
            .collect();
        Ok(products.into_iter().map(str::to_string).collect())
    }

    async fn update_app_api_products(
        &self,
        id: &str,
        products: &BTreeSet<String>,
    ) -> Result<(), PortalError> {
        let client = self.resolve_client(id).await?;
        let desired = self.resolve_resources(products).await?;

        // The policy endpoint cannot filter by client, so the whole list is scanned
        let existing = self
            .client
            .list_permissions()
            .await
            .map_err(|e| fail("list permissions", &e, &[]))?;

        let plan = plan_permission_changes(&client.client_id, &desired, &existing);
        if plan.is_empty() {
            debug!("API products of {} already up to date", id);
            return Ok(());
        }
        info!(
            "Reconciling API products of {}: {} to delete, {} to create",
            id,
            plan.to_delete.len(),
            plan.to_create.len()
        );

        for permission in &plan.to_delete {
            self.client
                .delete_permission(&permission.id)
                .await
                .map_err(|e| fail("delete permission", &e, &[]))?;
            debug!("Deleted permission {}", permission.name);
        }

        for (product, resource_id) in &plan.to_create {
            let permission = NewUmaPermission {
                name: permission_name(&client.client_id, product),
                description: format!("{product} access for client {}", client.client_id),
                clients: vec![client.client_id.clone()],
            };
            self.client
                .create_permission(resource_id, &permission)
                .await
                .map_err(|e| fail("create permission", &e, &[]))?;
            debug!("Created permission {}", permission.name);
        }
        Ok(())
    }

    async fn create_api_product(&self, product: &ApiProduct) -> Result<(), PortalError> {
        match self
            .client
            .create_resource(&product.name, product.description.as_deref())
            .await
        {
            Ok(_) => {
                info!("Created API product {}", product.name);
                Ok(())
            }
            Err(KeycloakError::Api { status: 409, .. }) => {
                debug!("API product {} already exists", product.name);
                Err(PortalError::conflict("API product already exists"))
            }
            Err(e) => Err(fail("create resource", &e, &[BadRequest, Conflict])),
        }
    }

    async fn delete_api_product(&self, name: &str) -> Result<Deletion, PortalError> {
        let ids = self
            .client
            .find_resource_ids(name)
            .await
            .map_err(|e| fail("find resource", &e, &[]))?;

        let resource_id = match ids.as_slice() {
            [] => return Ok(Deletion::Absent),
            [id] => id,
            _ => {
                error!("Found {} Keycloak resources named {}", ids.len(), name);
                return Err(PortalError::internal(format!(
                    "{} resources share the name {name}",
                    ids.len()
                )));
            }
        };

        match self.client.delete_resource(resource_id).await {
            Ok(()) => {
                info!("Deleted API product {}", name);
                Ok(Deletion::Deleted)
            }
            Err(KeycloakError::Api { status: 404, .. }) => Ok(Deletion::Absent),
            Err(e) => Err(fail("delete resource", &e, &[])),
        }
    }

    async fn get_api_products(&self) -> Result<Vec<ApiProduct>, PortalError> {
        let resources = self
            .client
            .list_resources()
            .await
            .map_err(|e| fail("list resources", &e, &[]))?;

        Ok(resources
            .into_iter()
            .filter(|r| r.name != DEFAULT_RESOURCE)
            .map(|r| ApiProduct {
                name: r.name,
                description: r.display_name,
            })
            .collect())
    }
}
