//! Diffing of an application's UMA permissions against its desired API products.

use idp_clients::keycloak::UmaPermission;
use std::collections::{BTreeMap, BTreeSet};

/// Name given to the permission granting `app_id` access to `product`
pub fn permission_name(app_id: &str, product: &str) -> String {
    format!("{app_id}/{product}")
}

/// API product granted by `permission`, if the permission belongs to `app_id`.
///
/// A permission belongs to the application when its client list contains the
/// application and its name carries the `<app_id>/` prefix. Permissions that
/// only list the client were not created by this service and are left alone.
pub fn granted_product<'a>(app_id: &str, permission: &'a UmaPermission) -> Option<&'a str> {
    if !permission.clients.iter().any(|client| client == app_id) {
        return None;
    }
    permission
        .name
        .strip_prefix(app_id)
        .and_then(|rest| rest.strip_prefix('/'))
        .filter(|product| !product.is_empty())
}

/// Writes needed to move an application from its current grants to the desired ones
#[derive(Debug, Default, PartialEq, Eq)]
pub struct PermissionPlan<'a> {
    /// Permissions whose product is no longer desired
    pub to_delete: Vec<&'a UmaPermission>,
    /// Desired products without a permission, as `(product, resource_id)`
    pub to_create: Vec<(&'a str, &'a str)>,
}

impl PermissionPlan<'_> {
    pub fn is_empty(&self) -> bool {
        self.to_delete.is_empty() && self.to_create.is_empty()
    }
}

/// Computes the delete and create sets for `app_id`.
///
/// `desired` maps each wanted product name to its resource id. Products that
/// are both granted and desired produce no write, so replaying the same
/// desired set yields an empty plan.
pub fn plan_permission_changes<'a>(
    app_id: &str,
    desired: &'a BTreeMap<String, String>,
    existing: &'a [UmaPermission],
) -> PermissionPlan<'a> {
    let mut granted = BTreeSet::new();
    let mut to_delete = Vec::new();

    for permission in existing {
        let Some(product) = granted_product(app_id, permission) else {
            continue;
        };
        if desired.contains_key(product) {
            granted.insert(product);
        } else {
            to_delete.push(permission);
        }
    }

    let to_create = desired
        .iter()
        .filter(|(product, _)| !granted.contains(product.as_str()))
        .map(|(product, resource_id)| (product.as_str(), resource_id.as_str()))
        .collect();

    PermissionPlan {
        to_delete,
        to_create,
    }
}
