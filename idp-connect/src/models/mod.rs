use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Request body for creating an OAuth application
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreateOAuthApplicationBody {
    /// Unique external identifier of the application
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Display name, used as the identifier when `id` is absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl CreateOAuthApplicationBody {
    /// The first non-blank of `id` and `name`
    pub fn identifier(&self) -> Option<&str> {
        [self.id.as_deref(), self.name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|value| !value.is_empty())
    }
}

/// Credentials of a newly created OAuth application
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OAuthApplication {
    pub client_id: String,
    /// Generated by the provider and returned only once
    pub client_secret: String,
    pub client_name: String,
}

/// An existing OAuth application, without its secret
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSummary {
    pub client_id: String,
    pub client_name: String,
}

/// A named permission unit that can be granted to an application
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq, PartialOrd, Ord)]
pub struct ApiProduct {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreateApiProductBody {
    pub api_product: ApiProduct,
}

/// Desired set of API products for an application
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAppApiProductsBody {
    #[serde(default)]
    pub api_products: Vec<String>,
}

/// Result of a delete against the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deletion {
    Deleted,
    /// The object did not exist, nothing was changed
    Absent,
}
