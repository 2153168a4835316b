use confique::Config;
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::str::FromStr;

/// Identity provider driven by this deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Cognito,
    Keycloak,
    Okta,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cognito => "cognito",
            Self::Keycloak => "keycloak",
            Self::Okta => "okta",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cognito" => Ok(Self::Cognito),
            "keycloak" => Ok(Self::Keycloak),
            "okta" => Ok(Self::Okta),
            other => Err(format!(
                "unknown provider '{other}', expected one of: cognito, keycloak, okta"
            )),
        }
    }
}

impl<'de> Deserialize<'de> for ProviderKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        value.parse().map_err(serde::de::Error::custom)
    }
}

/// What `DELETE /api-products/{name}` answers when the product does not exist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingProductPolicy {
    /// Respond 404
    #[default]
    NotFound,
    /// Respond 204 as if the product had been deleted
    NoContent,
}

impl FromStr for MissingProductPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "not-found" | "404" => Ok(Self::NotFound),
            "no-content" | "204" => Ok(Self::NoContent),
            other => Err(format!(
                "unknown missing product policy '{other}', expected not-found or no-content"
            )),
        }
    }
}

impl<'de> Deserialize<'de> for MissingProductPolicy {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        value.parse().map_err(serde::de::Error::custom)
    }
}

/// Cognito user pool settings
#[derive(Debug, Config, Clone, Default)]
pub struct CognitoConfig {
    /// User pool that owns the app clients and the resource server
    #[config(env = "IDP_CONNECT_COGNITO_USER_POOL_ID")]
    pub user_pool_id: Option<String>,

    /// AWS region, falls back to the standard AWS environment when unset
    #[config(env = "IDP_CONNECT_COGNITO_REGION")]
    pub region: Option<String>,
}

/// Keycloak realm settings
#[derive(Config, Clone, Default)]
pub struct KeycloakConfig {
    /// Realm issuer URL (e.g. https://keycloak.example.com/realms/my-org)
    #[config(env = "IDP_CONNECT_KEYCLOAK_ISSUER")]
    pub issuer: Option<String>,

    /// Client used to authenticate management calls
    #[config(env = "IDP_CONNECT_KEYCLOAK_MGMT_CLIENT_ID")]
    pub mgmt_client_id: Option<String>,

    #[config(env = "IDP_CONNECT_KEYCLOAK_MGMT_CLIENT_SECRET")]
    pub mgmt_client_secret: Option<String>,

    /// Seconds a management token is reused before being refetched (default: 60)
    #[config(env = "IDP_CONNECT_KEYCLOAK_TOKEN_MAX_AGE", default = 60)]
    pub token_max_age: u64,

    /// Page size for paginated list calls (default: 100)
    #[config(env = "IDP_CONNECT_KEYCLOAK_PAGE_SIZE", default = 100)]
    pub page_size: usize,
}

impl fmt::Debug for KeycloakConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeycloakConfig")
            .field("issuer", &self.issuer)
            .field("mgmt_client_id", &self.mgmt_client_id)
            .field("token_max_age", &self.token_max_age)
            .field("page_size", &self.page_size)
            .finish_non_exhaustive()
    }
}

/// Okta org settings
#[derive(Config, Clone, Default)]
pub struct OktaConfig {
    /// Okta domain (e.g. https://dev-123456.okta.com)
    #[config(env = "IDP_CONNECT_OKTA_DOMAIN")]
    pub domain: Option<String>,

    /// API token used for SSWS authentication, falls back to `OKTA_API_TOKEN` when unset
    #[config(env = "IDP_CONNECT_OKTA_API_TOKEN")]
    pub api_token: Option<String>,
}

impl fmt::Debug for OktaConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OktaConfig")
            .field("domain", &self.domain)
            .finish_non_exhaustive()
    }
}
