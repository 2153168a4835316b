use super::KeycloakError;
use log::{debug, info};
use reqwest::Client;
use serde::Deserialize;
use url::Url;

/// Management endpoints resolved from a realm's well-known documents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredEndpoints {
    pub token: String,
    pub resource_registration: String,
    pub policy: String,
}

#[derive(Debug, Deserialize)]
struct OpenIdConfiguration {
    token_endpoint: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Uma2Configuration {
    resource_registration_endpoint: Option<String>,
    policy_endpoint: Option<String>,
}

impl DiscoveredEndpoints {
    /// Reads the OpenID and UMA2 configuration documents of `issuer`.
    ///
    /// Fails when either document is unreachable or lacks one of the
    /// endpoints the adapter depends on.
    pub async fn discover(http: &Client, issuer: &str) -> Result<Self, KeycloakError> {
        let issuer = issuer.trim_end_matches('/');

        let openid: OpenIdConfiguration =
            fetch_document(http, &format!("{issuer}/.well-known/openid-configuration")).await?;
        let uma: Uma2Configuration =
            fetch_document(http, &format!("{issuer}/.well-known/uma2-configuration")).await?;

        let endpoints = Self {
            token: require(openid.token_endpoint, "token_endpoint")?,
            resource_registration: require(
                uma.resource_registration_endpoint,
                "resource_registration_endpoint",
            )?,
            policy: require(uma.policy_endpoint, "policy_endpoint")?,
        };
        info!(
            "Discovered Keycloak endpoints: token={}, resources={}, policies={}",
            endpoints.token, endpoints.resource_registration, endpoints.policy
        );
        Ok(endpoints)
    }
}

async fn fetch_document<T: serde::de::DeserializeOwned>(
    http: &Client,
    url: &str,
) -> Result<T, KeycloakError> {
    debug!("Fetching discovery document {}", url);
    let response = http
        .get(url)
        .send()
        .await
        .map_err(|e| KeycloakError::Discovery(format!("{url}: {e}")))?;

    if !response.status().is_success() {
        return Err(KeycloakError::Discovery(format!(
            "{url} returned {}",
            response.status()
        )));
    }

    response
        .json::<T>()
        .await
        .map_err(|e| KeycloakError::Discovery(format!("{url}: invalid document: {e}")))
}

fn require(value: Option<String>, name: &str) -> Result<String, KeycloakError> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| KeycloakError::Discovery(format!("{name} is missing")))
}

/// Admin REST root for the realm named by `issuer`.
///
/// `https://kc.example.com/realms/acme` becomes
/// `https://kc.example.com/admin/realms/acme`.
pub fn admin_root(issuer: &str) -> Result<String, KeycloakError> {
    let mut url = Url::parse(issuer).map_err(|e| {
        KeycloakError::Discovery(format!("issuer {issuer} is not a valid URL: {e}"))
    })?;
    let segments: Vec<String> = url
        .path_segments()
        .map(|segments| {
            segments
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let realms_at = segments
        .len()
        .checked_sub(2)
        .filter(|&i| segments[i] == "realms")
        .ok_or_else(|| {
            KeycloakError::Discovery(format!("issuer {issuer} does not name a realm"))
        })?;

    let mut admin_path = segments[..realms_at].to_vec();
    admin_path.extend(["admin".to_string(), "realms".to_string()]);
    admin_path.push(segments[realms_at + 1].clone());
    url.set_path(&admin_path.join("/"));
    Ok(url.as_str().trim_end_matches('/').to_string())
}
