pub mod providers;

pub use providers::{CognitoConfig, KeycloakConfig, MissingProductPolicy, OktaConfig, ProviderKind};

use confique::Config;
use url::Url;

/// Unprefixed variable read when `IDP_CONNECT_OKTA_API_TOKEN` is unset
const OKTA_TOKEN_FALLBACK: &str = "OKTA_API_TOKEN";

/// Main configuration structure for idp-connect
#[derive(Debug, Config, Clone)]
pub struct AppConfig {
    /// The port the server will listen to (default: 8080)
    #[config(env = "IDP_CONNECT_PORT", default = 8080)]
    pub port: u16,

    /// Identity provider to drive: cognito, keycloak or okta
    #[config(env = "IDP_CONNECT_PROVIDER")]
    pub provider: ProviderKind,

    /// Resource server (scope registry) holding the API products (default: access)
    #[config(env = "IDP_CONNECT_RESOURCE_SERVER", default = "access")]
    pub resource_server: String,

    /// Response for deleting an API product that does not exist: not-found or no-content
    #[config(env = "IDP_CONNECT_MISSING_PRODUCT_ON_DELETE", default = "not-found")]
    pub missing_product_on_delete: MissingProductPolicy,

    /// Timeout for outbound provider calls in seconds (default: 30)
    #[config(env = "IDP_CONNECT_CLIENT_TIMEOUT", default = 30)]
    pub client_timeout: u64,

    #[config(nested)]
    pub cognito: CognitoConfig,

    #[config(nested)]
    pub keycloak: KeycloakConfig,

    #[config(nested)]
    pub okta: OktaConfig,
}

impl AppConfig {
    /// Loads the configuration from environment variables and validates it
    pub fn new() -> Result<Self, String> {
        let config = Self::builder()
            .env()
            .load()
            .map_err(|e| e.to_string())?
            .with_okta_token_fallback(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    /// Takes the Okta API token from `OKTA_API_TOKEN` when none is configured
    fn with_okta_token_fallback(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if is_blank(&self.okta.api_token) {
            if let Some(token) = lookup(OKTA_TOKEN_FALLBACK).filter(|t| !t.trim().is_empty()) {
                self.okta.api_token = Some(token);
            }
        }
        self
    }

    /// Checks that the selected provider has every setting it needs
    pub fn validate(&self) -> Result<(), String> {
        if self.resource_server.trim().is_empty() {
            return Err("IDP_CONNECT_RESOURCE_SERVER must not be empty".to_string());
        }

        let missing: Vec<&str> = match self.provider {
            ProviderKind::Cognito => [(
                "IDP_CONNECT_COGNITO_USER_POOL_ID",
                &self.cognito.user_pool_id,
            )]
            .into_iter()
            .filter(|(_, value)| is_blank(value))
            .map(|(name, _)| name)
            .collect(),
            ProviderKind::Keycloak => [
                ("IDP_CONNECT_KEYCLOAK_ISSUER", &self.keycloak.issuer),
                (
                    "IDP_CONNECT_KEYCLOAK_MGMT_CLIENT_ID",
                    &self.keycloak.mgmt_client_id,
                ),
                (
                    "IDP_CONNECT_KEYCLOAK_MGMT_CLIENT_SECRET",
                    &self.keycloak.mgmt_client_secret,
                ),
            ]
            .into_iter()
            .filter(|(_, value)| is_blank(value))
            .map(|(name, _)| name)
            .collect(),
            ProviderKind::Okta => [
                ("IDP_CONNECT_OKTA_DOMAIN", &self.okta.domain),
                ("IDP_CONNECT_OKTA_API_TOKEN", &self.okta.api_token),
            ]
            .into_iter()
            .filter(|(_, value)| is_blank(value))
            .map(|(name, _)| name)
            .collect(),
        };

        if !missing.is_empty() {
            return Err(format!(
                "provider {} requires: {}",
                self.provider,
                missing.join(", ")
            ));
        }

        let endpoint = match self.provider {
            ProviderKind::Keycloak => Some(("IDP_CONNECT_KEYCLOAK_ISSUER", &self.keycloak.issuer)),
            ProviderKind::Okta => Some(("IDP_CONNECT_OKTA_DOMAIN", &self.okta.domain)),
            ProviderKind::Cognito => None,
        };
        if let Some((name, Some(value))) = endpoint {
            Url::parse(value.trim()).map_err(|e| format!("{name} is not a valid URL: {e}"))?;
        }
        Ok(())
    }

    #[cfg(test)]
    pub fn for_test_with_keycloak(keycloak_mock: &wiremock::MockServer) -> Self {
        Self {
            port: 0, // Let the OS choose a port
            provider: ProviderKind::Keycloak,
            resource_server: "access".to_string(),
            missing_product_on_delete: MissingProductPolicy::NotFound,
            client_timeout: 5,
            cognito: CognitoConfig::default(),
            keycloak: KeycloakConfig {
                issuer: Some(format!("{}/realms/test", keycloak_mock.uri())),
                mgmt_client_id: Some("idp-connect".to_string()),
                mgmt_client_secret: Some("secret".to_string()),
                token_max_age: 60,
                page_size: 100,
            },
            okta: OktaConfig::default(),
        }
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().is_none_or(|v| v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config(provider: ProviderKind) -> AppConfig {
        AppConfig {
            port: 8080,
            provider,
            resource_server: "access".to_string(),
            missing_product_on_delete: MissingProductPolicy::NotFound,
            client_timeout: 30,
            cognito: CognitoConfig::default(),
            keycloak: KeycloakConfig::default(),
            okta: OktaConfig::default(),
        }
    }

    #[test]
    fn test_load_from_env() {
        for (name, _value) in std::env::vars() {
            if name.starts_with("IDP_CONNECT_") {
                std::env::remove_var(name);
            }
        }
        std::env::set_var("IDP_CONNECT_PROVIDER", "cognito");
        std::env::set_var("IDP_CONNECT_COGNITO_USER_POOL_ID", "us-east-1_abc");

        let config = AppConfig::new().unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.provider, ProviderKind::Cognito);
        assert_eq!(config.resource_server, "access");
        assert_eq!(
            config.missing_product_on_delete,
            MissingProductPolicy::NotFound
        );
        assert_eq!(config.client_timeout, 30);
        assert_eq!(
            config.cognito.user_pool_id.as_deref(),
            Some("us-east-1_abc")
        );
        assert_eq!(config.cognito.region, None);
        assert_eq!(config.keycloak.token_max_age, 60);

        std::env::remove_var("IDP_CONNECT_PROVIDER");
        std::env::remove_var("IDP_CONNECT_COGNITO_USER_POOL_ID");
    }

    #[test]
    fn test_validate_reports_missing_provider_settings() {
        let err = base_config(ProviderKind::Keycloak).validate().unwrap_err();
        assert!(err.contains("IDP_CONNECT_KEYCLOAK_ISSUER"));
        assert!(err.contains("IDP_CONNECT_KEYCLOAK_MGMT_CLIENT_SECRET"));

        let err = base_config(ProviderKind::Okta).validate().unwrap_err();
        assert!(err.contains("IDP_CONNECT_OKTA_API_TOKEN"));

        let err = base_config(ProviderKind::Cognito).validate().unwrap_err();
        assert!(err.contains("IDP_CONNECT_COGNITO_USER_POOL_ID"));
    }

    #[test]
    fn test_validate_accepts_complete_settings() {
        let mut config = base_config(ProviderKind::Okta);
        config.okta.domain = Some("https://dev-1.okta.com".to_string());
        config.okta.api_token = Some("token".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_malformed_endpoints() {
        let mut config = base_config(ProviderKind::Okta);
        config.okta.domain = Some("dev-1.okta.com".to_string());
        config.okta.api_token = Some("token".to_string());
        let err = config.validate().unwrap_err();
        assert!(err.contains("IDP_CONNECT_OKTA_DOMAIN"));
    }

    #[test]
    fn test_provider_has_no_default() {
        assert!(AppConfig::builder().load().is_err());
    }

    #[test]
    fn test_okta_token_falls_back_to_okta_variable() {
        let lookup = |name: &str| (name == "OKTA_API_TOKEN").then(|| "from-env".to_string());

        let config = base_config(ProviderKind::Okta).with_okta_token_fallback(lookup);
        assert_eq!(config.okta.api_token.as_deref(), Some("from-env"));

        let mut configured = base_config(ProviderKind::Okta);
        configured.okta.api_token = Some("configured".to_string());
        let config = configured.with_okta_token_fallback(lookup);
        assert_eq!(config.okta.api_token.as_deref(), Some("configured"));

        let config = base_config(ProviderKind::Okta).with_okta_token_fallback(|_| None);
        assert_eq!(config.okta.api_token, None);
    }

    #[test]
    fn test_validate_rejects_blank_values() {
        let mut config = base_config(ProviderKind::Cognito);
        config.cognito.user_pool_id = Some("  ".to_string());
        assert!(config.validate().is_err());

        let mut config = base_config(ProviderKind::Cognito);
        config.cognito.user_pool_id = Some("pool".to_string());
        config.resource_server = String::new();
        assert!(config.validate().is_err());
    }
}
