//! Keycloak management facade: discovery, token cache and the REST client.

pub mod client;
pub mod discovery;
pub mod token;

pub use client::{
    ClientRepresentation, KeycloakApi, KeycloakRestClient, KeycloakSettings, NewUmaPermission,
    RegisteredClient, ResourceRepresentation, UmaPermission,
};
pub use discovery::DiscoveredEndpoints;
pub use token::{TokenCache, TokenPolicy};

use thiserror::Error;

/// Errors returned by the Keycloak facade
#[derive(Debug, Error)]
pub enum KeycloakError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Keycloak returned {status}: {error}")]
    Api {
        status: u16,
        error: String,
        description: Option<String>,
    },

    #[error("Failed to obtain management token: {message}")]
    Token {
        status: Option<u16>,
        message: String,
    },

    #[error("Endpoint discovery failed: {0}")]
    Discovery(String),

    #[error("Failed to deserialize response: {0}")]
    Deserialization(String),
}

impl KeycloakError {
    /// HTTP status reported by Keycloak, if the failure came from a response
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Token { status, .. } => *status,
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            Self::Discovery(_) | Self::Deserialization(_) => None,
        }
    }
}
