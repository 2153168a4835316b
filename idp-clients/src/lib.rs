//! # idp-clients
//!
//! Narrow client facades over the identity providers that idp-connect can drive.
//!
//! ## Components
//!
//! - **Cognito:** Wraps the AWS SDK user-pool calls (clients and resource servers).
//! - **Keycloak:** Endpoint discovery, a cached management token and a REST client
//!   for the client registration, admin and UMA protection APIs.
//! - **Okta:** REST client for applications and custom authorization servers.
//!
//! Every facade is a trait with one production implementation so callers can
//! substitute a test double.

pub mod cognito;
pub mod keycloak;
pub mod okta;

pub use cognito::{CognitoApi, CognitoError, CognitoSdkClient};
pub use keycloak::{KeycloakApi, KeycloakError, KeycloakRestClient, KeycloakSettings};
pub use okta::{OktaApi, OktaError, OktaRestClient};
