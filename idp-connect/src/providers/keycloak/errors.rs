use crate::errors::{ClassifiedError, ProviderErrorKind};
use idp_clients::keycloak::KeycloakError;

/// Reduces a Keycloak failure to a provider-independent category
pub fn classify_keycloak_error(err: &KeycloakError) -> ClassifiedError {
    match err {
        KeycloakError::Api {
            status,
            error,
            description,
        } => {
            let kind = match status {
                400 => ProviderErrorKind::BadRequest,
                404 => ProviderErrorKind::NotFound,
                409 => ProviderErrorKind::Conflict,
                _ => ProviderErrorKind::Upstream,
            };
            let reason = description.as_deref().unwrap_or(error);
            ClassifiedError::new(kind, Some(*status), error, reason)
        }
        KeycloakError::Token { status, message } => ClassifiedError::new(
            ProviderErrorKind::Upstream,
            *status,
            "Management token unavailable",
            message,
        ),
        other => ClassifiedError::new(
            ProviderErrorKind::Upstream,
            other.status(),
            "Internal Server Error",
            other,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api_error(status: u16, description: Option<&str>) -> KeycloakError {
        KeycloakError::Api {
            status,
            error: "invalid_request".to_string(),
            description: description.map(str::to_string),
        }
    }

    #[test]
    fn test_status_drives_kind() {
        assert_eq!(
            classify_keycloak_error(&api_error(400, None)).kind,
            ProviderErrorKind::BadRequest
        );
        assert_eq!(
            classify_keycloak_error(&api_error(404, None)).kind,
            ProviderErrorKind::NotFound
        );
        assert_eq!(
            classify_keycloak_error(&api_error(409, None)).kind,
            ProviderErrorKind::Conflict
        );
        assert_eq!(
            classify_keycloak_error(&api_error(502, None)).kind,
            ProviderErrorKind::Upstream
        );
    }

    #[test]
    fn test_description_becomes_reason() {
        let classified =
            classify_keycloak_error(&api_error(409, Some("Resource with name [a] already exists.")));
        assert_eq!(classified.message, "invalid_request");
        assert_eq!(classified.reason, "Resource with name [a] already exists.");

        let classified = classify_keycloak_error(&api_error(409, None));
        assert_eq!(classified.reason, "invalid_request");
    }

    #[test]
    fn test_token_failure_is_upstream_even_with_client_status() {
        let classified = classify_keycloak_error(&KeycloakError::Token {
            status: Some(401),
            message: "Invalid client secret".to_string(),
        });
        assert_eq!(classified.kind, ProviderErrorKind::Upstream);
        assert_eq!(classified.status, Some(401));
    }

    #[test]
    fn test_discovery_and_decode_failures_are_upstream() {
        let classified =
            classify_keycloak_error(&KeycloakError::Deserialization("eof".to_string()));
        assert_eq!(classified.kind, ProviderErrorKind::Upstream);
        assert_eq!(classified.status, None);
        assert!(classified.reason.contains("eof"));
    }
}
