use crate::errors::{ClassifiedError, ProviderErrorKind};
use idp_clients::cognito::{CognitoError, RESOURCE_NOT_FOUND};

/// Reduces a Cognito failure to a provider-independent category
pub fn classify_cognito_error(err: &CognitoError) -> ClassifiedError {
    match err {
        CognitoError::Service {
            status,
            code,
            message,
        } => {
            let kind = match code.as_deref() {
                Some(RESOURCE_NOT_FOUND) => ProviderErrorKind::NotFound,
                Some("InvalidParameterException")
                | Some("ScopeDoesNotExistException")
                | Some("InvalidOAuthFlowException") => ProviderErrorKind::BadRequest,
                _ => ProviderErrorKind::Upstream,
            };
            let title = match kind {
                ProviderErrorKind::NotFound => "Resource Not Found".to_string(),
                ProviderErrorKind::BadRequest => "Bad Request".to_string(),
                _ => code
                    .clone()
                    .unwrap_or_else(|| "Internal Server Error".to_string()),
            };
            ClassifiedError::new(kind, *status, title, message)
        }
        CognitoError::InvalidInput(message) => {
            ClassifiedError::new(ProviderErrorKind::BadRequest, None, "Bad Request", message)
        }
    }
}
