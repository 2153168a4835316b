use crate::errors::{ClassifiedError, ProviderErrorKind};
use idp_clients::okta::OktaError;

/// Reduces an Okta failure to a provider-independent category
pub fn classify_okta_error(err: &OktaError) -> ClassifiedError {
    match err {
        OktaError::Api {
            status,
            code,
            summary,
        } => {
            let (kind, title) = match status {
                400 => (ProviderErrorKind::BadRequest, "Bad Request"),
                404 => (ProviderErrorKind::NotFound, "Resource Not Found"),
                409 => (ProviderErrorKind::Conflict, "Resource Exists"),
                _ => (ProviderErrorKind::Upstream, "Internal Server Error"),
            };
            ClassifiedError::new(kind, Some(*status), title, format!("{summary} ({code})"))
        }
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

    fn api_error(status: u16) -> OktaError {
        OktaError::Api {
            status,
            code: "E0000007".to_string(),
            summary: "Not found: Resource not found: 0oa1 (AppInstance)".to_string(),
        }
    }

    #[test]
    fn test_not_found_keeps_summary_and_code() {
        let classified = classify_okta_error(&api_error(404));
        assert_eq!(classified.kind, ProviderErrorKind::NotFound);
        assert_eq!(classified.message, "Resource Not Found");
        assert_eq!(
            classified.reason,
            "Not found: Resource not found: 0oa1 (AppInstance) (E0000007)"
        );
    }

    #[test]
    fn test_rate_limit_is_upstream() {
        let classified = classify_okta_error(&api_error(429));
        assert_eq!(classified.kind, ProviderErrorKind::Upstream);
        assert_eq!(classified.status, Some(429));
    }

    #[test]
    fn test_decode_failure_is_upstream() {
        let classified =
            classify_okta_error(&OktaError::Deserialization("missing field `id`".to_string()));
        assert_eq!(classified.kind, ProviderErrorKind::Upstream);
        assert_eq!(classified.status, None);
    }
}
