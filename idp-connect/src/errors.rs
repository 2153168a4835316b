use axum::response::IntoResponse;
use axum::Json;
use http::StatusCode;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Normalized error body returned by every route
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PortalError {
    /// HTTP status code of the response
    pub code: u16,
    pub message: String,
    pub reason: String,
}

impl PortalError {
    pub fn new<M: ToString, R: ToString>(status: StatusCode, message: M, reason: R) -> Self {
        Self {
            code: status.as_u16(),
            message: message.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Create new Bad Request Error (400) with a reason
    pub fn bad_request<R: ToString>(reason: R) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "Bad Request", reason)
    }

    /// Create new Not Found Error (404) with a reason
    pub fn not_found<R: ToString>(reason: R) -> Self {
        Self::new(StatusCode::NOT_FOUND, "Resource Not Found", reason)
    }

    /// Create new Conflict Error (409) with a reason
    pub fn conflict<R: ToString>(reason: R) -> Self {
        Self::new(StatusCode::CONFLICT, "Resource Exists", reason)
    }

    /// Create new Internal Server Error (500) with a reason
    pub fn internal<R: ToString>(reason: R) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error", reason)
    }

    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl std::fmt::Display for PortalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}: {}", self.code, self.message, self.reason)
    }
}

impl IntoResponse for PortalError {
    fn into_response(self) -> axum::response::Response {
        (self.status(), Json(self)).into_response()
    }
}

/// Category of a provider failure, independent of the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    BadRequest,
    NotFound,
    Conflict,
    Upstream,
}

/// A provider failure reduced to what the HTTP layer needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedError {
    pub kind: ProviderErrorKind,
    /// Status reported by the provider, if any
    pub status: Option<u16>,
    pub message: String,
    pub reason: String,
}

impl ClassifiedError {
    pub fn new<M: ToString, R: ToString>(
        kind: ProviderErrorKind,
        status: Option<u16>,
        message: M,
        reason: R,
    ) -> Self {
        Self {
            kind,
            status,
            message: message.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Maps the failure onto the responses a route may return.
    ///
    /// Kinds outside `allowed` collapse to a 500 that keeps the provider's
    /// status in `reason`.
    pub fn into_portal_error(self, allowed: &[ProviderErrorKind]) -> PortalError {
        let kind = if allowed.contains(&self.kind) {
            self.kind
        } else {
            ProviderErrorKind::Upstream
        };

        let status = match kind {
            ProviderErrorKind::BadRequest => StatusCode::BAD_REQUEST,
            ProviderErrorKind::NotFound => StatusCode::NOT_FOUND,
            ProviderErrorKind::Conflict => StatusCode::CONFLICT,
            ProviderErrorKind::Upstream => {
                let reason = match self.status {
                    Some(status) => format!("provider responded {status}: {}", self.reason),
                    None => self.reason,
                };
                return PortalError::new(StatusCode::INTERNAL_SERVER_ERROR, self.message, reason);
            }
        };
        PortalError::new(status, self.message, self.reason)
    }
}
