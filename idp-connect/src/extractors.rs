use crate::errors::PortalError;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request};
use axum::Json;
use http::HeaderMap;
use log::debug;

/// Header some callers send with an access token for the adapter itself
pub const TOKEN_HEADER: &str = "token";

/// JSON body extractor that rejects malformed or missing bodies with a
/// [`PortalError`] instead of axum's plain-text rejection
pub struct PortalJson<T>(pub T);

impl<T, S> FromRequest<S> for PortalJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = PortalError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => {
                debug!("Rejected request body: {}", rejection.body_text());
                Err(PortalError::bad_request(rejection.body_text()))
            }
        }
    }
}

/// Notes the presence of the `token` header, never its value
pub fn log_token_header(headers: &HeaderMap) {
    if headers.contains_key(TOKEN_HEADER) {
        debug!("Request carries a {} header, ignoring it", TOKEN_HEADER);
    }
}
