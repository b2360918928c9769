use crate::error::ApiError;
use crate::http_server::AppState;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use tracing::warn;

/// Auth gate for protected routes.
///
/// Extracts `Authorization: Bearer <token>`, authenticates it inline and
/// stores the [`Principal`](crate::auth::Principal) in request extensions.
/// Every rejection becomes the same 401; the handler is not invoked.
pub async fn require_bearer(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(token) = bearer_token(request.headers()) else {
        warn!(
            path = %request.uri().path(),
            error_type = "missing_token",
            "Rejected request without bearer token"
        );
        return Err(ApiError::Unauthorized);
    };

    let result = state.authenticator.authenticate(token).await;
    match result {
        Ok(principal) => {
            request.extensions_mut().insert(principal);
            Ok(next.run(request).await)
        }
        Err(e) => {
            warn!(
                path = %request.uri().path(),
                error_type = e.kind(),
                error = %e,
                "Bearer token rejected"
            );
            Err(ApiError::Unauthorized)
        }
    }
}

/// Token from an `Authorization: Bearer` header; the scheme is case-insensitive
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}
