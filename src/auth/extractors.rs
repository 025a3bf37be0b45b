use crate::app::AppContext;
use crate::auth::token::TokenExtractor;
use crate::error::SubledgerError;
use axum::{extract::FromRequestParts, http::request::Parts};
use std::future::Future;

/// Axum extractor for the authenticated user's id.
///
/// Rejects the request with 401 when the bearer token is missing, malformed,
/// badly signed or expired.
///
/// ```rust,ignore
/// async fn handler(AuthUser(user_id): AuthUser) -> String {
///     format!("user {}", user_id)
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser(pub i64);

impl FromRequestParts<AppContext> for AuthUser {
    type Rejection = SubledgerError;

    fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> impl Future<Output = Result<Self, Self::Rejection>> + Send {
        let outcome = TokenExtractor::from_header(parts)
            .and_then(|token| state.sessions().verify(&token))
            .map(|claims| AuthUser(claims.user_id));

        async move { outcome }
    }
}
