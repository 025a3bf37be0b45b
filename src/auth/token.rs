use crate::error::SubledgerError;
use axum::http::{header, request::Parts};

/// Pulls the bearer token out of a request
pub struct TokenExtractor;

impl TokenExtractor {
    /// Token from `Authorization: Bearer <token>`
    pub fn from_header(parts: &Parts) -> Result<String, SubledgerError> {
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| SubledgerError::unauthorized("missing token"))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| SubledgerError::unauthorized("missing token"))?
            .trim();

        if token.is_empty() {
            return Err(SubledgerError::unauthorized("missing token"));
        }

        Ok(token.to_string())
    }
}
