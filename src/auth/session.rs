//! Session tokens: HS256 JWTs carrying the user id.

use crate::config::AuthConfig;
use crate::error::{Result, SubledgerError};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Claims embedded in every session token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    pub user_id: i64,
    /// Expiry, seconds since the Unix epoch
    pub exp: i64,
    /// Issued at, seconds since the Unix epoch
    pub iat: i64,
}

/// Signs session tokens
#[derive(Clone)]
pub struct SessionIssuer {
    key: Arc<EncodingKey>,
    ttl: Duration,
}

impl SessionIssuer {
    pub fn from_secret(secret: &[u8], ttl: Duration) -> Self {
        Self {
            key: Arc::new(EncodingKey::from_secret(secret)),
            ttl,
        }
    }

    /// Issuer for the configured secret and token TTL
    pub fn from_config(config: &AuthConfig) -> Result<Self> {
        Ok(Self::from_secret(config.secret()?.as_bytes(), config.token_ttl()))
    }

    /// Lifetime of issued tokens
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Sign a token for `user_id` valid from now for the configured TTL
    pub fn issue(&self, user_id: i64) -> Result<String> {
        let iat = chrono::Utc::now().timestamp();
        let ttl = i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX);
        let claims = SessionClaims {
            user_id,
            exp: iat.saturating_add(ttl),
            iat,
        };
        self.sign(&claims)
    }

    /// Sign arbitrary claims
    pub fn sign(&self, claims: &SessionClaims) -> Result<String> {
        encode(&Header::new(Algorithm::HS256), claims, &self.key)
            .map_err(|e| SubledgerError::internal(format!("Failed to sign session token: {}", e)))
    }
}

/// Verifies session tokens
#[derive(Clone)]
pub struct SessionVerifier {
    key: Arc<DecodingKey>,
    validation: Validation,
}

impl SessionVerifier {
    pub fn from_secret(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.set_required_spec_claims(&["exp"]);

        Self {
            key: Arc::new(DecodingKey::from_secret(secret)),
            validation,
        }
    }

    pub fn from_config(config: &AuthConfig) -> Result<Self> {
        Ok(Self::from_secret(config.secret()?.as_bytes()))
    }

    /// Decode and validate `token`; any failure is `Unauthorized`
    pub fn verify(&self, token: &str) -> Result<SessionClaims> {
        decode::<SessionClaims>(token, &self.key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(error = %e, "Session token rejected");
                match e.kind() {
                    ErrorKind::ExpiredSignature => SubledgerError::unauthorized("token expired"),
                    _ => SubledgerError::unauthorized("invalid token"),
                }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"test-secret";

    #[test]
    fn test_issued_token_verifies() {
        let issuer = SessionIssuer::from_secret(SECRET, Duration::from_secs(86_400));
        let token = issuer.issue(42).unwrap();

        let claims = SessionVerifier::from_secret(SECRET).verify(&token).unwrap();
        assert_eq!(claims.user_id, 42);
        assert_eq!(claims.exp - claims.iat, 86_400);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = SessionIssuer::from_secret(SECRET, Duration::from_secs(60))
            .issue(1)
            .unwrap();

        let err = SessionVerifier::from_secret(b"other").verify(&token).unwrap_err();
        assert!(matches!(err, SubledgerError::Unauthorized(ref m) if m == "invalid token"));
    }

    #[test]
    fn test_expired_token_rejected() {
        let issuer = SessionIssuer::from_secret(SECRET, Duration::from_secs(60));
        let now = chrono::Utc::now().timestamp();
        let token = issuer
            .sign(&SessionClaims {
                user_id: 1,
                exp: now - 3_600,
                iat: now - 7_200,
            })
            .unwrap();

        let err = SessionVerifier::from_secret(SECRET).verify(&token).unwrap_err();
        assert!(matches!(err, SubledgerError::Unauthorized(ref m) if m == "token expired"));
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(SessionVerifier::from_secret(SECRET).verify("not.a.jwt").is_err());
    }

    #[test]
    fn test_from_config_requires_secret() {
        assert!(SessionIssuer::from_config(&AuthConfig::default()).is_err());
        assert!(SessionVerifier::from_config(&AuthConfig::default()).is_err());
    }
}
