use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// The error type shared by every layer of subledger
#[derive(Debug, thiserror::Error)]
pub enum SubledgerError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// A write was rejected by a uniqueness constraint.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Connectivity failure against the store (connection refused, pool exhausted).
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// Cache backend failure. Never authoritative, so callers usually log and move on.
    #[error("Cache error: {0}")]
    Cache(String),

    /// A required setting is missing or invalid.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

/// Error body returned to HTTP clients.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    error: String,
    error_id: String,
}

impl SubledgerError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    pub fn cache(msg: impl Into<String>) -> Self {
        Self::Cache(msg.into())
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether another attempt at the same operation could succeed.
    ///
    /// Absence, uniqueness violations and caller mistakes are deterministic
    /// and short-circuit the retry loop.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Unavailable(_) | Self::Cache(_) | Self::Database(_)
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Cache(_) | Self::Configuration(_) | Self::Database(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message suitable for clients.
    ///
    /// Server-side failures are reduced to a generic message; the full error
    /// only goes to the log, keyed by the error id.
    pub(crate) fn safe_message(&self) -> String {
        match self {
            Self::NotFound(_) | Self::BadRequest(_) | Self::Unauthorized(_) | Self::Conflict(_) => {
                self.to_string()
            }
            Self::Unavailable(_) => "Service unavailable".to_string(),
            Self::Database(_) => "Database error".to_string(),
            Self::Cache(_) | Self::Configuration(_) | Self::Internal(_) => {
                "Internal server error".to_string()
            }
        }
    }
}

impl IntoResponse for SubledgerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_id = uuid::Uuid::new_v4().to_string();

        if status.is_server_error() {
            tracing::error!(
                status = status.as_u16(),
                error_id = %error_id,
                error = %self,
                "Request failed"
            );
        } else {
            tracing::debug!(
                status = status.as_u16(),
                error_id = %error_id,
                error = %self,
                "Request rejected"
            );
        }

        let body = ErrorResponse {
            error: self.safe_message(),
            error_id,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias used throughout the crate
pub type Result<T> = std::result::Result<T, SubledgerError>;

impl From<serde_json::Error> for SubledgerError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_data() || err.is_syntax() || err.is_eof() {
            SubledgerError::BadRequest(format!("JSON error: {}", err))
        } else {
            SubledgerError::Internal(format!("JSON serialization error: {}", err))
        }
    }
}

#[cfg(feature = "database")]
impl From<sea_orm::DbErr> for SubledgerError {
    fn from(err: sea_orm::DbErr) -> Self {
        use sea_orm::{DbErr, SqlErr};

        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(msg)) => {
                return SubledgerError::Conflict(msg);
            }
            Some(SqlErr::ForeignKeyConstraintViolation(msg)) => {
                return SubledgerError::BadRequest(format!("Referenced record missing: {}", msg));
            }
            _ => {}
        }

        match &err {
            DbErr::RecordNotFound(msg) => SubledgerError::NotFound(if msg.is_empty() {
                "Record not found".to_string()
            } else {
                msg.clone()
            }),
            DbErr::RecordNotUpdated => SubledgerError::NotFound("Record no longer exists".to_string()),
            DbErr::ConnectionAcquire(inner) => {
                SubledgerError::Unavailable(format!("Connection pool: {}", inner))
            }
            DbErr::Conn(inner) => SubledgerError::Unavailable(format!("Connection error: {}", inner)),
            DbErr::Query(inner) => SubledgerError::Database(format!("Query error: {}", inner)),
            DbErr::Exec(inner) => SubledgerError::Database(format!("Execution error: {}", inner)),
            DbErr::Type(inner) => SubledgerError::Internal(format!("Type error: {}", inner)),
            DbErr::Json(inner) => SubledgerError::Internal(format!("JSON error: {}", inner)),
            DbErr::Migration(inner) => SubledgerError::Database(format!("Migration error: {}", inner)),
            _ => SubledgerError::Database(format!("Database error: {}", err)),
        }
    }
}

#[cfg(feature = "cache-redis")]
impl From<redis::RedisError> for SubledgerError {
    fn from(err: redis::RedisError) -> Self {
        SubledgerError::Cache(format!("Redis {}: {}", err.category(), err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_error() {
        let err = SubledgerError::not_found("Subscription not found");
        assert!(matches!(err, SubledgerError::NotFound(_)));
        assert_eq!(err.to_string(), "Not found: Subscription not found");
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_conflict_maps_to_409() {
        let err = SubledgerError::conflict("subscription already exists");
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert_eq!(err.safe_message(), "Conflict: subscription already exists");
    }

    #[test]
    fn test_retryable_classification() {
        assert!(SubledgerError::unavailable("refused").is_retryable());
        assert!(SubledgerError::cache("io").is_retryable());
        assert!(SubledgerError::database("deadlock").is_retryable());

        assert!(!SubledgerError::not_found("plan").is_retryable());
        assert!(!SubledgerError::conflict("dup").is_retryable());
        assert!(!SubledgerError::bad_request("body").is_retryable());
        assert!(!SubledgerError::configuration("JWT_SECRET").is_retryable());
        assert!(!SubledgerError::internal("bug").is_retryable());
    }

    #[test]
    fn test_safe_message_hides_server_details() {
        let err = SubledgerError::database("relation \"subscriptions\" does not exist");
        assert_eq!(err.safe_message(), "Database error");

        let err = SubledgerError::configuration("JWT_SECRET is not set");
        assert_eq!(err.safe_message(), "Internal server error");
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_unavailable_maps_to_503() {
        let err = SubledgerError::unavailable("pool timed out");
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.safe_message(), "Service unavailable");
    }

    #[test]
    fn test_json_syntax_error_is_bad_request() {
        let err: SubledgerError = serde_json::from_str::<serde_json::Value>("{not json")
            .unwrap_err()
            .into();
        assert!(matches!(err, SubledgerError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_into_response_carries_error_id() {
        let response = SubledgerError::not_found("Plan not found").into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "Not found: Plan not found");
        assert!(body["error_id"].as_str().is_some_and(|id| !id.is_empty()));
    }

    #[cfg(feature = "database")]
    #[test]
    fn test_record_not_found_maps_to_not_found() {
        let err: SubledgerError = sea_orm::DbErr::RecordNotFound(String::new()).into();
        assert!(matches!(err, SubledgerError::NotFound(ref m) if m == "Record not found"));
    }
}
