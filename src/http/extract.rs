use crate::error::SubledgerError;
use axum::{Json, extract::Request};
use serde::de::DeserializeOwned;

/// JSON body extractor whose rejections use the crate error format
///
/// axum's own `Json` answers malformed bodies with a plain-text 400/415/422;
/// this maps every rejection to a `BadRequest` so clients always get the
/// `{ "error": ... }` body.
pub struct JsonBody<T>(pub T);

impl<T, S> axum::extract::FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = SubledgerError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| SubledgerError::bad_request(format!("Invalid input: {}", e.body_text())))?;
        Ok(JsonBody(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Router, body::Body, http::StatusCode, routing::post};
    use serde::Deserialize;
    use tower::ServiceExt;

    #[derive(Deserialize)]
    struct Payload {
        n: i64,
    }

    async fn echo(JsonBody(body): JsonBody<Payload>) -> String {
        body.n.to_string()
    }

    async fn send(body: &'static str, content_type: &'static str) -> StatusCode {
        let app = Router::new().route("/", post(echo));
        let request = axum::http::Request::post("/")
            .header("content-type", content_type)
            .body(Body::from(body))
            .unwrap();
        app.oneshot(request).await.unwrap().status()
    }

    #[tokio::test]
    async fn test_valid_body() {
        assert_eq!(send(r#"{"n":3}"#, "application/json").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_rejections_are_bad_request() {
        assert_eq!(send("{", "application/json").await, StatusCode::BAD_REQUEST);
        assert_eq!(send(r#"{"n":"x"}"#, "application/json").await, StatusCode::BAD_REQUEST);
        assert_eq!(send(r#"{"n":3}"#, "text/plain").await, StatusCode::BAD_REQUEST);
    }
}
