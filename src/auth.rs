//! Bearer-token authentication for the HTTP API.
//!
//! Tokens are configured in `[auth]` and map to owner ids; everything a key
//! creates is scoped to its owner.

use crate::config::AuthSettings;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::{header, request::Parts, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;

/// The owner id resolved from the request's bearer token.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub String);

/// Rejection for missing or invalid credentials.
#[derive(Debug)]
pub struct AuthRejection(String);

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({ "success": false, "error": self.0 })),
        )
            .into_response()
    }
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    AuthSettings: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        let auth = AuthSettings::from_ref(state);

        let header_value = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AuthRejection("Missing Authorization header".to_string()))?;

        let token = header_value
            .strip_prefix("Bearer ")
            .ok_or_else(|| AuthRejection("Expected a bearer token".to_string()))?
            .trim();

        match auth.owner_for_token(token) {
            Some(owner) => Ok(AuthenticatedUser(owner.to_string())),
            None => Err(AuthRejection("Invalid API token".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ApiKey;
    use axum::http::Request;

    fn auth_settings() -> AuthSettings {
        AuthSettings {
            keys: vec![ApiKey {
                token: "secret-1".to_string(),
                owner: "alice".to_string(),
            }],
        }
    }

    async fn extract(header_value: Option<&str>) -> std::result::Result<String, String> {
        let mut builder = Request::builder().uri("/records");
        if let Some(value) = header_value {
            builder = builder.header(header::AUTHORIZATION, value);
        }
        let request = builder.body(()).unwrap();
        let (mut parts, _) = request.into_parts();

        AuthenticatedUser::from_request_parts(&mut parts, &auth_settings())
            .await
            .map(|u| u.0)
            .map_err(|r| r.0)
    }

    #[tokio::test]
    async fn test_valid_token_resolves_owner() {
        assert_eq!(extract(Some("Bearer secret-1")).await.unwrap(), "alice");
    }

    #[tokio::test]
    async fn test_missing_header_is_rejected() {
        let err = extract(None).await.unwrap_err();
        assert!(err.contains("Missing"));
    }

    #[tokio::test]
    async fn test_unknown_token_is_rejected() {
        let err = extract(Some("Bearer nope")).await.unwrap_err();
        assert!(err.contains("Invalid"));
    }

    #[tokio::test]
    async fn test_non_bearer_scheme_is_rejected() {
        let err = extract(Some("Basic abc")).await.unwrap_err();
        assert!(err.contains("bearer"));
    }
}
