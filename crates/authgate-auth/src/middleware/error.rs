//! Error response handling for authentication middleware.
//!
//! Implements `IntoResponse` for `AuthError` so extractors and handlers can
//! bubble it straight out of a route. Store and configuration failures are
//! never detailed to clients; they surface as an opaque 500.

use axum::{
    Json,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::error::AuthError;

// ============================================================================
// IntoResponse Implementation
// ============================================================================

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = error_details(&self);
        let reason = self.reason_code();

        if status.is_server_error() {
            tracing::error!(error = %self, "request failed with server error");
        }

        let body = json!({
            "error": reason,
            "message": message,
        });

        let mut headers = HeaderMap::new();
        if status == StatusCode::UNAUTHORIZED {
            let www_auth = build_www_authenticate_header(reason, &message);
            if let Ok(value) = HeaderValue::from_str(&www_auth) {
                headers.insert(header::WWW_AUTHENTICATE, value);
            }
        }

        (status, headers, Json(body)).into_response()
    }
}

/// Maps an `AuthError` to its HTTP status and client-safe message.
fn error_details(error: &AuthError) -> (StatusCode, String) {
    match error {
        AuthError::Expired => (StatusCode::UNAUTHORIZED, "Token has expired".to_string()),
        AuthError::Malformed { message } | AuthError::Invalid { message } => {
            (StatusCode::UNAUTHORIZED, message.clone())
        }
        AuthError::Revoked => (
            StatusCode::UNAUTHORIZED,
            "Token has been revoked".to_string(),
        ),
        AuthError::Unauthorized { message } => (StatusCode::UNAUTHORIZED, message.clone()),
        AuthError::InvalidCredentials => {
            (StatusCode::UNAUTHORIZED, "Invalid credentials".to_string())
        }
        // Internal details stay in the logs.
        AuthError::Store { .. } | AuthError::Configuration { .. } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error".to_string(),
        ),
    }
}

/// Builds the WWW-Authenticate header value for 401 responses.
///
/// Format: `Bearer realm="authgate", error="token_expired", error_description="..."`
fn build_www_authenticate_header(error: &str, description: &str) -> String {
    let escaped_desc = description.replace('\"', "\\\"");
    format!("Bearer realm=\"authgate\", error=\"{error}\", error_description=\"{escaped_desc}\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn test_expired_response() {
        let response = AuthError::Expired.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let www_auth = response
            .headers()
            .get(header::WWW_AUTHENTICATE)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert!(www_auth.contains("Bearer"));
        assert!(www_auth.contains("realm=\"authgate\""));
        assert!(www_auth.contains("error=\"token_expired\""));

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "token_expired");
    }

    #[tokio::test]
    async fn test_revoked_response() {
        let response = AuthError::Revoked.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "token_revoked");
    }

    #[tokio::test]
    async fn test_store_failure_is_opaque() {
        let response = AuthError::store("redis: connection refused").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!response.headers().contains_key(header::WWW_AUTHENTICATE));

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "server_error");
        // Backend details never reach the client.
        assert!(!json["message"].as_str().unwrap().contains("redis"));
    }

    #[tokio::test]
    async fn test_invalid_credentials_response() {
        let response = AuthError::InvalidCredentials.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "invalid_credentials");
    }

    #[test]
    fn test_www_authenticate_header_escaping() {
        let header = build_www_authenticate_header("token_invalid", "Token contains \"quotes\"");
        assert!(header.contains("\\\"quotes\\\""));
    }
}
