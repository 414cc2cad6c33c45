/// Bearer-token authentication for Axum
///
/// [`require_bearer`] validates the `Authorization: Bearer <token>` header and
/// inserts an [`AuthContext`] into the request extensions. Handlers take
/// `AuthContext` as an extractor; it rejects with 401 when the middleware did
/// not run or did not authenticate the request.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use axum::{middleware, routing::get, Router};
/// use kanmind_shared::auth::jwt::TokenKeys;
/// use kanmind_shared::auth::middleware::{require_bearer, AuthContext};
///
/// async fn whoami(auth: AuthContext) -> String {
///     auth.user_id.to_string()
/// }
///
/// let keys = Arc::new(TokenKeys::new("a-secret-key-of-at-least-32-bytes!!"));
/// let app: Router = Router::new()
///     .route("/whoami", get(whoami))
///     .layer(middleware::from_fn_with_state(keys, require_bearer));
/// ```

use std::sync::Arc;

use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::jwt::{JwtError, TokenKeys, TokenType};
use crate::models::UserId;

/// Authenticated identity attached to a request
///
/// This is only the token subject. Whether the user still has a profile is
/// decided by the access policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthContext {
    pub user_id: UserId,
}

/// Error type for authentication
#[derive(Debug, PartialEq, Eq)]
pub enum AuthError {
    /// No `Authorization` header
    MissingCredentials,

    /// Header present but not `Bearer <token>`
    InvalidFormat(String),

    /// Token rejected (bad signature, expired, wrong type)
    InvalidToken(String),
}

impl AuthError {
    fn message(&self) -> String {
        match self {
            AuthError::MissingCredentials => "Authentication credentials were not provided".to_string(),
            AuthError::InvalidFormat(msg) | AuthError::InvalidToken(msg) => msg.clone(),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": "unauthorized",
            "message": self.message(),
        }));

        (
            StatusCode::UNAUTHORIZED,
            [(header::WWW_AUTHENTICATE, "Bearer")],
            body,
        )
            .into_response()
    }
}

impl From<JwtError> for AuthError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::Expired => AuthError::InvalidToken("Token expired".to_string()),
            JwtError::InvalidIssuer => AuthError::InvalidToken("Invalid issuer".to_string()),
            JwtError::WrongTokenType { .. } => {
                AuthError::InvalidToken("Expected an access token".to_string())
            }
            other => AuthError::InvalidToken(format!("Invalid token: {}", other)),
        }
    }
}

/// Extracts the bearer token from request headers
pub fn bearer_token(headers: &axum::http::HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::MissingCredentials)?
        .to_str()
        .map_err(|_| AuthError::InvalidFormat("Authorization header is not valid ASCII".to_string()))?;

    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AuthError::InvalidFormat("Expected Bearer token".to_string()))
}

/// Middleware validating access tokens
///
/// Use with `axum::middleware::from_fn_with_state`.
pub async fn require_bearer(
    State(keys): State<Arc<TokenKeys>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let token = bearer_token(req.headers())?;

    let claims = keys.validate(token, TokenType::Access).map_err(|e| {
        tracing::debug!(error = %e, "Rejected bearer token");
        AuthError::from(e)
    })?;

    req.extensions_mut().insert(AuthContext {
        user_id: claims.sub,
    });

    Ok(next.run(req).await)
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .copied()
            .ok_or(AuthError::MissingCredentials)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::HeaderMap, middleware, routing::get, Router};
    use tower::ServiceExt;
    use uuid::Uuid;

    const SECRET: &str = "test-secret-key-at-least-32-bytes-long";

    fn app(keys: Arc<TokenKeys>) -> Router {
        async fn whoami(auth: AuthContext) -> String {
            auth.user_id.to_string()
        }

        Router::new()
            .route("/whoami", get(whoami))
            .layer(middleware::from_fn_with_state(keys, require_bearer))
    }

    fn request(auth: Option<&str>) -> Request {
        let mut builder = axum::http::Request::builder().uri("/whoami");
        if let Some(value) = auth {
            builder = builder.header(header::AUTHORIZATION, value);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn test_bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), Err(AuthError::MissingCredentials));

        headers.insert(header::AUTHORIZATION, "Token abc".parse().unwrap());
        assert!(matches!(bearer_token(&headers), Err(AuthError::InvalidFormat(_))));

        headers.insert(header::AUTHORIZATION, "Bearer ".parse().unwrap());
        assert!(matches!(bearer_token(&headers), Err(AuthError::InvalidFormat(_))));

        headers.insert(header::AUTHORIZATION, "Bearer abc.def".parse().unwrap());
        assert_eq!(bearer_token(&headers), Ok("abc.def"));
    }

    #[test]
    fn test_auth_error_is_unauthorized() {
        for err in [
            AuthError::MissingCredentials,
            AuthError::InvalidFormat("x".to_string()),
            AuthError::InvalidToken("x".to_string()),
        ] {
            let response = err.into_response();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
            assert!(response.headers().contains_key(header::WWW_AUTHENTICATE));
        }
    }

    #[tokio::test]
    async fn test_valid_access_token_passes() {
        let keys = Arc::new(TokenKeys::new(SECRET));
        let token = keys.issue(Uuid::new_v4(), TokenType::Access).unwrap();

        let response = app(keys)
            .oneshot(request(Some(&format!("Bearer {}", token))))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_missing_or_refresh_token_is_rejected() {
        let keys = Arc::new(TokenKeys::new(SECRET));

        let response = app(keys.clone()).oneshot(request(None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let refresh = keys.issue(Uuid::new_v4(), TokenType::Refresh).unwrap();
        let response = app(keys)
            .oneshot(request(Some(&format!("Bearer {}", refresh))))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_extractor_without_middleware_rejects() {
        async fn whoami(auth: AuthContext) -> String {
            auth.user_id.to_string()
        }

        let response = Router::new()
            .route("/whoami", get(whoami))
            .oneshot(request(None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
