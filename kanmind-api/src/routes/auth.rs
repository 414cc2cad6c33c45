/// Authentication endpoints
///
/// - `POST /api/registration`: create an account and its profile
/// - `POST /api/login`: exchange credentials for tokens
/// - `POST /api/token/refresh`: exchange a refresh token for an access token
///
/// Registration and login answer with the same body:
///
/// ```json
/// {
///   "token": "eyJ...",
///   "refresh_token": "eyJ...",
///   "user_id": "uuid",
///   "email": "ada@example.com",
///   "fullname": "Ada Lovelace"
/// }
/// ```

use axum::{extract::State, http::StatusCode, Json};
use kanmind_shared::{
    auth::password,
    models::{CreateUser, User},
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{
    app::AppState,
    error::{ApiError, ApiJson, ApiResult},
};

const INVALID_CREDENTIALS: &str = "Invalid email or password";

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 100, message = "Full name must be 1 to 100 characters"))]
    pub fullname: String,

    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    pub password: String,

    pub repeated_password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    /// Access token
    pub token: String,
    pub refresh_token: String,
    pub user_id: String,
    pub email: String,
    pub fullname: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshResponse {
    pub token: String,
}

impl AuthResponse {
    fn issue(state: &AppState, user: &User) -> ApiResult<Self> {
        let pair = state.tokens.issue_pair(user.id)?;

        Ok(Self {
            token: pair.access_token,
            refresh_token: pair.refresh_token,
            user_id: user.id.to_string(),
            email: user.email.clone(),
            fullname: user.fullname.clone(),
        })
    }
}

/// Argon2 is CPU bound; keep it off the async workers
async fn blocking<T, F>(f: F) -> ApiResult<T>
where
    F: FnOnce() -> Result<T, password::PasswordError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::InternalError(format!("Password task failed: {}", e)))?
        .map_err(ApiError::from)
}

/// Registers a user
///
/// # Errors
///
/// - `400 Bad Request`: invalid fields or passwords that do not match
/// - `409 Conflict`: email already registered
pub async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    req.validate()?;
    password::validate_new_password(&req.password, &req.repeated_password)
        .map_err(|message| ApiError::field("password", message))?;

    let email = req.email.trim().to_lowercase();
    let fullname = req.fullname.trim().to_string();
    if fullname.is_empty() {
        return Err(ApiError::field("fullname", "Full name must not be blank"));
    }

    if state.store.find_user_by_email(&email).await?.is_some() {
        return Err(ApiError::Conflict("Email already registered".to_string()));
    }

    let plain = req.password;
    let password_hash = blocking(move || password::hash_password(&plain)).await?;

    let user = state
        .store
        .create_user(CreateUser {
            email,
            fullname,
            password_hash,
        })
        .await?;

    tracing::info!(user_id = %user.id, "User registered");

    Ok((StatusCode::CREATED, Json(AuthResponse::issue(&state, &user)?)))
}

/// Logs a user in
///
/// Unknown email and wrong password are indistinguishable to the caller.
///
/// # Errors
///
/// - `400 Bad Request`: malformed body
/// - `401 Unauthorized`: invalid credentials
pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    req.validate()?;

    let email = req.email.trim().to_lowercase();
    let Some(user) = state.store.find_user_by_email(&email).await? else {
        tracing::debug!("Login for unknown email");
        return Err(ApiError::Unauthorized(INVALID_CREDENTIALS.to_string()));
    };

    let plain = req.password;
    let hash = user.password_hash.clone();
    let valid = blocking(move || password::verify_password(&plain, &hash)).await?;
    if !valid {
        tracing::debug!(user_id = %user.id, "Login with wrong password");
        return Err(ApiError::Unauthorized(INVALID_CREDENTIALS.to_string()));
    }

    tracing::info!(user_id = %user.id, "User logged in");

    Ok(Json(AuthResponse::issue(&state, &user)?))
}

/// Exchanges a refresh token for a new access token
///
/// # Errors
///
/// - `401 Unauthorized`: invalid, expired, or not a refresh token
pub async fn refresh(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RefreshRequest>,
) -> ApiResult<Json<RefreshResponse>> {
    let token = state.tokens.refresh(&req.refresh_token)?;

    Ok(Json(RefreshResponse { token }))
}
