/// Profile lookup endpoints
///
/// Profiles are the public projection of users (`id`, `fullname`, `email`).
/// Any authenticated caller may read them; the board UI needs them to pick
/// members, assignees and reviewers.

use axum::{extract::State, Json};
use kanmind_shared::{
    auth::middleware::AuthContext,
    models::{UserId, UserProfile},
};
use serde::Deserialize;
use validator::Validate;

use crate::{
    app::AppState,
    error::{ApiError, ApiPath, ApiQuery, ApiResult},
};

#[derive(Debug, Deserialize, Validate)]
pub struct EmailCheckQuery {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
}

pub async fn list_profiles(
    State(state): State<AppState>,
    _auth: AuthContext,
) -> ApiResult<Json<Vec<UserProfile>>> {
    Ok(Json(state.store.list_profiles().await?))
}

pub async fn get_profile(
    State(state): State<AppState>,
    _auth: AuthContext,
    ApiPath(user_id): ApiPath<UserId>,
) -> ApiResult<Json<UserProfile>> {
    state
        .store
        .find_profile(user_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Profile {} not found", user_id)))
}

/// `GET /api/email-check?email=...`
///
/// Returns the profile registered under the email, 404 if there is none.
pub async fn email_check(
    State(state): State<AppState>,
    _auth: AuthContext,
    ApiQuery(query): ApiQuery<EmailCheckQuery>,
) -> ApiResult<Json<UserProfile>> {
    query.validate()?;

    let email = query.email.trim().to_lowercase();
    state
        .store
        .find_profile_by_email(&email)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("No profile with this email".to_string()))
}
