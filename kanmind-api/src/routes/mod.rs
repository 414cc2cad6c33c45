/// API route handlers
///
/// - `health`: liveness and store connectivity
/// - `auth`: registration, login, token refresh
/// - `profiles`: profile lookup
/// - `boards`, `tasks`, `comments`: the board hierarchy
///
/// Handlers follow one order: resolve the caller, validate the request shape,
/// ask the access policy, then touch the store.

use std::collections::BTreeSet;

use kanmind_shared::{
    auth::{
        authorization::{AuthzError, DenyReason, Principal},
        middleware::AuthContext,
    },
    models::UserId,
};

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};

pub mod auth;
pub mod boards;
pub mod comments;
pub mod health;
pub mod profiles;
pub mod tasks;

/// Resolves the authenticated caller to a policy principal
pub(crate) async fn principal(state: &AppState, auth: AuthContext) -> ApiResult<Principal> {
    Ok(state.policy().resolve_principal(auth.user_id).await?)
}

/// Resolves the caller and requires a profile
///
/// For listings, which have no single target to run a policy check against.
pub(crate) async fn profile_id(state: &AppState, auth: AuthContext) -> ApiResult<UserId> {
    principal(state, auth)
        .await?
        .profile()
        .ok_or_else(|| AuthzError::Forbidden(DenyReason::NoProfile).into())
}

/// Fails with a field error unless every id has a profile
pub(crate) async fn ensure_profiles(
    state: &AppState,
    field: &str,
    ids: &BTreeSet<UserId>,
) -> ApiResult<()> {
    if ids.is_empty() {
        return Ok(());
    }

    let found: BTreeSet<UserId> = state
        .store
        .find_profiles(ids)
        .await?
        .into_iter()
        .map(|profile| profile.id)
        .collect();

    let missing: Vec<String> = ids.difference(&found).map(ToString::to_string).collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(ApiError::field(
            field,
            format!("Unknown user id(s): {}", missing.join(", ")),
        ))
    }
}
