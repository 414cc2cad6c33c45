/// Comment endpoints, nested under a task
///
/// Reading and writing comments requires access to the task's board. Only the
/// author may delete a comment; the board owner has no override.

use axum::{extract::State, http::StatusCode, Json};
use kanmind_shared::{
    auth::middleware::AuthContext,
    models::{Comment, CommentId, CreateComment, TaskId},
};
use serde::Deserialize;
use validator::Validate;

use super::principal;
use crate::{
    app::AppState,
    error::{ApiError, ApiJson, ApiPath, ApiResult},
};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCommentRequest {
    #[validate(length(max = 10000, message = "Comment must be at most 10000 characters"))]
    pub content: String,
}

pub async fn list_comments(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiPath(task_id): ApiPath<TaskId>,
) -> ApiResult<Json<Vec<Comment>>> {
    let principal = principal(&state, auth).await?;

    state
        .policy()
        .task_comments(principal, task_id)
        .await?
        .into_result()?;

    Ok(Json(state.store.list_comments(task_id).await?))
}

/// Adds a comment authored by the caller
///
/// # Errors
///
/// - `400 Bad Request`: content empty or whitespace only
/// - `404 Not Found`: task does not exist
/// - `403 Forbidden`: caller has no access to the task's board
pub async fn create_comment(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiPath(task_id): ApiPath<TaskId>,
    ApiJson(req): ApiJson<CreateCommentRequest>,
) -> ApiResult<(StatusCode, Json<Comment>)> {
    let principal = principal(&state, auth).await?;

    req.validate()?;
    let content = req.content.trim();
    if content.is_empty() {
        return Err(ApiError::field("content", "Comment must not be empty"));
    }

    state
        .policy()
        .task_comments(principal, task_id)
        .await?
        .into_result()?;

    let comment = state
        .store
        .create_comment(CreateComment {
            task_id,
            author_id: principal.user_id(),
            content: content.to_string(),
        })
        .await?;

    tracing::info!(comment_id = %comment.id, %task_id, author_id = %comment.author_id, "Comment created");

    Ok((StatusCode::CREATED, Json(comment)))
}

pub async fn delete_comment(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiPath((task_id, comment_id)): ApiPath<(TaskId, CommentId)>,
) -> ApiResult<StatusCode> {
    let principal = principal(&state, auth).await?;

    state
        .policy()
        .delete_comment(principal, task_id, comment_id)
        .await?
        .into_result()?;

    if !state.store.delete_comment(comment_id).await? {
        return Err(ApiError::NotFound(format!("Comment {} not found", comment_id)));
    }

    tracing::info!(%comment_id, %task_id, user_id = %principal.user_id(), "Comment deleted");

    Ok(StatusCode::NO_CONTENT)
}
