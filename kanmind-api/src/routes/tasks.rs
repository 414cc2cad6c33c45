/// Task endpoints
///
/// Tasks inherit visibility from their board: the board owner and members
/// may read, create and edit them. Deleting is narrower and limited to the
/// board owner, the assignee and the reviewer.
///
/// Assignee and reviewer must be the board owner or a member. The board of a
/// task never changes after creation.

use axum::{extract::State, http::StatusCode, Json};
use chrono::NaiveDate;
use kanmind_shared::{
    auth::{middleware::AuthContext, policy::TaskAction},
    models::{
        Board, BoardId, CreateTask, Task, TaskId, TaskPriority, TaskScope, TaskStatus, UpdateTask,
        UserId,
    },
};
use serde::{Deserialize, Deserializer};
use validator::Validate;

use super::{principal, profile_id};
use crate::{
    app::AppState,
    error::{ApiError, ApiJson, ApiPath, ApiResult},
};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTaskRequest {
    /// Target board; required. Kept raw so that an id which cannot name a
    /// board reads as a missing board rather than a malformed request.
    pub board: Option<serde_json::Value>,

    #[validate(length(min = 1, max = 255, message = "Title must be 1 to 255 characters"))]
    pub title: String,

    pub description: Option<String>,

    #[serde(default)]
    pub status: TaskStatus,

    #[serde(default)]
    pub priority: TaskPriority,

    pub assignee_id: Option<UserId>,
    pub reviewer_id: Option<UserId>,
    pub due_date: NaiveDate,
}

/// Partial update; absent fields stay as they are, `null` clears nullable ones
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateTaskRequest {
    /// Accepted only when equal to the current board
    pub board: Option<BoardId>,

    #[validate(length(min = 1, max = 255, message = "Title must be 1 to 255 characters"))]
    pub title: Option<String>,

    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,

    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,

    #[serde(default, deserialize_with = "nullable")]
    pub assignee_id: Option<Option<UserId>>,

    #[serde(default, deserialize_with = "nullable")]
    pub reviewer_id: Option<Option<UserId>>,

    pub due_date: Option<NaiveDate>,
}

/// Tells a present `null` (`Some(None)`) apart from an absent field (`None`)
fn nullable<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn clean_title(title: &str) -> ApiResult<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(ApiError::field("title", "Title must not be blank"));
    }
    Ok(title.to_string())
}

/// Resolves the `board` of a create request
///
/// Absent or `null` is a validation error. Anything present that is not a
/// UUID string cannot refer to an existing board and is reported as 404.
fn board_reference(raw: Option<&serde_json::Value>) -> ApiResult<BoardId> {
    let Some(value) = raw else {
        return Err(ApiError::field("board", "Board is required"));
    };

    value
        .as_str()
        .and_then(|s| s.parse::<BoardId>().ok())
        .ok_or_else(|| ApiError::NotFound(format!("Board {} not found", value)))
}

/// Assignee and reviewer must have access to the board
fn check_participant(board: &Board, field: &str, user_id: Option<UserId>) -> ApiResult<()> {
    match user_id {
        Some(id) if !board.has_access(id) => Err(ApiError::field(
            field,
            format!("User {} is not a member of board {}", id, board.id),
        )),
        _ => Ok(()),
    }
}

async fn list_scoped(state: &AppState, auth: AuthContext, scope: TaskScope) -> ApiResult<Json<Vec<Task>>> {
    let user_id = profile_id(state, auth).await?;

    Ok(Json(state.store.list_tasks(user_id, scope).await?))
}

/// `GET /api/tasks`: every task on a board visible to the caller
pub async fn list_tasks(State(state): State<AppState>, auth: AuthContext) -> ApiResult<Json<Vec<Task>>> {
    list_scoped(&state, auth, TaskScope::Visible).await
}

pub async fn assigned_to_me(
    State(state): State<AppState>,
    auth: AuthContext,
) -> ApiResult<Json<Vec<Task>>> {
    list_scoped(&state, auth, TaskScope::AssignedTo).await
}

pub async fn reviewing(State(state): State<AppState>, auth: AuthContext) -> ApiResult<Json<Vec<Task>>> {
    list_scoped(&state, auth, TaskScope::Reviewing).await
}

/// Creates a task
///
/// # Errors
///
/// - `400 Bad Request`: `board` missing, invalid fields, non-member assignee or reviewer
/// - `404 Not Found`: board does not exist, or `board` is not a UUID
/// - `403 Forbidden`: caller is neither owner nor member of the board
pub async fn create_task(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiJson(req): ApiJson<CreateTaskRequest>,
) -> ApiResult<(StatusCode, Json<Task>)> {
    let principal = principal(&state, auth).await?;

    let board_id = board_reference(req.board.as_ref())?;
    req.validate()?;
    let title = clean_title(&req.title)?;

    let board = state
        .policy()
        .create_task(principal, board_id)
        .await?
        .into_result()?;

    check_participant(&board, "assignee_id", req.assignee_id)?;
    check_participant(&board, "reviewer_id", req.reviewer_id)?;

    let task = state
        .store
        .create_task(CreateTask {
            board_id,
            title,
            description: req.description,
            status: req.status,
            priority: req.priority,
            assignee_id: req.assignee_id,
            reviewer_id: req.reviewer_id,
            due_date: req.due_date,
        })
        .await?;

    tracing::info!(task_id = %task.id, %board_id, user_id = %principal.user_id(), "Task created");

    Ok((StatusCode::CREATED, Json(task)))
}

pub async fn get_task(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiPath(task_id): ApiPath<TaskId>,
) -> ApiResult<Json<Task>> {
    let principal = principal(&state, auth).await?;

    let ctx = state
        .policy()
        .task(principal, task_id, TaskAction::View)
        .await?
        .into_result()?;

    Ok(Json(ctx.task))
}

/// Applies a partial update
///
/// # Errors
///
/// - `400 Bad Request`: `board` differs from the current board, invalid fields,
///   non-member assignee or reviewer
/// - `404 Not Found` / `403 Forbidden`: as for reading the task
pub async fn update_task(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiPath(task_id): ApiPath<TaskId>,
    ApiJson(req): ApiJson<UpdateTaskRequest>,
) -> ApiResult<Json<Task>> {
    let principal = principal(&state, auth).await?;

    req.validate()?;
    let title = req.title.as_deref().map(clean_title).transpose()?;

    let ctx = state
        .policy()
        .task(principal, task_id, TaskAction::Edit)
        .await?
        .into_result()?;

    if let Some(board_id) = req.board {
        if board_id != ctx.task.board_id {
            return Err(ApiError::field("board", "The board of a task cannot be changed"));
        }
    }
    if let Some(assignee_id) = req.assignee_id {
        check_participant(&ctx.board, "assignee_id", assignee_id)?;
    }
    if let Some(reviewer_id) = req.reviewer_id {
        check_participant(&ctx.board, "reviewer_id", reviewer_id)?;
    }

    let changes = UpdateTask {
        title,
        description: req.description,
        status: req.status,
        priority: req.priority,
        assignee_id: req.assignee_id,
        reviewer_id: req.reviewer_id,
        due_date: req.due_date,
    };
    if changes.is_empty() {
        return Ok(Json(ctx.task));
    }

    let task = state
        .store
        .update_task(task_id, changes)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Task {} not found", task_id)))?;

    tracing::info!(%task_id, user_id = %principal.user_id(), "Task updated");

    Ok(Json(task))
}

/// Deletes a task; allowed for the board owner, the assignee and the reviewer
pub async fn delete_task(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiPath(task_id): ApiPath<TaskId>,
) -> ApiResult<StatusCode> {
    let principal = principal(&state, auth).await?;

    state
        .policy()
        .task(principal, task_id, TaskAction::Delete)
        .await?
        .into_result()?;

    if !state.store.delete_task(task_id).await? {
        return Err(ApiError::NotFound(format!("Task {} not found", task_id)));
    }

    tracing::info!(%task_id, user_id = %principal.user_id(), "Task deleted");

    Ok(StatusCode::NO_CONTENT)
}
