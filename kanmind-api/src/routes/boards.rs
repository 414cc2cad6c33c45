/// Board endpoints
///
/// | Method | Path | Who |
/// |---|---|---|
/// | GET | `/api/boards` | boards the caller owns or belongs to |
/// | POST | `/api/boards` | any caller with a profile |
/// | GET | `/api/boards/:board_id` | owner or member |
/// | PATCH | `/api/boards/:board_id` | owner or member |
/// | DELETE | `/api/boards/:board_id` | owner |

use std::collections::BTreeSet;

use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use kanmind_shared::{
    auth::{middleware::AuthContext, policy::BoardAction},
    models::{Board, BoardId, BoardSummary, CreateBoard, Task, UpdateBoard, UserId, UserProfile},
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{ensure_profiles, principal, profile_id};
use crate::{
    app::AppState,
    error::{ApiError, ApiJson, ApiPath, ApiResult},
};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateBoardRequest {
    #[validate(length(min = 1, max = 255, message = "Title must be 1 to 255 characters"))]
    pub title: String,

    #[serde(default)]
    pub members: Vec<UserId>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateBoardRequest {
    #[validate(length(min = 1, max = 255, message = "Title must be 1 to 255 characters"))]
    pub title: Option<String>,

    /// Replaces the member set
    pub members: Option<Vec<UserId>>,
}

/// Board with resolved member profiles and its tasks
#[derive(Debug, Serialize, Deserialize)]
pub struct BoardDetail {
    pub id: BoardId,
    pub title: String,
    pub owner_id: UserId,
    pub created_at: DateTime<Utc>,
    pub members: Vec<UserProfile>,
    pub tasks: Vec<Task>,
}

fn clean_title(title: &str) -> ApiResult<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(ApiError::field("title", "Title must not be blank"));
    }
    Ok(title.to_string())
}

async fn detail(state: &AppState, board: Board) -> ApiResult<BoardDetail> {
    let members = state.store.find_profiles(&board.members).await?;
    let tasks = state.store.list_board_tasks(board.id).await?;

    Ok(BoardDetail {
        id: board.id,
        title: board.title,
        owner_id: board.owner_id,
        created_at: board.created_at,
        members,
        tasks,
    })
}

pub async fn list_boards(
    State(state): State<AppState>,
    auth: AuthContext,
) -> ApiResult<Json<Vec<BoardSummary>>> {
    let user_id = profile_id(&state, auth).await?;

    Ok(Json(state.store.list_board_summaries(user_id).await?))
}

/// Creates a board owned by the caller
///
/// The owner is always added to the member set.
pub async fn create_board(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiJson(req): ApiJson<CreateBoardRequest>,
) -> ApiResult<(StatusCode, Json<Board>)> {
    let principal = principal(&state, auth).await?;

    req.validate()?;
    let title = clean_title(&req.title)?;
    let members: BTreeSet<UserId> = req.members.into_iter().collect();

    let owner_id = state.policy().create_board(principal).into_result()?;
    ensure_profiles(&state, "members", &members).await?;

    let board = state
        .store
        .create_board(CreateBoard::new(title, owner_id, members))
        .await?;

    tracing::info!(board_id = %board.id, %owner_id, members = board.members.len(), "Board created");

    Ok((StatusCode::CREATED, Json(board)))
}

pub async fn get_board(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiPath(board_id): ApiPath<BoardId>,
) -> ApiResult<Json<BoardDetail>> {
    let principal = principal(&state, auth).await?;

    let board = state
        .policy()
        .board(principal, board_id, BoardAction::View)
        .await?
        .into_result()?;

    Ok(Json(detail(&state, board).await?))
}

/// Updates the title and/or replaces the member set
pub async fn update_board(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiPath(board_id): ApiPath<BoardId>,
    ApiJson(req): ApiJson<UpdateBoardRequest>,
) -> ApiResult<Json<BoardDetail>> {
    let principal = principal(&state, auth).await?;

    req.validate()?;
    let title = req.title.as_deref().map(clean_title).transpose()?;
    let members: Option<BTreeSet<UserId>> = req.members.map(|ids| ids.into_iter().collect());

    state
        .policy()
        .board(principal, board_id, BoardAction::Manage)
        .await?
        .into_result()?;

    if let Some(members) = &members {
        ensure_profiles(&state, "members", members).await?;
    }

    let board = state
        .store
        .update_board(board_id, UpdateBoard { title, members })
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Board {} not found", board_id)))?;

    tracing::info!(%board_id, user_id = %principal.user_id(), "Board updated");

    Ok(Json(detail(&state, board).await?))
}

pub async fn delete_board(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiPath(board_id): ApiPath<BoardId>,
) -> ApiResult<StatusCode> {
    let principal = principal(&state, auth).await?;

    state
        .policy()
        .board(principal, board_id, BoardAction::Delete)
        .await?
        .into_result()?;

    if !state.store.delete_board(board_id).await? {
        return Err(ApiError::NotFound(format!("Board {} not found", board_id)));
    }

    tracing::info!(%board_id, user_id = %principal.user_id(), "Board deleted");

    Ok(StatusCode::NO_CONTENT)
}
