//! PostgreSQL-backed [`EntityStore`]
//!
//! Thin adapter over the model operations in [`crate::models`], translating
//! constraint violations into [`StoreError`] variants.

use std::collections::BTreeSet;

use async_trait::async_trait;
use sqlx::PgPool;

use super::{EntityStore, StoreError, StoreResult};
use crate::db::pool::health_check;
use crate::models::{
    Board, BoardId, BoardSummary, Comment, CommentId, CreateBoard, CreateComment, CreateTask,
    CreateUser, Task, TaskId, TaskScope, UpdateBoard, UpdateTask, User, UserId, UserProfile,
};

/// Entity store over a PostgreSQL connection pool
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Maps constraint violations to domain errors, everything else stays a
/// database error
fn classify(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        let constraint = db_err.constraint().unwrap_or("unknown").to_string();

        if db_err.is_unique_violation() {
            if constraint.contains("email") {
                return StoreError::Conflict("Email already registered".to_string());
            }
            return StoreError::Conflict(format!("Constraint violation: {}", constraint));
        }

        if db_err.is_foreign_key_violation() {
            return StoreError::InvalidReference(constraint);
        }
    }

    StoreError::Database(err)
}

#[async_trait]
impl EntityStore for PgStore {
    async fn ping(&self) -> StoreResult<()> {
        health_check(&self.pool).await.map_err(StoreError::from)
    }

    async fn create_user(&self, data: CreateUser) -> StoreResult<User> {
        User::create_with_profile(&self.pool, data)
            .await
            .map_err(classify)
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(User::find_by_email(&self.pool, email).await?)
    }

    async fn find_profile(&self, id: UserId) -> StoreResult<Option<UserProfile>> {
        Ok(UserProfile::find(&self.pool, id).await?)
    }

    async fn find_profile_by_email(&self, email: &str) -> StoreResult<Option<UserProfile>> {
        Ok(UserProfile::find_by_email(&self.pool, email).await?)
    }

    async fn find_profiles(&self, ids: &BTreeSet<UserId>) -> StoreResult<Vec<UserProfile>> {
        Ok(UserProfile::find_many(&self.pool, ids).await?)
    }

    async fn list_profiles(&self) -> StoreResult<Vec<UserProfile>> {
        Ok(UserProfile::list(&self.pool).await?)
    }

    async fn create_board(&self, data: CreateBoard) -> StoreResult<Board> {
        Board::create(&self.pool, data).await.map_err(classify)
    }

    async fn find_board(&self, id: BoardId) -> StoreResult<Option<Board>> {
        Ok(Board::find_by_id(&self.pool, id).await?)
    }

    async fn list_board_summaries(&self, user_id: UserId) -> StoreResult<Vec<BoardSummary>> {
        Ok(BoardSummary::list_for_user(&self.pool, user_id).await?)
    }

    async fn update_board(&self, id: BoardId, data: UpdateBoard) -> StoreResult<Option<Board>> {
        Board::update(&self.pool, id, data).await.map_err(classify)
    }

    async fn delete_board(&self, id: BoardId) -> StoreResult<bool> {
        Ok(Board::delete(&self.pool, id).await?)
    }

    async fn create_task(&self, data: CreateTask) -> StoreResult<Task> {
        Task::create(&self.pool, data).await.map_err(classify)
    }

    async fn find_task(&self, id: TaskId) -> StoreResult<Option<Task>> {
        Ok(Task::find_by_id(&self.pool, id).await?)
    }

    async fn list_board_tasks(&self, board_id: BoardId) -> StoreResult<Vec<Task>> {
        Ok(Task::list_by_board(&self.pool, board_id).await?)
    }

    async fn list_tasks(&self, user_id: UserId, scope: TaskScope) -> StoreResult<Vec<Task>> {
        Ok(Task::list_for_user(&self.pool, user_id, scope).await?)
    }

    async fn update_task(&self, id: TaskId, data: UpdateTask) -> StoreResult<Option<Task>> {
        Task::update(&self.pool, id, data).await.map_err(classify)
    }

    async fn delete_task(&self, id: TaskId) -> StoreResult<bool> {
        Ok(Task::delete(&self.pool, id).await?)
    }

    async fn create_comment(&self, data: CreateComment) -> StoreResult<Comment> {
        Comment::create(&self.pool, data).await.map_err(classify)
    }

    async fn find_comment(&self, id: CommentId) -> StoreResult<Option<Comment>> {
        Ok(Comment::find_by_id(&self.pool, id).await?)
    }

    async fn list_comments(&self, task_id: TaskId) -> StoreResult<Vec<Comment>> {
        Ok(Comment::list_by_task(&self.pool, task_id).await?)
    }

    async fn delete_comment(&self, id: CommentId) -> StoreResult<bool> {
        Ok(Comment::delete(&self.pool, id).await?)
    }
}
