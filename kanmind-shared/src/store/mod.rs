//! Entity store abstraction
//!
//! Handlers and the access policy talk to persistence through the
//! [`EntityStore`] trait instead of reaching for a pool directly. Two backends
//! exist:
//!
//! - [`postgres::PgStore`]: production backend over sqlx
//! - [`memory::MemoryStore`]: in-process backend for tests and local runs
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use kanmind_shared::store::{EntityStore, memory::MemoryStore};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store: Arc<dyn EntityStore> = Arc::new(MemoryStore::new());
//! let profiles = store.list_profiles().await?;
//! assert!(profiles.is_empty());
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::models::{
    Board, BoardId, BoardSummary, Comment, CommentId, CreateBoard, CreateComment, CreateTask,
    CreateUser, Task, TaskId, TaskScope, UpdateBoard, UpdateTask, User, UserId, UserProfile,
};

pub mod memory;
pub mod postgres;

/// Error type for store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Underlying database failure
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A uniqueness rule was violated (e.g. email already registered)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Referenced row does not exist (foreign key violation)
    #[error("Invalid reference: {0}")]
    InvalidReference(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence capabilities the API needs
///
/// Every read returns a consistent snapshot of the entity it loads; a board
/// always comes back together with its complete member set.
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Cheap connectivity probe for health checks
    async fn ping(&self) -> StoreResult<()>;

    /// Registers a user together with its profile
    async fn create_user(&self, data: CreateUser) -> StoreResult<User>;

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    async fn find_profile(&self, id: UserId) -> StoreResult<Option<UserProfile>>;

    async fn find_profile_by_email(&self, email: &str) -> StoreResult<Option<UserProfile>>;

    /// Profiles for the given ids; ids without a profile are left out
    async fn find_profiles(&self, ids: &BTreeSet<UserId>) -> StoreResult<Vec<UserProfile>>;

    async fn list_profiles(&self) -> StoreResult<Vec<UserProfile>>;

    async fn create_board(&self, data: CreateBoard) -> StoreResult<Board>;

    async fn find_board(&self, id: BoardId) -> StoreResult<Option<Board>>;

    /// Boards the user owns or belongs to, with counters
    async fn list_board_summaries(&self, user_id: UserId) -> StoreResult<Vec<BoardSummary>>;

    async fn update_board(&self, id: BoardId, data: UpdateBoard) -> StoreResult<Option<Board>>;

    async fn delete_board(&self, id: BoardId) -> StoreResult<bool>;

    async fn create_task(&self, data: CreateTask) -> StoreResult<Task>;

    async fn find_task(&self, id: TaskId) -> StoreResult<Option<Task>>;

    async fn list_board_tasks(&self, board_id: BoardId) -> StoreResult<Vec<Task>>;

    /// Tasks on boards visible to the user, narrowed by `scope`
    async fn list_tasks(&self, user_id: UserId, scope: TaskScope) -> StoreResult<Vec<Task>>;

    async fn update_task(&self, id: TaskId, data: UpdateTask) -> StoreResult<Option<Task>>;

    async fn delete_task(&self, id: TaskId) -> StoreResult<bool>;

    async fn create_comment(&self, data: CreateComment) -> StoreResult<Comment>;

    async fn find_comment(&self, id: CommentId) -> StoreResult<Option<Comment>>;

    async fn list_comments(&self, task_id: TaskId) -> StoreResult<Vec<Comment>>;

    async fn delete_comment(&self, id: CommentId) -> StoreResult<bool>;
}
