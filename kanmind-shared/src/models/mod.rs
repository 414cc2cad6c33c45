//! Domain models and their PostgreSQL operations
//!
//! # Models
//!
//! - `user`: accounts and their public profiles
//! - `board`: boards with an owner and a member set
//! - `task`: tasks on a board, with optional assignee and reviewer
//! - `comment`: comments on a task
//!
//! The SQL lives next to each model. Code outside the store layer should go
//! through [`crate::store::EntityStore`] rather than calling these directly.

use uuid::Uuid;

pub mod board;
pub mod comment;
pub mod task;
pub mod user;

pub type UserId = Uuid;
pub type BoardId = Uuid;
pub type TaskId = Uuid;
pub type CommentId = Uuid;

pub use board::{Board, BoardSummary, CreateBoard, UpdateBoard};
pub use comment::{Comment, CreateComment};
pub use task::{CreateTask, Task, TaskPriority, TaskScope, TaskStatus, UpdateTask};
pub use user::{CreateUser, User, UserProfile};
