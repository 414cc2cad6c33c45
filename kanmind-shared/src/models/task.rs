//! Task model and database operations
//!
//! Tasks belong to exactly one board for their whole life. They may have a
//! single assignee and a single reviewer, both of whom gain the right to
//! delete the task.
//!
//! # Workflow
//!
//! ```text
//! to-do → in-progress → review → done
//! ```
//!
//! Any status may be set directly; the API does not enforce transitions.
//!
//! # Schema
//!
//! ```sql
//! CREATE TYPE task_status AS ENUM ('to-do', 'in-progress', 'review', 'done');
//! CREATE TYPE task_priority AS ENUM ('low', 'medium', 'high');
//!
//! CREATE TABLE tasks (
//!     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
//!     board_id UUID NOT NULL REFERENCES boards(id) ON DELETE CASCADE,
//!     title VARCHAR(255) NOT NULL,
//!     description TEXT,
//!     status task_status NOT NULL DEFAULT 'to-do',
//!     priority task_priority NOT NULL DEFAULT 'medium',
//!     assignee_id UUID REFERENCES users(id) ON DELETE SET NULL,
//!     reviewer_id UUID REFERENCES users(id) ON DELETE SET NULL,
//!     due_date DATE NOT NULL,
//!     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
//! );
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};

use super::{BoardId, TaskId, UserId};

/// Workflow column of a task
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "task_status", rename_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    #[default]
    ToDo,
    InProgress,
    Review,
    Done,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::ToDo => "to-do",
            TaskStatus::InProgress => "in-progress",
            TaskStatus::Review => "review",
            TaskStatus::Done => "done",
        }
    }
}

/// Task priority
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "task_priority", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
}

impl TaskPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPriority::Low => "low",
            TaskPriority::Medium => "medium",
            TaskPriority::High => "high",
        }
    }
}

/// Task on a board
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Task {
    pub id: TaskId,

    /// Owning board, immutable after creation
    pub board_id: BoardId,

    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub assignee_id: Option<UserId>,
    pub reviewer_id: Option<UserId>,
    pub due_date: NaiveDate,
    pub created_at: DateTime<Utc>,

    /// Number of comments on the task (computed on read)
    pub comments_count: i64,
}

impl Task {
    pub fn is_assignee(&self, user_id: UserId) -> bool {
        self.assignee_id == Some(user_id)
    }

    pub fn is_reviewer(&self, user_id: UserId) -> bool {
        self.reviewer_id == Some(user_id)
    }
}

/// Input for creating a task
#[derive(Debug, Clone)]
pub struct CreateTask {
    pub board_id: BoardId,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub assignee_id: Option<UserId>,
    pub reviewer_id: Option<UserId>,
    pub due_date: NaiveDate,
}

/// Input for updating a task
///
/// Only `Some` fields are written. Nullable columns use `Some(None)` to clear.
/// The board cannot be changed.
#[derive(Debug, Clone, Default)]
pub struct UpdateTask {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub assignee_id: Option<Option<UserId>>,
    pub reviewer_id: Option<Option<UserId>>,
    pub due_date: Option<NaiveDate>,
}

impl UpdateTask {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.status.is_none()
            && self.priority.is_none()
            && self.assignee_id.is_none()
            && self.reviewer_id.is_none()
            && self.due_date.is_none()
    }
}

/// Which tasks of the visible set to return
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskScope {
    /// Every task on a board the user owns or belongs to
    Visible,

    /// Visible tasks the user is assigned to
    AssignedTo,

    /// Visible tasks the user reviews
    Reviewing,
}

impl Task {
    const SELECT: &'static str = r#"
        SELECT t.id, t.board_id, t.title, t.description, t.status, t.priority,
               t.assignee_id, t.reviewer_id, t.due_date, t.created_at,
               (SELECT COUNT(*) FROM comments c WHERE c.task_id = t.id) AS comments_count
        FROM tasks t
    "#;

    pub async fn create(pool: &PgPool, data: CreateTask) -> Result<Self, sqlx::Error> {
        let id: TaskId = sqlx::query_scalar(
            r#"
            INSERT INTO tasks (board_id, title, description, status, priority,
                               assignee_id, reviewer_id, due_date)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id
            "#,
        )
        .bind(data.board_id)
        .bind(data.title)
        .bind(data.description)
        .bind(data.status)
        .bind(data.priority)
        .bind(data.assignee_id)
        .bind(data.reviewer_id)
        .bind(data.due_date)
        .fetch_one(pool)
        .await?;

        Self::find_by_id(pool, id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }

    pub async fn find_by_id(pool: &PgPool, id: TaskId) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Task>(&format!("{} WHERE t.id = $1", Self::SELECT))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list_by_board(pool: &PgPool, board_id: BoardId) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Task>(&format!(
            "{} WHERE t.board_id = $1 ORDER BY t.created_at ASC, t.id ASC",
            Self::SELECT
        ))
        .bind(board_id)
        .fetch_all(pool)
        .await
    }

    /// Lists tasks on boards the user owns or is a member of
    pub async fn list_for_user(
        pool: &PgPool,
        user_id: UserId,
        scope: TaskScope,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let filter = match scope {
            TaskScope::Visible => "",
            TaskScope::AssignedTo => "AND t.assignee_id = $1",
            TaskScope::Reviewing => "AND t.reviewer_id = $1",
        };

        let query = format!(
            r#"
            {select}
            JOIN boards b ON b.id = t.board_id
            WHERE (b.owner_id = $1 OR EXISTS (
                    SELECT 1 FROM board_members m
                    WHERE m.board_id = b.id AND m.user_id = $1
                  ))
              {filter}
            ORDER BY t.created_at ASC, t.id ASC
            "#,
            select = Self::SELECT,
            filter = filter,
        );

        sqlx::query_as::<_, Task>(&query)
            .bind(user_id)
            .fetch_all(pool)
            .await
    }

    /// Applies the present fields; `None` when the task does not exist
    pub async fn update(
        pool: &PgPool,
        id: TaskId,
        data: UpdateTask,
    ) -> Result<Option<Self>, sqlx::Error> {
        if data.is_empty() {
            return Self::find_by_id(pool, id).await;
        }

        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE tasks SET ");
        let mut fields = builder.separated(", ");

        if let Some(title) = data.title {
            fields.push("title = ").push_bind_unseparated(title);
        }
        if let Some(description) = data.description {
            fields.push("description = ").push_bind_unseparated(description);
        }
        if let Some(status) = data.status {
            fields.push("status = ").push_bind_unseparated(status);
        }
        if let Some(priority) = data.priority {
            fields.push("priority = ").push_bind_unseparated(priority);
        }
        if let Some(assignee_id) = data.assignee_id {
            fields.push("assignee_id = ").push_bind_unseparated(assignee_id);
        }
        if let Some(reviewer_id) = data.reviewer_id {
            fields.push("reviewer_id = ").push_bind_unseparated(reviewer_id);
        }
        if let Some(due_date) = data.due_date {
            fields.push("due_date = ").push_bind_unseparated(due_date);
        }

        builder.push(" WHERE id = ").push_bind(id).push(" RETURNING id");

        let updated = builder
            .build_query_scalar::<TaskId>()
            .fetch_optional(pool)
            .await?;

        match updated {
            Some(id) => Self::find_by_id(pool, id).await,
            None => Ok(None),
        }
    }

    /// Deletes a task; its comments cascade
    pub async fn delete(pool: &PgPool, id: TaskId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
