//! Comment model and database operations
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE comments (
//!     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
//!     task_id UUID NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
//!     author_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
//!     content TEXT NOT NULL,
//!     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
//! );
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use super::{CommentId, TaskId, UserId};

/// Comment on a task
///
/// Author and creation time are fixed when the comment is written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Comment {
    pub id: CommentId,
    pub task_id: TaskId,
    pub author_id: UserId,

    /// Author's display name at read time
    pub author: String,

    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Comment {
    pub fn is_author(&self, user_id: UserId) -> bool {
        self.author_id == user_id
    }
}

#[derive(Debug, Clone)]
pub struct CreateComment {
    pub task_id: TaskId,
    pub author_id: UserId,
    pub content: String,
}

impl Comment {
    const SELECT: &'static str = r#"
        SELECT c.id, c.task_id, c.author_id, u.fullname AS author, c.content, c.created_at
        FROM comments c
        JOIN users u ON u.id = c.author_id
    "#;

    pub async fn create(pool: &PgPool, data: CreateComment) -> Result<Self, sqlx::Error> {
        let id: CommentId = sqlx::query_scalar(
            r#"
            INSERT INTO comments (task_id, author_id, content)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(data.task_id)
        .bind(data.author_id)
        .bind(data.content)
        .fetch_one(pool)
        .await?;

        Self::find_by_id(pool, id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }

    pub async fn find_by_id(pool: &PgPool, id: CommentId) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Comment>(&format!("{} WHERE c.id = $1", Self::SELECT))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Comments of a task, oldest first
    pub async fn list_by_task(pool: &PgPool, task_id: TaskId) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Comment>(&format!(
            "{} WHERE c.task_id = $1 ORDER BY c.created_at ASC, c.id ASC",
            Self::SELECT
        ))
        .bind(task_id)
        .fetch_all(pool)
        .await
    }

    pub async fn delete(pool: &PgPool, id: CommentId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
