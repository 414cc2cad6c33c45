//! Board model and database operations
//!
//! A board is the root of an authorization scope: its owner and member set
//! decide who may see and change the tasks and comments underneath it.
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE boards (
//!     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
//!     title VARCHAR(255) NOT NULL,
//!     owner_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
//!     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
//! );
//!
//! CREATE TABLE board_members (
//!     board_id UUID NOT NULL REFERENCES boards(id) ON DELETE CASCADE,
//!     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
//!     PRIMARY KEY (board_id, user_id)
//! );
//! ```

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use super::{BoardId, UserId};

/// Board with its member set loaded
///
/// The owner is not required to appear in `members`; ownership checks look at
/// `owner_id` alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    pub id: BoardId,
    pub title: String,
    pub owner_id: UserId,
    pub members: BTreeSet<UserId>,
    pub created_at: DateTime<Utc>,
}

impl Board {
    pub fn is_owner(&self, user_id: UserId) -> bool {
        self.owner_id == user_id
    }

    pub fn is_member(&self, user_id: UserId) -> bool {
        self.members.contains(&user_id)
    }

    /// Owner or member
    pub fn has_access(&self, user_id: UserId) -> bool {
        self.is_owner(user_id) || self.is_member(user_id)
    }
}

/// Row shape of the board query: members aggregated into an array
#[derive(Debug, sqlx::FromRow)]
struct BoardRow {
    id: BoardId,
    title: String,
    owner_id: UserId,
    member_ids: Vec<UserId>,
    created_at: DateTime<Utc>,
}

impl From<BoardRow> for Board {
    fn from(row: BoardRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            owner_id: row.owner_id,
            members: row.member_ids.into_iter().collect(),
            created_at: row.created_at,
        }
    }
}

/// Input for creating a board
#[derive(Debug, Clone)]
pub struct CreateBoard {
    pub title: String,
    pub owner_id: UserId,
    pub members: BTreeSet<UserId>,
}

impl CreateBoard {
    /// Builds the creation input, adding the owner to the member set
    pub fn new(title: impl Into<String>, owner_id: UserId, members: BTreeSet<UserId>) -> Self {
        let mut members = members;
        members.insert(owner_id);

        Self {
            title: title.into(),
            owner_id,
            members,
        }
    }
}

/// Input for updating a board; `None` leaves a field unchanged
#[derive(Debug, Clone, Default)]
pub struct UpdateBoard {
    pub title: Option<String>,

    /// Replaces the whole member set
    pub members: Option<BTreeSet<UserId>>,
}

/// Per-board counters shown in the board overview
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct BoardSummary {
    pub id: BoardId,
    pub title: String,
    pub owner_id: UserId,
    pub member_count: i64,
    pub ticket_count: i64,
    pub tasks_to_do_count: i64,
    pub tasks_high_prio_count: i64,
}

impl Board {
    /// Loads the board and its members in a single statement, so the member
    /// set is a consistent snapshot
    const SELECT: &'static str = r#"
        SELECT b.id, b.title, b.owner_id, b.created_at,
               COALESCE(ARRAY_AGG(m.user_id) FILTER (WHERE m.user_id IS NOT NULL), '{}') AS member_ids
        FROM boards b
        LEFT JOIN board_members m ON m.board_id = b.id
        WHERE b.id = $1
        GROUP BY b.id
    "#;

    /// Creates a board and its member rows in one transaction
    pub async fn create(pool: &PgPool, data: CreateBoard) -> Result<Self, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let id: BoardId = sqlx::query_scalar(
            r#"
            INSERT INTO boards (title, owner_id)
            VALUES ($1, $2)
            RETURNING id
            "#,
        )
        .bind(&data.title)
        .bind(data.owner_id)
        .fetch_one(&mut *tx)
        .await?;

        let members: Vec<UserId> = data.members.into_iter().collect();
        sqlx::query(
            r#"
            INSERT INTO board_members (board_id, user_id)
            SELECT $1, UNNEST($2::uuid[])
            "#,
        )
        .bind(id)
        .bind(members)
        .execute(&mut *tx)
        .await?;

        let board = sqlx::query_as::<_, BoardRow>(Self::SELECT)
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(board.into())
    }

    pub async fn find_by_id(pool: &PgPool, id: BoardId) -> Result<Option<Self>, sqlx::Error> {
        let row = sqlx::query_as::<_, BoardRow>(Self::SELECT)
            .bind(id)
            .fetch_optional(pool)
            .await?;

        Ok(row.map(Board::from))
    }

    /// Updates title and/or member set; `None` when the board does not exist
    pub async fn update(
        pool: &PgPool,
        id: BoardId,
        data: UpdateBoard,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        // Row lock serializes concurrent membership edits on the same board
        let exists: Option<BoardId> =
            sqlx::query_scalar("SELECT id FROM boards WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;

        if exists.is_none() {
            return Ok(None);
        }

        if let Some(title) = data.title {
            sqlx::query("UPDATE boards SET title = $2 WHERE id = $1")
                .bind(id)
                .bind(title)
                .execute(&mut *tx)
                .await?;
        }

        if let Some(members) = data.members {
            sqlx::query("DELETE FROM board_members WHERE board_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;

            let members: Vec<UserId> = members.into_iter().collect();
            sqlx::query(
                r#"
                INSERT INTO board_members (board_id, user_id)
                SELECT $1, UNNEST($2::uuid[])
                "#,
            )
            .bind(id)
            .bind(members)
            .execute(&mut *tx)
            .await?;
        }

        let board = sqlx::query_as::<_, BoardRow>(Self::SELECT)
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(Some(board.into()))
    }

    /// Deletes a board; tasks and comments cascade
    pub async fn delete(pool: &PgPool, id: BoardId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM boards WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

impl BoardSummary {
    /// Boards the user owns or is a member of, oldest first
    pub async fn list_for_user(pool: &PgPool, user_id: UserId) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, BoardSummary>(
            r#"
            SELECT b.id, b.title, b.owner_id,
                   (SELECT COUNT(*) FROM board_members m WHERE m.board_id = b.id) AS member_count,
                   (SELECT COUNT(*) FROM tasks t WHERE t.board_id = b.id) AS ticket_count,
                   (SELECT COUNT(*) FROM tasks t
                     WHERE t.board_id = b.id AND t.status = 'to-do') AS tasks_to_do_count,
                   (SELECT COUNT(*) FROM tasks t
                     WHERE t.board_id = b.id AND t.priority = 'high') AS tasks_high_prio_count
            FROM boards b
            WHERE b.owner_id = $1
               OR EXISTS (
                    SELECT 1 FROM board_members m
                    WHERE m.board_id = b.id AND m.user_id = $1
               )
            ORDER BY b.created_at ASC, b.id ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
    }
}
