//! User accounts and profiles
//!
//! A [`User`] is the authentication identity (email + password hash). Every
//! user registered through the API also gets a [`UserProfile`] record, which is
//! what boards, tasks and comments reference. The profile shares the user's id.
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE users (
//!     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
//!     email VARCHAR(255) NOT NULL,
//!     fullname VARCHAR(255) NOT NULL,
//!     password_hash VARCHAR(255) NOT NULL,
//!     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
//! );
//! CREATE UNIQUE INDEX users_email_lower_idx ON users (LOWER(email));
//!
//! CREATE TABLE user_profiles (
//!     user_id UUID PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
//!     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
//! );
//! ```

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use super::UserId;

/// Authentication identity
///
/// Passwords are stored as Argon2id hashes, never in plaintext.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    /// Unique user ID (shared with the profile)
    pub id: UserId,

    /// Email address, unique case-insensitively
    pub email: String,

    /// Display name
    pub fullname: String,

    /// Argon2id password hash
    #[serde(skip_serializing)]
    pub password_hash: String,

    /// When the account was registered
    pub created_at: DateTime<Utc>,
}

/// Input for registering a new user
#[derive(Debug, Clone)]
pub struct CreateUser {
    pub email: String,
    pub fullname: String,
    /// Argon2id hash, never the plaintext password
    pub password_hash: String,
}

/// Public projection of a user that boards and tasks point at
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserProfile {
    pub id: UserId,
    pub fullname: String,
    pub email: String,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            fullname: user.fullname.clone(),
            email: user.email.clone(),
        }
    }
}

impl User {
    /// Inserts a user and its profile in one transaction
    ///
    /// # Errors
    ///
    /// Fails with a unique violation when the email is already registered.
    pub async fn create_with_profile(pool: &PgPool, data: CreateUser) -> Result<Self, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, fullname, password_hash)
            VALUES ($1, $2, $3)
            RETURNING id, email, fullname, password_hash, created_at
            "#,
        )
        .bind(data.email)
        .bind(data.fullname)
        .bind(data.password_hash)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO user_profiles (user_id) VALUES ($1)")
            .bind(user.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(user)
    }

    /// Finds a user by email, ignoring case
    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, fullname, password_hash, created_at
            FROM users
            WHERE LOWER(email) = LOWER($1)
            "#,
        )
        .bind(email)
        .fetch_optional(pool)
        .await
    }
}

impl UserProfile {
    const SELECT: &'static str = r#"
        SELECT u.id, u.fullname, u.email
        FROM user_profiles p
        JOIN users u ON u.id = p.user_id
    "#;

    /// Finds the profile of a user, `None` when the user has no profile record
    pub async fn find(pool: &PgPool, id: UserId) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, UserProfile>(&format!("{} WHERE p.user_id = $1", Self::SELECT))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, UserProfile>(&format!(
            "{} WHERE LOWER(u.email) = LOWER($1)",
            Self::SELECT
        ))
        .bind(email)
        .fetch_optional(pool)
        .await
    }

    /// Loads the profiles for a set of ids; unknown ids are skipped
    pub async fn find_many(pool: &PgPool, ids: &BTreeSet<UserId>) -> Result<Vec<Self>, sqlx::Error> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<UserId> = ids.iter().copied().collect();
        sqlx::query_as::<_, UserProfile>(&format!(
            "{} WHERE p.user_id = ANY($1) ORDER BY u.fullname ASC, u.id ASC",
            Self::SELECT
        ))
        .bind(ids)
        .fetch_all(pool)
        .await
    }

    pub async fn list(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, UserProfile>(&format!(
            "{} ORDER BY u.fullname ASC, u.id ASC",
            Self::SELECT
        ))
        .fetch_all(pool)
        .await
    }
}
