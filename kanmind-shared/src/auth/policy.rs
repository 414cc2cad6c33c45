//! Store-backed access policy
//!
//! [`AccessPolicy`] loads the entities a check needs through an
//! [`EntityStore`], applies the rules from [`super::authorization::rules`], and
//! returns a [`Decision`]. Existence is always settled before permission: a
//! missing board, task or comment yields `NotFound` even for a caller who
//! would be denied anyway.
//!
//! # Example
//!
//! ```no_run
//! use kanmind_shared::auth::policy::{AccessPolicy, BoardAction};
//! use kanmind_shared::store::EntityStore;
//! use uuid::Uuid;
//!
//! # async fn example(store: &dyn EntityStore, user_id: Uuid, board_id: Uuid)
//! #     -> Result<(), Box<dyn std::error::Error>> {
//! let policy = AccessPolicy::new(store);
//! let principal = policy.resolve_principal(user_id).await?;
//!
//! let board = policy
//!     .board(principal, board_id, BoardAction::Delete)
//!     .await?
//!     .into_result()?;
//! println!("{} may delete {}", user_id, board.title);
//! # Ok(())
//! # }
//! ```

use tracing::debug;

use super::authorization::{denial, rules, Decision, DenyReason, Principal, Resource};
use crate::models::{Board, BoardId, Comment, CommentId, Task, TaskId, UserId};
use crate::store::{EntityStore, StoreResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardAction {
    View,
    /// Update title or member set
    Manage,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskAction {
    View,
    Edit,
    Delete,
}

/// A task together with the board that scopes it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskContext {
    pub task: Task,
    pub board: Board,
}

/// Per-request policy evaluator
///
/// Holds nothing but a store reference; create one per request.
#[derive(Clone, Copy)]
pub struct AccessPolicy<'a> {
    store: &'a dyn EntityStore,
}

impl<'a> AccessPolicy<'a> {
    pub fn new(store: &'a dyn EntityStore) -> Self {
        Self { store }
    }

    /// Resolves an authenticated user id to a [`Principal`]
    pub async fn resolve_principal(&self, user_id: UserId) -> StoreResult<Principal> {
        let principal = match self.store.find_profile(user_id).await? {
            Some(_) => Principal::Profile(user_id),
            None => {
                debug!(%user_id, "Authenticated user has no profile");
                Principal::Unprovisioned(user_id)
            }
        };

        Ok(principal)
    }

    /// Board creation; on `Allow` carries the future owner's id
    pub fn create_board(&self, principal: Principal) -> Decision<UserId> {
        Decision::check(
            rules::can_create_board(principal),
            principal.user_id(),
            DenyReason::NoProfile,
        )
    }

    /// Loads a board and checks `action` on it
    pub async fn board(
        &self,
        principal: Principal,
        board_id: BoardId,
        action: BoardAction,
    ) -> StoreResult<Decision<Board>> {
        let Some(board) = self.store.find_board(board_id).await? else {
            return Ok(Decision::NotFound(Resource::Board(board_id)));
        };

        let (allowed, reason) = match action {
            BoardAction::View => (
                rules::can_view_board(principal, &board),
                DenyReason::NotBoardMember,
            ),
            BoardAction::Manage => (
                rules::can_manage_board(principal, &board),
                DenyReason::NotBoardMember,
            ),
            BoardAction::Delete => (
                rules::can_delete_board(principal, &board),
                DenyReason::NotBoardOwner,
            ),
        };

        Ok(self.decide(principal, allowed, board, reason, "board"))
    }

    /// Task creation on `board_id`; on `Allow` carries the target board
    ///
    /// An unknown board id is `NotFound` regardless of who asks.
    pub async fn create_task(
        &self,
        principal: Principal,
        board_id: BoardId,
    ) -> StoreResult<Decision<Board>> {
        let Some(board) = self.store.find_board(board_id).await? else {
            return Ok(Decision::NotFound(Resource::Board(board_id)));
        };

        let allowed = rules::can_create_task(principal, &board);
        Ok(self.decide(principal, allowed, board, DenyReason::NotBoardMember, "create_task"))
    }

    /// Loads a task with its board and checks `action`
    pub async fn task(
        &self,
        principal: Principal,
        task_id: TaskId,
        action: TaskAction,
    ) -> StoreResult<Decision<TaskContext>> {
        let ctx = match self.load_task(task_id).await? {
            Ok(ctx) => ctx,
            Err(missing) => return Ok(Decision::NotFound(missing)),
        };

        let (allowed, reason) = match action {
            TaskAction::View | TaskAction::Edit => (
                rules::can_view_or_edit_task(principal, &ctx.task, &ctx.board),
                DenyReason::NotBoardMember,
            ),
            TaskAction::Delete => (
                rules::can_delete_task(principal, &ctx.task, &ctx.board),
                DenyReason::NotTaskParticipant,
            ),
        };

        Ok(self.decide(principal, allowed, ctx, reason, "task"))
    }

    /// Listing or writing comments on a task
    pub async fn task_comments(
        &self,
        principal: Principal,
        task_id: TaskId,
    ) -> StoreResult<Decision<TaskContext>> {
        let ctx = match self.load_task(task_id).await? {
            Ok(ctx) => ctx,
            Err(missing) => return Ok(Decision::NotFound(missing)),
        };

        let allowed = rules::can_view_or_create_comment(principal, &ctx.task, &ctx.board);
        Ok(self.decide(principal, allowed, ctx, DenyReason::NotBoardMember, "comments"))
    }

    /// Deleting a comment addressed through its task
    ///
    /// A comment that exists but belongs to another task is `NotFound`.
    pub async fn delete_comment(
        &self,
        principal: Principal,
        task_id: TaskId,
        comment_id: CommentId,
    ) -> StoreResult<Decision<Comment>> {
        if self.store.find_task(task_id).await?.is_none() {
            return Ok(Decision::NotFound(Resource::Task(task_id)));
        }

        let comment = match self.store.find_comment(comment_id).await? {
            Some(comment) if comment.task_id == task_id => comment,
            _ => return Ok(Decision::NotFound(Resource::Comment(comment_id))),
        };

        let allowed = rules::can_delete_comment(principal, &comment);
        Ok(self.decide(
            principal,
            allowed,
            comment,
            DenyReason::NotCommentAuthor,
            "delete_comment",
        ))
    }

    async fn load_task(&self, task_id: TaskId) -> StoreResult<Result<TaskContext, Resource>> {
        let Some(task) = self.store.find_task(task_id).await? else {
            return Ok(Err(Resource::Task(task_id)));
        };

        let Some(board) = self.store.find_board(task.board_id).await? else {
            return Ok(Err(Resource::Board(task.board_id)));
        };

        Ok(Ok(TaskContext { task, board }))
    }

    fn decide<T>(
        &self,
        principal: Principal,
        allowed: bool,
        value: T,
        reason: DenyReason,
        check: &'static str,
    ) -> Decision<T> {
        let reason = denial(principal, reason);
        if !allowed {
            debug!(
                user_id = %principal.user_id(),
                check,
                reason = reason.as_str(),
                "Access denied"
            );
        }
        Decision::check(allowed, value, reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    use chrono::NaiveDate;
    use uuid::Uuid;

    use crate::auth::authorization::AuthzError;
    use crate::models::{CreateBoard, CreateComment, CreateTask, CreateUser, TaskPriority, TaskStatus, User};
    use crate::store::memory::MemoryStore;

    async fn user(store: &MemoryStore, name: &str) -> User {
        store
            .create_user(CreateUser {
                email: format!("{}@example.com", name),
                fullname: name.to_string(),
                password_hash: "hash".to_string(),
            })
            .await
            .unwrap()
    }

    async fn board(store: &MemoryStore, owner: &User, members: &[&User]) -> Board {
        let members: BTreeSet<UserId> = members.iter().map(|u| u.id).collect();
        store
            .create_board(CreateBoard::new("Board", owner.id, members))
            .await
            .unwrap()
    }

    async fn task(store: &MemoryStore, board: &Board, assignee: Option<&User>) -> Task {
        store
            .create_task(CreateTask {
                board_id: board.id,
                title: "Task".to_string(),
                description: None,
                status: TaskStatus::ToDo,
                priority: TaskPriority::Medium,
                assignee_id: assignee.map(|u| u.id),
                reviewer_id: None,
                due_date: NaiveDate::from_ymd_opt(2026, 6, 30).unwrap(),
            })
            .await
            .unwrap()
    }

    async fn comment(store: &MemoryStore, task: &Task, author: &User) -> Comment {
        store
            .create_comment(CreateComment {
                task_id: task.id,
                author_id: author.id,
                content: "Comment".to_string(),
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_resolve_principal() {
        let store = MemoryStore::new();
        let policy = AccessPolicy::new(&store);
        let ada = user(&store, "ada").await;

        assert_eq!(
            policy.resolve_principal(ada.id).await.unwrap(),
            Principal::Profile(ada.id)
        );

        let ghost = Uuid::new_v4();
        assert_eq!(
            policy.resolve_principal(ghost).await.unwrap(),
            Principal::Unprovisioned(ghost)
        );
    }

    #[tokio::test]
    async fn test_board_delete_owner_only() {
        let store = MemoryStore::new();
        let policy = AccessPolicy::new(&store);
        let u1 = user(&store, "u1").await;
        let u2 = user(&store, "u2").await;
        let b = board(&store, &u1, &[&u2]).await;

        let decision = policy
            .board(Principal::Profile(u2.id), b.id, BoardAction::Delete)
            .await
            .unwrap();
        assert_eq!(decision, Decision::Deny(DenyReason::NotBoardOwner));

        let decision = policy
            .board(Principal::Profile(u2.id), b.id, BoardAction::Manage)
            .await
            .unwrap();
        assert!(decision.is_allowed());

        let decision = policy
            .board(Principal::Profile(u1.id), b.id, BoardAction::Delete)
            .await
            .unwrap();
        assert_eq!(decision, Decision::Allow(b));
    }

    #[tokio::test]
    async fn test_board_view_outsider_and_missing() {
        let store = MemoryStore::new();
        let policy = AccessPolicy::new(&store);
        let owner = user(&store, "owner").await;
        let outsider = user(&store, "outsider").await;
        let b = board(&store, &owner, &[]).await;

        let decision = policy
            .board(Principal::Profile(outsider.id), b.id, BoardAction::View)
            .await
            .unwrap();
        assert_eq!(decision, Decision::Deny(DenyReason::NotBoardMember));

        let missing = Uuid::new_v4();
        let decision = policy
            .board(Principal::Profile(outsider.id), missing, BoardAction::View)
            .await
            .unwrap();
        assert_eq!(decision, Decision::NotFound(Resource::Board(missing)));
    }

    #[tokio::test]
    async fn test_create_task_not_found_before_forbidden() {
        let store = MemoryStore::new();
        let policy = AccessPolicy::new(&store);
        let stranger = user(&store, "stranger").await;
        let missing = Uuid::new_v4();

        let decision = policy
            .create_task(Principal::Profile(stranger.id), missing)
            .await
            .unwrap();
        assert_eq!(decision, Decision::NotFound(Resource::Board(missing)));

        // Same for an identity without a profile
        let decision = policy
            .create_task(Principal::Unprovisioned(Uuid::new_v4()), missing)
            .await
            .unwrap();
        assert!(matches!(decision.into_result(), Err(AuthzError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_create_task_membership() {
        let store = MemoryStore::new();
        let policy = AccessPolicy::new(&store);
        let owner = user(&store, "owner").await;
        let member = user(&store, "member").await;
        let stranger = user(&store, "stranger").await;
        let b = board(&store, &owner, &[&member]).await;

        for allowed in [&owner, &member] {
            let decision = policy
                .create_task(Principal::Profile(allowed.id), b.id)
                .await
                .unwrap();
            assert!(decision.is_allowed());
        }

        let decision = policy
            .create_task(Principal::Profile(stranger.id), b.id)
            .await
            .unwrap();
        assert_eq!(decision, Decision::Deny(DenyReason::NotBoardMember));
    }

    #[tokio::test]
    async fn test_task_delete_participants() {
        let store = MemoryStore::new();
        let policy = AccessPolicy::new(&store);
        let owner = user(&store, "owner").await;
        let u3 = user(&store, "u3").await;
        let u4 = user(&store, "u4").await;
        let b = board(&store, &owner, &[&u3, &u4]).await;
        let t = task(&store, &b, Some(&u3)).await;

        let decision = policy
            .task(Principal::Profile(u3.id), t.id, TaskAction::Delete)
            .await
            .unwrap();
        assert!(decision.is_allowed());

        let decision = policy
            .task(Principal::Profile(u4.id), t.id, TaskAction::Delete)
            .await
            .unwrap();
        assert_eq!(decision, Decision::Deny(DenyReason::NotTaskParticipant));

        let decision = policy
            .task(Principal::Profile(u4.id), t.id, TaskAction::Edit)
            .await
            .unwrap();
        match decision {
            Decision::Allow(ctx) => {
                assert_eq!(ctx.task.id, t.id);
                assert_eq!(ctx.board.id, b.id);
            }
            other => panic!("expected allow, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_task_missing() {
        let store = MemoryStore::new();
        let policy = AccessPolicy::new(&store);
        let owner = user(&store, "owner").await;
        let missing = Uuid::new_v4();

        let decision = policy
            .task(Principal::Profile(owner.id), missing, TaskAction::View)
            .await
            .unwrap();
        assert_eq!(decision, Decision::NotFound(Resource::Task(missing)));

        let decision = policy
            .task_comments(Principal::Profile(owner.id), missing)
            .await
            .unwrap();
        assert_eq!(decision, Decision::NotFound(Resource::Task(missing)));
    }

    #[tokio::test]
    async fn test_comment_delete_author_only() {
        let store = MemoryStore::new();
        let policy = AccessPolicy::new(&store);
        let u1 = user(&store, "u1").await;
        let u5 = user(&store, "u5").await;
        let b = board(&store, &u1, &[&u5]).await;
        let t = task(&store, &b, None).await;
        let c = comment(&store, &t, &u5).await;

        let decision = policy
            .delete_comment(Principal::Profile(u1.id), t.id, c.id)
            .await
            .unwrap();
        assert_eq!(decision, Decision::Deny(DenyReason::NotCommentAuthor));

        let decision = policy
            .delete_comment(Principal::Profile(u5.id), t.id, c.id)
            .await
            .unwrap();
        assert!(decision.is_allowed());
    }

    #[tokio::test]
    async fn test_comment_on_other_task_is_not_found() {
        let store = MemoryStore::new();
        let policy = AccessPolicy::new(&store);
        let owner = user(&store, "owner").await;
        let b = board(&store, &owner, &[]).await;
        let t1 = task(&store, &b, None).await;
        let t2 = task(&store, &b, None).await;
        let c = comment(&store, &t1, &owner).await;

        let decision = policy
            .delete_comment(Principal::Profile(owner.id), t2.id, c.id)
            .await
            .unwrap();
        assert_eq!(decision, Decision::NotFound(Resource::Comment(c.id)));

        let missing_task = Uuid::new_v4();
        let decision = policy
            .delete_comment(Principal::Profile(owner.id), missing_task, c.id)
            .await
            .unwrap();
        assert_eq!(decision, Decision::NotFound(Resource::Task(missing_task)));
    }

    #[tokio::test]
    async fn test_comments_require_membership() {
        let store = MemoryStore::new();
        let policy = AccessPolicy::new(&store);
        let owner = user(&store, "owner").await;
        let member = user(&store, "member").await;
        let stranger = user(&store, "stranger").await;
        let b = board(&store, &owner, &[&member]).await;
        let t = task(&store, &b, None).await;

        assert!(policy
            .task_comments(Principal::Profile(member.id), t.id)
            .await
            .unwrap()
            .is_allowed());
        assert_eq!(
            policy
                .task_comments(Principal::Profile(stranger.id), t.id)
                .await
                .unwrap(),
            Decision::Deny(DenyReason::NotBoardMember)
        );
    }

    #[tokio::test]
    async fn test_no_profile_cannot_create_board() {
        let store = MemoryStore::new();
        let policy = AccessPolicy::new(&store);
        let ada = user(&store, "ada").await;
        store.remove_profile(ada.id).await;

        let principal = policy.resolve_principal(ada.id).await.unwrap();
        assert_eq!(principal, Principal::Unprovisioned(ada.id));
        assert_eq!(
            policy.create_board(principal),
            Decision::Deny(DenyReason::NoProfile)
        );

        let bob = user(&store, "bob").await;
        assert_eq!(
            policy.create_board(Principal::Profile(bob.id)),
            Decision::Allow(bob.id)
        );
    }

    #[tokio::test]
    async fn test_unprovisioned_owner_loses_access() {
        let store = MemoryStore::new();
        let policy = AccessPolicy::new(&store);
        let owner = user(&store, "owner").await;
        let b = board(&store, &owner, &[]).await;
        store.remove_profile(owner.id).await;

        let principal = policy.resolve_principal(owner.id).await.unwrap();
        let decision = policy.board(principal, b.id, BoardAction::Delete).await.unwrap();
        assert_eq!(decision, Decision::Deny(DenyReason::NoProfile));
    }

    #[tokio::test]
    async fn test_decisions_are_idempotent() {
        let store = MemoryStore::new();
        let policy = AccessPolicy::new(&store);
        let owner = user(&store, "owner").await;
        let member = user(&store, "member").await;
        let b = board(&store, &owner, &[&member]).await;

        for action in [BoardAction::View, BoardAction::Manage, BoardAction::Delete] {
            let first = policy
                .board(Principal::Profile(member.id), b.id, action)
                .await
                .unwrap();
            let second = policy
                .board(Principal::Profile(member.id), b.id, action)
                .await
                .unwrap();
            assert_eq!(first, second);
        }
    }
}
