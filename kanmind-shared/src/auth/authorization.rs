/// Access rules for boards, tasks and comments
///
/// A board is the root of an authorization scope. Its owner and members may
/// see and change everything underneath it, with two narrowed rules:
///
/// | Action | Allowed for |
/// |---|---|
/// | view / edit board | owner, members |
/// | delete board | owner |
/// | create / view / edit task | owner, members of the task's board |
/// | delete task | board owner, task assignee, task reviewer |
/// | view / create comment | owner, members of the task's board |
/// | delete comment | comment author |
/// | create board | any user with a profile |
///
/// Every rule here is a pure function over already-loaded entities. Loading
/// them, and telling a missing entity apart from a forbidden one, is the job
/// of [`super::policy::AccessPolicy`].
///
/// A [`Principal::Unprovisioned`] identity (valid token, no profile record) is
/// denied by every rule.

use std::fmt;

use serde::Serialize;

use crate::models::{BoardId, CommentId, TaskId, UserId};
use crate::store::StoreError;

/// Identity as seen by the access rules
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Principal {
    /// Authenticated user with a profile record
    Profile(UserId),

    /// Authenticated user without a profile record
    Unprovisioned(UserId),
}

impl Principal {
    pub fn user_id(&self) -> UserId {
        match self {
            Principal::Profile(id) | Principal::Unprovisioned(id) => *id,
        }
    }

    /// User id when the principal has a profile
    pub fn profile(&self) -> Option<UserId> {
        match self {
            Principal::Profile(id) => Some(*id),
            Principal::Unprovisioned(_) => None,
        }
    }
}

/// Why a request was denied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    NoProfile,
    NotBoardMember,
    NotBoardOwner,
    NotTaskParticipant,
    NotCommentAuthor,
}

impl DenyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DenyReason::NoProfile => "no_profile",
            DenyReason::NotBoardMember => "not_board_member",
            DenyReason::NotBoardOwner => "not_board_owner",
            DenyReason::NotTaskParticipant => "not_task_participant",
            DenyReason::NotCommentAuthor => "not_comment_author",
        }
    }

    /// Human-readable explanation for error bodies
    pub fn message(&self) -> &'static str {
        match self {
            DenyReason::NoProfile => "A user profile is required for this action",
            DenyReason::NotBoardMember => "You must be a member of this board",
            DenyReason::NotBoardOwner => "Only the board owner can do this",
            DenyReason::NotTaskParticipant => {
                "Only the board owner, the assignee or the reviewer can delete this task"
            }
            DenyReason::NotCommentAuthor => "Only the author can delete this comment",
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Entity a lookup failed to find
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Board(BoardId),
    Task(TaskId),
    Comment(CommentId),
}

impl Resource {
    pub fn kind(&self) -> &'static str {
        match self {
            Resource::Board(_) => "Board",
            Resource::Task(_) => "Task",
            Resource::Comment(_) => "Comment",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::Board(id) => write!(f, "Board {} not found", id),
            Resource::Task(id) => write!(f, "Task {} not found", id),
            Resource::Comment(id) => write!(f, "Comment {} not found", id),
        }
    }
}

/// Outcome of a policy check
///
/// `Allow` carries whatever the check had to load, so callers never read the
/// same entity twice.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub enum Decision<T> {
    Allow(T),
    Deny(DenyReason),
    NotFound(Resource),
}

impl<T> Decision<T> {
    /// Allows with `value` when `allowed`, otherwise denies with `reason`
    pub fn check(allowed: bool, value: T, reason: DenyReason) -> Self {
        if allowed {
            Decision::Allow(value)
        } else {
            Decision::Deny(reason)
        }
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow(_))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Decision<U> {
        match self {
            Decision::Allow(value) => Decision::Allow(f(value)),
            Decision::Deny(reason) => Decision::Deny(reason),
            Decision::NotFound(resource) => Decision::NotFound(resource),
        }
    }

    pub fn into_result(self) -> Result<T, AuthzError> {
        match self {
            Decision::Allow(value) => Ok(value),
            Decision::Deny(reason) => Err(AuthzError::Forbidden(reason)),
            Decision::NotFound(resource) => Err(AuthzError::NotFound(resource)),
        }
    }
}

/// Error type for authorization checks
#[derive(Debug, thiserror::Error)]
pub enum AuthzError {
    #[error("Forbidden: {}", .0.message())]
    Forbidden(DenyReason),

    #[error("{0}")]
    NotFound(Resource),

    /// Lookup failed; never turned into a denial
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Rule predicates
///
/// Each returns `true` when the principal may perform the action.
pub mod rules {
    use super::Principal;
    use crate::models::{Board, Comment, Task};

    pub fn can_create_board(principal: Principal) -> bool {
        principal.profile().is_some()
    }

    pub fn can_view_board(principal: Principal, board: &Board) -> bool {
        principal.profile().is_some_and(|id| board.has_access(id))
    }

    pub fn can_manage_board(principal: Principal, board: &Board) -> bool {
        can_view_board(principal, board)
    }

    pub fn can_delete_board(principal: Principal, board: &Board) -> bool {
        principal.profile().is_some_and(|id| board.is_owner(id))
    }

    pub fn can_create_task(principal: Principal, board: &Board) -> bool {
        can_view_board(principal, board)
    }

    /// `board` must be the task's board
    pub fn can_view_or_edit_task(principal: Principal, task: &Task, board: &Board) -> bool {
        debug_assert_eq!(task.board_id, board.id);
        can_view_board(principal, board)
    }

    /// Board owner, assignee or reviewer; plain members are denied
    pub fn can_delete_task(principal: Principal, task: &Task, board: &Board) -> bool {
        debug_assert_eq!(task.board_id, board.id);
        principal
            .profile()
            .is_some_and(|id| board.is_owner(id) || task.is_assignee(id) || task.is_reviewer(id))
    }

    pub fn can_view_or_create_comment(principal: Principal, task: &Task, board: &Board) -> bool {
        can_view_or_edit_task(principal, task, board)
    }

    /// Author only, regardless of board ownership
    pub fn can_delete_comment(principal: Principal, comment: &Comment) -> bool {
        principal.profile().is_some_and(|id| comment.is_author(id))
    }
}

/// Reason to report when a rule fails
///
/// An identity without a profile always gets [`DenyReason::NoProfile`], so
/// the caller learns what is actually missing.
pub fn denial(principal: Principal, reason: DenyReason) -> DenyReason {
    match principal {
        Principal::Unprovisioned(_) => DenyReason::NoProfile,
        Principal::Profile(_) => reason,
    }
}

#[cfg(test)]
mod tests {
    use super::rules::*;
    use super::*;
    use chrono::{NaiveDate, Utc};
    use uuid::Uuid;

    use crate::models::{Board, Comment, Task, TaskPriority, TaskStatus};

    fn board(owner: UserId, members: &[UserId]) -> Board {
        Board {
            id: Uuid::new_v4(),
            title: "Board".to_string(),
            owner_id: owner,
            members: members.iter().copied().collect(),
            created_at: Utc::now(),
        }
    }

    fn task(board: &Board, assignee: Option<UserId>, reviewer: Option<UserId>) -> Task {
        Task {
            id: Uuid::new_v4(),
            board_id: board.id,
            title: "Task".to_string(),
            description: None,
            status: TaskStatus::ToDo,
            priority: TaskPriority::Medium,
            assignee_id: assignee,
            reviewer_id: reviewer,
            due_date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            created_at: Utc::now(),
            comments_count: 0,
        }
    }

    fn comment(task: &Task, author: UserId) -> Comment {
        Comment {
            id: Uuid::new_v4(),
            task_id: task.id,
            author_id: author,
            author: "Author".to_string(),
            content: "Looks good".to_string(),
            created_at: Utc::now(),
        }
    }

    fn ids<const N: usize>() -> [UserId; N] {
        std::array::from_fn(|_| Uuid::new_v4())
    }

    #[test]
    fn test_view_board_owner_or_member_only() {
        let [owner, member, outsider, other_owner] = ids();
        let b = board(owner, &[member]);
        let other = board(other_owner, &[outsider]);

        assert!(can_view_board(Principal::Profile(owner), &b));
        assert!(can_view_board(Principal::Profile(member), &b));
        assert!(!can_view_board(Principal::Profile(outsider), &b));
        assert!(!can_view_board(Principal::Profile(other_owner), &b));

        // Membership of one board grants nothing on another
        assert!(can_view_board(Principal::Profile(outsider), &other));
        assert!(!can_view_board(Principal::Profile(member), &other));
    }

    #[test]
    fn test_owner_outside_member_set_keeps_access() {
        let [owner, member] = ids();
        let b = board(owner, &[member]);

        assert!(can_view_board(Principal::Profile(owner), &b));
        assert!(can_manage_board(Principal::Profile(owner), &b));
        assert!(can_delete_board(Principal::Profile(owner), &b));
    }

    #[test]
    fn test_delete_board_owner_only() {
        // Scenario: owner U1 with members [U1, U2]
        let [u1, u2] = ids();
        let b = board(u1, &[u1, u2]);

        assert!(!can_delete_board(Principal::Profile(u2), &b));
        assert!(can_delete_board(Principal::Profile(u1), &b));
        assert!(can_manage_board(Principal::Profile(u2), &b));
    }

    #[test]
    fn test_delete_task_participants_only() {
        let [owner, u3, u4, reviewer] = ids();
        let b = board(owner, &[owner, u3, u4, reviewer]);

        let t = task(&b, Some(u3), None);
        assert!(can_delete_task(Principal::Profile(u3), &t, &b));
        assert!(can_delete_task(Principal::Profile(owner), &t, &b));
        assert!(!can_delete_task(Principal::Profile(u4), &t, &b));
        assert!(!can_delete_task(Principal::Profile(reviewer), &t, &b));

        let reviewed = task(&b, None, Some(reviewer));
        assert!(can_delete_task(Principal::Profile(reviewer), &reviewed, &b));
        assert!(!can_delete_task(Principal::Profile(u3), &reviewed, &b));

        // Plain members may still edit
        assert!(can_view_or_edit_task(Principal::Profile(u4), &t, &b));
    }

    #[test]
    fn test_delete_comment_author_only() {
        let [owner, author, member] = ids();
        let b = board(owner, &[owner, author, member]);
        let t = task(&b, None, None);
        let c = comment(&t, author);

        assert!(!can_delete_comment(Principal::Profile(owner), &c));
        assert!(!can_delete_comment(Principal::Profile(member), &c));
        assert!(can_delete_comment(Principal::Profile(author), &c));
    }

    #[test]
    fn test_comments_follow_board_membership() {
        let [owner, member, outsider] = ids();
        let b = board(owner, &[member]);
        let t = task(&b, Some(outsider), None);

        assert!(can_view_or_create_comment(Principal::Profile(owner), &t, &b));
        assert!(can_view_or_create_comment(Principal::Profile(member), &t, &b));
        // Being assignee does not make an outsider a board member
        assert!(!can_view_or_create_comment(Principal::Profile(outsider), &t, &b));
    }

    #[test]
    fn test_unprovisioned_principal_is_denied_everything() {
        let [user] = ids();
        let b = board(user, &[user]);
        let t = task(&b, Some(user), Some(user));
        let c = comment(&t, user);
        let principal = Principal::Unprovisioned(user);

        assert!(!can_create_board(principal));
        assert!(!can_view_board(principal, &b));
        assert!(!can_manage_board(principal, &b));
        assert!(!can_delete_board(principal, &b));
        assert!(!can_create_task(principal, &b));
        assert!(!can_view_or_edit_task(principal, &t, &b));
        assert!(!can_delete_task(principal, &t, &b));
        assert!(!can_view_or_create_comment(principal, &t, &b));
        assert!(!can_delete_comment(principal, &c));

        assert!(can_create_board(Principal::Profile(user)));
    }

    #[test]
    fn test_rules_are_idempotent() {
        let [owner, member] = ids();
        let b = board(owner, &[member]);

        for principal in [Principal::Profile(owner), Principal::Profile(member)] {
            let first = can_delete_board(principal, &b);
            let second = can_delete_board(principal, &b);
            assert_eq!(first, second);
        }
    }

    #[test]
    fn test_decision_into_result() {
        let allowed: Decision<u8> = Decision::check(true, 7, DenyReason::NotBoardMember);
        assert_eq!(allowed.into_result().unwrap(), 7);

        let denied: Decision<u8> = Decision::check(false, 7, DenyReason::NotBoardOwner);
        assert!(matches!(
            denied.into_result(),
            Err(AuthzError::Forbidden(DenyReason::NotBoardOwner))
        ));

        let id = Uuid::new_v4();
        let missing: Decision<u8> = Decision::NotFound(Resource::Task(id));
        assert!(matches!(
            missing.into_result(),
            Err(AuthzError::NotFound(Resource::Task(found))) if found == id
        ));
    }

    #[test]
    fn test_decision_map_keeps_denials() {
        let denied: Decision<u8> = Decision::Deny(DenyReason::NoProfile);
        assert_eq!(denied.map(|v| v + 1), Decision::Deny(DenyReason::NoProfile));

        let allowed: Decision<u8> = Decision::Allow(1);
        assert_eq!(allowed.map(|v| v + 1), Decision::Allow(2));
    }

    #[test]
    fn test_deny_reason_codes() {
        assert_eq!(DenyReason::NoProfile.as_str(), "no_profile");
        assert_eq!(DenyReason::NotTaskParticipant.to_string(), "not_task_participant");
        assert_eq!(
            serde_json::to_string(&DenyReason::NotCommentAuthor).unwrap(),
            "\"not_comment_author\""
        );
    }

    #[test]
    fn test_denial_prefers_no_profile() {
        let [user] = ids();

        assert_eq!(
            denial(Principal::Unprovisioned(user), DenyReason::NotBoardOwner),
            DenyReason::NoProfile
        );
        assert_eq!(
            denial(Principal::Profile(user), DenyReason::NotBoardOwner),
            DenyReason::NotBoardOwner
        );
    }
}
