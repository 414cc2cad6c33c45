//! In-memory [`EntityStore`]
//!
//! Mirrors the PostgreSQL backend closely enough for the HTTP layer to be
//! exercised without a database: case-insensitive email uniqueness, reference
//! checks that stand in for foreign keys, cascading deletes and computed
//! counters. Rows are ordered by insertion, which matches the `created_at`
//! ordering of the SQL queries.

use std::collections::{BTreeSet, HashMap, HashSet};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{EntityStore, StoreError, StoreResult};
use crate::models::{
    Board, BoardId, BoardSummary, Comment, CommentId, CreateBoard, CreateComment, CreateTask,
    CreateUser, Task, TaskId, TaskPriority, TaskScope, TaskStatus, UpdateBoard, UpdateTask, User,
    UserId, UserProfile,
};

/// Stored value tagged with its insertion sequence number
#[derive(Debug, Clone)]
struct Row<T> {
    seq: u64,
    value: T,
}

#[derive(Debug, Default)]
struct Tables {
    seq: u64,
    users: HashMap<UserId, Row<User>>,
    profiles: HashSet<UserId>,
    boards: HashMap<BoardId, Row<Board>>,
    tasks: HashMap<TaskId, Row<Task>>,
    comments: HashMap<CommentId, Row<Comment>>,
}

impl Tables {
    fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    fn require_user(&self, id: UserId) -> StoreResult<()> {
        if self.users.contains_key(&id) {
            Ok(())
        } else {
            Err(StoreError::InvalidReference(format!("user {}", id)))
        }
    }

    fn require_users<'a>(&self, ids: impl IntoIterator<Item = &'a UserId>) -> StoreResult<()> {
        ids.into_iter().try_for_each(|id| self.require_user(*id))
    }

    fn profile(&self, id: UserId) -> Option<UserProfile> {
        if !self.profiles.contains(&id) {
            return None;
        }
        self.users.get(&id).map(|row| UserProfile::from(&row.value))
    }

    fn sorted_profiles(&self, mut profiles: Vec<UserProfile>) -> Vec<UserProfile> {
        profiles.sort_by(|a, b| a.fullname.cmp(&b.fullname).then(a.id.cmp(&b.id)));
        profiles
    }

    /// Task as the SQL query returns it, with its comment counter filled in
    fn task_view(&self, row: &Row<Task>) -> Task {
        let mut task = row.value.clone();
        task.comments_count = self
            .comments
            .values()
            .filter(|c| c.value.task_id == task.id)
            .count() as i64;
        task
    }

    /// Comment with the author's current display name
    fn comment_view(&self, row: &Row<Comment>) -> Comment {
        let mut comment = row.value.clone();
        if let Some(author) = self.users.get(&comment.author_id) {
            comment.author = author.value.fullname.clone();
        }
        comment
    }

    fn tasks_where(&self, predicate: impl Fn(&Task) -> bool) -> Vec<Task> {
        let mut rows: Vec<&Row<Task>> = self
            .tasks
            .values()
            .filter(|row| predicate(&row.value))
            .collect();
        rows.sort_by_key(|row| row.seq);
        rows.into_iter().map(|row| self.task_view(row)).collect()
    }

    fn remove_task_cascade(&mut self, id: TaskId) -> bool {
        let removed = self.tasks.remove(&id).is_some();
        if removed {
            self.comments.retain(|_, c| c.value.task_id != id);
        }
        removed
    }
}

/// Entity store kept entirely in process memory
///
/// Cloning is not supported; share it behind an `Arc` like any other store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops the profile record of a user while keeping the account
    ///
    /// Such a user can still authenticate but owns no profile; the access
    /// policy denies them everything that requires one.
    pub async fn remove_profile(&self, user_id: UserId) -> bool {
        self.tables.write().await.profiles.remove(&user_id)
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn create_user(&self, data: CreateUser) -> StoreResult<User> {
        let mut tables = self.tables.write().await;

        let email_lower = data.email.to_lowercase();
        if tables
            .users
            .values()
            .any(|row| row.value.email.to_lowercase() == email_lower)
        {
            return Err(StoreError::Conflict("Email already registered".to_string()));
        }

        let user = User {
            id: Uuid::new_v4(),
            email: data.email,
            fullname: data.fullname,
            password_hash: data.password_hash,
            created_at: Utc::now(),
        };

        let seq = tables.next_seq();
        tables.users.insert(
            user.id,
            Row {
                seq,
                value: user.clone(),
            },
        );
        tables.profiles.insert(user.id);

        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let tables = self.tables.read().await;
        let email_lower = email.to_lowercase();

        Ok(tables
            .users
            .values()
            .find(|row| row.value.email.to_lowercase() == email_lower)
            .map(|row| row.value.clone()))
    }

    async fn find_profile(&self, id: UserId) -> StoreResult<Option<UserProfile>> {
        Ok(self.tables.read().await.profile(id))
    }

    async fn find_profile_by_email(&self, email: &str) -> StoreResult<Option<UserProfile>> {
        let tables = self.tables.read().await;
        let email_lower = email.to_lowercase();

        Ok(tables
            .users
            .values()
            .find(|row| row.value.email.to_lowercase() == email_lower)
            .and_then(|row| tables.profile(row.value.id)))
    }

    async fn find_profiles(&self, ids: &BTreeSet<UserId>) -> StoreResult<Vec<UserProfile>> {
        let tables = self.tables.read().await;
        let profiles = ids.iter().filter_map(|id| tables.profile(*id)).collect();
        Ok(tables.sorted_profiles(profiles))
    }

    async fn list_profiles(&self) -> StoreResult<Vec<UserProfile>> {
        let tables = self.tables.read().await;
        let profiles = tables
            .profiles
            .iter()
            .filter_map(|id| tables.profile(*id))
            .collect();
        Ok(tables.sorted_profiles(profiles))
    }

    async fn create_board(&self, data: CreateBoard) -> StoreResult<Board> {
        let mut tables = self.tables.write().await;

        tables.require_user(data.owner_id)?;
        tables.require_users(&data.members)?;

        let board = Board {
            id: Uuid::new_v4(),
            title: data.title,
            owner_id: data.owner_id,
            members: data.members,
            created_at: Utc::now(),
        };

        let seq = tables.next_seq();
        tables.boards.insert(
            board.id,
            Row {
                seq,
                value: board.clone(),
            },
        );

        Ok(board)
    }

    async fn find_board(&self, id: BoardId) -> StoreResult<Option<Board>> {
        let tables = self.tables.read().await;
        Ok(tables.boards.get(&id).map(|row| row.value.clone()))
    }

    async fn list_board_summaries(&self, user_id: UserId) -> StoreResult<Vec<BoardSummary>> {
        let tables = self.tables.read().await;

        let mut rows: Vec<&Row<Board>> = tables
            .boards
            .values()
            .filter(|row| row.value.has_access(user_id))
            .collect();
        rows.sort_by_key(|row| row.seq);

        let summaries = rows
            .into_iter()
            .map(|row| {
                let board = &row.value;
                let tasks: Vec<&Task> = tables
                    .tasks
                    .values()
                    .map(|t| &t.value)
                    .filter(|t| t.board_id == board.id)
                    .collect();

                BoardSummary {
                    id: board.id,
                    title: board.title.clone(),
                    owner_id: board.owner_id,
                    member_count: board.members.len() as i64,
                    ticket_count: tasks.len() as i64,
                    tasks_to_do_count: tasks
                        .iter()
                        .filter(|t| t.status == TaskStatus::ToDo)
                        .count() as i64,
                    tasks_high_prio_count: tasks
                        .iter()
                        .filter(|t| t.priority == TaskPriority::High)
                        .count() as i64,
                }
            })
            .collect();

        Ok(summaries)
    }

    async fn update_board(&self, id: BoardId, data: UpdateBoard) -> StoreResult<Option<Board>> {
        let mut tables = self.tables.write().await;

        if !tables.boards.contains_key(&id) {
            return Ok(None);
        }
        if let Some(members) = &data.members {
            tables.require_users(members)?;
        }

        let Some(row) = tables.boards.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(title) = data.title {
            row.value.title = title;
        }
        if let Some(members) = data.members {
            row.value.members = members;
        }

        Ok(Some(row.value.clone()))
    }

    async fn delete_board(&self, id: BoardId) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;

        if tables.boards.remove(&id).is_none() {
            return Ok(false);
        }

        let task_ids: Vec<TaskId> = tables
            .tasks
            .values()
            .filter(|row| row.value.board_id == id)
            .map(|row| row.value.id)
            .collect();
        for task_id in task_ids {
            tables.remove_task_cascade(task_id);
        }

        Ok(true)
    }

    async fn create_task(&self, data: CreateTask) -> StoreResult<Task> {
        let mut tables = self.tables.write().await;

        if !tables.boards.contains_key(&data.board_id) {
            return Err(StoreError::InvalidReference(format!(
                "board {}",
                data.board_id
            )));
        }
        tables.require_users(data.assignee_id.iter().chain(data.reviewer_id.iter()))?;

        let task = Task {
            id: Uuid::new_v4(),
            board_id: data.board_id,
            title: data.title,
            description: data.description,
            status: data.status,
            priority: data.priority,
            assignee_id: data.assignee_id,
            reviewer_id: data.reviewer_id,
            due_date: data.due_date,
            created_at: Utc::now(),
            comments_count: 0,
        };

        let seq = tables.next_seq();
        tables.tasks.insert(
            task.id,
            Row {
                seq,
                value: task.clone(),
            },
        );

        Ok(task)
    }

    async fn find_task(&self, id: TaskId) -> StoreResult<Option<Task>> {
        let tables = self.tables.read().await;
        Ok(tables.tasks.get(&id).map(|row| tables.task_view(row)))
    }

    async fn list_board_tasks(&self, board_id: BoardId) -> StoreResult<Vec<Task>> {
        let tables = self.tables.read().await;
        Ok(tables.tasks_where(|t| t.board_id == board_id))
    }

    async fn list_tasks(&self, user_id: UserId, scope: TaskScope) -> StoreResult<Vec<Task>> {
        let tables = self.tables.read().await;

        let visible: HashSet<BoardId> = tables
            .boards
            .values()
            .filter(|row| row.value.has_access(user_id))
            .map(|row| row.value.id)
            .collect();

        Ok(tables.tasks_where(|t| {
            visible.contains(&t.board_id)
                && match scope {
                    TaskScope::Visible => true,
                    TaskScope::AssignedTo => t.is_assignee(user_id),
                    TaskScope::Reviewing => t.is_reviewer(user_id),
                }
        }))
    }

    async fn update_task(&self, id: TaskId, data: UpdateTask) -> StoreResult<Option<Task>> {
        let mut tables = self.tables.write().await;

        if !tables.tasks.contains_key(&id) {
            return Ok(None);
        }
        let referenced = data
            .assignee_id
            .iter()
            .flatten()
            .chain(data.reviewer_id.iter().flatten());
        tables.require_users(referenced)?;

        let Some(row) = tables.tasks.get_mut(&id) else {
            return Ok(None);
        };
        let task = &mut row.value;

        if let Some(title) = data.title {
            task.title = title;
        }
        if let Some(description) = data.description {
            task.description = description;
        }
        if let Some(status) = data.status {
            task.status = status;
        }
        if let Some(priority) = data.priority {
            task.priority = priority;
        }
        if let Some(assignee_id) = data.assignee_id {
            task.assignee_id = assignee_id;
        }
        if let Some(reviewer_id) = data.reviewer_id {
            task.reviewer_id = reviewer_id;
        }
        if let Some(due_date) = data.due_date {
            task.due_date = due_date;
        }

        Ok(tables.tasks.get(&id).map(|row| tables.task_view(row)))
    }

    async fn delete_task(&self, id: TaskId) -> StoreResult<bool> {
        Ok(self.tables.write().await.remove_task_cascade(id))
    }

    async fn create_comment(&self, data: CreateComment) -> StoreResult<Comment> {
        let mut tables = self.tables.write().await;

        if !tables.tasks.contains_key(&data.task_id) {
            return Err(StoreError::InvalidReference(format!("task {}", data.task_id)));
        }
        tables.require_user(data.author_id)?;

        let comment = Comment {
            id: Uuid::new_v4(),
            task_id: data.task_id,
            author_id: data.author_id,
            author: String::new(),
            content: data.content,
            created_at: Utc::now(),
        };

        let seq = tables.next_seq();
        let row = Row {
            seq,
            value: comment,
        };
        let view = tables.comment_view(&row);
        tables.comments.insert(view.id, row);

        Ok(view)
    }

    async fn find_comment(&self, id: CommentId) -> StoreResult<Option<Comment>> {
        let tables = self.tables.read().await;
        Ok(tables.comments.get(&id).map(|row| tables.comment_view(row)))
    }

    async fn list_comments(&self, task_id: TaskId) -> StoreResult<Vec<Comment>> {
        let tables = self.tables.read().await;

        let mut rows: Vec<&Row<Comment>> = tables
            .comments
            .values()
            .filter(|row| row.value.task_id == task_id)
            .collect();
        rows.sort_by_key(|row| row.seq);

        Ok(rows.into_iter().map(|row| tables.comment_view(row)).collect())
    }

    async fn delete_comment(&self, id: CommentId) -> StoreResult<bool> {
        Ok(self.tables.write().await.comments.remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    async fn user(store: &MemoryStore, email: &str, fullname: &str) -> User {
        store
            .create_user(CreateUser {
                email: email.to_string(),
                fullname: fullname.to_string(),
                password_hash: "hash".to_string(),
            })
            .await
            .unwrap()
    }

    fn new_task(board_id: BoardId) -> CreateTask {
        CreateTask {
            board_id,
            title: "Write docs".to_string(),
            description: None,
            status: TaskStatus::default(),
            priority: TaskPriority::default(),
            assignee_id: None,
            reviewer_id: None,
            due_date: NaiveDate::from_ymd_opt(2026, 1, 31).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_email_is_unique_ignoring_case() {
        let store = MemoryStore::new();
        user(&store, "ada@example.com", "Ada").await;

        let err = store
            .create_user(CreateUser {
                email: "ADA@example.com".to_string(),
                fullname: "Other".to_string(),
                password_hash: "hash".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        let found = store.find_user_by_email("Ada@Example.com").await.unwrap();
        assert!(found.is_some());
    }

    #[tokio::test]
    async fn test_removed_profile_is_hidden() {
        let store = MemoryStore::new();
        let ada = user(&store, "ada@example.com", "Ada").await;

        assert!(store.remove_profile(ada.id).await);
        assert!(store.find_profile(ada.id).await.unwrap().is_none());
        assert!(store.list_profiles().await.unwrap().is_empty());
        assert!(store.find_user_by_email("ada@example.com").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_board_rejects_unknown_member() {
        let store = MemoryStore::new();
        let ada = user(&store, "ada@example.com", "Ada").await;

        let err = store
            .create_board(CreateBoard::new(
                "Sprint",
                ada.id,
                [Uuid::new_v4()].into_iter().collect(),
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidReference(_)));
    }

    #[tokio::test]
    async fn test_board_summaries_count_tasks() {
        let store = MemoryStore::new();
        let ada = user(&store, "ada@example.com", "Ada").await;
        let bob = user(&store, "bob@example.com", "Bob").await;

        let board = store
            .create_board(CreateBoard::new("Sprint", ada.id, BTreeSet::new()))
            .await
            .unwrap();

        store.create_task(new_task(board.id)).await.unwrap();
        store
            .create_task(CreateTask {
                priority: TaskPriority::High,
                status: TaskStatus::Done,
                ..new_task(board.id)
            })
            .await
            .unwrap();

        let summaries = store.list_board_summaries(ada.id).await.unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].member_count, 1);
        assert_eq!(summaries[0].ticket_count, 2);
        assert_eq!(summaries[0].tasks_to_do_count, 1);
        assert_eq!(summaries[0].tasks_high_prio_count, 1);

        assert!(store.list_board_summaries(bob.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_board_cascades() {
        let store = MemoryStore::new();
        let ada = user(&store, "ada@example.com", "Ada").await;
        let board = store
            .create_board(CreateBoard::new("Sprint", ada.id, BTreeSet::new()))
            .await
            .unwrap();
        let task = store.create_task(new_task(board.id)).await.unwrap();
        let comment = store
            .create_comment(CreateComment {
                task_id: task.id,
                author_id: ada.id,
                content: "On it".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(comment.author, "Ada");

        assert!(store.delete_board(board.id).await.unwrap());
        assert!(store.find_task(task.id).await.unwrap().is_none());
        assert!(store.find_comment(comment.id).await.unwrap().is_none());
        assert!(!store.delete_board(board.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_task_scopes_and_comment_count() {
        let store = MemoryStore::new();
        let ada = user(&store, "ada@example.com", "Ada").await;
        let bob = user(&store, "bob@example.com", "Bob").await;
        let eve = user(&store, "eve@example.com", "Eve").await;

        let board = store
            .create_board(CreateBoard::new(
                "Sprint",
                ada.id,
                [bob.id].into_iter().collect(),
            ))
            .await
            .unwrap();

        let assigned = store
            .create_task(CreateTask {
                assignee_id: Some(bob.id),
                ..new_task(board.id)
            })
            .await
            .unwrap();
        store
            .create_task(CreateTask {
                reviewer_id: Some(bob.id),
                ..new_task(board.id)
            })
            .await
            .unwrap();

        store
            .create_comment(CreateComment {
                task_id: assigned.id,
                author_id: bob.id,
                content: "Started".to_string(),
            })
            .await
            .unwrap();

        let visible = store.list_tasks(bob.id, TaskScope::Visible).await.unwrap();
        assert_eq!(visible.len(), 2);
        assert_eq!(visible[0].id, assigned.id);
        assert_eq!(visible[0].comments_count, 1);

        let mine = store.list_tasks(bob.id, TaskScope::AssignedTo).await.unwrap();
        assert_eq!(mine.len(), 1);

        let reviewing = store.list_tasks(bob.id, TaskScope::Reviewing).await.unwrap();
        assert_eq!(reviewing.len(), 1);
        assert_ne!(reviewing[0].id, assigned.id);

        assert!(store.list_tasks(eve.id, TaskScope::Visible).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_task_clears_assignee() {
        let store = MemoryStore::new();
        let ada = user(&store, "ada@example.com", "Ada").await;
        let board = store
            .create_board(CreateBoard::new("Sprint", ada.id, BTreeSet::new()))
            .await
            .unwrap();
        let task = store
            .create_task(CreateTask {
                assignee_id: Some(ada.id),
                ..new_task(board.id)
            })
            .await
            .unwrap();

        let updated = store
            .update_task(
                task.id,
                UpdateTask {
                    assignee_id: Some(None),
                    title: Some("Renamed".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.assignee_id, None);
        assert_eq!(updated.title, "Renamed");
        assert!(store
            .update_task(Uuid::new_v4(), UpdateTask::default())
            .await
            .unwrap()
            .is_none());
    }
}
