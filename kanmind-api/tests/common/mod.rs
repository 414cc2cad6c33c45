//! Shared helpers for HTTP-level tests
//!
//! Every test gets its own router over a fresh `MemoryStore`, so tests run in
//! parallel without a database. Users are seeded straight into the store and
//! handed an access token; only the auth tests go through registration.

#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use kanmind_api::{
    app::{build_router, AppState},
    config::Config,
};
use kanmind_shared::{
    auth::jwt::TokenType,
    models::{CreateUser, UserId},
    store::{memory::MemoryStore, EntityStore},
};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

pub const SECRET: &str = "integration-test-secret-of-32-bytes!";

/// A seeded user and their bearer token
#[derive(Debug, Clone)]
pub struct TestUser {
    pub id: UserId,
    pub email: String,
    pub token: String,
}

pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    pub store: Arc<MemoryStore>,
}

impl TestApp {
    pub fn new() -> Self {
        let config = Config::from_lookup(|key| match key {
            "JWT_SECRET" => Some(SECRET.to_string()),
            "STORE_BACKEND" => Some("memory".to_string()),
            _ => None,
        })
        .expect("test config");

        let store = Arc::new(MemoryStore::new());
        let state = AppState::new(store.clone(), config);

        Self {
            app: build_router(state.clone()),
            state,
            store,
        }
    }

    /// Creates a user with a profile, bypassing password hashing
    pub async fn user(&self, name: &str) -> TestUser {
        let email = format!("{}-{}@example.com", name.to_lowercase(), Uuid::new_v4());
        let user = self
            .store
            .create_user(CreateUser {
                email: email.clone(),
                fullname: name.to_string(),
                password_hash: "not-a-real-hash".to_string(),
            })
            .await
            .expect("seed user");

        TestUser {
            id: user.id,
            email,
            token: self.token_for(user.id),
        }
    }

    /// Access token for any id, whether or not the user exists
    pub fn token_for(&self, user_id: UserId) -> String {
        self.state
            .tokens
            .issue(user_id, TokenType::Access)
            .expect("issue token")
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }

        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("build request");

        let response = self.app.clone().oneshot(request).await.expect("call router");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");

        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };

        (status, json)
    }

    pub async fn get(&self, uri: &str, user: &TestUser) -> (StatusCode, Value) {
        self.send(Method::GET, uri, Some(&user.token), None).await
    }

    pub async fn post(&self, uri: &str, user: &TestUser, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, uri, Some(&user.token), Some(body)).await
    }

    pub async fn patch(&self, uri: &str, user: &TestUser, body: Value) -> (StatusCode, Value) {
        self.send(Method::PATCH, uri, Some(&user.token), Some(body)).await
    }

    pub async fn delete(&self, uri: &str, user: &TestUser) -> (StatusCode, Value) {
        self.send(Method::DELETE, uri, Some(&user.token), None).await
    }

    /// Creates a board through the API and returns its id
    pub async fn board(&self, owner: &TestUser, members: &[&TestUser]) -> Uuid {
        let members: Vec<String> = members.iter().map(|m| m.id.to_string()).collect();
        let (status, body) = self
            .post(
                "/api/boards",
                owner,
                serde_json::json!({ "title": "Board", "members": members }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create board: {}", body);
        id(&body)
    }

    /// Creates a task through the API and returns its id
    pub async fn task(
        &self,
        author: &TestUser,
        board_id: Uuid,
        assignee: Option<&TestUser>,
        reviewer: Option<&TestUser>,
    ) -> Uuid {
        let (status, body) = self
            .post(
                "/api/tasks",
                author,
                serde_json::json!({
                    "board": board_id,
                    "title": "Task",
                    "due_date": "2025-06-30",
                    "assignee_id": assignee.map(|u| u.id),
                    "reviewer_id": reviewer.map(|u| u.id),
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create task: {}", body);
        id(&body)
    }

    /// Creates a comment through the API and returns its id
    pub async fn comment(&self, author: &TestUser, task_id: Uuid) -> Uuid {
        let (status, body) = self
            .post(
                &format!("/api/tasks/{}/comments", task_id),
                author,
                serde_json::json!({ "content": "Looks good" }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create comment: {}", body);
        id(&body)
    }
}

pub fn id(body: &Value) -> Uuid {
    body["id"]
        .as_str()
        .and_then(|s| s.parse().ok())
        .unwrap_or_else(|| panic!("no id in {}", body))
}
