//! Common test utilities for API integration tests
//!
//! Builds the real router over the seeded in-memory store, creates a small
//! organization, and mints access tokens so tests can drive the API through
//! `tower::Service::call` without a network or database.
//!
//! | User | Role | Department |
//! |---|---|---|
//! | `ceo` | CEO | Executive |
//! | `director` | DIRECTOR | Engineering |
//! | `worker` | NORMAL_USER | Engineering |
//! | `outsider` | NORMAL_USER | Sales |

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    response::Response,
    Router,
};
use serde_json::{json, Value};
use std::sync::OnceLock;
use taskflow_api::{
    app::{build_router, AppState},
    config::{ApiConfig, Config, JwtConfig, StoreBackend},
};
use taskflow_shared::{
    auth::password::hash_password,
    models::{
        permission::PermissionSet,
        role::{ROLE_CEO, ROLE_DIRECTOR, ROLE_NORMAL_USER},
        user::{CreateUser, User, UserStatus},
    },
    store::Stores,
};
use tower::Service as _;
use uuid::Uuid;

pub const PASSWORD: &str = "Correct-Horse-9";

/// Argon2 is slow on purpose; hash once per test binary
fn password_hash() -> &'static str {
    static HASH: OnceLock<String> = OnceLock::new();
    HASH.get_or_init(|| hash_password(PASSWORD).unwrap())
}

pub fn test_config() -> Config {
    Config {
        api: ApiConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            production: false,
            cors_origins: Vec::new(),
        },
        store: StoreBackend::Memory,
        database: None,
        jwt: JwtConfig {
            secret: "test-secret-key-at-least-32-bytes-long".to_string(),
            access_ttl_hours: 1,
        },
        bootstrap_admin: None,
    }
}

/// A seeded user with a ready-made access token
#[derive(Clone)]
pub struct TestUser {
    pub user: User,
    pub token: String,
}

impl TestUser {
    pub fn id(&self) -> Uuid {
        self.user.id
    }
}

/// Test context containing all necessary resources
pub struct TestContext {
    pub app: Router,
    pub state: AppState,
    pub ceo: TestUser,
    pub director: TestUser,
    pub worker: TestUser,
    pub outsider: TestUser,
}

impl TestContext {
    pub async fn new() -> Self {
        let state = AppState::new(Stores::in_memory(), test_config());
        let app = build_router(state.clone());

        let ceo = Self::seed(&state, "ceo", ROLE_CEO, "Executive").await;
        let director = Self::seed(&state, "director", ROLE_DIRECTOR, "Engineering").await;
        let worker = Self::seed(&state, "worker", ROLE_NORMAL_USER, "Engineering").await;
        let outsider = Self::seed(&state, "outsider", ROLE_NORMAL_USER, "Sales").await;

        Self {
            app,
            state,
            ceo,
            director,
            worker,
            outsider,
        }
    }

    async fn seed(state: &AppState, username: &str, role: &str, department: &str) -> TestUser {
        let user = state
            .stores
            .directory
            .insert_user(CreateUser {
                username: username.to_string(),
                email: format!("{}@example.com", username),
                department: Some(department.to_string()),
                status: UserStatus::Active,
                roles: vec![role.to_string()],
                permissions: PermissionSet::new(),
                password_hash: password_hash().to_string(),
            })
            .await
            .unwrap();
        let token = state.tokens.issue_access(&user).unwrap();
        TestUser { user, token }
    }

    /// Sends a request and returns the raw response
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        let body = match body {
            Some(value) => {
                builder = builder.header("content-type", "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };

        self.app
            .clone()
            .call(builder.body(body).unwrap())
            .await
            .unwrap()
    }

    /// Sends a request and decodes the JSON body (`Null` when empty)
    pub async fn call(
        &self,
        method: Method,
        uri: &str,
        as_user: Option<&TestUser>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let response = self
            .send(method, uri, as_user.map(|u| u.token.as_str()), body)
            .await;
        read_json(response).await
    }

    pub async fn get(&self, uri: &str, as_user: &TestUser) -> (StatusCode, Value) {
        self.call(Method::GET, uri, Some(as_user), None).await
    }

    pub async fn post(&self, uri: &str, as_user: &TestUser, body: Value) -> (StatusCode, Value) {
        self.call(Method::POST, uri, Some(as_user), Some(body)).await
    }

    pub async fn put(&self, uri: &str, as_user: &TestUser, body: Value) -> (StatusCode, Value) {
        self.call(Method::PUT, uri, Some(as_user), Some(body)).await
    }

    /// Creates a task through the API and returns its ID
    pub async fn create_task(&self, creator: &TestUser, assignee: &TestUser, title: &str) -> Uuid {
        let (status, body) = self
            .post(
                "/api/v1/task/add",
                creator,
                json!({
                    "title": title,
                    "description": "Created by a test",
                    "dueDate": (chrono::Utc::now() + chrono::Duration::days(7)).to_rfc3339(),
                    "priority": "HIGH",
                    "categories": ["Engineering"],
                    "assignedTo": assignee.id(),
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create failed: {}", body);
        body["id"].as_str().unwrap().parse().unwrap()
    }
}

pub async fn read_json(response: Response) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| {
            Value::String(String::from_utf8_lossy(&bytes).into_owned())
        })
    };
    (status, value)
}
