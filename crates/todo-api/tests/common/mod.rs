//! API テスト共通のシードデータとリクエストヘルパー

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::{self, Body};
use axum::Router;
use domain::{AuthToken, Email, PlainPassword, Todo, TodoId, User, UserId, AUTH_ACCESS};
use http::{Request, StatusCode};
use infrastructure::{
    Argon2PasswordHasher, InMemoryStore, PasswordHasher, TodoRepository, UserRepository,
};
use shared::TokenService;
use todo_api::{app_with_state, AppState};
use tower::ServiceExt; // for `oneshot`

pub const TEST_SECRET: &str = "integration-test-secret";

pub const USER_ONE_EMAIL: &str = "andrew@example.com";
pub const USER_ONE_PASSWORD: &str = "userOnePass";
pub const USER_TWO_EMAIL: &str = "jen@example.com";
pub const USER_TWO_PASSWORD: &str = "userTwoPass";

/// テストごとに作り直すシード済みアプリ
pub struct TestApp {
    pub store: Arc<InMemoryStore>,
    pub tokens: TokenService,
    pub todos: Vec<Todo>,
    pub users: Vec<User>,
    /// ユーザー 1 に登録済みのトークン
    pub user_one_token: String,
    state: AppState,
}

/// 応答のステータス・`x-auth` ヘッダー・JSON ボディ
pub struct TestResponse {
    pub status: StatusCode,
    pub auth_header: Option<String>,
    pub json: serde_json::Value,
}

pub fn test_hasher() -> Argon2PasswordHasher {
    // テストでは最小コストで十分
    Argon2PasswordHasher::with_cost(1024, 1).unwrap()
}

pub fn test_tokens() -> TokenService {
    TokenService::new(TEST_SECRET, chrono::Duration::hours(1))
}

impl TestApp {
    /// Todo 2 件（2 件目は完了済み）とユーザー 2 人（1 人目はトークン付き）を投入する
    pub async fn seeded() -> Self {
        let store = Arc::new(InMemoryStore::new());
        let tokens = test_tokens();
        let hasher = test_hasher();

        let mut user_one = seed_user(&hasher, USER_ONE_EMAIL, USER_ONE_PASSWORD);
        let user_one_token = tokens.issue(&user_one.id, AUTH_ACCESS).unwrap();
        user_one.add_token(AuthToken::auth(user_one_token.clone()));
        let user_two = seed_user(&hasher, USER_TWO_EMAIL, USER_TWO_PASSWORD);

        let first = Todo {
            id: TodoId::new(),
            text: "First test todo".to_string(),
            completed: false,
            completed_at: None,
            creator: Some(user_one.id.clone()),
        };
        let second = Todo {
            id: TodoId::new(),
            text: "Second test todo".to_string(),
            completed: true,
            completed_at: Some(333),
            creator: Some(user_two.id.clone()),
        };

        for user in [&user_one, &user_two] {
            store.insert_user(user).await.unwrap();
        }
        for todo in [&first, &second] {
            store.insert_todo(todo).await.unwrap();
        }

        let state = AppState::new(
            store.clone(),
            store.clone(),
            Arc::new(hasher),
            tokens.clone(),
        );

        Self {
            store,
            tokens,
            todos: vec![first, second],
            users: vec![user_one, user_two],
            user_one_token,
            state,
        }
    }

    pub fn router(&self) -> Router {
        app_with_state(self.state.clone())
    }

    pub async fn get(&self, uri: &str) -> TestResponse {
        self.send("GET", uri, None, None).await
    }

    pub async fn get_auth(&self, uri: &str, token: &str) -> TestResponse {
        self.send("GET", uri, None, Some(token)).await
    }

    pub async fn delete(&self, uri: &str) -> TestResponse {
        self.send("DELETE", uri, None, None).await
    }

    pub async fn post(&self, uri: &str, body: serde_json::Value) -> TestResponse {
        self.send("POST", uri, Some(body.to_string()), None).await
    }

    pub async fn post_auth(&self, uri: &str, body: serde_json::Value, token: &str) -> TestResponse {
        self.send("POST", uri, Some(body.to_string()), Some(token)).await
    }

    pub async fn post_raw(&self, uri: &str, raw: &str) -> TestResponse {
        self.send("POST", uri, Some(raw.to_string()), None).await
    }

    pub async fn patch(&self, uri: &str, body: serde_json::Value) -> TestResponse {
        self.send("PATCH", uri, Some(body.to_string()), None).await
    }

    async fn send(
        &self,
        method: &str,
        uri: &str,
        body: Option<String>,
        token: Option<&str>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if body.is_some() {
            builder = builder.header("content-type", "application/json");
        }
        if let Some(token) = token {
            builder = builder.header("x-auth", token);
        }
        let request = builder
            .body(body.map(Body::from).unwrap_or_else(Body::empty))
            .unwrap();

        let response = self.router().oneshot(request).await.unwrap();
        let status = response.status();
        let auth_header = response
            .headers()
            .get("x-auth")
            .map(|v| v.to_str().unwrap().to_string());
        let bytes = body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };

        TestResponse {
            status,
            auth_header,
            json,
        }
    }

    pub async fn todo_count(&self) -> usize {
        self.store.list_todos().await.unwrap().len()
    }

    pub async fn user_count(&self) -> usize {
        self.store.count_users().await.unwrap()
    }

    pub async fn stored_user(&self, id: &UserId) -> Option<User> {
        self.store.find_user(id).await.unwrap()
    }
}

fn seed_user(hasher: &Argon2PasswordHasher, email: &str, password: &str) -> User {
    let hash = hasher.hash(&PlainPassword::new(password)).unwrap();
    User::new(Email::parse(email).unwrap(), hash)
}

/// 存在しない（が形式は正しい）ID
pub fn unknown_id() -> String {
    TodoId::new().to_string()
}
