//! Todo とユーザーの HTTP API（axum）
//!
//! ルーティングと共有状態をここで組み立て、ハンドラは `todos` / `users` に置く。

pub mod auth;
pub mod error;
pub mod models;
pub mod todos;
pub mod users;

use std::sync::Arc;

use axum::{
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use infrastructure::{InMemoryStore, PasswordHasher, TodoRepository, UserRepository};
use shared::TokenService;
use tower_http::trace::TraceLayer;

use crate::models::HealthBody;

/// アプリケーションの共有状態
#[derive(Clone)]
pub struct AppState {
    pub todos: Arc<dyn TodoRepository>,
    pub users: Arc<dyn UserRepository>,
    pub passwords: Arc<dyn PasswordHasher>,
    pub tokens: TokenService,
}

impl AppState {
    pub fn new(
        todos: Arc<dyn TodoRepository>,
        users: Arc<dyn UserRepository>,
        passwords: Arc<dyn PasswordHasher>,
        tokens: TokenService,
    ) -> Self {
        Self {
            todos,
            users,
            passwords,
            tokens,
        }
    }

    /// 1 つの InMemoryStore を Todo とユーザーの両方に使う
    pub fn in_memory(tokens: TokenService, passwords: Arc<dyn PasswordHasher>) -> Self {
        let store = Arc::new(InMemoryStore::new());
        Self::new(store.clone(), store, passwords, tokens)
    }
}

/// 外部から状態を注入してルータを構築
pub fn app_with_state(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/todos", get(todos::list_todos).post(todos::create_todo))
        .route(
            "/todos/:id",
            get(todos::get_todo)
                .patch(todos::patch_todo)
                .delete(todos::delete_todo),
        )
        .route("/users", post(users::create_user))
        .route("/users/login", post(users::login))
        .route("/users/me", get(users::me))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// ヘルスチェック用ハンドラ
async fn health() -> impl IntoResponse {
    let body = HealthBody { status: "ok" };
    (StatusCode::OK, Json(body))
}
