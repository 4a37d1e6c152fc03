use async_trait::async_trait;
use domain::{AuthToken, Email, Todo, TodoId, User, UserId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Email already registered: {0}")]
    DuplicateEmail(String),

    #[error("DynamoDB error: {0}")]
    DynamoDb(String),

    #[error("Concurrent modification: {0}")]
    Conflict(String),

    #[error("Corrupt document: {0}")]
    Corrupt(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// `todos` コレクションへのアクセス
#[async_trait]
pub trait TodoRepository: Send + Sync {
    async fn insert_todo(&self, todo: &Todo) -> StoreResult<()>;

    /// 全件を挿入順で取得
    async fn list_todos(&self) -> StoreResult<Vec<Todo>>;

    async fn find_todo(&self, id: &TodoId) -> StoreResult<Option<Todo>>;

    /// 既存ドキュメントを置き換える。対象が存在しなければ `None`
    async fn update_todo(&self, todo: &Todo) -> StoreResult<Option<Todo>>;

    /// 削除したドキュメントを返す。対象が存在しなければ `None`
    async fn delete_todo(&self, id: &TodoId) -> StoreResult<Option<Todo>>;
}

/// `users` コレクションへのアクセス
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// メールアドレスが登録済みなら `StoreError::DuplicateEmail`
    async fn insert_user(&self, user: &User) -> StoreResult<()>;

    async fn find_user(&self, id: &UserId) -> StoreResult<Option<User>>;

    async fn find_user_by_email(&self, email: &Email) -> StoreResult<Option<User>>;

    /// トークン一覧の末尾に追加し、更新後のユーザーを返す
    async fn push_token(&self, id: &UserId, token: AuthToken) -> StoreResult<Option<User>>;

    async fn count_users(&self) -> StoreResult<usize>;
}
