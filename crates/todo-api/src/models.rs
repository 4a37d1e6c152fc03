use domain::{Todo, User};
use serde::{Deserialize, Serialize};

/// POST /todos リクエスト
#[derive(Debug, Deserialize)]
pub struct CreateTodoRequest {
    pub text: Option<String>,
}

/// GET /todos レスポンス
#[derive(Debug, Serialize, Deserialize)]
pub struct TodoListResponse {
    pub todos: Vec<Todo>,
}

/// 単一 Todo を返すレスポンス
#[derive(Debug, Serialize, Deserialize)]
pub struct TodoResponse {
    pub todo: Todo,
}

/// POST /users と POST /users/login のリクエスト
#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// ユーザーの公開ビュー（パスワードとトークンは含めない）
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.as_str().to_string(),
            email: user.email.as_str().to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthBody {
    /// サービスの簡易ステータス
    pub status: &'static str,
}
