use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use domain::{Todo, TodoId, TodoPatch};

use crate::auth::OptionalUser;
use crate::error::ApiError;
use crate::models::{CreateTodoRequest, TodoListResponse, TodoResponse};
use crate::AppState;

/// パスパラメータを TodoId に変換
///
/// 形式不正は「存在しない」と同じ 404 にする。
fn parse_todo_id(raw: &str) -> Result<TodoId, ApiError> {
    TodoId::parse(raw).map_err(|e| {
        tracing::debug!(error = %e, "Rejected malformed todo id");
        ApiError::NotFound
    })
}

/// POST /todos
pub async fn create_todo(
    State(state): State<AppState>,
    OptionalUser(caller): OptionalUser,
    payload: Result<Json<CreateTodoRequest>, JsonRejection>,
) -> Result<Json<Todo>, ApiError> {
    let Json(req) = payload?;
    let creator = caller.map(|c| c.user.id);

    let todo = Todo::new(req.text.as_deref(), creator)?;
    state.todos.insert_todo(&todo).await?;

    tracing::info!(todo_id = %todo.id, "Todo created");
    Ok(Json(todo))
}

/// GET /todos
pub async fn list_todos(State(state): State<AppState>) -> Result<Json<TodoListResponse>, ApiError> {
    let todos = state.todos.list_todos().await?;
    Ok(Json(TodoListResponse { todos }))
}

/// GET /todos/:id
pub async fn get_todo(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<TodoResponse>, ApiError> {
    let id = parse_todo_id(&id)?;
    let todo = state.todos.find_todo(&id).await?.ok_or(ApiError::NotFound)?;
    Ok(Json(TodoResponse { todo }))
}

/// DELETE /todos/:id
pub async fn delete_todo(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<TodoResponse>, ApiError> {
    let id = parse_todo_id(&id)?;
    let todo = state.todos.delete_todo(&id).await?.ok_or(ApiError::NotFound)?;

    tracing::info!(todo_id = %todo.id, "Todo deleted");
    Ok(Json(TodoResponse { todo }))
}

/// PATCH /todos/:id（text / completed の部分更新）
pub async fn patch_todo(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<TodoPatch>, JsonRejection>,
) -> Result<Json<TodoResponse>, ApiError> {
    let id = parse_todo_id(&id)?;
    let Json(patch) = payload?;

    let mut todo = state.todos.find_todo(&id).await?.ok_or(ApiError::NotFound)?;
    todo.apply(patch, Utc::now())?;

    // 読み取り後に削除されていれば 404
    let todo = state.todos.update_todo(&todo).await?.ok_or(ApiError::NotFound)?;
    Ok(Json(TodoResponse { todo }))
}
