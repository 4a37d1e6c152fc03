//! プロセス内ドキュメントストア（開発/テスト用）

use crate::repositories::{StoreError, StoreResult, TodoRepository, UserRepository};
use async_trait::async_trait;
use domain::{AuthToken, Email, Todo, TodoId, User, UserId};
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Default)]
pub struct InMemoryStore {
    // 挿入順を保持する
    todos: Mutex<Vec<Todo>>,
    users: Mutex<Vec<User>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn todos(&self) -> MutexGuard<'_, Vec<Todo>> {
        self.todos.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn users(&self) -> MutexGuard<'_, Vec<User>> {
        self.users.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl TodoRepository for InMemoryStore {
    async fn insert_todo(&self, todo: &Todo) -> StoreResult<()> {
        self.todos().push(todo.clone());
        Ok(())
    }

    async fn list_todos(&self) -> StoreResult<Vec<Todo>> {
        Ok(self.todos().clone())
    }

    async fn find_todo(&self, id: &TodoId) -> StoreResult<Option<Todo>> {
        Ok(self.todos().iter().find(|t| &t.id == id).cloned())
    }

    async fn update_todo(&self, todo: &Todo) -> StoreResult<Option<Todo>> {
        let mut todos = self.todos();
        match todos.iter_mut().find(|t| t.id == todo.id) {
            Some(existing) => {
                *existing = todo.clone();
                Ok(Some(todo.clone()))
            }
            None => Ok(None),
        }
    }

    async fn delete_todo(&self, id: &TodoId) -> StoreResult<Option<Todo>> {
        let mut todos = self.todos();
        Ok(todos
            .iter()
            .position(|t| &t.id == id)
            .map(|index| todos.remove(index)))
    }
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        let mut users = self.users();
        if users.iter().any(|u| u.email == user.email) {
            return Err(StoreError::DuplicateEmail(user.email.to_string()));
        }
        users.push(user.clone());
        Ok(())
    }

    async fn find_user(&self, id: &UserId) -> StoreResult<Option<User>> {
        Ok(self.users().iter().find(|u| &u.id == id).cloned())
    }

    async fn find_user_by_email(&self, email: &Email) -> StoreResult<Option<User>> {
        Ok(self.users().iter().find(|u| &u.email == email).cloned())
    }

    async fn push_token(&self, id: &UserId, token: AuthToken) -> StoreResult<Option<User>> {
        let mut users = self.users();
        Ok(users.iter_mut().find(|u| &u.id == id).map(|user| {
            user.add_token(token);
            user.clone()
        }))
    }

    async fn count_users(&self) -> StoreResult<usize> {
        Ok(self.users().len())
    }
}
