use crate::errors::ValidationErrors;
use crate::identifiers::{TodoId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Todo {
    pub id: TodoId,
    pub text: String,
    #[serde(default)]
    pub completed: bool,
    /// 完了時刻（ミリ秒）。`completed == true` の間だけ存在する
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator: Option<UserId>,
}

/// PATCH /todos/:id で受け付ける部分更新
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TodoPatch {
    pub text: Option<String>,
    pub completed: Option<bool>,
}

impl Todo {
    /// 新しい Todo を作成（テキストはトリムして保持）
    pub fn new(text: Option<&str>, creator: Option<UserId>) -> Result<Self, ValidationErrors> {
        let text = validate_text(text)?;

        Ok(Self {
            id: TodoId::new(),
            text,
            completed: false,
            completed_at: None,
            creator,
        })
    }

    /// 部分更新を適用する
    ///
    /// 検証に失敗した場合は何も変更しない。`completed` が省略された場合は完了状態を維持する。
    pub fn apply(&mut self, patch: TodoPatch, now: DateTime<Utc>) -> Result<(), ValidationErrors> {
        let text = match patch.text {
            Some(text) => Some(validate_text(Some(&text))?),
            None => None,
        };

        if let Some(text) = text {
            self.text = text;
        }

        match patch.completed {
            Some(true) => self.complete(now),
            Some(false) => self.reopen(),
            None => {}
        }

        Ok(())
    }

    pub fn complete(&mut self, at: DateTime<Utc>) {
        self.completed = true;
        self.completed_at = Some(at.timestamp_millis());
    }

    pub fn reopen(&mut self) {
        self.completed = false;
        self.completed_at = None;
    }
}

/// Todo テキストの検証（必須・トリム後 1 文字以上）
pub fn validate_text(text: Option<&str>) -> Result<String, ValidationErrors> {
    match text.map(str::trim) {
        None => Err(ValidationErrors::single("text", "is required")),
        Some("") => Err(ValidationErrors::single("text", "must not be empty")),
        Some(trimmed) => Ok(trimmed.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_todo() -> Todo {
        Todo::new(Some("First test todo"), None).unwrap()
    }

    #[test]
    fn test_todo_creation_trims_text() {
        let creator = UserId::new();

        let todo = Todo::new(Some("  Buy milk  "), Some(creator.clone())).unwrap();

        assert_eq!(todo.text, "Buy milk");
        assert!(!todo.completed);
        assert_eq!(todo.completed_at, None);
        assert_eq!(todo.creator, Some(creator));
    }

    #[test]
    fn test_todo_creation_rejects_missing_or_blank_text() {
        for input in [None, Some(""), Some("   ")] {
            let errors = Todo::new(input, None).unwrap_err();
            assert!(errors.has_field("text"), "input: {input:?}");
        }
    }

    #[test]
    fn test_complete_sets_completed_at() {
        let mut todo = sample_todo();
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();

        todo.apply(
            TodoPatch {
                completed: Some(true),
                ..TodoPatch::default()
            },
            now,
        )
        .unwrap();

        assert!(todo.completed);
        assert_eq!(todo.completed_at, Some(now.timestamp_millis()));
    }

    #[test]
    fn test_reopen_clears_completed_at() {
        let mut todo = sample_todo();
        todo.complete(Utc::now());

        todo.apply(
            TodoPatch {
                text: Some("Updated".to_string()),
                completed: Some(false),
            },
            Utc::now(),
        )
        .unwrap();

        assert_eq!(todo.text, "Updated");
        assert!(!todo.completed);
        assert_eq!(todo.completed_at, None);
    }

    #[test]
    fn test_patch_without_completed_keeps_state() {
        let mut todo = sample_todo();
        let done_at = Utc::now();
        todo.complete(done_at);

        todo.apply(
            TodoPatch {
                text: Some("Renamed".to_string()),
                completed: None,
            },
            Utc::now(),
        )
        .unwrap();

        assert!(todo.completed);
        assert_eq!(todo.completed_at, Some(done_at.timestamp_millis()));
    }

    #[test]
    fn test_invalid_patch_leaves_todo_untouched() {
        let mut todo = sample_todo();
        let before = todo.clone();

        let result = todo.apply(
            TodoPatch {
                text: Some(" ".to_string()),
                completed: Some(true),
            },
            Utc::now(),
        );

        assert!(result.is_err());
        assert_eq!(todo, before);
    }

    #[test]
    fn test_serialized_todo_omits_absent_completed_at() {
        let todo = sample_todo();

        let json = serde_json::to_value(&todo).unwrap();

        assert_eq!(json["text"], "First test todo");
        assert_eq!(json["completed"], false);
        assert!(json.get("completedAt").is_none());
        assert!(json.get("creator").is_none());
    }
}
