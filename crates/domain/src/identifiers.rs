use crate::errors::{DomainError, DomainResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::OnceLock;

/// ObjectId 形式の文字列長（12 バイトを 16 進表記）
pub const OBJECT_ID_LEN: usize = 24;

static PROCESS_UNIQUE: OnceLock<[u8; 5]> = OnceLock::new();
static COUNTER: OnceLock<AtomicU32> = OnceLock::new();

/// 12 バイトの ObjectId を生成して 16 進文字列で返す
///
/// 先頭 4 バイトは秒単位のタイムスタンプ（ビッグエンディアン）、続く 5 バイトは
/// プロセス固有の乱数、末尾 3 バイトはカウンタ。文字列の辞書順が生成順とほぼ一致する。
fn generate_object_id() -> String {
    let seconds = Utc::now().timestamp() as u32;
    let unique = PROCESS_UNIQUE.get_or_init(rand::random::<[u8; 5]>);
    let count = COUNTER
        .get_or_init(|| AtomicU32::new(rand::random::<u32>()))
        .fetch_add(1, Ordering::Relaxed);

    let mut bytes = [0u8; 12];
    bytes[0..4].copy_from_slice(&seconds.to_be_bytes());
    bytes[4..9].copy_from_slice(unique);
    bytes[9..12].copy_from_slice(&count.to_be_bytes()[1..4]);

    hex::encode(bytes)
}

/// 24 桁の 16 進文字列かどうか（大文字小文字は問わない）
fn is_object_id(s: &str) -> bool {
    s.len() == OBJECT_ID_LEN && s.bytes().all(|b| b.is_ascii_hexdigit())
}

fn object_id_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let mut head = [0u8; 4];
    hex::decode_to_slice(s.get(0..8)?, &mut head).ok()?;
    DateTime::from_timestamp(i64::from(u32::from_be_bytes(head)), 0)
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TodoId(String);

impl TodoId {
    pub fn new() -> Self {
        Self(generate_object_id())
    }

    /// 外部入力（パスパラメータ等）から TodoId を作成
    ///
    /// ObjectId 形式でなければストアに問い合わせる前に拒否する。
    pub fn parse(s: &str) -> DomainResult<Self> {
        if !is_object_id(s) {
            return Err(DomainError::InvalidTodoId(s.to_string()));
        }
        Ok(Self(s.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        object_id_timestamp(&self.0)
    }
}

impl fmt::Display for TodoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Default for TodoId {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new() -> Self {
        Self(generate_object_id())
    }

    pub fn parse(s: &str) -> DomainResult<Self> {
        if !is_object_id(s) {
            return Err(DomainError::InvalidUserId(s.to_string()));
        }
        Ok(Self(s.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_todo_id_new_generates_24_hex_chars() {
        let id = TodoId::new();

        assert_eq!(id.as_str().len(), OBJECT_ID_LEN);
        assert!(id.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        assert!(TodoId::parse(id.as_str()).is_ok());
    }

    #[test]
    fn test_generated_ids_are_unique_and_ordered() {
        let first = TodoId::new();
        let second = TodoId::new();

        assert_ne!(first, second);
        // 同一秒内ではカウンタ部分で順序付けされる
        if first.created_at() == second.created_at() && !first.as_str().ends_with("ffffff") {
            assert!(first.as_str() < second.as_str());
        }
    }

    #[test]
    fn test_parse_rejects_malformed_ids() {
        for input in ["123abc", "", "zzzzzzzzzzzzzzzzzzzzzzzz", "5f1d7c3a9b1e8a0012345678a"] {
            assert_eq!(
                TodoId::parse(input),
                Err(DomainError::InvalidTodoId(input.to_string()))
            );
            assert!(UserId::parse(input).is_err());
        }
    }

    #[test]
    fn test_parse_normalizes_case() {
        let id = TodoId::parse("5F1D7C3A9B1E8A0012345678").unwrap();

        assert_eq!(id.as_str(), "5f1d7c3a9b1e8a0012345678");
    }

    #[test]
    fn test_created_at_reads_leading_timestamp() {
        let id = TodoId::parse("5f1d7c3a0000000000000000").unwrap();

        assert_eq!(id.created_at().unwrap().timestamp(), 0x5f1d7c3a);
    }
}
