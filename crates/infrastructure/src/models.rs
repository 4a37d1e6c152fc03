//! DynamoDB シングルテーブル上のドキュメント表現
//!
//! 各ドキュメントは `PK` / `SK` のキーと、本体 JSON を格納する `Data` 属性を持つ。

use crate::repositories::{StoreError, StoreResult};
use aws_sdk_dynamodb::types::AttributeValue;
use domain::{Email, TodoId, UserId};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;

pub type Item = HashMap<String, AttributeValue>;

pub const TODO_PARTITION: &str = "TODO";
pub const USER_PARTITION: &str = "USER";
pub const EMAIL_PARTITION: &str = "EMAIL";

/// 楽観的ロック用のバージョン属性
pub const VERSION_ATTR: &str = "Version";

/// アイテムのエンティティタイプ
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityType {
    Todo,
    User,
    /// メールアドレスの一意性を保証するためのロックアイテム
    EmailLock,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Todo => "Todo",
            EntityType::User => "User",
            EntityType::EmailLock => "EmailLock",
        }
    }
}

/// シングルテーブル設計のキー構造
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DynamoDbKeys {
    pub pk: String,
    pub sk: String,
}

impl DynamoDbKeys {
    /// SK は ObjectId の辞書順（≒作成順）で並ぶ
    pub fn for_todo(id: &TodoId) -> Self {
        Self {
            pk: TODO_PARTITION.to_string(),
            sk: format!("TODO#{}", id.as_str()),
        }
    }

    pub fn for_user(id: &UserId) -> Self {
        Self {
            pk: USER_PARTITION.to_string(),
            sk: format!("USER#{}", id.as_str()),
        }
    }

    pub fn for_email(email: &Email) -> Self {
        Self {
            pk: EMAIL_PARTITION.to_string(),
            sk: format!("EMAIL#{}", email.as_str()),
        }
    }

    pub fn to_key_map(&self) -> Item {
        let mut map = HashMap::new();
        map.insert("PK".to_string(), AttributeValue::S(self.pk.clone()));
        map.insert("SK".to_string(), AttributeValue::S(self.sk.clone()));
        map
    }
}

/// ドキュメントを `Data` 属性に JSON として格納したアイテムを作る
pub fn document_item<T: Serialize>(
    keys: &DynamoDbKeys,
    entity_type: EntityType,
    document: &T,
) -> StoreResult<Item> {
    let mut item = keys.to_key_map();
    item.insert(
        "EntityType".to_string(),
        AttributeValue::S(entity_type.as_str().to_string()),
    );
    item.insert(
        "Data".to_string(),
        AttributeValue::S(serde_json::to_string(document)?),
    );
    Ok(item)
}

/// `Data` 属性からドキュメントを復元
pub fn document_from_item<T: DeserializeOwned>(item: &Item) -> StoreResult<T> {
    let data = item
        .get("Data")
        .and_then(|v| v.as_s().ok())
        .ok_or_else(|| StoreError::Corrupt("missing Data attribute".to_string()))?;
    Ok(serde_json::from_str(data)?)
}

/// バージョン属性を付与する
pub fn with_version(mut item: Item, version: u64) -> Item {
    item.insert(
        VERSION_ATTR.to_string(),
        AttributeValue::N(version.to_string()),
    );
    item
}

/// バージョン属性を読む。属性が無いアイテムは 0 とみなす
pub fn item_version(item: &Item) -> StoreResult<u64> {
    match item.get(VERSION_ATTR) {
        None => Ok(0),
        Some(value) => value
            .as_n()
            .ok()
            .and_then(|n| n.parse().ok())
            .ok_or_else(|| StoreError::Corrupt(format!("invalid {VERSION_ATTR} attribute"))),
    }
}

/// メールアドレス → ユーザー ID のロックアイテム
pub fn email_lock_item(email: &Email, user_id: &UserId) -> Item {
    let mut item = DynamoDbKeys::for_email(email).to_key_map();
    item.insert(
        "EntityType".to_string(),
        AttributeValue::S(EntityType::EmailLock.as_str().to_string()),
    );
    item.insert(
        "UserId".to_string(),
        AttributeValue::S(user_id.as_str().to_string()),
    );
    item
}

pub fn user_id_from_lock(item: &Item) -> StoreResult<UserId> {
    let raw = item
        .get("UserId")
        .and_then(|v| v.as_s().ok())
        .ok_or_else(|| StoreError::Corrupt("missing UserId attribute".to_string()))?;
    UserId::parse(raw).map_err(|e| StoreError::Corrupt(e.to_string()))
}
