use crate::models::{
    document_from_item, document_item, email_lock_item, item_version, user_id_from_lock,
    with_version, DynamoDbKeys, EntityType, Item, TODO_PARTITION, USER_PARTITION, VERSION_ATTR,
};
use crate::repositories::{StoreError, StoreResult, TodoRepository, UserRepository};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_dynamodb::error::DisplayErrorContext;
use aws_sdk_dynamodb::operation::transact_write_items::TransactWriteItemsError;
use aws_sdk_dynamodb::types::{
    AttributeDefinition, AttributeValue, BillingMode, CancellationReason, KeySchemaElement,
    KeyType, Put, ReturnValue, ScalarAttributeType, Select, TransactWriteItem,
};
use std::time::Duration;
use aws_sdk_dynamodb::Client;
use domain::{AuthToken, Email, Todo, TodoId, User, UserId};
use shared::Config;
use tracing::{debug, info, warn};

/// `insert_user` のトランザクション内でメールロックを書き込む位置
const EMAIL_LOCK_INDEX: usize = 1;

/// `push_token` の楽観的ロック競合時の最大試行回数
const MAX_TOKEN_PUSH_ATTEMPTS: u32 = 5;
const TOKEN_PUSH_BACKOFF: Duration = Duration::from_millis(20);

fn backend_error<E>(e: E) -> StoreError
where
    E: std::error::Error,
{
    StoreError::DynamoDb(DisplayErrorContext(&e).to_string())
}

/// キャンセル理由のうち、メールロックの条件チェック失敗だけを重複とみなす
fn is_email_lock_conflict(reasons: &[CancellationReason]) -> bool {
    reasons
        .get(EMAIL_LOCK_INDEX)
        .and_then(|reason| reason.code())
        == Some("ConditionalCheckFailed")
}

/// DynamoDB をドキュメントストアとして使う実装
#[derive(Clone)]
pub struct DynamoDbStore {
    client: Client,
    table_name: String,
}

impl DynamoDbStore {
    pub async fn new(config: &Config) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.aws_region.clone()));
        if let Some(endpoint) = &config.dynamodb_endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        let aws_config = loader.load().await;

        Self::from_client(Client::new(&aws_config), &config.dynamodb_table)
    }

    pub fn from_client(client: Client, table_name: &str) -> Self {
        Self {
            client,
            table_name: table_name.to_string(),
        }
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// テーブルが無ければ作成する（DynamoDB Local 向け）
    pub async fn ensure_table(&self) -> StoreResult<()> {
        match self
            .client
            .describe_table()
            .table_name(&self.table_name)
            .send()
            .await
        {
            Ok(_) => return Ok(()),
            Err(e)
                if e.as_service_error()
                    .is_some_and(|se| se.is_resource_not_found_exception()) => {}
            Err(e) => return Err(backend_error(e)),
        }

        info!(table = %self.table_name, "Creating DynamoDB table");

        self.client
            .create_table()
            .table_name(&self.table_name)
            .billing_mode(BillingMode::PayPerRequest)
            .attribute_definitions(
                AttributeDefinition::builder()
                    .attribute_name("PK")
                    .attribute_type(ScalarAttributeType::S)
                    .build()
                    .map_err(backend_error)?,
            )
            .attribute_definitions(
                AttributeDefinition::builder()
                    .attribute_name("SK")
                    .attribute_type(ScalarAttributeType::S)
                    .build()
                    .map_err(backend_error)?,
            )
            .key_schema(
                KeySchemaElement::builder()
                    .attribute_name("PK")
                    .key_type(KeyType::Hash)
                    .build()
                    .map_err(backend_error)?,
            )
            .key_schema(
                KeySchemaElement::builder()
                    .attribute_name("SK")
                    .key_type(KeyType::Range)
                    .build()
                    .map_err(backend_error)?,
            )
            .send()
            .await
            .map_err(backend_error)?;

        Ok(())
    }

    async fn get_item(&self, keys: &DynamoDbKeys) -> StoreResult<Option<Item>> {
        let output = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .set_key(Some(keys.to_key_map()))
            .consistent_read(true)
            .send()
            .await
            .map_err(backend_error)?;

        Ok(output.item)
    }

    /// 読み取り時のバージョンが変わっていない場合だけ上書きする
    ///
    /// 削除済み、または他の書き込みが先行した場合は `false`。
    async fn replace_versioned_item(&self, item: Item, expected: u64) -> StoreResult<bool> {
        let result = self
            .client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(with_version(item, expected + 1)))
            .condition_expression(
                "attribute_exists(PK) AND (attribute_not_exists(#version) OR #version = :expected)",
            )
            .expression_attribute_names("#version", VERSION_ATTR)
            .expression_attribute_values(":expected", AttributeValue::N(expected.to_string()))
            .send()
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(e)
                if e.as_service_error()
                    .is_some_and(|se| se.is_conditional_check_failed_exception()) =>
            {
                Ok(false)
            }
            Err(e) => Err(backend_error(e)),
        }
    }

    /// 既存アイテムのみ上書きする。存在しなければ `false`
    async fn replace_item(&self, item: Item) -> StoreResult<bool> {
        let result = self
            .client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(item))
            .condition_expression("attribute_exists(PK)")
            .send()
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(e)
                if e.as_service_error()
                    .is_some_and(|se| se.is_conditional_check_failed_exception()) =>
            {
                Ok(false)
            }
            Err(e) => Err(backend_error(e)),
        }
    }

    /// パーティション内の全アイテムを SK 順に取得
    async fn query_partition(&self, partition: &str) -> StoreResult<Vec<Item>> {
        let mut items = Vec::new();
        let mut start_key = None;

        loop {
            let output = self
                .client
                .query()
                .table_name(&self.table_name)
                .key_condition_expression("PK = :pk")
                .expression_attribute_values(":pk", AttributeValue::S(partition.to_string()))
                .set_exclusive_start_key(start_key)
                .consistent_read(true)
                .send()
                .await
                .map_err(backend_error)?;

            items.extend(output.items.unwrap_or_default());

            match output.last_evaluated_key {
                Some(key) if !key.is_empty() => start_key = Some(key),
                _ => break,
            }
        }

        Ok(items)
    }
}

#[async_trait]
impl TodoRepository for DynamoDbStore {
    async fn insert_todo(&self, todo: &Todo) -> StoreResult<()> {
        let item = document_item(&DynamoDbKeys::for_todo(&todo.id), EntityType::Todo, todo)?;

        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(item))
            .condition_expression("attribute_not_exists(PK)")
            .send()
            .await
            .map_err(backend_error)?;

        debug!(todo_id = %todo.id, "Todo saved");
        Ok(())
    }

    async fn list_todos(&self) -> StoreResult<Vec<Todo>> {
        self.query_partition(TODO_PARTITION)
            .await?
            .iter()
            .map(document_from_item::<Todo>)
            .collect()
    }

    async fn find_todo(&self, id: &TodoId) -> StoreResult<Option<Todo>> {
        self.get_item(&DynamoDbKeys::for_todo(id))
            .await?
            .map(|item| document_from_item(&item))
            .transpose()
    }

    async fn update_todo(&self, todo: &Todo) -> StoreResult<Option<Todo>> {
        let item = document_item(&DynamoDbKeys::for_todo(&todo.id), EntityType::Todo, todo)?;

        if self.replace_item(item).await? {
            Ok(Some(todo.clone()))
        } else {
            Ok(None)
        }
    }

    async fn delete_todo(&self, id: &TodoId) -> StoreResult<Option<Todo>> {
        let result = self
            .client
            .delete_item()
            .table_name(&self.table_name)
            .set_key(Some(DynamoDbKeys::for_todo(id).to_key_map()))
            .condition_expression("attribute_exists(PK)")
            .return_values(ReturnValue::AllOld)
            .send()
            .await;

        match result {
            Ok(output) => output
                .attributes
                .map(|item| document_from_item(&item))
                .transpose(),
            Err(e)
                if e.as_service_error()
                    .is_some_and(|se| se.is_conditional_check_failed_exception()) =>
            {
                Ok(None)
            }
            Err(e) => Err(backend_error(e)),
        }
    }
}

#[async_trait]
impl UserRepository for DynamoDbStore {
    /// ユーザー本体とメールロックを 1 トランザクションで書き込む
    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        let user_put = Put::builder()
            .table_name(&self.table_name)
            .set_item(Some(with_version(
                document_item(&DynamoDbKeys::for_user(&user.id), EntityType::User, user)?,
                0,
            )))
            .condition_expression("attribute_not_exists(PK)")
            .build()
            .map_err(backend_error)?;
        let lock_put = Put::builder()
            .table_name(&self.table_name)
            .set_item(Some(email_lock_item(&user.email, &user.id)))
            .condition_expression("attribute_not_exists(PK)")
            .build()
            .map_err(backend_error)?;

        let result = self
            .client
            .transact_write_items()
            .transact_items(TransactWriteItem::builder().put(user_put).build())
            .transact_items(TransactWriteItem::builder().put(lock_put).build())
            .send()
            .await;

        match result {
            Ok(_) => {
                debug!(user_id = %user.id, "User saved");
                Ok(())
            }
            Err(e) => {
                if let Some(TransactWriteItemsError::TransactionCanceledException(canceled)) =
                    e.as_service_error()
                {
                    if is_email_lock_conflict(canceled.cancellation_reasons()) {
                        return Err(StoreError::DuplicateEmail(user.email.to_string()));
                    }
                }
                Err(backend_error(e))
            }
        }
    }

    async fn find_user(&self, id: &UserId) -> StoreResult<Option<User>> {
        self.get_item(&DynamoDbKeys::for_user(id))
            .await?
            .map(|item| document_from_item(&item))
            .transpose()
    }

    async fn find_user_by_email(&self, email: &Email) -> StoreResult<Option<User>> {
        match self.get_item(&DynamoDbKeys::for_email(email)).await? {
            Some(lock) => self.find_user(&user_id_from_lock(&lock)?).await,
            None => Ok(None),
        }
    }

    /// バージョン属性による楽観的ロックで読み取り → 追加 → 条件付き書き込みを行う
    ///
    /// 競合した場合は読み直して再試行する。
    async fn push_token(&self, id: &UserId, token: AuthToken) -> StoreResult<Option<User>> {
        let keys = DynamoDbKeys::for_user(id);

        for attempt in 1..=MAX_TOKEN_PUSH_ATTEMPTS {
            let Some(item) = self.get_item(&keys).await? else {
                return Ok(None);
            };
            let version = item_version(&item)?;
            let mut user: User = document_from_item(&item)?;
            user.add_token(token.clone());

            let updated = document_item(&keys, EntityType::User, &user)?;
            if self.replace_versioned_item(updated, version).await? {
                debug!(user_id = %id, version = version + 1, "Token pushed");
                return Ok(Some(user));
            }

            warn!(user_id = %id, attempt, "Version conflict while pushing token");
            tokio::time::sleep(TOKEN_PUSH_BACKOFF * attempt).await;
        }

        Err(StoreError::Conflict(format!(
            "token push for {id} gave up after {MAX_TOKEN_PUSH_ATTEMPTS} attempts"
        )))
    }

    async fn count_users(&self) -> StoreResult<usize> {
        let mut count = 0usize;
        let mut start_key = None;

        loop {
            let output = self
                .client
                .query()
                .table_name(&self.table_name)
                .key_condition_expression("PK = :pk")
                .expression_attribute_values(":pk", AttributeValue::S(USER_PARTITION.to_string()))
                .select(Select::Count)
                .set_exclusive_start_key(start_key)
                .send()
                .await
                .map_err(backend_error)?;

            count += usize::try_from(output.count).unwrap_or_default();

            match output.last_evaluated_key {
                Some(key) if !key.is_empty() => start_key = Some(key),
                _ => break,
            }
        }

        Ok(count)
    }
}
