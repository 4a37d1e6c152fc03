//! todo-api バイナリのエントリポイント
//! 設定を環境変数から読み込み、HTTP サーバを起動します。

use std::sync::Arc;

use anyhow::Context;
use infrastructure::{Argon2PasswordHasher, DynamoDbStore};
use shared::{init_tracing, Config, StorageBackend, TokenService};
use todo_api::{app_with_state, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env はローカル開発用（無くてもよい）
    dotenvy::dotenv().ok();
    init_tracing().map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    let config = Config::from_env().context("invalid configuration")?;
    let state = build_state(&config).await?;

    let addr = config.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, environment = %config.environment, "server starting");

    axum::serve(listener, app_with_state(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("server stopped");
    Ok(())
}

async fn build_state(config: &Config) -> anyhow::Result<AppState> {
    let tokens = TokenService::from_config(config);
    let passwords = Arc::new(Argon2PasswordHasher::new());

    match config.storage {
        StorageBackend::Memory => {
            tracing::info!("Using in-memory store");
            Ok(AppState::in_memory(tokens, passwords))
        }
        StorageBackend::DynamoDb => {
            let store = Arc::new(DynamoDbStore::new(config).await);
            // ローカルエンドポイント指定時のみテーブルを自動作成
            if config.dynamodb_endpoint.is_some() {
                store
                    .ensure_table()
                    .await
                    .context("failed to prepare DynamoDB table")?;
            }
            tracing::info!(table = %store.table_name(), "Using DynamoDB store");
            Ok(AppState::new(store.clone(), store, passwords, tokens))
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
}
