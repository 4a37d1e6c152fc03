use std::env;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use thiserror::Error;

/// 本番以外で使う署名シークレット
pub const DEV_JWT_SECRET: &str = "dev-secret-change-me";

/// トークン有効期限の上限（10 年）
pub const MAX_TOKEN_TTL_HOURS: i64 = 24 * 365 * 10;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("Invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

/// 永続化先
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    DynamoDb,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: IpAddr,
    pub port: u16,
    pub environment: String,
    pub storage: StorageBackend,
    pub dynamodb_table: String,
    /// DynamoDB Local 等のエンドポイント上書き
    pub dynamodb_endpoint: Option<String>,
    pub aws_region: String,
    pub jwt_secret: String,
    pub token_ttl: chrono::Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// 任意のキー参照関数から設定を組み立てる
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = lookup("ENVIRONMENT").unwrap_or_else(|| "dev".to_string());

        let bind_addr = match lookup("BIND_ADDR") {
            Some(value) => value.parse().map_err(|_| ConfigError::Invalid {
                key: "BIND_ADDR",
                value,
            })?,
            None => IpAddr::V4(Ipv4Addr::LOCALHOST),
        };

        let port = match lookup("PORT") {
            Some(value) => value
                .parse()
                .map_err(|_| ConfigError::Invalid { key: "PORT", value })?,
            None => 3000,
        };

        let storage = match lookup("STORAGE_BACKEND").as_deref() {
            None | Some("memory") => StorageBackend::Memory,
            Some("dynamodb") => StorageBackend::DynamoDb,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "STORAGE_BACKEND",
                    value: other.to_string(),
                })
            }
        };

        let jwt_secret = match lookup("JWT_SECRET") {
            Some(secret) if !secret.is_empty() => secret,
            _ if environment == "production" => return Err(ConfigError::Missing("JWT_SECRET")),
            _ => DEV_JWT_SECRET.to_string(),
        };

        let token_ttl = match lookup("TOKEN_TTL_HOURS") {
            Some(value) => match value.parse::<i64>() {
                Ok(hours) if (1..=MAX_TOKEN_TTL_HOURS).contains(&hours) => {
                    chrono::Duration::try_hours(hours).ok_or(ConfigError::Invalid {
                        key: "TOKEN_TTL_HOURS",
                        value,
                    })?
                }
                _ => {
                    return Err(ConfigError::Invalid {
                        key: "TOKEN_TTL_HOURS",
                        value,
                    })
                }
            },
            None => chrono::Duration::days(7),
        };

        Ok(Config {
            bind_addr,
            port,
            environment,
            storage,
            dynamodb_table: lookup("DYNAMODB_TABLE").unwrap_or_else(|| "todo-api".to_string()),
            dynamodb_endpoint: lookup("DYNAMODB_ENDPOINT").filter(|s| !s.is_empty()),
            aws_region: lookup("AWS_REGION").unwrap_or_else(|| "ap-northeast-1".to_string()),
            jwt_secret,
            token_ttl,
        })
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.port)
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}
