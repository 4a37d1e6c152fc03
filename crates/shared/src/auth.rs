use crate::config::Config;
use domain::UserId;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub access: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Token expired")]
    Expired,

    #[error("Invalid token: {0}")]
    Invalid(String),

    #[error("Token signing failed: {0}")]
    Signing(String),
}

/// セッショントークンの発行と検証（HS256）
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: chrono::Duration,
}

impl TokenService {
    pub fn new(secret: &str, ttl: chrono::Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.jwt_secret, config.token_ttl)
    }

    /// ユーザー ID とアクセス種別を署名したトークンを発行
    pub fn issue(&self, user_id: &UserId, access: &str) -> Result<String, TokenError> {
        let now = chrono::Utc::now();
        let expires_at = now
            .checked_add_signed(self.ttl)
            .ok_or_else(|| TokenError::Signing(format!("ttl out of range: {}", self.ttl)))?;
        let claims = Claims {
            sub: user_id.as_str().to_string(),
            access: access.to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// 署名と有効期限を検証してクレームを返す
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        decode::<Claims>(token, &self.decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid(e.to_string()),
            })
    }

    /// トークンを検証し、指定アクセス種別のユーザー ID を取り出す
    pub fn verify_user(&self, token: &str, access: &str) -> Result<UserId, TokenError> {
        let claims = self.verify(token)?;
        if claims.access != access {
            return Err(TokenError::Invalid(format!(
                "unexpected access: {}",
                claims.access
            )));
        }
        UserId::parse(&claims.sub).map_err(|e| TokenError::Invalid(e.to_string()))
    }
}
