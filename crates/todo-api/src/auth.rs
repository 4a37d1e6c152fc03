//! `x-auth` ヘッダーによるセッショントークン認証

use crate::error::ApiError;
use crate::AppState;
use axum::async_trait;
use axum::extract::FromRequestParts;
use domain::{User, AUTH_ACCESS};
use http::request::Parts;
use http::{HeaderMap, HeaderName};

/// セッショントークンの受け渡しに使うヘッダー
pub static AUTH_HEADER: HeaderName = HeaderName::from_static("x-auth");

/// 認証済みユーザー（ヘッダー必須）
#[derive(Debug)]
pub struct CurrentUser {
    pub user: User,
}

/// 認証済みユーザー（ヘッダーが無ければ `None`）
///
/// ヘッダーがあるのに検証できない場合は 401 とする。
#[derive(Debug)]
pub struct OptionalUser(pub Option<CurrentUser>);

fn header_token(headers: &HeaderMap) -> Result<Option<&str>, ApiError> {
    match headers.get(&AUTH_HEADER) {
        Some(value) => value
            .to_str()
            .map(Some)
            .map_err(|_| ApiError::Unauthorized("x-auth header is not valid ASCII".to_string())),
        None => Ok(None),
    }
}

/// トークンを検証し、トークンを保持しているユーザーを引く
///
/// 署名が正しくても、ユーザーのトークン一覧に無ければ拒否する。
pub async fn authenticate(state: &AppState, token: &str) -> Result<CurrentUser, ApiError> {
    let user_id = state
        .tokens
        .verify_user(token, AUTH_ACCESS)
        .map_err(|e| ApiError::Unauthorized(e.to_string()))?;

    let user = state
        .users
        .find_user(&user_id)
        .await?
        .filter(|user| user.has_token(AUTH_ACCESS, token))
        .ok_or_else(|| ApiError::Unauthorized(format!("token not registered for {user_id}")))?;

    Ok(CurrentUser { user })
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = header_token(&parts.headers)?
            .ok_or_else(|| ApiError::Unauthorized("missing x-auth header".to_string()))?;
        authenticate(state, token).await
    }
}

#[async_trait]
impl FromRequestParts<AppState> for OptionalUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match header_token(&parts.headers)? {
            Some(token) => Ok(OptionalUser(Some(authenticate(state, token).await?))),
            None => Ok(OptionalUser(None)),
        }
    }
}
