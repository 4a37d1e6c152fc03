use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use domain::{AuthToken, Email, NewUser, PlainPassword, User, ValidationErrors, AUTH_ACCESS};
use http::HeaderValue;

use crate::auth::{CurrentUser, AUTH_HEADER};
use crate::error::ApiError;
use crate::models::{CredentialsRequest, UserResponse};
use crate::AppState;

/// ボディにユーザー、`x-auth` ヘッダーにトークンを載せたレスポンス
fn authenticated_response(user: &User, token: &str) -> Result<Response, ApiError> {
    let header = HeaderValue::from_str(token).map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(([(AUTH_HEADER.clone(), header)], Json(UserResponse::from(user))).into_response())
}

/// POST /users
///
/// 検証 → 重複確認 → ハッシュ化 → トークン発行 → 保存 の順に明示的に行う。
pub async fn create_user(
    State(state): State<AppState>,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(req) = payload?;
    let new_user = NewUser::validate(req.email.as_deref(), req.password.as_deref())?;

    if state.users.find_user_by_email(&new_user.email).await?.is_some() {
        return Err(ValidationErrors::single(
            "email",
            format!("{} is already registered", new_user.email),
        )
        .into());
    }

    // Argon2 は CPU を占有するためブロッキングスレッドで実行
    let passwords = state.passwords.clone();
    let password = new_user.password;
    let password_hash = tokio::task::spawn_blocking(move || passwords.hash(&password)).await??;

    let mut user = User::new(new_user.email, password_hash);
    let token = state.tokens.issue(&user.id, AUTH_ACCESS)?;
    user.add_token(AuthToken::auth(token.clone()));

    state.users.insert_user(&user).await?;

    tracing::info!(user_id = %user.id, "User created");
    authenticated_response(&user, &token)
}

/// POST /users/login
///
/// メールアドレス不明とパスワード不一致は区別せず 400 を返す。
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let invalid = || ApiError::BadRequest("invalid email or password".to_string());

    let Json(req) = payload?;
    let (Some(email), Some(password)) = (req.email, req.password) else {
        return Err(invalid());
    };
    let email = Email::parse(&email).map_err(|_| invalid())?;

    let user = state
        .users
        .find_user_by_email(&email)
        .await?
        .ok_or_else(invalid)?;

    let passwords = state.passwords.clone();
    let password = PlainPassword::new(password);
    let password_hash = user.password_hash.clone();
    let matched =
        tokio::task::spawn_blocking(move || passwords.verify(&password, &password_hash)).await??;
    if !matched {
        tracing::info!(user_id = %user.id, "Login rejected");
        return Err(invalid());
    }

    let token = state.tokens.issue(&user.id, AUTH_ACCESS)?;
    let user = state
        .users
        .push_token(&user.id, AuthToken::auth(token.clone()))
        .await?
        .ok_or_else(invalid)?;

    tracing::info!(user_id = %user.id, "User logged in");
    authenticated_response(&user, &token)
}

/// GET /users/me
pub async fn me(current: CurrentUser) -> Json<UserResponse> {
    Json(UserResponse::from(&current.user))
}
