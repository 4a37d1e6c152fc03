use crate::errors::ValidationErrors;
use crate::identifiers::UserId;
use serde::{Deserialize, Serialize};
use std::fmt;
use validator::ValidateEmail;

/// パスワードの最小文字数
pub const MIN_PASSWORD_LEN: usize = 6;

/// セッショントークンのアクセス種別
pub const AUTH_ACCESS: &str = "auth";

/// メールアドレス（トリム済み・形式検証済み）
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Email(String);

impl Email {
    pub fn parse(raw: &str) -> Result<Self, ValidationErrors> {
        let email = raw.trim().to_string();
        if email.is_empty() {
            return Err(ValidationErrors::single("email", "is required"));
        }
        if !email.validate_email() {
            return Err(ValidationErrors::single(
                "email",
                format!("{email} is not a valid email"),
            ));
        }
        Ok(Self(email))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 平文パスワード。ログやデバッグ出力に中身を出さない
#[derive(Clone, PartialEq, Eq)]
pub struct PlainPassword(String);

impl PlainPassword {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for PlainPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PlainPassword(***)")
    }
}

/// 登録前に検証済みの入力
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: Email,
    pub password: PlainPassword,
}

impl NewUser {
    /// メールアドレスとパスワードをまとめて検証する
    ///
    /// 両方が不正な場合は両方のフィールドを列挙して返す。
    pub fn validate(email: Option<&str>, password: Option<&str>) -> Result<Self, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let email = match email.map(Email::parse) {
            Some(Ok(email)) => Some(email),
            Some(Err(e)) => {
                errors.merge(e);
                None
            }
            None => {
                errors.add("email", "is required");
                None
            }
        };

        match password {
            None => errors.add("password", "is required"),
            Some(p) if p.chars().count() < MIN_PASSWORD_LEN => errors.add(
                "password",
                format!("must be at least {MIN_PASSWORD_LEN} characters"),
            ),
            Some(_) => {}
        }

        match (email, password) {
            (Some(email), Some(password)) if errors.is_empty() => Ok(Self {
                email,
                password: PlainPassword::new(password),
            }),
            _ => Err(errors),
        }
    }
}

/// ユーザーに紐づくセッショントークン
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthToken {
    pub access: String,
    pub token: String,
}

impl AuthToken {
    pub fn auth(token: impl Into<String>) -> Self {
        Self {
            access: AUTH_ACCESS.to_string(),
            token: token.into(),
        }
    }
}

/// 永続化されるユーザードキュメント
///
/// `password_hash` は一方向ハッシュのみ。レスポンスには含めない。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub email: Email,
    pub password_hash: String,
    #[serde(default)]
    pub tokens: Vec<AuthToken>,
}

impl User {
    pub fn new(email: Email, password_hash: String) -> Self {
        Self {
            id: UserId::new(),
            email,
            password_hash,
            tokens: Vec::new(),
        }
    }

    pub fn add_token(&mut self, token: AuthToken) {
        self.tokens.push(token);
    }

    pub fn has_token(&self, access: &str, token: &str) -> bool {
        self.tokens
            .iter()
            .any(|t| t.access == access && t.token == token)
    }
}
