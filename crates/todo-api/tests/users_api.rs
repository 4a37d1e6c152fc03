mod common;

use common::{TestApp, USER_ONE_EMAIL, USER_ONE_PASSWORD, USER_TWO_EMAIL};
use domain::{UserId, AUTH_ACCESS};
use http::StatusCode;
use serde_json::json;

#[tokio::test]
async fn test_create_user() {
    let app = TestApp::seeded().await;
    let email = "example@example.com";
    let password = "123mnb!";

    let res = app
        .post("/users", json!({ "email": email, "password": password }))
        .await;

    assert_eq!(res.status, StatusCode::OK);
    let token = res.auth_header.expect("x-auth header");
    assert!(!token.is_empty());
    assert_eq!(res.json["email"], email);
    assert!(res.json.get("password").is_none());
    assert!(res.json.get("tokens").is_none());

    let id = UserId::parse(res.json["id"].as_str().unwrap()).unwrap();
    let stored = app.stored_user(&id).await.expect("user persisted");
    assert_eq!(stored.email.as_str(), email);
    assert_ne!(stored.password_hash, password);
    assert!(stored.has_token(AUTH_ACCESS, &token));
    assert_eq!(app.user_count().await, 3);
}

#[tokio::test]
async fn test_created_user_token_authenticates() {
    let app = TestApp::seeded().await;

    let created = app
        .post(
            "/users",
            json!({ "email": "fresh@example.com", "password": "secret1" }),
        )
        .await;
    let token = created.auth_header.unwrap();

    let me = app.get_auth("/users/me", &token).await;

    assert_eq!(me.status, StatusCode::OK);
    assert_eq!(me.json["email"], "fresh@example.com");
}

#[tokio::test]
async fn test_create_user_rejects_invalid_input() {
    let app = TestApp::seeded().await;

    let bad_email = app
        .post("/users", json!({ "email": "and", "password": "123" }))
        .await;
    assert_eq!(bad_email.status, StatusCode::BAD_REQUEST);
    assert!(bad_email.json["fields"]["email"].is_array());
    assert!(bad_email.json["fields"]["password"].is_array());
    assert!(bad_email.auth_header.is_none());

    let short_password = app
        .post("/users", json!({ "email": "short@example.com", "password": "12345" }))
        .await;
    assert_eq!(short_password.status, StatusCode::BAD_REQUEST);
    assert!(short_password.json["fields"]["password"].is_array());

    let missing = app.post("/users", json!({})).await;
    assert_eq!(missing.status, StatusCode::BAD_REQUEST);

    assert_eq!(app.user_count().await, 2);
}

#[tokio::test]
async fn test_create_user_rejects_duplicate_email() {
    let app = TestApp::seeded().await;

    let res = app
        .post(
            "/users",
            json!({ "email": USER_ONE_EMAIL, "password": "Password123!" }),
        )
        .await;

    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert!(res.json["fields"]["email"][0]
        .as_str()
        .unwrap()
        .contains("already registered"));
    assert_eq!(app.user_count().await, 2);
}

#[tokio::test]
async fn test_login() {
    let app = TestApp::seeded().await;
    let user = &app.users[1];
    assert!(user.tokens.is_empty());

    let res = app
        .post(
            "/users/login",
            json!({ "email": USER_TWO_EMAIL, "password": common::USER_TWO_PASSWORD }),
        )
        .await;

    assert_eq!(res.status, StatusCode::OK);
    let token = res.auth_header.expect("x-auth header");
    assert_eq!(res.json["id"], user.id.as_str());

    let stored = app.stored_user(&user.id).await.unwrap();
    assert_eq!(stored.tokens.len(), 1);
    assert!(stored.has_token(AUTH_ACCESS, &token));
}

#[tokio::test]
async fn test_login_rejects_bad_credentials() {
    let app = TestApp::seeded().await;

    let wrong_password = app
        .post(
            "/users/login",
            json!({ "email": USER_ONE_EMAIL, "password": "not-the-password" }),
        )
        .await;
    assert_eq!(wrong_password.status, StatusCode::BAD_REQUEST);
    assert!(wrong_password.auth_header.is_none());

    let unknown = app
        .post(
            "/users/login",
            json!({ "email": "nobody@example.com", "password": USER_ONE_PASSWORD }),
        )
        .await;
    assert_eq!(unknown.status, StatusCode::BAD_REQUEST);
    assert_eq!(unknown.json, wrong_password.json);

    let stored = app.stored_user(&app.users[0].id).await.unwrap();
    assert_eq!(stored.tokens.len(), 1);
}

#[tokio::test]
async fn test_me_with_seeded_token() {
    let app = TestApp::seeded().await;
    let token = app.user_one_token.clone();

    let res = app.get_auth("/users/me", &token).await;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.json["id"], app.users[0].id.as_str());
    assert_eq!(res.json["email"], USER_ONE_EMAIL);
}

#[tokio::test]
async fn test_me_unauthorized() {
    let app = TestApp::seeded().await;

    let missing = app.get("/users/me").await;
    assert_eq!(missing.status, StatusCode::UNAUTHORIZED);
    assert_eq!(missing.json["error"], "unauthorized");

    let forged = app.get_auth("/users/me", "forged.token.value").await;
    assert_eq!(forged.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_me_rejects_signed_but_unregistered_token() {
    let app = TestApp::seeded().await;
    // 署名は正しいがユーザー 2 のトークン一覧には無い
    let token = app.tokens.issue(&app.users[1].id, AUTH_ACCESS).unwrap();

    let res = app.get_auth("/users/me", &token).await;

    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
}
