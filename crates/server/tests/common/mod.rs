//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use cvmaker_auth::AppResources;
use cvmaker_auth::config::{
    AppConfig, GitHubConfig, OAuth2Config, SigningAlgorithm, SigningConfig,
};
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, DbBackend, Statement};
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const CLIENT_ID: &str = "cvmaker";
pub const CLIENT_SECRET: &str = "cvmaker-secret";
pub const SHARED_SECRET: &str = "24D77EF9C1A85B3E6F0D42A97C13E58B0F6A2D94E7B15C38A60F29D4E71CBD8B";
pub const GITHUB_ACCESS_TOKEN: &str = "gho_test_token";

/// Create an in-memory database with the server schema.
pub async fn create_test_db() -> Arc<DatabaseConnection> {
    let db = Database::connect("sqlite::memory:").await.expect("connect");

    db.execute(Statement::from_string(
        DbBackend::Sqlite,
        r#"CREATE TABLE app_user (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            created_at TEXT NOT NULL
        );"#,
    ))
    .await
    .expect("create app_user table");

    db.execute(Statement::from_string(
        DbBackend::Sqlite,
        r#"CREATE TABLE oauth2_token (
            id TEXT PRIMARY KEY,
            refresh_token_id TEXT NOT NULL UNIQUE,
            user_id TEXT NOT NULL REFERENCES app_user(id) ON DELETE CASCADE,
            client_id TEXT NOT NULL,
            scope TEXT NOT NULL,
            access_token_expires_at TEXT NOT NULL,
            refresh_token_expires_at TEXT NOT NULL,
            created_at TEXT NOT NULL,
            revoked_at TEXT NULL
        );"#,
    ))
    .await
    .expect("create oauth2_token table");

    Arc::new(db)
}

pub fn test_config(github: &MockServer) -> AppConfig {
    AppConfig {
        database_url: "sqlite::memory:".to_string(),
        listen_addr: "127.0.0.1:0".to_string(),
        oauth2: OAuth2Config {
            client_id: CLIENT_ID.to_string(),
            client_secret: CLIENT_SECRET.to_string(),
            access_token_lifetime: 3600,
            refresh_token_lifetime: 7200,
            signing: SigningConfig {
                algorithm: SigningAlgorithm::HS256,
                signing_key: SHARED_SECRET.to_string(),
                verifier_key: SHARED_SECRET.to_string(),
            },
        },
        github: GitHubConfig {
            client_id: "gh-client".to_string(),
            client_secret: "gh-secret".to_string(),
            token_url: format!("{}/login/oauth/access_token", github.uri()),
            api_url: github.uri(),
            timeout_secs: 5,
        },
    }
}

/// Resources wired against a fresh database and the given GitHub mock.
pub async fn create_test_resources(github: &MockServer) -> (AppResources, Arc<DatabaseConnection>) {
    let db = create_test_db().await;
    let config = Arc::new(test_config(github));
    let resources = AppResources::new(db.clone(), config).expect("build resources");
    (resources, db)
}

/// GitHub accepts `code` exactly once; any later exchange gets the error
/// payload GitHub sends for used or unknown codes.
pub async fn mount_code_exchange(github: &MockServer, code: &str) {
    Mock::given(method("POST"))
        .and(path("/login/oauth/access_token"))
        .and(header("accept", "application/json"))
        .and(body_string_contains(format!("code={code}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": GITHUB_ACCESS_TOKEN,
            "token_type": "bearer",
            "scope": "user:email"
        })))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(github)
        .await;

    Mock::given(method("POST"))
        .and(path("/login/oauth/access_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": "bad_verification_code",
            "error_description": "The code passed is incorrect or expired."
        })))
        .with_priority(10)
        .mount(github)
        .await;
}

pub async fn mount_emails(github: &MockServer, emails: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/user/emails"))
        .and(header(
            "authorization",
            format!("Bearer {GITHUB_ACCESS_TOKEN}").as_str(),
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(emails))
        .mount(github)
        .await;
}

/// A GitHub account with one primary verified address.
pub async fn mount_github_user(github: &MockServer, code: &str, email: &str) {
    mount_code_exchange(github, code).await;
    mount_emails(
        github,
        json!([
            {"email": "noreply@users.github.com", "primary": false, "verified": true},
            {"email": email, "primary": true, "verified": true}
        ]),
    )
    .await;
}
