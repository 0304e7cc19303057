//! Fixtures shared by unit tests and the router tests under `tests/`.

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use axum::Router;
use chrono::{DateTime, FixedOffset, TimeZone};
use sea_orm::{DatabaseConnection, Value};

use crate::{
    auth::Role,
    config::{AppConfig, AuthConfig},
    db::entities::{file, refresh_token, user},
    routes::router,
    services::{ServiceContext, mailer::EmailSender},
    state::AppState,
};

pub const ADMIN_EMAIL: &str = "admin@example.com";
pub const ADMIN_PASSWORD: &str = "Secret1!";

pub fn auth_config() -> AuthConfig {
    AuthConfig {
        access_token_secret: "access-secret".to_string(),
        refresh_token_secret: "refresh-secret".to_string(),
        forget_password_secret: "forget-secret".to_string(),
        access_token_ttl: "15m".to_string(),
        refresh_token_ttl: "7d".to_string(),
        forget_password_ttl: "10m".to_string(),
        cookie_secure: false,
        reset_password_url: "http://localhost:3000/reset-password".to_string(),
        admin_name: "System Admin".to_string(),
        admin_email: ADMIN_EMAIL.to_string(),
        admin_password: ADMIN_PASSWORD.to_string(),
    }
}

pub fn test_config() -> AppConfig {
    AppConfig {
        auth: Some(auth_config()),
        ..AppConfig::default()
    }
}

/// Mailer that keeps every message in memory.
#[derive(Debug, Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<SentMail>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMail {
    pub to: String,
    pub subject: String,
    pub html: String,
}

impl RecordingMailer {
    pub fn messages(&self) -> Vec<SentMail> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl EmailSender for RecordingMailer {
    async fn send(&self, to: &str, subject: &str, html: &str) -> anyhow::Result<()> {
        self.sent
            .lock()
            .map_err(|_| anyhow::anyhow!("mailer lock poisoned"))?
            .push(SentMail {
                to: to.to_string(),
                subject: subject.to_string(),
                html: html.to_string(),
            });
        Ok(())
    }
}

pub fn test_state_with_mailer(
    db: DatabaseConnection,
    mailer: Arc<dyn EmailSender>,
) -> Arc<AppState> {
    AppState::new(test_config(), db, mailer).expect("test state should build")
}

pub fn test_state(db: DatabaseConnection) -> Arc<AppState> {
    test_state_with_mailer(db, Arc::new(RecordingMailer::default()))
}

pub fn test_services(db: DatabaseConnection) -> ServiceContext {
    ServiceContext::from_state(&test_state(db))
}

pub fn test_router(db: DatabaseConnection) -> Router {
    router(test_state(db))
}

pub fn ts() -> DateTime<FixedOffset> {
    FixedOffset::east_opt(0)
        .expect("offset should be valid")
        .with_ymd_and_hms(2026, 1, 1, 0, 0, 0)
        .single()
        .expect("timestamp should be valid")
}

pub fn user_model(id: i32, email: &str, password_hash: &str, role: Role) -> user::Model {
    user::Model {
        id,
        created_at: ts(),
        updated_at: ts(),
        name: "Test User".to_string(),
        email: email.to_string(),
        password_hash: password_hash.to_string(),
        is_active: true,
        role,
        profile_image_id: None,
        created_by: None,
        updated_by: None,
    }
}

pub fn refresh_token_model(
    id: i32,
    token: &str,
    user_id: i32,
    expires_at: DateTime<FixedOffset>,
    revoked: bool,
) -> refresh_token::Model {
    refresh_token::Model {
        id,
        created_at: ts(),
        updated_at: ts(),
        token: token.to_string(),
        expires_at,
        revoked,
        user_id,
        ip_address: None,
        user_agent: None,
    }
}

pub fn file_model(id: i32, path: &str) -> file::Model {
    file::Model {
        id,
        created_at: ts(),
        updated_at: ts(),
        path: path.to_string(),
        content_type: Some("image/png".to_string()),
        original_name: "avatar.png".to_string(),
        modified_name: format!("file-{id}.png"),
    }
}

/// Row answering a `COUNT(*)` issued by the paginator.
pub fn count_row(total: i64) -> BTreeMap<&'static str, Value> {
    BTreeMap::from([("num_items", Value::BigInt(Some(total)))])
}
