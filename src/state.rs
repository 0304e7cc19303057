use std::sync::Arc;

use anyhow::Context;
use sea_orm::DatabaseConnection;

use crate::{
    auth::jwt::TokenCodec,
    config::{AppConfig, AuthConfig},
    services::mailer::EmailSender,
};

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    /// Copy of `config.auth`, which must be present to serve requests.
    pub auth: AuthConfig,
    pub db: DatabaseConnection,
    pub tokens: TokenCodec,
    pub mailer: Arc<dyn EmailSender>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        db: DatabaseConnection,
        mailer: Arc<dyn EmailSender>,
    ) -> anyhow::Result<Arc<Self>> {
        let auth = config
            .auth
            .clone()
            .context("auth config is required (set APP_AUTH__* variables)")?;
        let tokens = TokenCodec::from_config(&auth);
        Ok(Arc::new(Self {
            config,
            auth,
            db,
            tokens,
            mailer,
        }))
    }
}
