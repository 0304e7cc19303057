use std::{path::PathBuf, sync::Arc};

use sea_orm::DatabaseConnection;

use crate::{
    auth::jwt::TokenCodec,
    config::AuthConfig,
    db::dao::DaoContext,
    services::{
        auth_service::AuthService, file_service::FileStore, mailer::EmailSender,
        user_service::UserService,
    },
    state::AppState,
};

/// Per-request service factory over one shared connection pool.
#[derive(Clone)]
pub struct ServiceContext {
    daos: DaoContext,
    tokens: TokenCodec,
    auth: AuthConfig,
    mailer: Arc<dyn EmailSender>,
    upload_dir: PathBuf,
}

impl ServiceContext {
    pub fn new(
        db: &DatabaseConnection,
        tokens: TokenCodec,
        auth: AuthConfig,
        mailer: Arc<dyn EmailSender>,
        upload_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            daos: DaoContext::new(db),
            tokens,
            auth,
            mailer,
            upload_dir: upload_dir.into(),
        }
    }

    pub fn from_state(state: &AppState) -> Self {
        Self::new(
            &state.db,
            state.tokens.clone(),
            state.auth.clone(),
            Arc::clone(&state.mailer),
            state.config.storage.upload_dir.clone(),
        )
    }

    pub fn auth(&self) -> AuthService {
        AuthService::new(
            self.daos.user(),
            self.daos.refresh_token(),
            self.tokens.clone(),
            Arc::clone(&self.mailer),
            self.auth.reset_password_url.clone(),
        )
    }

    pub fn user(&self) -> UserService {
        UserService::new(self.daos.user(), self.files())
    }

    pub fn files(&self) -> FileStore {
        FileStore::new(self.daos.file(), self.upload_dir.clone())
    }
}
