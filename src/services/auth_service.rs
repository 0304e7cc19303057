use std::sync::Arc;

use chrono::DateTime;
use serde::Serialize;

use crate::{
    auth::{
        Role, TokenKind, TokenSubject,
        jwt::TokenCodec,
        password::{hash_password, verify_password, verify_unknown_account},
    },
    db::{
        dao::{ClientMeta, DaoBase, DaoLayerError, RefreshTokenDao, UserDao, refresh_token_dao},
        entities::user,
    },
    error::AppError,
    services::mailer::EmailSender,
};

const INVALID_CREDENTIALS: &str = "Invalid email or password";
const ACCOUNT_DEACTIVATED: &str = "Account is deactivated";
const NOT_AUTHORIZED: &str = "You are not authorized";
const INVALID_RESET_TOKEN: &str = "Invalid or expired reset token";

/// Public identity returned next to a fresh access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionUser {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub role: Role,
}

impl From<&user::Model> for SessionUser {
    fn from(user: &user::Model) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
        }
    }
}

#[derive(Debug)]
pub struct LoginOutcome {
    pub access_token: String,
    /// Goes into the cookie, never into a response body.
    pub refresh_token: String,
    pub user: SessionUser,
}

#[derive(Debug)]
pub struct RefreshOutcome {
    pub access_token: String,
    pub refresh_token: String,
    pub role: Role,
}

/// Issues, rotates and revokes sessions, and runs the password flows.
#[derive(Clone)]
pub struct AuthService {
    users: UserDao,
    refresh_tokens: RefreshTokenDao,
    codec: TokenCodec,
    mailer: Arc<dyn EmailSender>,
    reset_password_url: String,
}

impl AuthService {
    pub fn new(
        users: UserDao,
        refresh_tokens: RefreshTokenDao,
        codec: TokenCodec,
        mailer: Arc<dyn EmailSender>,
        reset_password_url: String,
    ) -> Self {
        Self {
            users,
            refresh_tokens,
            codec,
            mailer,
            reset_password_url,
        }
    }

    pub fn refresh_ttl(&self) -> chrono::Duration {
        self.codec.ttl(TokenKind::Refresh)
    }

    pub async fn login(
        &self,
        email: &str,
        password: &str,
        client: ClientMeta,
    ) -> Result<LoginOutcome, AppError> {
        let Some(user) = self.users.find_by_email(email).await? else {
            verify_unknown_account(password);
            tracing::info!("login rejected: unknown email");
            return Err(AppError::unauthorized(INVALID_CREDENTIALS));
        };

        if !verify_password(password, &user.password_hash) {
            tracing::info!(user_id = user.id, "login rejected: wrong password");
            return Err(AppError::unauthorized(INVALID_CREDENTIALS));
        }

        if !user.is_active {
            tracing::info!(user_id = user.id, "login rejected: account deactivated");
            return Err(AppError::unauthorized(ACCOUNT_DEACTIVATED));
        }

        let subject = TokenSubject::from(&user);
        let access_token = self.codec.sign_access(&subject)?;
        let refresh_token = self.codec.sign_refresh(&subject)?;
        self.refresh_tokens
            .issue(user.id, &refresh_token, client, self.refresh_ttl())
            .await?;

        tracing::info!(user_id = user.id, "login succeeded");
        Ok(LoginOutcome {
            access_token,
            refresh_token,
            user: SessionUser::from(&user),
        })
    }

    /// Revokes the presented token. An unknown token is reported so the caller can clear
    /// its cookie.
    pub async fn logout(&self, refresh_token: &str) -> Result<(), AppError> {
        if self.refresh_tokens.find_by_token(refresh_token).await?.is_none() {
            return Err(AppError::bad_request("RefreshToken not found"));
        }
        self.refresh_tokens.revoke(refresh_token).await?;
        Ok(())
    }

    pub async fn logout_all(&self, user_id: i32) -> Result<u64, AppError> {
        let revoked = self.refresh_tokens.revoke_all_for_user(user_id).await?;
        tracing::info!(user_id, revoked, "revoked all sessions");
        Ok(revoked)
    }

    /// Deletes refresh rows past their expiry.
    pub async fn purge_expired_tokens(&self) -> Result<u64, AppError> {
        let purged = self.refresh_tokens.purge_expired().await?;
        tracing::info!(purged, "purged expired refresh tokens");
        Ok(purged)
    }

    /// Exchanges an active refresh token for a new token pair, rotating the row in place.
    pub async fn refresh(&self, refresh_token: &str) -> Result<RefreshOutcome, AppError> {
        let row = self
            .refresh_tokens
            .find_by_token(refresh_token)
            .await?
            .filter(refresh_token_dao::is_active)
            .ok_or_else(|| reject_refresh("no active row for token"))?;

        let claims = self
            .codec
            .verify(refresh_token, TokenKind::Refresh)
            .ok_or_else(|| reject_refresh("signature or expiry check failed"))?;
        if claims.id != row.user_id {
            return Err(reject_refresh("token subject does not own the row"));
        }

        let user = self.active_user(row.user_id).await?;

        let subject = TokenSubject::from(&user);
        let access_token = self.codec.sign_access(&subject)?;
        let next_refresh = self.codec.sign_refresh(&subject)?;

        if self
            .refresh_tokens
            .rotate(refresh_token, &next_refresh)
            .await?
            .is_none()
        {
            tracing::warn!(user_id = user.id, "refresh rejected: rotation race lost");
            return Err(AppError::unauthorized(NOT_AUTHORIZED));
        }

        Ok(RefreshOutcome {
            access_token,
            refresh_token: next_refresh,
            role: user.role,
        })
    }

    /// Owner of an active refresh token.
    pub async fn current_user(&self, refresh_token: &str) -> Result<user::Model, AppError> {
        let row = self
            .refresh_tokens
            .find_by_token(refresh_token)
            .await?
            .filter(refresh_token_dao::is_active)
            .ok_or_else(|| AppError::unauthorized(NOT_AUTHORIZED))?;
        self.active_user(row.user_id).await
    }

    /// Self-service only: `actor` must be the target account.
    pub async fn change_password(
        &self,
        actor: &user::Model,
        target_id: i32,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AppError> {
        if actor.id != target_id {
            return Err(AppError::forbidden("You can only change your own password"));
        }

        let user = self.users.find_by_id(target_id).await?;
        if !verify_password(current_password, &user.password_hash) {
            return Err(AppError::bad_request("Current password is incorrect"));
        }

        let password_hash = hash_password(new_password)?;
        self.users
            .set_password(user.id, password_hash, Some(actor.id))
            .await?;
        tracing::info!(user_id = user.id, "password changed");
        Ok(())
    }

    /// Mails a reset link when `email` belongs to an active account. The caller answers
    /// identically either way.
    pub async fn forget_password(&self, email: &str) -> Result<(), AppError> {
        let Some(user) = self.users.find_by_email(email).await? else {
            tracing::debug!("password reset requested for unknown email");
            return Ok(());
        };
        if !user.is_active {
            tracing::debug!(user_id = user.id, "password reset requested for inactive account");
            return Ok(());
        }

        let token = self.codec.sign_reset(&TokenSubject::from(&user))?;
        let link = format!("{}?token={token}", self.reset_password_url);
        let html = reset_email_html(&user.name, &link, self.codec.ttl(TokenKind::Reset));

        if let Err(err) = self
            .mailer
            .send(&user.email, "Reset your password", &html)
            .await
        {
            tracing::warn!(user_id = user.id, "reset mail delivery failed: {err:#}");
        }
        Ok(())
    }

    /// Stores a new password for the subject of a valid reset token.
    ///
    /// The token is refused once the account changed in or after the second it was
    /// issued. The write itself is conditional on that, so a successful reset spends
    /// the token even under concurrent use.
    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<(), AppError> {
        let claims = self
            .codec
            .verify(token, TokenKind::Reset)
            .ok_or_else(|| AppError::bad_request(INVALID_RESET_TOKEN))?;

        let user = match self.users.find_by_id(claims.id).await {
            Ok(user) => user,
            Err(DaoLayerError::NotFound { .. }) => {
                return Err(AppError::bad_request(INVALID_RESET_TOKEN));
            }
            Err(err) => return Err(err.into()),
        };
        if !user.is_active {
            return Err(AppError::unauthorized(ACCOUNT_DEACTIVATED));
        }
        let issued_at = DateTime::from_timestamp(claims.iat as i64, 0)
            .ok_or_else(|| AppError::bad_request(INVALID_RESET_TOKEN))?
            .fixed_offset();
        if user.email != claims.email || user.updated_at >= issued_at {
            return Err(AppError::bad_request(INVALID_RESET_TOKEN));
        }

        let password_hash = hash_password(new_password)?;
        if !self
            .users
            .set_password_if_unchanged(user.id, password_hash, issued_at)
            .await?
        {
            tracing::warn!(user_id = user.id, "reset token already spent");
            return Err(AppError::bad_request(INVALID_RESET_TOKEN));
        }
        tracing::info!(user_id = user.id, "password reset");
        Ok(())
    }

    async fn active_user(&self, id: i32) -> Result<user::Model, AppError> {
        let user = match self.users.find_by_id(id).await {
            Ok(user) => user,
            Err(DaoLayerError::NotFound { .. }) => {
                return Err(reject_refresh("owner no longer exists"));
            }
            Err(err) => return Err(err.into()),
        };
        if !user.is_active {
            return Err(reject_refresh("owner is deactivated"));
        }
        Ok(user)
    }
}

fn reject_refresh(reason: &'static str) -> AppError {
    tracing::info!(reason, "refresh token rejected");
    AppError::unauthorized(NOT_AUTHORIZED)
}

fn reset_email_html(name: &str, link: &str, ttl: chrono::Duration) -> String {
    format!(
        "<p>Hello {name},</p>\
         <p>Use the link below to choose a new password. It expires in {} minutes.</p>\
         <p><a href=\"{link}\">Reset password</a></p>\
         <p>If you did not ask for this, you can ignore this message.</p>",
        ttl.num_minutes()
    )
}
