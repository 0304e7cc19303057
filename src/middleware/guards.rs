use std::{marker::PhantomData, sync::Arc};

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};

use crate::{
    auth::{AdminOnly, AnyRole, RequiredRoles, TokenKind},
    db::{
        dao::{DaoBase, DaoContext, DaoLayerError},
        entities::user,
    },
    error::AppError,
    state::AppState,
};

const NOT_AUTHORIZED: &str = "You are not authorized";

/// Bearer-token guard. Resolves the calling account and enforces `R`'s role set.
///
/// Every failure other than a deactivated account or a role mismatch reads
/// "You are not authorized".
pub struct AuthGuard<R: RequiredRoles = AnyRole> {
    pub user: user::Model,
    _roles: PhantomData<R>,
}

pub type CurrentUser = AuthGuard<AnyRole>;
pub type AdminUser = AuthGuard<AdminOnly>;

impl<R> FromRequestParts<Arc<AppState>> for AuthGuard<R>
where
    R: RequiredRoles + Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let user = resolve_user(parts, state).await?;

        if !R::permits(user.role) {
            tracing::debug!(user_id = user.id, role = %user.role, "role not permitted");
            return Err(AppError::forbidden("You have no access"));
        }

        Ok(Self {
            user,
            _roles: PhantomData,
        })
    }
}

async fn resolve_user(parts: &Parts, state: &AppState) -> Result<user::Model, AppError> {
    let token = bearer_token(parts).ok_or_else(|| AppError::unauthorized(NOT_AUTHORIZED))?;

    let claims = state
        .tokens
        .verify(token, TokenKind::Access)
        .ok_or_else(|| AppError::unauthorized(NOT_AUTHORIZED))?;

    let user = match DaoContext::new(&state.db).user().find_by_id(claims.id).await {
        Ok(user) => user,
        Err(DaoLayerError::NotFound { .. }) => {
            return Err(AppError::unauthorized(NOT_AUTHORIZED));
        }
        Err(err) => {
            tracing::error!(user_id = claims.id, "auth guard lookup failed: {err}");
            return Err(AppError::unauthorized(NOT_AUTHORIZED));
        }
    };

    if !user.is_active {
        return Err(AppError::unauthorized("Account is deactivated"));
    }
    Ok(user)
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}
