use chrono::{Duration, Utc};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set, sea_query::Expr};

use super::{DaoBase, DaoResult};
use crate::db::entities::refresh_token::{self, Entity as RefreshToken};

const IP_ADDRESS_MAX: usize = 45;
const USER_AGENT_MAX: usize = 255;

/// Client context recorded alongside an issued refresh token.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientMeta {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl ClientMeta {
    fn truncated(value: Option<String>, max: usize) -> Option<String> {
        value.map(|value| value.chars().take(max).collect())
    }
}

#[derive(Clone)]
pub struct RefreshTokenDao {
    db: DatabaseConnection,
}

impl DaoBase for RefreshTokenDao {
    type Entity = RefreshToken;
    const NAME: &'static str = "RefreshToken";

    fn new(db: &DatabaseConnection) -> Self {
        Self { db: db.clone() }
    }

    fn db(&self) -> &DatabaseConnection {
        &self.db
    }
}

/// A row is usable iff it is neither revoked nor past its expiry.
pub fn is_active(token: &refresh_token::Model) -> bool {
    !token.revoked && token.expires_at > Utc::now().fixed_offset()
}

impl RefreshTokenDao {
    pub async fn issue(
        &self,
        user_id: i32,
        token: &str,
        client: ClientMeta,
        ttl: Duration,
    ) -> DaoResult<refresh_token::Model> {
        let model = refresh_token::ActiveModel {
            token: Set(token.to_string()),
            expires_at: Set(Utc::now().fixed_offset() + ttl),
            revoked: Set(false),
            user_id: Set(user_id),
            ip_address: Set(ClientMeta::truncated(client.ip_address, IP_ADDRESS_MAX)),
            user_agent: Set(ClientMeta::truncated(client.user_agent, USER_AGENT_MAX)),
            ..Default::default()
        };
        self.create(model).await
    }

    pub async fn find_by_token(&self, token: &str) -> DaoResult<Option<refresh_token::Model>> {
        let token = token.to_string();
        self.find_one(move |query| query.filter(refresh_token::Column::Token.eq(token)))
            .await
    }

    /// Marks the row revoked. Returns whether a row matched; revoking twice is harmless.
    pub async fn revoke(&self, token: &str) -> DaoResult<bool> {
        let result = RefreshToken::update_many()
            .col_expr(refresh_token::Column::Revoked, Expr::value(true))
            .col_expr(
                refresh_token::Column::UpdatedAt,
                Expr::value(Utc::now().fixed_offset()),
            )
            .filter(refresh_token::Column::Token.eq(token))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected > 0)
    }

    /// Swaps the token string in place, but only while the old value is still active.
    ///
    /// `None` means the row was already rotated, revoked or expired when the update ran;
    /// of two concurrent rotations of the same token at most one gets a row back.
    pub async fn rotate(
        &self,
        old_token: &str,
        new_token: &str,
    ) -> DaoResult<Option<refresh_token::Model>> {
        let now = Utc::now().fixed_offset();
        let rows = RefreshToken::update_many()
            .col_expr(refresh_token::Column::Token, Expr::value(new_token))
            .col_expr(refresh_token::Column::UpdatedAt, Expr::value(now))
            .filter(refresh_token::Column::Token.eq(old_token))
            .filter(refresh_token::Column::Revoked.eq(false))
            .filter(refresh_token::Column::ExpiresAt.gt(now))
            .exec_with_returning(&self.db)
            .await?;
        Ok(rows.into_iter().next())
    }

    pub async fn revoke_all_for_user(&self, user_id: i32) -> DaoResult<u64> {
        let result = RefreshToken::update_many()
            .col_expr(refresh_token::Column::Revoked, Expr::value(true))
            .col_expr(
                refresh_token::Column::UpdatedAt,
                Expr::value(Utc::now().fixed_offset()),
            )
            .filter(refresh_token::Column::UserId.eq(user_id))
            .filter(refresh_token::Column::Revoked.eq(false))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected)
    }

    pub async fn purge_expired(&self) -> DaoResult<u64> {
        let result = RefreshToken::delete_many()
            .filter(refresh_token::Column::ExpiresAt.lt(Utc::now().fixed_offset()))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected)
    }
}
