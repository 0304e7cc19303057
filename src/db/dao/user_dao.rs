use chrono::{DateTime, FixedOffset, Utc};
use sea_orm::{
    ColumnTrait, Condition, DatabaseConnection, EntityTrait, Order, QueryFilter, Set,
    sea_query::Expr,
};

use super::{DaoBase, DaoResult, Page};
use crate::{
    auth::Role,
    db::entities::{prelude::User, user},
};

#[derive(Clone)]
pub struct UserDao {
    db: DatabaseConnection,
}

impl DaoBase for UserDao {
    type Entity = User;
    const NAME: &'static str = "User";

    fn new(db: &DatabaseConnection) -> Self {
        Self { db: db.clone() }
    }

    fn db(&self) -> &DatabaseConnection {
        &self.db
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub created_by: Option<i32>,
}

/// Listing filters; every populated field narrows the result.
#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    /// Limits the listing to a single account (non-admin callers).
    pub only_id: Option<i32>,
    /// Substring match on name or email.
    pub search_term: Option<String>,
    pub role: Option<Role>,
    pub email: Option<String>,
    pub is_active: Option<bool>,
}

impl UserFilter {
    fn condition(&self) -> Condition {
        let mut condition = Condition::all();
        if let Some(id) = self.only_id {
            condition = condition.add(user::Column::Id.eq(id));
        }
        if let Some(term) = self.search_term.as_deref().filter(|term| !term.is_empty()) {
            condition = condition.add(
                Condition::any()
                    .add(user::Column::Name.contains(term))
                    .add(user::Column::Email.contains(term)),
            );
        }
        if let Some(role) = self.role {
            condition = condition.add(user::Column::Role.eq(role));
        }
        if let Some(email) = self.email.as_deref().filter(|email| !email.is_empty()) {
            condition = condition.add(user::Column::Email.eq(email));
        }
        if let Some(is_active) = self.is_active {
            condition = condition.add(user::Column::IsActive.eq(is_active));
        }
        condition
    }
}

impl UserDao {
    pub async fn find_by_email(&self, email: &str) -> DaoResult<Option<user::Model>> {
        let email = email.to_string();
        self.find_one(move |query| query.filter(user::Column::Email.eq(email)))
            .await
    }

    /// Another account already using `email`, if any.
    pub async fn find_email_owner_other_than(
        &self,
        email: &str,
        id: i32,
    ) -> DaoResult<Option<user::Model>> {
        let email = email.to_string();
        self.find_one(move |query| {
            query
                .filter(user::Column::Email.eq(email))
                .filter(user::Column::Id.ne(id))
        })
        .await
    }

    pub async fn admin_exists(&self) -> DaoResult<bool> {
        self.find_one(|query| query.filter(user::Column::Role.eq(Role::Admin)))
            .await
            .map(|admin| admin.is_some())
    }

    pub async fn create_user(&self, new_user: NewUser) -> DaoResult<user::Model> {
        let model = user::ActiveModel {
            name: Set(new_user.name),
            email: Set(new_user.email),
            password_hash: Set(new_user.password_hash),
            is_active: Set(true),
            role: Set(new_user.role),
            profile_image_id: Set(None),
            created_by: Set(new_user.created_by),
            updated_by: Set(new_user.created_by),
            ..Default::default()
        };
        self.create(model).await
    }

    pub async fn set_password(
        &self,
        id: i32,
        password_hash: String,
        updated_by: Option<i32>,
    ) -> DaoResult<user::Model> {
        self.update(id, move |active| {
            active.password_hash = Set(password_hash);
            active.updated_by = Set(updated_by);
        })
        .await
    }

    /// Stores a new hash only if the row has not changed since `unchanged_since`.
    ///
    /// The write bumps `updated_at`, so of two callers holding the same cut-off at most
    /// one sees `true`.
    pub async fn set_password_if_unchanged(
        &self,
        id: i32,
        password_hash: String,
        unchanged_since: DateTime<FixedOffset>,
    ) -> DaoResult<bool> {
        let result = User::update_many()
            .col_expr(user::Column::PasswordHash, Expr::value(password_hash))
            .col_expr(user::Column::UpdatedBy, Expr::value(id))
            .col_expr(user::Column::UpdatedAt, Expr::value(Utc::now().fixed_offset()))
            .filter(user::Column::Id.eq(id))
            .filter(user::Column::UpdatedAt.lt(unchanged_since))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected > 0)
    }

    pub async fn list(
        &self,
        filter: &UserFilter,
        page: u64,
        limit: u64,
        order: (user::Column, Order),
    ) -> DaoResult<Page<user::Model>> {
        let condition = filter.condition();
        self.find(page, limit, Some(order), move |query| query.filter(condition))
            .await
    }
}
