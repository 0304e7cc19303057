use base_entity_derive::base_entity;
use sea_orm::entity::prelude::*;

use crate::auth::Role;

/// Account row. `created_by`/`updated_by` hold the acting user's id (no foreign key).
#[base_entity]
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    pub name: String,
    #[sea_orm(unique)]
    pub email: String,
    pub password_hash: String,
    #[sea_orm(default_value = true)]
    pub is_active: bool,
    pub role: Role,
    #[sea_orm(indexed)]
    pub profile_image_id: Option<i32>,
    pub created_by: Option<i32>,
    pub updated_by: Option<i32>,
    #[sea_orm(has_many)]
    pub refresh_tokens: HasMany<super::refresh_token::Entity>,
    #[sea_orm(belongs_to, from = "profile_image_id", to = "id", on_delete = "SetNull")]
    pub profile_image: HasOne<super::file::Entity>,
}

impl ActiveModelBehavior for ActiveModel {}
