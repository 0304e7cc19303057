use base_entity_derive::base_entity;
use sea_orm::entity::prelude::*;

/// Metadata for an uploaded file stored under the configured upload directory.
#[base_entity]
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "files")]
pub struct Model {
    pub path: String,
    pub content_type: Option<String>,
    pub original_name: String,
    #[sea_orm(unique)]
    pub modified_name: String,
    #[sea_orm(has_many)]
    pub users: HasMany<super::user::Entity>,
}

impl ActiveModelBehavior for ActiveModel {}
