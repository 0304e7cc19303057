use sea_orm::{DatabaseConnection, Set};

use super::{DaoBase, DaoResult};
use crate::db::entities::{file, prelude::File};

#[derive(Clone)]
pub struct FileDao {
    db: DatabaseConnection,
}

impl DaoBase for FileDao {
    type Entity = File;
    const NAME: &'static str = "File";

    fn new(db: &DatabaseConnection) -> Self {
        Self { db: db.clone() }
    }

    fn db(&self) -> &DatabaseConnection {
        &self.db
    }
}

#[derive(Debug, Clone)]
pub struct NewFile {
    pub path: String,
    pub content_type: Option<String>,
    pub original_name: String,
    pub modified_name: String,
}

impl FileDao {
    pub async fn create_file(&self, new_file: NewFile) -> DaoResult<file::Model> {
        let model = file::ActiveModel {
            path: Set(new_file.path),
            content_type: Set(new_file.content_type),
            original_name: Set(new_file.original_name),
            modified_name: Set(new_file.modified_name),
            ..Default::default()
        };
        self.create(model).await
    }
}
