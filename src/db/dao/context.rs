use sea_orm::DatabaseConnection;

use super::{DaoBase, FileDao, RefreshTokenDao, UserDao};

/// Hands out DAOs that share one pooled connection handle.
#[derive(Clone)]
pub struct DaoContext {
    db: DatabaseConnection,
}

impl DaoContext {
    pub fn new(db: &DatabaseConnection) -> Self {
        Self { db: db.clone() }
    }

    pub fn user(&self) -> UserDao {
        DaoBase::new(&self.db)
    }

    pub fn refresh_token(&self) -> RefreshTokenDao {
        DaoBase::new(&self.db)
    }

    pub fn file(&self) -> FileDao {
        DaoBase::new(&self.db)
    }
}
