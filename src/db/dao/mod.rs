pub mod base;
pub mod base_traits;
mod context;
pub mod error;
pub mod file_dao;
pub mod refresh_token_dao;
pub mod user_dao;

pub use base::{DaoBase, Page};
pub use base_traits::{HasCreatedAtColumn, TimestampedActiveModel};
pub use context::DaoContext;
pub use error::{DaoLayerError, DaoResult};
pub use file_dao::{FileDao, NewFile};
pub use refresh_token_dao::{ClientMeta, RefreshTokenDao};
pub use user_dao::{NewUser, UserDao, UserFilter};
