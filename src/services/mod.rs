pub mod auth_service;
mod context;
pub mod file_service;
pub mod mailer;
pub mod user_service;

pub use context::ServiceContext;
