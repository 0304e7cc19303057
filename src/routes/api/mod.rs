pub mod admin;
pub mod auth;
pub mod public;
mod router;
mod rules;
pub mod session;
pub mod users;

pub use router::router;
