pub mod bootstrap;
pub mod duration;
pub mod jwt;
pub mod password;
mod types;

pub use types::{AdminOnly, AnyRole, Claims, RequiredRoles, Role, TokenKind, TokenSubject};
