#[allow(unused_imports)]
pub mod prelude {
    pub use super::file::Entity as File;
    pub use super::refresh_token::Entity as RefreshToken;
    pub use super::user::Entity as User;
}

pub mod file;
pub mod refresh_token;
pub mod user;
