use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::db::entities::user;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, DeriveActiveEnum,
)]
#[serde(rename_all = "lowercase")]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum Role {
    #[sea_orm(string_value = "admin")]
    Admin,
    #[sea_orm(string_value = "user")]
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }

    pub fn is_admin(&self) -> bool {
        match self {
            Role::Admin => true,
            Role::User => false,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for Role {
    type Error = ();

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "user" => Ok(Role::User),
            _ => Err(()),
        }
    }
}

/// Roles a guarded route accepts. An empty set admits any authenticated user.
pub trait RequiredRoles {
    fn allowed() -> &'static [Role];

    fn permits(role: Role) -> bool {
        let allowed = Self::allowed();
        allowed.is_empty() || allowed.contains(&role)
    }
}

pub struct AnyRole;

impl RequiredRoles for AnyRole {
    fn allowed() -> &'static [Role] {
        &[]
    }
}

pub struct AdminOnly;

impl RequiredRoles for AdminOnly {
    fn allowed() -> &'static [Role] {
        &[Role::Admin]
    }
}

/// Embedded `type` claim; each kind is signed with its own secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
    Reset,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    pub id: i32, // subject user id
    pub email: String,
    pub role: Role,
    pub exp: usize,
    pub iat: usize,
    pub jti: String,
    #[serde(rename = "type")]
    pub kind: TokenKind,
}

/// The identity fields copied into every freshly minted token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSubject {
    pub id: i32,
    pub email: String,
    pub role: Role,
}

impl From<&user::Model> for TokenSubject {
    fn from(user: &user::Model) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            role: user.role,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{AdminOnly, AnyRole, RequiredRoles, Role, TokenKind};

    #[test]
    fn role_string_roundtrip() {
        assert_eq!(Role::User.as_str(), "user");
        assert_eq!(Role::Admin.to_string(), "admin");

        assert_eq!(Role::try_from("user"), Ok(Role::User));
        assert_eq!(Role::try_from("ADMIN"), Ok(Role::Admin));
        assert!(Role::try_from("manager").is_err());
    }

    #[test]
    fn role_sets_gate_membership() {
        assert!(AnyRole::permits(Role::User));
        assert!(AnyRole::permits(Role::Admin));
        assert!(AdminOnly::permits(Role::Admin));
        assert!(!AdminOnly::permits(Role::User));
    }

    #[test]
    fn token_kind_serializes_lowercase() {
        assert_eq!(
            serde_json::to_value(TokenKind::Refresh).expect("kind should serialize"),
            serde_json::json!("refresh")
        );
    }
}
