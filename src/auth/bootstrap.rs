use anyhow::Context;

use crate::{
    auth::{Role, password::hash_password},
    config::AuthConfig,
    db::dao::{NewUser, UserDao},
};

/// Creates the configured admin account unless an admin already exists.
///
/// Returns whether an account was created.
pub async fn seed_admin(users: &UserDao, cfg: &AuthConfig) -> anyhow::Result<bool> {
    if users
        .admin_exists()
        .await
        .context("failed to look up existing admins")?
    {
        tracing::info!("admin account present; skipping seed");
        return Ok(false);
    }

    if let Some(existing) = users
        .find_by_email(&cfg.admin_email)
        .await
        .context("failed to look up seed admin email")?
    {
        tracing::warn!(
            user_id = existing.id,
            "seed admin email belongs to a non-admin account; skipping seed"
        );
        return Ok(false);
    }

    let password_hash = hash_password(&cfg.admin_password)
        .map_err(|err| anyhow::anyhow!("admin seed hash error: {err}"))?;
    let admin = users
        .create_user(NewUser {
            name: cfg.admin_name.clone(),
            email: cfg.admin_email.clone(),
            password_hash,
            role: Role::Admin,
            created_by: None,
        })
        .await
        .context("failed to create seed admin")?;
    tracing::info!(user_id = admin.id, "seeded admin account");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use sea_orm::{DatabaseBackend, MockDatabase};

    use super::seed_admin;
    use crate::{
        auth::Role,
        db::{
            dao::{DaoBase, UserDao},
            entities::user,
        },
        test_helpers::{auth_config, user_model},
    };

    #[tokio::test]
    async fn skips_when_admin_exists() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[user_model(1, "root@example.com", "hash", Role::Admin)]])
            .into_connection();

        let created = seed_admin(&UserDao::new(&db), &auth_config())
            .await
            .expect("seed should succeed");
        assert!(!created);
    }

    #[tokio::test]
    async fn creates_admin_on_empty_store() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<user::Model>::new()])
            .append_query_results([Vec::<user::Model>::new()])
            .append_query_results([[user_model(1, "admin@example.com", "hash", Role::Admin)]])
            .into_connection();

        let created = seed_admin(&UserDao::new(&db), &auth_config())
            .await
            .expect("seed should succeed");
        assert!(created);
    }

    #[tokio::test]
    async fn does_not_promote_existing_member() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<user::Model>::new()])
            .append_query_results([[user_model(4, "admin@example.com", "hash", Role::User)]])
            .into_connection();

        let created = seed_admin(&UserDao::new(&db), &auth_config())
            .await
            .expect("seed should succeed");
        assert!(!created);
    }
}
