use chrono::{Duration, Utc};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter};

use account_server::{
    auth::Role,
    config::DatabaseConfig,
    db::{
        connection::connect_with,
        dao::{ClientMeta, DaoBase, DaoContext, NewUser},
        entities::{prelude::RefreshToken, refresh_token},
    },
};

/// Single-connection in-memory store with the full schema.
async fn memory_db() -> DatabaseConnection {
    connect_with(&DatabaseConfig {
        url: "sqlite::memory:".to_string(),
        max_connections: 1,
        min_idle: 1,
    })
    .await
    .expect("in-memory sqlite should open")
}

async fn create_user(daos: &DaoContext, email: &str) -> i32 {
    daos.user()
        .create_user(NewUser {
            name: "Store Test".to_string(),
            email: email.to_string(),
            password_hash: "hash".to_string(),
            role: Role::User,
            created_by: None,
        })
        .await
        .expect("user insert should succeed")
        .id
}

async fn issue(daos: &DaoContext, user_id: i32, token: &str, ttl: Duration) {
    daos.refresh_token()
        .issue(user_id, token, ClientMeta::default(), ttl)
        .await
        .expect("token insert should succeed");
}

async fn tokens_of(db: &DatabaseConnection, user_id: i32) -> u64 {
    RefreshToken::find()
        .filter(refresh_token::Column::UserId.eq(user_id))
        .count(db)
        .await
        .expect("count should succeed")
}

#[tokio::test]
async fn rotation_only_matches_an_active_token_value() {
    let db = memory_db().await;
    let daos = DaoContext::new(&db);
    let user_id = create_user(&daos, "rotate@example.com").await;
    let tokens = daos.refresh_token();
    issue(&daos, user_id, "first", Duration::days(7)).await;

    let rotated = tokens
        .rotate("first", "second")
        .await
        .expect("rotate should run");
    assert_eq!(rotated.map(|row| row.token).as_deref(), Some("second"));

    // the old value no longer exists
    assert!(
        tokens
            .rotate("first", "third")
            .await
            .expect("rotate should run")
            .is_none()
    );

    assert!(tokens.revoke("second").await.expect("revoke should run"));
    assert!(
        tokens
            .rotate("second", "fourth")
            .await
            .expect("rotate should run")
            .is_none()
    );

    issue(&daos, user_id, "lapsed", Duration::seconds(-5)).await;
    assert!(
        tokens
            .rotate("lapsed", "fresh")
            .await
            .expect("rotate should run")
            .is_none()
    );
}

#[tokio::test]
async fn racing_rotations_of_one_token_have_a_single_winner() {
    let db = memory_db().await;
    let daos = DaoContext::new(&db);
    let user_id = create_user(&daos, "race@example.com").await;
    issue(&daos, user_id, "shared", Duration::days(7)).await;

    let left = daos.refresh_token();
    let right = daos.refresh_token();
    let (a, b) = tokio::join!(left.rotate("shared", "left"), right.rotate("shared", "right"));

    let winners = [a.expect("rotate should run"), b.expect("rotate should run")]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>();
    assert_eq!(winners.len(), 1);

    let stored = daos
        .refresh_token()
        .find_by_token(&winners[0].token)
        .await
        .expect("lookup should run");
    assert!(stored.is_some());
    assert!(
        daos.refresh_token()
            .find_by_token("shared")
            .await
            .expect("lookup should run")
            .is_none()
    );
}

#[tokio::test]
async fn deleting_an_account_drops_its_refresh_tokens() {
    let db = memory_db().await;
    let daos = DaoContext::new(&db);
    let doomed = create_user(&daos, "doomed@example.com").await;
    let kept = create_user(&daos, "kept@example.com").await;
    issue(&daos, doomed, "doomed-1", Duration::days(7)).await;
    issue(&daos, doomed, "doomed-2", Duration::days(7)).await;
    issue(&daos, kept, "kept-1", Duration::days(7)).await;

    daos.user().delete(doomed).await.expect("delete should succeed");

    assert_eq!(tokens_of(&db, doomed).await, 0);
    assert_eq!(tokens_of(&db, kept).await, 1);
}

#[tokio::test]
async fn conditional_password_write_lands_once_per_cutoff() {
    let db = memory_db().await;
    let daos = DaoContext::new(&db);
    let user_id = create_user(&daos, "reset@example.com").await;
    let cutoff = Utc::now().fixed_offset();

    let users = daos.user();
    assert!(
        users
            .set_password_if_unchanged(user_id, "first".to_string(), cutoff)
            .await
            .expect("update should run")
    );
    assert!(
        !users
            .set_password_if_unchanged(user_id, "second".to_string(), cutoff)
            .await
            .expect("update should run")
    );

    let stored = users.find_by_id(user_id).await.expect("user should exist");
    assert_eq!(stored.password_hash, "first");
}
