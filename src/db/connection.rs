use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection};
use tracing::info;

use crate::config::{AppConfig, DatabaseConfig};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const SQLITE_BUSY_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbBackendKind {
    Postgres,
    Sqlite,
}

impl DbBackendKind {
    pub fn from_url(url: &str) -> Result<Self> {
        let normalized = url.trim().to_ascii_lowercase();
        if normalized.starts_with("postgres://") || normalized.starts_with("postgresql://") {
            Ok(Self::Postgres)
        } else if normalized.starts_with("sqlite:") {
            Ok(Self::Sqlite)
        } else {
            Err(anyhow!(
                "unsupported database url '{}'; expected scheme postgres://, postgresql://, or sqlite://",
                redact_url(url)
            ))
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::Sqlite => "sqlite",
        }
    }

    async fn post_connect(self, db: &DatabaseConnection) -> Result<()> {
        if self == Self::Sqlite {
            db.execute_unprepared("PRAGMA foreign_keys = ON").await?;
            db.execute_unprepared(&format!("PRAGMA busy_timeout = {SQLITE_BUSY_TIMEOUT_MS}"))
                .await?;
        }
        Ok(())
    }
}

/// Opens the pool, applies backend pragmas and syncs the schema from the entity registry.
pub async fn connect(cfg: &AppConfig) -> Result<DatabaseConnection> {
    let database = cfg
        .database
        .as_ref()
        .context("database config is required (set APP_DATABASE__URL)")?;
    connect_with(database).await
}

pub async fn connect_with(cfg: &DatabaseConfig) -> Result<DatabaseConnection> {
    let kind = DbBackendKind::from_url(&cfg.url)?;

    let mut options = ConnectOptions::new(cfg.url.clone());
    options
        .max_connections(cfg.max_connections)
        .min_connections(cfg.min_idle)
        .connect_timeout(CONNECT_TIMEOUT)
        .sqlx_logging(false);

    let db = Database::connect(options)
        .await
        .with_context(|| format!("failed to connect to {}", redact_url(&cfg.url)))?;
    kind.post_connect(&db).await?;

    info!(backend = kind.as_str(), "syncing database schema from entities");
    db.get_schema_registry("account_server::db::entities::*")
        .sync(&db)
        .await?;
    Ok(db)
}

fn redact_url(url: &str) -> String {
    let trimmed = url.trim();
    if let Some((scheme, _)) = trimmed.split_once("://") {
        format!("{scheme}://<redacted>")
    } else if let Some((scheme, _)) = trimmed.split_once(':') {
        format!("{scheme}:<redacted>")
    } else {
        "<invalid-url>".to_string()
    }
}
