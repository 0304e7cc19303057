use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::{defaults, envconfig::EnvConfig, validate};

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub general: GeneralConfig,
    pub logging: LoggingConfig,
    pub database: Option<DatabaseConfig>,
    pub auth: Option<AuthConfig>,
    pub storage: StorageConfig,
    pub mail: MailConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        <Self as EnvConfig>::from_env()
    }
}

impl EnvConfig for AppConfig {
    fn validate(&self) -> Result<()> {
        validate::validate(self)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeneralConfig {
    pub host: String,
    pub port: u16,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            host: defaults::DEFAULT_HOST.to_string(),
            port: defaults::DEFAULT_PORT,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    pub rust_log: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            rust_log: defaults::DEFAULT_RUST_LOG.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_db_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_db_min_idle")]
    pub min_idle: u32,
}

/// Token secrets, lifetimes and the bootstrap admin account.
///
/// TTLs are duration strings such as `15m` or `7d`; anything unparsable falls back
/// to fifteen minutes (see [`crate::auth::duration::parse_duration`]).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    pub access_token_secret: String,
    pub refresh_token_secret: String,
    pub forget_password_secret: String,
    #[serde(default = "default_access_token_ttl")]
    pub access_token_ttl: String,
    #[serde(default = "default_refresh_token_ttl")]
    pub refresh_token_ttl: String,
    #[serde(default = "default_forget_password_ttl")]
    pub forget_password_ttl: String,
    #[serde(default)]
    pub cookie_secure: bool,
    #[serde(default = "default_reset_password_url")]
    pub reset_password_url: String,
    #[serde(default = "default_admin_name")]
    pub admin_name: String,
    pub admin_email: String,
    pub admin_password: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    pub upload_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: defaults::DEFAULT_UPLOAD_DIR.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct MailConfig {
    pub from: String,
    /// Off means messages are logged and dropped.
    pub enabled: bool,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            from: defaults::DEFAULT_MAIL_FROM.to_string(),
            enabled: false,
            smtp_host: String::new(),
            smtp_port: defaults::DEFAULT_SMTP_PORT,
            smtp_username: None,
            smtp_password: None,
        }
    }
}

fn default_db_max_connections() -> u32 {
    defaults::DEFAULT_DB_MAX_CONNECTIONS
}

fn default_db_min_idle() -> u32 {
    defaults::DEFAULT_DB_MIN_IDLE
}

fn default_access_token_ttl() -> String {
    defaults::DEFAULT_ACCESS_TOKEN_TTL.to_string()
}

fn default_refresh_token_ttl() -> String {
    defaults::DEFAULT_REFRESH_TOKEN_TTL.to_string()
}

fn default_forget_password_ttl() -> String {
    defaults::DEFAULT_FORGET_PASSWORD_TTL.to_string()
}

fn default_reset_password_url() -> String {
    defaults::DEFAULT_RESET_PASSWORD_URL.to_string()
}

fn default_admin_name() -> String {
    defaults::DEFAULT_ADMIN_NAME.to_string()
}
