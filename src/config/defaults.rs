pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_RUST_LOG: &str = "info,tower_http=info";
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 10;
pub const DEFAULT_DB_MIN_IDLE: u32 = 2;
pub const DEFAULT_ACCESS_TOKEN_TTL: &str = "15m";
pub const DEFAULT_REFRESH_TOKEN_TTL: &str = "7d";
pub const DEFAULT_FORGET_PASSWORD_TTL: &str = "10m";
pub const DEFAULT_RESET_PASSWORD_URL: &str = "http://localhost:3000/reset-password";
pub const DEFAULT_ADMIN_NAME: &str = "System Admin";
pub const DEFAULT_UPLOAD_DIR: &str = "uploads";
pub const DEFAULT_MAIL_FROM: &str = "no-reply@example.com";
pub const DEFAULT_SMTP_PORT: u16 = 587;
