use anyhow::{Result, bail};

use super::{AppConfig, AuthConfig, MailConfig};

pub fn validate(cfg: &AppConfig) -> Result<()> {
    let mut errors: Vec<String> = Vec::new();

    if cfg.general.host.trim().is_empty() {
        errors.push("general.host must not be empty".to_string());
    }

    if let Some(database) = cfg.database.as_ref() {
        if database.url.trim().is_empty() {
            errors.push("database.url must not be empty".to_string());
        }

        if database.min_idle > database.max_connections {
            errors.push(format!(
                "database.min_idle ({}) must be <= database.max_connections ({})",
                database.min_idle, database.max_connections
            ));
        }
    }

    if let Some(auth) = cfg.auth.as_ref() {
        validate_auth(auth, &mut errors);
    }

    if cfg.storage.upload_dir.trim().is_empty() {
        errors.push("storage.upload_dir must not be empty".to_string());
    }

    if cfg.mail.enabled {
        validate_mail(&cfg.mail, &mut errors);
    }

    if errors.is_empty() {
        return Ok(());
    }

    bail!("invalid app config:\n- {}", errors.join("\n- "))
}

fn validate_auth(auth: &AuthConfig, errors: &mut Vec<String>) {
    let secrets = [
        ("auth.access_token_secret", auth.access_token_secret.as_str()),
        ("auth.refresh_token_secret", auth.refresh_token_secret.as_str()),
        ("auth.forget_password_secret", auth.forget_password_secret.as_str()),
    ];

    for (name, secret) in secrets {
        if secret.trim().is_empty() {
            errors.push(format!("{name} must not be empty"));
        }
    }

    // pairwise distinct
    for (i, (left_name, left)) in secrets.iter().enumerate() {
        for (right_name, right) in &secrets[i + 1..] {
            if !left.is_empty() && left == right {
                errors.push(format!("{left_name} and {right_name} must differ"));
            }
        }
    }

    if auth.admin_email.trim().is_empty() {
        errors.push("auth.admin_email must not be empty".to_string());
    }

    if auth.admin_password.len() < 8 {
        errors.push("auth.admin_password must be at least 8 characters".to_string());
    }
}

fn validate_mail(mail: &MailConfig, errors: &mut Vec<String>) {
    if mail.smtp_host.trim().is_empty() {
        errors.push("mail.smtp_host is required when mail is enabled".to_string());
    }

    if mail.from.parse::<lettre::message::Mailbox>().is_err() {
        errors.push(format!("mail.from ({}) is not a valid address", mail.from));
    }

    if mail.smtp_username.is_some() != mail.smtp_password.is_some() {
        errors.push("mail.smtp_username and mail.smtp_password must be set together".to_string());
    }
}
