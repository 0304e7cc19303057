use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};

use super::{Claims, TokenKind, TokenSubject, duration::parse_duration};
use crate::{config::AuthConfig, error::AppError};

#[derive(Clone)]
pub struct JwtKeys {
    pub enc: EncodingKey,
    pub dec: DecodingKey,
}

impl JwtKeys {
    pub fn from_secret(secret: &[u8]) -> Self {
        Self {
            enc: EncodingKey::from_secret(secret),
            dec: DecodingKey::from_secret(secret),
        }
    }
}

pub fn now_unix() -> usize {
    Utc::now().timestamp().max(0) as usize
}

pub fn make_claims(subject: &TokenSubject, kind: TokenKind, ttl: Duration) -> Claims {
    let iat = now_unix();
    let exp = iat.saturating_add(ttl.num_seconds().max(0) as usize);
    Claims {
        id: subject.id,
        email: subject.email.clone(),
        role: subject.role,
        exp,
        iat,
        jti: uuid::Uuid::new_v4().to_string(),
        kind,
    }
}

pub fn encode_token(keys: &JwtKeys, claims: &Claims) -> Result<String, AppError> {
    let mut header = Header::new(Algorithm::HS256);
    header.typ = Some("JWT".into());

    encode(&header, claims, &keys.enc)
        .map_err(|err| AppError::internal(format!("token encoding failed: {err}")))
}

/// Signs and verifies the three token kinds, each with its own secret and lifetime.
#[derive(Clone)]
pub struct TokenCodec {
    access: JwtKeys,
    refresh: JwtKeys,
    reset: JwtKeys,
    access_ttl: Duration,
    refresh_ttl: Duration,
    reset_ttl: Duration,
}

impl TokenCodec {
    pub fn from_config(cfg: &AuthConfig) -> Self {
        Self {
            access: JwtKeys::from_secret(cfg.access_token_secret.as_bytes()),
            refresh: JwtKeys::from_secret(cfg.refresh_token_secret.as_bytes()),
            reset: JwtKeys::from_secret(cfg.forget_password_secret.as_bytes()),
            access_ttl: parse_duration(&cfg.access_token_ttl),
            refresh_ttl: parse_duration(&cfg.refresh_token_ttl),
            reset_ttl: parse_duration(&cfg.forget_password_ttl),
        }
    }

    pub fn ttl(&self, kind: TokenKind) -> Duration {
        match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
            TokenKind::Reset => self.reset_ttl,
        }
    }

    fn keys(&self, kind: TokenKind) -> &JwtKeys {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
            TokenKind::Reset => &self.reset,
        }
    }

    pub fn sign(&self, subject: &TokenSubject, kind: TokenKind) -> Result<String, AppError> {
        let claims = make_claims(subject, kind, self.ttl(kind));
        encode_token(self.keys(kind), &claims)
    }

    pub fn sign_access(&self, subject: &TokenSubject) -> Result<String, AppError> {
        self.sign(subject, TokenKind::Access)
    }

    pub fn sign_refresh(&self, subject: &TokenSubject) -> Result<String, AppError> {
        self.sign(subject, TokenKind::Refresh)
    }

    pub fn sign_reset(&self, subject: &TokenSubject) -> Result<String, AppError> {
        self.sign(subject, TokenKind::Reset)
    }

    /// Checks signature, expiry and the `type` claim. Any failure yields `None`.
    pub fn verify(&self, token: &str, kind: TokenKind) -> Option<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = true;

        match decode::<Claims>(token, &self.keys(kind).dec, &validation) {
            Ok(data) if data.claims.kind == kind => Some(data.claims),
            Ok(data) => {
                tracing::debug!(expected = ?kind, found = ?data.claims.kind, "token type mismatch");
                None
            }
            Err(err) => {
                tracing::debug!(kind = ?kind, "token rejected: {err}");
                None
            }
        }
    }
}
