use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{HeaderMap, header, request::Parts},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

use crate::{db::dao::ClientMeta, error::AppError};

pub const REFRESH_COOKIE: &str = "refresh_token";

/// Adds the http-only refresh cookie, replacing any previous value.
pub fn set_refresh_cookie(
    jar: CookieJar,
    token: String,
    ttl: chrono::Duration,
    secure: bool,
) -> CookieJar {
    let mut cookie = Cookie::new(REFRESH_COOKIE, token);
    cookie.set_http_only(true);
    cookie.set_same_site(SameSite::Lax);
    cookie.set_secure(secure);
    cookie.set_path("/");
    cookie.set_max_age(time::Duration::seconds(ttl.num_seconds()));
    jar.add(cookie)
}

/// Emits a removal cookie when the request carried one.
pub fn clear_refresh_cookie(jar: CookieJar) -> CookieJar {
    jar.remove(Cookie::build(REFRESH_COOKIE).path("/"))
}

pub fn refresh_cookie(jar: &CookieJar) -> Result<String, AppError> {
    jar.get(REFRESH_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| AppError::unauthorized("Please sign in first"))
}

/// Caller address and agent recorded next to each refresh token.
pub struct ClientInfo(pub ClientMeta);

impl<S: Send + Sync> FromRequestParts<S> for ClientInfo {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string());
        Ok(Self(client_meta(&parts.headers, peer)))
    }
}

fn client_meta(headers: &HeaderMap, peer: Option<String>) -> ClientMeta {
    let forwarded = header_str(headers, "x-forwarded-for")
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string);
    ClientMeta {
        ip_address: forwarded.or(peer),
        user_agent: header_str(headers, header::USER_AGENT.as_str()).map(str::to_string),
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}
