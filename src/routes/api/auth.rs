use std::sync::Arc;

use axum::{
    Router,
    extract::State,
    routing::{get, post, put},
};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{
    rules::strong_password,
    session::{ClientInfo, clear_refresh_cookie, refresh_cookie, set_refresh_cookie},
};
use crate::{
    auth::Role,
    error::AppError,
    middleware::{CurrentUser, ValidatedJson},
    response::JsonApiResponse,
    services::{ServiceContext, auth_service::SessionUser, user_service::UserView},
    state::AppState,
};

type CookieResult<T> = Result<(CookieJar, JsonApiResponse<T>), (CookieJar, AppError)>;

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ChangePasswordRequest {
    /// Defaults to the caller.
    pub user_id: Option<i32>,
    #[validate(length(min = 1, message = "Current password is required"))]
    pub current_password: String,
    #[validate(
        length(min = 8, max = 128, message = "Password must be between 8 and 128 characters"),
        custom(function = "strong_password")
    )]
    pub new_password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ForgetPasswordRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ResetPasswordRequest {
    #[validate(length(min = 1, message = "Token is required"))]
    pub token: String,
    #[validate(
        length(min = 8, max = 128, message = "Password must be between 8 and 128 characters"),
        custom(function = "strong_password")
    )]
    pub new_password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub user: SessionUser,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub access_token: String,
    pub role: Role,
}

#[derive(Debug, Serialize)]
pub struct LogoutAllResponse {
    pub revoked: u64,
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/logout-all", post(logout_all))
        .route("/refresh", post(refresh))
        .route("/change-password", put(change_password))
        .route("/forget-password", post(forget_password))
        .route("/reset-password", post(reset_password))
        .route("/user", get(current_user))
}

async fn login(
    State(state): State<Arc<AppState>>,
    ClientInfo(client): ClientInfo,
    jar: CookieJar,
    ValidatedJson(body): ValidatedJson<LoginRequest>,
) -> Result<(CookieJar, JsonApiResponse<LoginResponse>), AppError> {
    let service = ServiceContext::from_state(&state).auth();
    let outcome = service.login(&body.email, &body.password, client).await?;

    let jar = set_refresh_cookie(
        jar,
        outcome.refresh_token,
        service.refresh_ttl(),
        state.auth.cookie_secure,
    );
    let body = JsonApiResponse::ok(
        "Login successful",
        LoginResponse {
            access_token: outcome.access_token,
            user: outcome.user,
        },
    )?;
    Ok((jar, body))
}

async fn logout(State(state): State<Arc<AppState>>, jar: CookieJar) -> CookieResult<()> {
    let token = refresh_cookie(&jar).map_err(|err| (jar.clone(), err))?;
    let jar = clear_refresh_cookie(jar);

    match ServiceContext::from_state(&state).auth().logout(&token).await {
        Ok(()) => Ok((jar, JsonApiResponse::message("Logout successful"))),
        Err(err) => Err((jar, err)),
    }
}

async fn logout_all(
    State(state): State<Arc<AppState>>,
    CurrentUser { user, .. }: CurrentUser,
    jar: CookieJar,
) -> Result<(CookieJar, JsonApiResponse<LogoutAllResponse>), AppError> {
    let revoked = ServiceContext::from_state(&state)
        .auth()
        .logout_all(user.id)
        .await?;
    let body = JsonApiResponse::ok(
        "Logged out from all sessions",
        LogoutAllResponse { revoked },
    )?;
    Ok((clear_refresh_cookie(jar), body))
}

async fn refresh(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> CookieResult<RefreshResponse> {
    let token = refresh_cookie(&jar).map_err(|err| (jar.clone(), err))?;
    let service = ServiceContext::from_state(&state).auth();

    let outcome = match service.refresh(&token).await {
        Ok(outcome) => outcome,
        Err(err) => return Err((clear_refresh_cookie(jar), err)),
    };

    let jar = set_refresh_cookie(
        jar,
        outcome.refresh_token,
        service.refresh_ttl(),
        state.auth.cookie_secure,
    );
    let body = JsonApiResponse::ok(
        "Access token updated successfully",
        RefreshResponse {
            access_token: outcome.access_token,
            role: outcome.role,
        },
    )
    .map_err(|err| (jar.clone(), err))?;
    Ok((jar, body))
}

async fn change_password(
    State(state): State<Arc<AppState>>,
    CurrentUser { user, .. }: CurrentUser,
    ValidatedJson(body): ValidatedJson<ChangePasswordRequest>,
) -> Result<JsonApiResponse<()>, AppError> {
    let target = body.user_id.unwrap_or(user.id);
    ServiceContext::from_state(&state)
        .auth()
        .change_password(&user, target, &body.current_password, &body.new_password)
        .await?;
    Ok(JsonApiResponse::message("Password changed successfully"))
}

/// Answers the same way whether or not the address belongs to an account.
async fn forget_password(
    State(state): State<Arc<AppState>>,
    ValidatedJson(body): ValidatedJson<ForgetPasswordRequest>,
) -> Result<JsonApiResponse<()>, AppError> {
    ServiceContext::from_state(&state)
        .auth()
        .forget_password(&body.email)
        .await?;
    Ok(JsonApiResponse::message(
        "Password reset email sent successfully",
    ))
}

async fn reset_password(
    State(state): State<Arc<AppState>>,
    ValidatedJson(body): ValidatedJson<ResetPasswordRequest>,
) -> Result<JsonApiResponse<()>, AppError> {
    ServiceContext::from_state(&state)
        .auth()
        .reset_password(&body.token, &body.new_password)
        .await?;
    Ok(JsonApiResponse::message("Password reset successfully"))
}

async fn current_user(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> CookieResult<UserView> {
    let token = refresh_cookie(&jar).map_err(|err| (jar.clone(), err))?;
    let services = ServiceContext::from_state(&state);

    let user = match services.auth().current_user(&token).await {
        Ok(user) => user,
        Err(err) => return Err((clear_refresh_cookie(jar), err)),
    };
    match services
        .user()
        .view(user)
        .await
        .and_then(|view| JsonApiResponse::ok("User fetched successfully", view))
    {
        Ok(body) => Ok((jar, body)),
        Err(err) => Err((jar, err)),
    }
}
