use std::sync::Arc;

use axum::{Router, extract::State, routing::post};
use serde::Serialize;

use crate::{
    middleware::AdminUser,
    response::{ApiResult, JsonApiResponse},
    services::ServiceContext,
    state::AppState,
};

#[derive(Debug, Serialize)]
pub struct PurgeResponse {
    pub purged: u64,
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route(
        "/maintenance/purge-expired-tokens",
        post(purge_expired_tokens),
    )
}

async fn purge_expired_tokens(
    State(state): State<Arc<AppState>>,
    AdminUser { user, .. }: AdminUser,
) -> ApiResult<PurgeResponse> {
    tracing::info!(admin_id = user.id, "token purge requested");
    let purged = ServiceContext::from_state(&state)
        .auth()
        .purge_expired_tokens()
        .await?;
    JsonApiResponse::ok("Expired refresh tokens purged", PurgeResponse { purged })
}
