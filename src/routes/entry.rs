use std::sync::Arc;

use axum::{Router, middleware};
use tower_http::trace::TraceLayer;

use crate::{
    middleware::{catch_panic_layer, json_error_middleware},
    state::AppState,
};

use super::api;

pub const API_PREFIX: &str = "/api/v1";

/// Full application: liveness routes, the versioned API and the shared error layers.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(api::public::router())
        .nest(API_PREFIX, api::router())
        .with_state(state)
        .layer(middleware::from_fn(json_error_middleware))
        .layer(catch_panic_layer())
        .layer(TraceLayer::new_for_http())
}
