use std::sync::Arc;

use axum::{Router, routing::get};
use serde::Serialize;

use crate::{
    response::{ApiResult, JsonApiResponse},
    state::AppState,
};

#[derive(Debug, Serialize)]
pub struct Liveness {
    pub name: &'static str,
    pub version: &'static str,
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
}

async fn root() -> ApiResult<Liveness> {
    JsonApiResponse::ok("Server is running", liveness())
}

async fn health() -> ApiResult<Liveness> {
    JsonApiResponse::ok("OK", liveness())
}

fn liveness() -> Liveness {
    Liveness {
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
    }
}
