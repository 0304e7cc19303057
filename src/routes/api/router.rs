use std::sync::Arc;

use axum::Router;

use crate::state::AppState;

use super::{admin, auth, users};

/// Everything mounted under the API prefix.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/users", users::router())
        .nest("/admin", admin::router())
}
