use std::any::Any;

use axum::response::{IntoResponse, Response};
use tower_http::catch_panic::CatchPanicLayer;

use crate::{error::AppError, response::JsonApiResponse};

pub fn catch_panic_layer() -> CatchPanicLayer<fn(Box<dyn Any + Send + 'static>) -> Response> {
    CatchPanicLayer::custom(panic_to_json)
}

// the panic hook has already logged payload and location
fn panic_to_json(_panic: Box<dyn Any + Send + 'static>) -> Response {
    JsonApiResponse::from_error(&AppError::internal("handler panicked")).into_response()
}
