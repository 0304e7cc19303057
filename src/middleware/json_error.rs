use axum::{
    body::{Bytes, to_bytes},
    extract::Request,
    http::{HeaderMap, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::{
    error::{AppError, FieldError},
    response::{JsonApiResponse, log_app_error},
};

const MAX_ERROR_BODY_BYTES: usize = 16 * 1024;

/// Rewrites plain-text error bodies (extractor rejections, unknown routes, 405s) into
/// the JSON envelope, tagging the entry with the request path.
pub async fn json_error_middleware(req: Request, next: Next) -> Response {
    let path = req.uri().path().to_string();
    let response = next.run(req).await;

    let status = response.status();
    if !status.is_client_error() && !status.is_server_error() {
        return response;
    }
    if is_json_response(response.headers()) {
        return response;
    }

    let (parts, body) = response.into_parts();
    let message = match status {
        StatusCode::NOT_FOUND => "API not found".to_string(),
        _ => match to_bytes(body, MAX_ERROR_BODY_BYTES).await {
            Ok(bytes) => body_message(status, bytes),
            Err(_) => default_message(status),
        },
    };

    let app_error = app_error_from_status(status, message, &path);
    if status.is_server_error() {
        log_app_error(&app_error, status);
    }

    let mut envelope = JsonApiResponse::from_error_at(&app_error, &path);
    envelope.status_code = status.as_u16();
    let mut wrapped = envelope.into_response();
    copy_headers(&parts.headers, &mut wrapped);
    wrapped
}

fn is_json_response(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| {
            let value = value.to_ascii_lowercase();
            value.contains("application/json") || value.contains("+json")
        })
        .unwrap_or(false)
}

fn body_message(status: StatusCode, bytes: Bytes) -> String {
    let message = String::from_utf8_lossy(&bytes).trim().to_string();
    if message.is_empty() {
        return default_message(status);
    }
    message
}

fn default_message(status: StatusCode) -> String {
    status
        .canonical_reason()
        .unwrap_or("Request failed")
        .to_string()
}

fn app_error_from_status(status: StatusCode, message: String, path: &str) -> AppError {
    match status {
        StatusCode::UNAUTHORIZED => AppError::unauthorized(message),
        StatusCode::FORBIDDEN => AppError::forbidden(message),
        StatusCode::NOT_FOUND => AppError::not_found(message),
        StatusCode::UNPROCESSABLE_ENTITY => {
            AppError::validation(vec![FieldError::new(path, message)])
        }
        _ if status.is_client_error() => AppError::bad_request(message),
        _ => AppError::internal(message),
    }
}

fn copy_headers(src: &HeaderMap, dest: &mut Response) {
    for (name, value) in src {
        if name == header::CONTENT_TYPE || name == header::CONTENT_LENGTH {
            continue;
        }
        dest.headers_mut().append(name.clone(), value.clone());
    }
}

#[cfg(test)]
mod tests {
    use axum::{
        Router,
        body::{self, Body},
        http::{Request, StatusCode, header},
        middleware,
        routing::get,
    };
    use serde_json::Value;
    use tower::ServiceExt;

    use super::json_error_middleware;

    fn app() -> Router {
        Router::new()
            .route("/teapot", get(|| async { (StatusCode::BAD_REQUEST, "bad input") }))
            .layer(middleware::from_fn(json_error_middleware))
    }

    async fn send(uri: &str) -> (StatusCode, Value) {
        let res = app()
            .oneshot(
                Request::builder()
                    .uri(uri)
                    .body(Body::empty())
                    .expect("request should build"),
            )
            .await
            .expect("request should complete");
        let status = res.status();
        assert_eq!(
            res.headers()
                .get(header::CONTENT_TYPE)
                .and_then(|value| value.to_str().ok()),
            Some("application/json")
        );
        let bytes = body::to_bytes(res.into_body(), usize::MAX)
            .await
            .expect("body should read");
        (
            status,
            serde_json::from_slice(&bytes).expect("body should be json"),
        )
    }

    #[tokio::test]
    async fn unknown_route_becomes_api_not_found() {
        let (status, body) = send("/nope").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "API not found");
        assert_eq!(body["errorMessages"][0]["path"], "/nope");
    }

    #[tokio::test]
    async fn text_errors_keep_their_message() {
        let (status, body) = send("/teapot").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["statusCode"], 400);
        assert_eq!(body["message"], "bad input");
    }
}
