use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::error::{AppError, FieldError};

pub type ApiResult<T> = Result<JsonApiResponse<T>, AppError>;

/// Uniform envelope returned by every endpoint, success or failure.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonApiResponse<T: Serialize> {
    pub success: bool,
    pub status_code: u16,
    pub message: String,
    pub data: Option<T>,
    pub meta: Option<PageMeta>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_messages: Option<Vec<FieldError>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub page: u64,
    pub limit: u64,
    pub count: u64,
    pub total: u64,
    pub total_pages: u64,
}

impl PageMeta {
    pub fn new(page: u64, limit: u64, count: u64, total: u64) -> Self {
        let total_pages = if limit == 0 { 0 } else { total.div_ceil(limit) };
        Self {
            page,
            limit,
            count,
            total,
            total_pages,
        }
    }
}

impl<T: Serialize> JsonApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> ApiResult<T> {
        Self::with_status(StatusCode::OK, message, data)
    }

    pub fn with_status(status: StatusCode, message: impl Into<String>, data: T) -> ApiResult<T> {
        Ok(Self {
            success: true,
            status_code: status.as_u16(),
            message: message.into(),
            data: Some(data),
            meta: None,
            error_messages: None,
        })
    }

    pub fn paginated(message: impl Into<String>, data: T, meta: PageMeta) -> ApiResult<T> {
        let mut response = Self::ok(message, data)?;
        response.meta = Some(meta);
        Ok(response)
    }
}

impl JsonApiResponse<()> {
    /// Success envelope without a payload.
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            status_code: StatusCode::OK.as_u16(),
            message: message.into(),
            data: None,
            meta: None,
            error_messages: None,
        }
    }

    pub(crate) fn from_error(err: &AppError) -> Self {
        Self {
            success: false,
            status_code: status_for(err).as_u16(),
            message: err.public_message().to_string(),
            data: None,
            meta: None,
            error_messages: Some(err.field_errors()),
        }
    }

    pub(crate) fn from_error_at(err: &AppError, path: &str) -> Self {
        let mut response = Self::from_error(err);
        if !matches!(err, AppError::Validation(_)) {
            response.error_messages = Some(vec![FieldError::new(path, err.public_message())]);
        }
        response
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = status_for(&self);
        log_app_error(&self, status);
        JsonApiResponse::from_error(&self).into_response()
    }
}

impl<T: Serialize> IntoResponse for JsonApiResponse<T> {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}

pub(crate) fn status_for(err: &AppError) -> StatusCode {
    match err {
        AppError::BadRequest(_) | AppError::Conflict(_) => StatusCode::BAD_REQUEST,
        AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        AppError::Forbidden(_) => StatusCode::FORBIDDEN,
        AppError::NotFound(_) => StatusCode::NOT_FOUND,
        AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub(crate) fn log_app_error(err: &AppError, status: StatusCode) {
    if status.is_server_error() {
        tracing::error!(status = status.as_u16(), error = %err.message(), "request failed");
    } else {
        tracing::debug!(status = status.as_u16(), error = %err.message(), "request rejected");
    }
}

#[cfg(test)]
mod tests {
    use axum::{http::StatusCode, response::IntoResponse};
    use serde_json::json;

    use super::{JsonApiResponse, PageMeta, status_for};
    use crate::error::{AppError, FieldError};

    #[test]
    fn conflict_is_reported_as_bad_request() {
        assert_eq!(
            status_for(&AppError::conflict("Email already registered")),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&AppError::validation(vec![])),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn error_envelope_has_uniform_shape() {
        let body = serde_json::to_value(JsonApiResponse::from_error(&AppError::forbidden(
            "You have no access",
        )))
        .expect("envelope should serialize");

        assert_eq!(
            body,
            json!({
                "success": false,
                "statusCode": 403,
                "message": "You have no access",
                "data": null,
                "meta": null,
                "errorMessages": [{ "path": "", "message": "You have no access" }]
            })
        );
    }

    #[test]
    fn wrapped_errors_carry_request_path() {
        let response =
            JsonApiResponse::from_error_at(&AppError::not_found("API not found"), "/api/v1/nope");

        assert_eq!(
            response.error_messages,
            Some(vec![FieldError::new("/api/v1/nope", "API not found")])
        );
    }

    #[test]
    fn page_meta_rounds_total_pages_up() {
        let meta = PageMeta::new(2, 10, 10, 21);

        assert_eq!(meta.total_pages, 3);
        assert_eq!(PageMeta::new(1, 10, 0, 0).total_pages, 0);
    }

    #[test]
    fn success_status_is_preserved() {
        let response = JsonApiResponse::with_status(StatusCode::CREATED, "User created", 1)
            .expect("response should build")
            .into_response();

        assert_eq!(response.status(), StatusCode::CREATED);
    }
}
