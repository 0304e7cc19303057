use std::sync::Arc;

use axum::{
    Router,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    routing::{get, put},
};
use sea_orm::Order;
use serde::Deserialize;
use validator::Validate;

use super::rules::{person_name, strong_password};
use crate::{
    auth::Role,
    error::{AppError, FieldError},
    middleware::{AdminUser, CurrentUser, ValidatedJson},
    response::{ApiResult, JsonApiResponse},
    services::{
        ServiceContext,
        file_service::UploadedFile,
        user_service::{ListUsers, NewAccount, SortField, UserChanges, UserView},
    },
    state::AppState,
};

const PROFILE_IMAGE_FIELD: &str = "profile_image";

#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(
        length(min = 2, max = 50, message = "Name must be between 2 and 50 characters"),
        custom(function = "person_name")
    )]
    pub name: String,
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(
        length(min = 8, max = 128, message = "Password must be between 8 and 128 characters"),
        custom(function = "strong_password")
    )]
    pub password: String,
    pub role: Option<Role>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateUserRequest {
    #[validate(
        length(min = 2, max = 50, message = "Name must be between 2 and 50 characters"),
        custom(function = "person_name")
    )]
    pub name: Option<String>,
    #[validate(email(message = "Invalid email address"))]
    pub email: Option<String>,
    pub role: Option<Role>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct ListUsersQuery {
    #[validate(range(min = 1, message = "Page must be at least 1"))]
    pub page: Option<u64>,
    #[validate(range(min = 1, max = 100, message = "Limit must be between 1 and 100"))]
    pub limit: Option<u64>,
    pub order_by: Option<String>,
    pub order_direction: Option<String>,
    pub search_term: Option<String>,
    pub role: Option<String>,
    pub email: Option<String>,
    pub is_active: Option<bool>,
}

impl TryFrom<ListUsersQuery> for ListUsers {
    type Error = AppError;

    fn try_from(query: ListUsersQuery) -> Result<Self, Self::Error> {
        query.validate()?;
        let defaults = ListUsers::default();

        let sort = match query.order_by.as_deref() {
            None => defaults.sort,
            Some(raw) => SortField::try_from(raw).map_err(|()| {
                invalid_query(
                    "order_by",
                    "order_by must be one of id, name, email, created_at, updated_at",
                )
            })?,
        };
        let direction = match query.order_direction.as_deref() {
            None => defaults.direction,
            Some(raw) if raw.eq_ignore_ascii_case("asc") => Order::Asc,
            Some(raw) if raw.eq_ignore_ascii_case("desc") => Order::Desc,
            Some(_) => {
                return Err(invalid_query(
                    "order_direction",
                    "order_direction must be asc or desc",
                ));
            }
        };

        Ok(Self {
            page: query.page.unwrap_or(defaults.page),
            limit: query.limit.unwrap_or(defaults.limit),
            sort,
            direction,
            search_term: query.search_term.filter(|term| !term.trim().is_empty()),
            role: query.role,
            email: query.email.filter(|email| !email.is_empty()),
            is_active: query.is_active,
        })
    }
}

fn invalid_query(path: &str, message: &str) -> AppError {
    AppError::validation(vec![FieldError::new(path, message)])
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route(
            "/{id}",
            get(get_user).patch(update_user).delete(delete_user),
        )
        .route("/{id}/profile-image", put(upload_profile_image))
}

async fn create_user(
    State(state): State<Arc<AppState>>,
    AdminUser { user: actor, .. }: AdminUser,
    ValidatedJson(body): ValidatedJson<CreateUserRequest>,
) -> ApiResult<UserView> {
    let created = ServiceContext::from_state(&state)
        .user()
        .create(
            &actor,
            NewAccount {
                name: body.name,
                email: body.email,
                password: body.password,
                role: body.role.unwrap_or(Role::User),
            },
        )
        .await?;
    JsonApiResponse::with_status(StatusCode::CREATED, "User created successfully", created)
}

async fn list_users(
    State(state): State<Arc<AppState>>,
    CurrentUser { user: actor, .. }: CurrentUser,
    Query(query): Query<ListUsersQuery>,
) -> ApiResult<Vec<UserView>> {
    let options = ListUsers::try_from(query)?;
    let (users, meta) = ServiceContext::from_state(&state)
        .user()
        .list(&actor, options)
        .await?;
    JsonApiResponse::paginated("Users fetched successfully", users, meta)
}

async fn get_user(
    State(state): State<Arc<AppState>>,
    CurrentUser { user: actor, .. }: CurrentUser,
    Path(id): Path<i32>,
) -> ApiResult<UserView> {
    let user = ServiceContext::from_state(&state)
        .user()
        .get(&actor, id)
        .await?;
    JsonApiResponse::ok("User fetched successfully", user)
}

async fn update_user(
    State(state): State<Arc<AppState>>,
    CurrentUser { user: actor, .. }: CurrentUser,
    Path(id): Path<i32>,
    ValidatedJson(body): ValidatedJson<UpdateUserRequest>,
) -> ApiResult<UserView> {
    let changes = UserChanges {
        name: body.name,
        email: body.email,
        role: body.role,
        is_active: body.is_active,
    };
    let updated = ServiceContext::from_state(&state)
        .user()
        .update(&actor, id, changes)
        .await?;
    JsonApiResponse::ok("User updated successfully", updated)
}

async fn delete_user(
    State(state): State<Arc<AppState>>,
    AdminUser { user: actor, .. }: AdminUser,
    Path(id): Path<i32>,
) -> Result<JsonApiResponse<()>, AppError> {
    ServiceContext::from_state(&state)
        .user()
        .delete(&actor, id)
        .await?;
    Ok(JsonApiResponse::message("User deleted successfully"))
}

async fn upload_profile_image(
    State(state): State<Arc<AppState>>,
    CurrentUser { user: actor, .. }: CurrentUser,
    Path(id): Path<i32>,
    multipart: Multipart,
) -> ApiResult<UserView> {
    let upload = read_profile_image(multipart).await?;
    let updated = ServiceContext::from_state(&state)
        .user()
        .set_profile_image(&actor, id, upload)
        .await?;
    JsonApiResponse::ok("Profile image updated successfully", updated)
}

async fn read_profile_image(mut multipart: Multipart) -> Result<UploadedFile, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::bad_request(err.body_text()))?
    {
        if field.name() != Some(PROFILE_IMAGE_FIELD) {
            continue;
        }
        let original_name = field.file_name().unwrap_or("upload").to_string();
        let content_type = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|err| AppError::bad_request(err.body_text()))?;
        if bytes.is_empty() {
            break;
        }
        return Ok(UploadedFile {
            original_name,
            content_type,
            bytes: bytes.to_vec(),
        });
    }
    Err(invalid_query(PROFILE_IMAGE_FIELD, "Profile image is required"))
}

#[cfg(test)]
mod tests {
    use sea_orm::Order;

    use super::ListUsersQuery;
    use crate::{
        error::AppError,
        services::user_service::{ListUsers, SortField},
    };

    #[test]
    fn query_defaults_match_listing_defaults() {
        let options = ListUsers::try_from(ListUsersQuery::default()).expect("defaults are valid");

        assert_eq!(options.page, 1);
        assert_eq!(options.limit, 10);
        assert_eq!(options.sort, SortField::CreatedAt);
        assert!(matches!(options.direction, Order::Desc));
    }

    #[test]
    fn sort_and_direction_are_whitelisted() {
        let options = ListUsers::try_from(ListUsersQuery {
            order_by: Some("email".to_string()),
            order_direction: Some("ASC".to_string()),
            ..ListUsersQuery::default()
        })
        .expect("query should be accepted");
        assert_eq!(options.sort, SortField::Email);
        assert!(matches!(options.direction, Order::Asc));

        let err = ListUsers::try_from(ListUsersQuery {
            order_by: Some("password_hash".to_string()),
            ..ListUsersQuery::default()
        })
        .expect_err("unknown column should be refused");
        assert_eq!(err.field_errors()[0].path, "order_by");

        let err = ListUsers::try_from(ListUsersQuery {
            order_direction: Some("sideways".to_string()),
            ..ListUsersQuery::default()
        })
        .expect_err("unknown direction should be refused");
        assert_eq!(err.field_errors()[0].path, "order_direction");
    }

    #[test]
    fn limit_is_bounded() {
        for limit in [0, 101] {
            let err = ListUsers::try_from(ListUsersQuery {
                limit: Some(limit),
                ..ListUsersQuery::default()
            })
            .expect_err("limit out of range");
            assert!(matches!(err, AppError::Validation(_)));
        }
    }
}
