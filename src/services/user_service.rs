use chrono::{DateTime, FixedOffset};
use sea_orm::{Order, Set};
use serde::Serialize;

use crate::{
    auth::{Role, password::hash_password},
    db::{
        dao::{DaoBase, NewUser, UserDao, UserFilter},
        entities::user,
    },
    error::AppError,
    response::PageMeta,
    services::file_service::{FileStore, FileView, UploadedFile},
};

const PROFILE_IMAGE_MODULE: &str = "users";

/// Account as exposed over the API; never carries the password hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserView {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub is_active: bool,
    pub role: Role,
    pub created_at: DateTime<FixedOffset>,
    pub updated_at: DateTime<FixedOffset>,
    pub profile_image: Option<FileView>,
}

impl UserView {
    fn new(user: user::Model, profile_image: Option<FileView>) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            is_active: user.is_active,
            role: user.role,
            created_at: user.created_at,
            updated_at: user.updated_at,
            profile_image,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewAccount {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
}

/// Requested edits. `role` and `is_active` are applied for admins only.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    Id,
    Name,
    Email,
    CreatedAt,
    UpdatedAt,
}

impl SortField {
    fn column(self) -> user::Column {
        match self {
            Self::Id => user::Column::Id,
            Self::Name => user::Column::Name,
            Self::Email => user::Column::Email,
            Self::CreatedAt => user::Column::CreatedAt,
            Self::UpdatedAt => user::Column::UpdatedAt,
        }
    }
}

impl TryFrom<&str> for SortField {
    type Error = ();

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "id" => Ok(Self::Id),
            "name" => Ok(Self::Name),
            "email" => Ok(Self::Email),
            "created_at" => Ok(Self::CreatedAt),
            "updated_at" => Ok(Self::UpdatedAt),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ListUsers {
    pub page: u64,
    pub limit: u64,
    pub sort: SortField,
    pub direction: Order,
    pub search_term: Option<String>,
    /// Raw role filter; an unknown role matches nothing.
    pub role: Option<String>,
    pub email: Option<String>,
    pub is_active: Option<bool>,
}

impl Default for ListUsers {
    fn default() -> Self {
        Self {
            page: 1,
            limit: 10,
            sort: SortField::CreatedAt,
            direction: Order::Desc,
            search_term: None,
            role: None,
            email: None,
            is_active: None,
        }
    }
}

#[derive(Clone)]
pub struct UserService {
    users: UserDao,
    files: FileStore,
}

impl UserService {
    pub fn new(users: UserDao, files: FileStore) -> Self {
        Self { users, files }
    }

    pub async fn view(&self, user: user::Model) -> Result<UserView, AppError> {
        let profile_image = match user.profile_image_id {
            Some(file_id) => self.files.get(file_id).await?.map(FileView::from),
            None => None,
        };
        Ok(UserView::new(user, profile_image))
    }

    /// Non-admins only ever see their own account.
    pub async fn list(
        &self,
        actor: &user::Model,
        options: ListUsers,
    ) -> Result<(Vec<UserView>, PageMeta), AppError> {
        let role = match options.role.as_deref().filter(|role| !role.is_empty()) {
            Some(raw) => match Role::try_from(raw) {
                Ok(role) => Some(role),
                Err(()) => {
                    let meta = PageMeta::new(options.page, options.limit, 0, 0);
                    return Ok((Vec::new(), meta));
                }
            },
            None => None,
        };

        let filter = UserFilter {
            only_id: (!actor.role.is_admin()).then_some(actor.id),
            search_term: options.search_term,
            role,
            email: options.email,
            is_active: options.is_active,
        };
        let page = self
            .users
            .list(
                &filter,
                options.page,
                options.limit,
                (options.sort.column(), options.direction),
            )
            .await?;

        let mut views = Vec::with_capacity(page.data.len());
        for user in page.data {
            views.push(self.view(user).await?);
        }
        let meta = PageMeta::new(page.page, page.limit, views.len() as u64, page.total);
        Ok((views, meta))
    }

    pub async fn get(&self, actor: &user::Model, id: i32) -> Result<UserView, AppError> {
        ensure_admin_or_self(actor, id, "You are not authorized to access this user")?;
        let user = self.users.find_by_id(id).await?;
        self.view(user).await
    }

    pub async fn create(
        &self,
        actor: &user::Model,
        account: NewAccount,
    ) -> Result<UserView, AppError> {
        if !actor.role.is_admin() {
            return Err(AppError::forbidden("Only administrators can create users"));
        }
        if self.users.find_by_email(&account.email).await?.is_some() {
            return Err(AppError::conflict("Email already registered"));
        }

        let password_hash = hash_password(&account.password)?;
        let created = self
            .users
            .create_user(NewUser {
                name: normalize_name(&account.name),
                email: account.email,
                password_hash,
                role: account.role,
                created_by: Some(actor.id),
            })
            .await?;
        tracing::info!(user_id = created.id, created_by = actor.id, "user created");
        self.view(created).await
    }

    pub async fn update(
        &self,
        actor: &user::Model,
        id: i32,
        changes: UserChanges,
    ) -> Result<UserView, AppError> {
        ensure_admin_or_self(actor, id, "You are not authorized to update this user")?;

        if let Some(email) = changes.email.as_deref() {
            if self
                .users
                .find_email_owner_other_than(email, id)
                .await?
                .is_some()
            {
                return Err(AppError::conflict("Email already taken"));
            }
        }

        let is_admin = actor.role.is_admin();
        let actor_id = actor.id;
        let updated = self
            .users
            .update(id, move |active| {
                if let Some(name) = changes.name {
                    active.name = Set(normalize_name(&name));
                }
                if let Some(email) = changes.email {
                    active.email = Set(email);
                }
                if is_admin {
                    if let Some(role) = changes.role {
                        active.role = Set(role);
                    }
                    if let Some(is_active) = changes.is_active {
                        active.is_active = Set(is_active);
                    }
                }
                active.updated_by = Set(Some(actor_id));
            })
            .await?;
        self.view(updated).await
    }

    /// Deletes the account (its refresh tokens cascade) and its profile image.
    pub async fn delete(&self, actor: &user::Model, id: i32) -> Result<(), AppError> {
        if !actor.role.is_admin() {
            return Err(AppError::forbidden("Only administrators can delete users"));
        }
        if actor.id == id {
            return Err(AppError::bad_request("You cannot delete your own account"));
        }

        let user = self.users.find_by_id(id).await?;
        self.users.delete(id).await?;
        tracing::info!(user_id = id, deleted_by = actor.id, "user deleted");

        if let Some(file_id) = user.profile_image_id {
            self.discard_image(file_id).await;
        }
        Ok(())
    }

    /// Stores `upload` as the account's profile image and drops the previous one.
    pub async fn set_profile_image(
        &self,
        actor: &user::Model,
        id: i32,
        upload: UploadedFile,
    ) -> Result<UserView, AppError> {
        ensure_admin_or_self(actor, id, "You are not authorized to update this user")?;

        let user = self.users.find_by_id(id).await?;
        let previous = user.profile_image_id;

        let stored = self.files.save(PROFILE_IMAGE_MODULE, upload).await?;
        let actor_id = actor.id;
        let stored_id = stored.id;
        let updated = match self
            .users
            .update(id, move |active| {
                active.profile_image_id = Set(Some(stored_id));
                active.updated_by = Set(Some(actor_id));
            })
            .await
        {
            Ok(updated) => updated,
            Err(err) => {
                // nothing references the new upload yet
                if let Err(cleanup) = self.files.delete(&stored).await {
                    tracing::warn!(file_id = stored_id, "failed to remove unused upload: {cleanup}");
                }
                return Err(err.into());
            }
        };

        if let Some(file_id) = previous {
            self.discard_image(file_id).await;
        }
        Ok(UserView::new(updated, Some(FileView::from(stored))))
    }

    async fn discard_image(&self, file_id: i32) {
        let result = match self.files.get(file_id).await {
            Ok(Some(record)) => self.files.delete(&record).await,
            Ok(None) => Ok(()),
            Err(err) => Err(err),
        };
        if let Err(err) = result {
            tracing::warn!(file_id, "failed to remove profile image: {err}");
        }
    }
}

fn ensure_admin_or_self(actor: &user::Model, id: i32, message: &str) -> Result<(), AppError> {
    if actor.role.is_admin() || actor.id == id {
        Ok(())
    } else {
        Err(AppError::forbidden(message))
    }
}

/// Trims, collapses inner whitespace and capitalises each word.
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use std::{path::Path, sync::Arc};

    use sea_orm::{DatabaseBackend, DatabaseConnection, DbErr, MockDatabase, MockExecResult, Order};

    use super::{ListUsers, NewAccount, SortField, UserChanges, UserService, normalize_name};
    use crate::{
        auth::{Role, jwt::TokenCodec},
        db::entities::{file, user},
        error::AppError,
        services::{ServiceContext, file_service::UploadedFile},
        test_helpers::{
            RecordingMailer, auth_config, count_row, file_model, test_services, user_model,
        },
    };

    fn admin() -> user::Model {
        user::Model {
            name: "System Admin".to_string(),
            ..user_model(1, "admin@example.com", "hash", Role::Admin)
        }
    }

    fn member(id: i32) -> user::Model {
        user_model(id, &format!("user{id}@example.com"), "hash", Role::User)
    }

    fn exec(rows_affected: u64) -> MockExecResult {
        MockExecResult {
            last_insert_id: 0,
            rows_affected,
        }
    }

    fn service_with_uploads(db: &DatabaseConnection, upload_dir: &Path) -> UserService {
        let auth = auth_config();
        ServiceContext::new(
            db,
            TokenCodec::from_config(&auth),
            auth,
            Arc::new(RecordingMailer::default()),
            upload_dir,
        )
        .user()
    }

    fn png() -> UploadedFile {
        UploadedFile {
            original_name: "avatar.png".to_string(),
            content_type: Some("image/png".to_string()),
            bytes: vec![0x89, b'P', b'N', b'G'],
        }
    }

    /// A stored file record whose path points at a real file under `dir`.
    fn file_on_disk(id: i32, dir: &Path) -> file::Model {
        let path = dir.join(format!("existing-{id}.png"));
        std::fs::write(&path, b"old").expect("fixture file should be written");
        file_model(id, &path.to_string_lossy())
    }

    /// SET clause of the first UPDATE in the log.
    fn update_set_clause(db: DatabaseConnection) -> String {
        db.into_transaction_log()
            .iter()
            .flat_map(|txn| txn.statements().iter())
            .map(|stmt| stmt.sql.clone())
            .find(|sql| sql.starts_with("UPDATE"))
            .and_then(|sql| sql.split(" WHERE ").next().map(str::to_string))
            .expect("an UPDATE should have run")
    }

    #[test]
    fn names_are_title_cased() {
        assert_eq!(normalize_name("  ada   lovelace "), "Ada Lovelace");
        assert_eq!(normalize_name("GRACE hopper"), "Grace Hopper");
    }

    #[test]
    fn sort_fields_are_whitelisted() {
        assert_eq!(SortField::try_from("created_at"), Ok(SortField::CreatedAt));
        assert!(SortField::try_from("password_hash").is_err());
    }

    #[tokio::test]
    async fn list_builds_page_meta() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[count_row(3)]])
            .append_query_results([[member(2), member(3)]])
            .into_connection();
        let service = test_services(db).user();

        let (users, meta) = service
            .list(
                &admin(),
                ListUsers {
                    page: 1,
                    limit: 2,
                    sort: SortField::Id,
                    direction: Order::Asc,
                    ..ListUsers::default()
                },
            )
            .await
            .expect("list should succeed");

        assert_eq!(users.len(), 2);
        assert_eq!(meta.total, 3);
        assert_eq!(meta.count, 2);
        assert_eq!(meta.total_pages, 2);
    }

    #[tokio::test]
    async fn unknown_role_filter_yields_empty_page_without_query() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let service = test_services(db).user();

        let (users, meta) = service
            .list(
                &admin(),
                ListUsers {
                    role: Some("superuser".to_string()),
                    ..ListUsers::default()
                },
            )
            .await
            .expect("list should succeed");

        assert!(users.is_empty());
        assert_eq!(meta.total, 0);
    }

    #[tokio::test]
    async fn members_cannot_read_other_accounts() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let service = test_services(db).user();

        let err = service.get(&member(2), 3).await.expect_err("read should fail");
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn get_reports_missing_user() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<user::Model>::new()])
            .into_connection();
        let service = test_services(db).user();

        let err = service.get(&admin(), 42).await.expect_err("read should fail");
        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(err.message(), "User not found");
    }

    #[tokio::test]
    async fn create_rejects_duplicate_email() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[member(2)]])
            .into_connection();
        let service = test_services(db).user();

        let err = service
            .create(
                &admin(),
                NewAccount {
                    name: "Someone".to_string(),
                    email: "user2@example.com".to_string(),
                    password: "Secret1!".to_string(),
                    role: Role::User,
                },
            )
            .await
            .expect_err("create should fail");
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(err.message(), "Email already registered");
    }

    #[tokio::test]
    async fn create_returns_view_without_hash() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<user::Model>::new()])
            .append_query_results([[member(5)]])
            .into_connection();
        let service = test_services(db).user();

        let view = service
            .create(
                &admin(),
                NewAccount {
                    name: "new member".to_string(),
                    email: "user5@example.com".to_string(),
                    password: "Secret1!".to_string(),
                    role: Role::User,
                },
            )
            .await
            .expect("create should succeed");

        assert_eq!(view.id, 5);
        let body = serde_json::to_value(&view).expect("view should serialize");
        assert!(body.get("password_hash").is_none());
        assert_eq!(body["role"], "user");
    }

    #[tokio::test]
    async fn update_rejects_email_owned_by_someone_else() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[member(3)]])
            .into_connection();
        let service = test_services(db).user();

        let err = service
            .update(
                &member(2),
                2,
                UserChanges {
                    email: Some("user3@example.com".to_string()),
                    ..UserChanges::default()
                },
            )
            .await
            .expect_err("update should fail");
        assert_eq!(err.message(), "Email already taken");
    }

    #[tokio::test]
    async fn members_cannot_update_others() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let service = test_services(db).user();

        let err = service
            .update(&member(2), 3, UserChanges::default())
            .await
            .expect_err("update should fail");
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn update_applies_changes() {
        let renamed = user::Model {
            name: "Renamed Person".to_string(),
            ..member(2)
        };
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[member(2)]])
            .append_query_results([[renamed]])
            .into_connection();
        let service = test_services(db).user();

        let view = service
            .update(
                &member(2),
                2,
                UserChanges {
                    name: Some("renamed person".to_string()),
                    ..UserChanges::default()
                },
            )
            .await
            .expect("update should succeed");
        assert_eq!(view.name, "Renamed Person");
    }

    #[tokio::test]
    async fn admin_cannot_delete_self() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let service = test_services(db).user();

        let err = service.delete(&admin(), 1).await.expect_err("delete should fail");
        assert_eq!(err.message(), "You cannot delete your own account");
    }

    #[tokio::test]
    async fn delete_removes_existing_user() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[member(4)]])
            .append_exec_results([exec(1)])
            .into_connection();
        let service = test_services(db).user();

        service.delete(&admin(), 4).await.expect("delete should succeed");
    }

    #[tokio::test]
    async fn self_service_update_ignores_role_and_activation() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[member(2)]])
            .append_query_results([[member(2)]])
            .into_connection();
        let service = test_services(db.clone()).user();

        let view = service
            .update(
                &member(2),
                2,
                UserChanges {
                    name: Some("still member".to_string()),
                    role: Some(Role::Admin),
                    is_active: Some(false),
                    ..UserChanges::default()
                },
            )
            .await
            .expect("update should succeed");
        assert_eq!(view.role, Role::User);

        let set = update_set_clause(db);
        assert!(set.contains(r#""name""#), "unexpected statement: {set}");
        assert!(!set.contains(r#""role""#), "unexpected statement: {set}");
        assert!(!set.contains(r#""is_active""#), "unexpected statement: {set}");
    }

    #[tokio::test]
    async fn admin_update_can_change_role_and_activation() {
        let promoted = user::Model {
            role: Role::Admin,
            is_active: false,
            ..member(2)
        };
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[member(2)]])
            .append_query_results([[promoted]])
            .into_connection();
        let service = test_services(db.clone()).user();

        let view = service
            .update(
                &admin(),
                2,
                UserChanges {
                    role: Some(Role::Admin),
                    is_active: Some(false),
                    ..UserChanges::default()
                },
            )
            .await
            .expect("update should succeed");
        assert_eq!(view.role, Role::Admin);

        let set = update_set_clause(db);
        assert!(set.contains(r#""role""#), "unexpected statement: {set}");
        assert!(set.contains(r#""is_active""#), "unexpected statement: {set}");
    }

    #[tokio::test]
    async fn replacing_profile_image_removes_the_previous_file() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let previous = file_on_disk(7, dir.path());
        let owner = user::Model {
            profile_image_id: Some(7),
            ..member(2)
        };
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[owner.clone()]])
            .append_query_results([[file_model(8, "users/new.png")]])
            .append_query_results([[owner.clone()]])
            .append_query_results([[user::Model {
                profile_image_id: Some(8),
                ..owner
            }]])
            .append_query_results([[previous.clone()]])
            .append_exec_results([exec(1)])
            .into_connection();
        let service = service_with_uploads(&db, dir.path());

        let view = service
            .set_profile_image(&member(2), 2, png())
            .await
            .expect("upload should succeed");

        assert_eq!(view.profile_image.map(|image| image.id), Some(8));
        assert!(!Path::new(&previous.path).exists());
        let uploads = std::fs::read_dir(dir.path().join("users"))
            .expect("module dir should exist")
            .count();
        assert_eq!(uploads, 1);
    }

    #[tokio::test]
    async fn members_cannot_set_another_accounts_image() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let service = service_with_uploads(&db, dir.path());

        let err = service
            .set_profile_image(&member(2), 3, png())
            .await
            .expect_err("upload should fail");
        assert!(matches!(err, AppError::Forbidden(_)));
        assert!(!dir.path().join("users").exists());
    }

    #[tokio::test]
    async fn failed_account_update_discards_the_new_upload() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let stored = file_on_disk(8, dir.path());
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[member(2)]])
            .append_query_results([[stored.clone()]])
            .append_query_errors([DbErr::Custom("connection lost".to_string())])
            .append_exec_results([exec(1)])
            .into_connection();
        let service = service_with_uploads(&db, dir.path());

        let err = service
            .set_profile_image(&member(2), 2, png())
            .await
            .expect_err("upload should fail");
        assert!(matches!(err, AppError::Internal(_)));
        assert!(!Path::new(&stored.path).exists());

        let last = db
            .into_transaction_log()
            .last()
            .and_then(|txn| txn.statements().first().map(|stmt| stmt.sql.clone()))
            .expect("statements should be logged");
        assert!(last.starts_with(r#"DELETE FROM "files""#), "unexpected statement: {last}");
    }
}
