use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use serde::Serialize;
use uuid::Uuid;

use crate::{
    db::{
        dao::{DaoBase, DaoLayerError, FileDao, NewFile},
        entities::file,
    },
    error::AppError,
};

/// An upload as received from a multipart form.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub original_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Public metadata of a stored file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileView {
    pub id: i32,
    pub path: String,
    #[serde(rename = "type")]
    pub content_type: Option<String>,
    pub original_name: String,
    pub modified_name: String,
}

impl From<file::Model> for FileView {
    fn from(model: file::Model) -> Self {
        Self {
            id: model.id,
            path: model.path,
            content_type: model.content_type,
            original_name: model.original_name,
            modified_name: model.modified_name,
        }
    }
}

/// Files live at `<root>/<module>/<uuid><ext>`; a row in `files` tracks each one.
#[derive(Clone)]
pub struct FileStore {
    files: FileDao,
    root: PathBuf,
}

impl FileStore {
    pub fn new(files: FileDao, root: impl Into<PathBuf>) -> Self {
        Self {
            files,
            root: root.into(),
        }
    }

    pub async fn save(&self, module: &str, upload: UploadedFile) -> Result<file::Model, AppError> {
        let modified_name = format!("{}{}", Uuid::new_v4(), extension_of(&upload.original_name));
        let dir = self.root.join(module);
        let path = dir.join(&modified_name);

        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|err| AppError::internal(format!("create {}: {err}", dir.display())))?;
        tokio::fs::write(&path, &upload.bytes)
            .await
            .map_err(|err| AppError::internal(format!("write {}: {err}", path.display())))?;

        let record = self
            .files
            .create_file(NewFile {
                path: path.to_string_lossy().into_owned(),
                content_type: upload.content_type,
                original_name: upload.original_name,
                modified_name,
            })
            .await;

        match record {
            Ok(record) => {
                tracing::debug!(file_id = record.id, module, "file stored");
                Ok(record)
            }
            Err(err) => {
                remove_quietly(&path).await;
                Err(err.into())
            }
        }
    }

    pub async fn get(&self, id: i32) -> Result<Option<file::Model>, AppError> {
        match self.files.find_by_id(id).await {
            Ok(record) => Ok(Some(record)),
            Err(DaoLayerError::NotFound { .. }) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Removes the file from disk, then its row. A file already gone from disk is fine.
    pub async fn delete(&self, record: &file::Model) -> Result<(), AppError> {
        match tokio::fs::remove_file(&record.path).await {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => {
                return Err(AppError::internal(format!("remove {}: {err}", record.path)));
            }
        }
        match self.files.delete(record.id).await {
            Ok(_) | Err(DaoLayerError::NotFound { .. }) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

/// `.ext` of the upload's name, restricted to ASCII alphanumerics.
fn extension_of(original_name: &str) -> String {
    Path::new(original_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
        .unwrap_or_default()
}

async fn remove_quietly(path: &Path) {
    if let Err(err) = tokio::fs::remove_file(path).await {
        tracing::warn!(path = %path.display(), "failed to clean up orphaned upload: {err}");
    }
}

#[cfg(test)]
mod tests {
    use sea_orm::{DatabaseBackend, DbErr, MockDatabase, MockExecResult};

    use super::{FileStore, UploadedFile, extension_of};
    use crate::{
        db::dao::{DaoBase, FileDao},
        test_helpers::file_model,
    };

    fn upload(name: &str) -> UploadedFile {
        UploadedFile {
            original_name: name.to_string(),
            content_type: Some("image/png".to_string()),
            bytes: vec![0x89, b'P', b'N', b'G'],
        }
    }

    #[test]
    fn extension_keeps_only_safe_suffixes() {
        assert_eq!(extension_of("avatar.PNG"), ".png");
        assert_eq!(extension_of("archive.tar.gz"), ".gz");
        assert_eq!(extension_of("no-extension"), "");
        assert_eq!(extension_of("weird.p/ng"), "");
    }

    #[tokio::test]
    async fn save_writes_under_module_directory() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[file_model(4, "stored-path")]])
            .into_connection();
        let store = FileStore::new(FileDao::new(&db), dir.path());

        let record = store
            .save("users", upload("avatar.png"))
            .await
            .expect("save should succeed");
        assert_eq!(record.id, 4);

        let mut entries = std::fs::read_dir(dir.path().join("users"))
            .expect("module dir should exist")
            .map(|entry| entry.expect("entry should be readable").path())
            .collect::<Vec<_>>();
        assert_eq!(entries.len(), 1);
        let written = entries.remove(0);
        assert_eq!(
            written.extension().and_then(|ext| ext.to_str()),
            Some("png")
        );
        assert_eq!(
            std::fs::read(&written).expect("file should be readable"),
            vec![0x89, b'P', b'N', b'G']
        );
    }

    #[tokio::test]
    async fn failed_insert_removes_written_file() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_errors([DbErr::Custom("insert failed".to_string())])
            .into_connection();
        let store = FileStore::new(FileDao::new(&db), dir.path());

        store
            .save("users", upload("avatar.png"))
            .await
            .expect_err("save should fail");

        let remaining = std::fs::read_dir(dir.path().join("users"))
            .expect("module dir should exist")
            .count();
        assert_eq!(remaining, 0);
    }

    #[tokio::test]
    async fn delete_tolerates_missing_disk_file() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let missing = dir.path().join("users").join("gone.png");
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .into_connection();
        let store = FileStore::new(FileDao::new(&db), dir.path());

        store
            .delete(&file_model(9, &missing.to_string_lossy()))
            .await
            .expect("delete should succeed");
    }

    #[tokio::test]
    async fn delete_removes_disk_file() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let path = dir.path().join("avatar.png");
        std::fs::write(&path, b"png").expect("fixture should be written");
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .into_connection();
        let store = FileStore::new(FileDao::new(&db), dir.path());

        store
            .delete(&file_model(9, &path.to_string_lossy()))
            .await
            .expect("delete should succeed");
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn get_maps_missing_row_to_none() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<crate::db::entities::file::Model>::new()])
            .into_connection();
        let store = FileStore::new(FileDao::new(&db), "uploads");

        assert!(store.get(3).await.expect("query should succeed").is_none());
    }
}
