//! Object store abstraction
//!
//! Rendered documents are kept in one folder per customer (keyed by vehicle
//! plate) below a configured root folder. [`FileStore`] is the capability a
//! backend provides; [`ObjectStoreUploader`] runs the lookup-or-create and
//! upload sequence on top of it.
//!
//! Lookup-then-create is not atomic. Two concurrent submissions for a new
//! customer key can both miss the lookup and create two folders.

pub mod google_drive;
pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, instrument};

pub use google_drive::GoogleDriveStore;
pub use memory::InMemoryFileStore;

pub const PDF_MIME_TYPE: &str = "application/pdf";

/// Where an uploaded document ended up
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageReference {
    pub folder_id: String,
    pub file_id: String,
    /// Publicly readable link to the file
    pub link: String,
    /// Whether the customer folder was created by this upload
    pub folder_created: bool,
}

/// Step of the upload sequence an error happened in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadStep {
    Authenticate,
    ResolveRoot,
    FindFolder,
    CreateFolder,
    UploadFile,
    ShareFile,
    Timeout,
}

impl fmt::Display for UploadStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UploadStep::Authenticate => "authenticate",
            UploadStep::ResolveRoot => "resolve_root",
            UploadStep::FindFolder => "find_folder",
            UploadStep::CreateFolder => "create_folder",
            UploadStep::UploadFile => "upload_file",
            UploadStep::ShareFile => "share_file",
            UploadStep::Timeout => "timeout",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Upload failed at {step}: {message}")]
pub struct UploadError {
    pub step: UploadStep,
    pub message: String,
}

impl UploadError {
    pub fn new(step: UploadStep, message: impl Into<String>) -> Self {
        Self {
            step,
            message: message.into(),
        }
    }
}

pub type UploadResult<T> = Result<T, UploadError>;

/// How folder searches below the root have to be scoped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FolderScope {
    /// Root lives in the service account's own drive
    MyDrive,
    /// Root lives in a shared drive
    SharedDrive { drive_id: String },
}

/// Storage backend capability
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Check the root folder and report which scope searches below it need
    async fn resolve_root(&self, root_id: &str) -> UploadResult<FolderScope>;

    /// Find a direct child folder of `parent_id` named exactly `name`
    async fn find_folder(
        &self,
        scope: &FolderScope,
        parent_id: &str,
        name: &str,
    ) -> UploadResult<Option<String>>;

    /// Create a folder and return its id
    async fn create_folder(&self, parent_id: &str, name: &str) -> UploadResult<String>;

    /// Store a file and return its id
    async fn upload_file(
        &self,
        folder_id: &str,
        name: &str,
        mime_type: &str,
        content: Vec<u8>,
    ) -> UploadResult<String>;

    /// Grant read access to anyone with the link
    async fn share_publicly(&self, file_id: &str) -> UploadResult<()>;

    /// Shareable link for a file
    fn share_link(&self, file_id: &str) -> String;

    /// Backend name for logs
    fn backend_name(&self) -> &'static str;
}

/// Uploads documents into per-customer folders
#[derive(Clone)]
pub struct ObjectStoreUploader {
    store: Arc<dyn FileStore>,
    root_folder_id: String,
}

impl ObjectStoreUploader {
    pub fn new(store: Arc<dyn FileStore>, root_folder_id: impl Into<String>) -> Self {
        Self {
            store,
            root_folder_id: root_folder_id.into(),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.store.backend_name()
    }

    /// Reuse the customer's folder or create it. Returns `(folder_id, created)`.
    pub async fn find_or_create_folder(&self, customer_key: &str) -> UploadResult<(String, bool)> {
        let scope = self.store.resolve_root(&self.root_folder_id).await?;

        if let Some(existing) = self
            .store
            .find_folder(&scope, &self.root_folder_id, customer_key)
            .await?
        {
            debug!(folder_id = %existing, "Reusing customer folder");
            return Ok((existing, false));
        }

        let created = self
            .store
            .create_folder(&self.root_folder_id, customer_key)
            .await?;
        info!(folder_id = %created, "Created customer folder");
        Ok((created, true))
    }

    /// Upload a document for a customer and make it readable via link
    #[instrument(
        skip(self, content),
        fields(backend = self.store.backend_name(), size = content.len())
    )]
    pub async fn upload(
        &self,
        customer_key: &str,
        file_name: &str,
        content: Vec<u8>,
    ) -> UploadResult<StorageReference> {
        let (folder_id, folder_created) = self.find_or_create_folder(customer_key).await?;

        let file_id = self
            .store
            .upload_file(&folder_id, file_name, PDF_MIME_TYPE, content)
            .await?;

        self.store.share_publicly(&file_id).await?;

        let link = self.store.share_link(&file_id);
        info!(file_id = %file_id, link = %link, "Document uploaded");

        Ok(StorageReference {
            folder_id,
            file_id,
            link,
            folder_created,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uploader() -> (Arc<InMemoryFileStore>, ObjectStoreUploader) {
        let store = Arc::new(InMemoryFileStore::new());
        let uploader = ObjectStoreUploader::new(store.clone(), "root");
        (store, uploader)
    }

    #[tokio::test]
    async fn test_same_key_reuses_folder() {
        let (store, uploader) = uploader();

        let first = uploader.upload("BI-XX 123", "a.pdf", b"%PDF-1".to_vec()).await.unwrap();
        let second = uploader.upload("BI-XX 123", "b.pdf", b"%PDF-2".to_vec()).await.unwrap();

        assert!(first.folder_created);
        assert!(!second.folder_created);
        assert_eq!(first.folder_id, second.folder_id);
        assert_eq!(store.folders_created(), 1);
        assert_eq!(store.files_in(&first.folder_id).len(), 2);
    }

    #[tokio::test]
    async fn test_different_keys_get_own_folders() {
        let (store, uploader) = uploader();

        let a = uploader.upload("BI-A 1", "a.pdf", vec![1]).await.unwrap();
        let b = uploader.upload("BI-B 2", "b.pdf", vec![2]).await.unwrap();

        assert_ne!(a.folder_id, b.folder_id);
        assert_eq!(store.folders_created(), 2);
    }

    #[tokio::test]
    async fn test_uploaded_file_is_shared() {
        let (store, uploader) = uploader();
        let reference = uploader.upload("BI-A 1", "a.pdf", vec![1]).await.unwrap();

        assert!(store.is_public(&reference.file_id));
        assert!(reference.link.contains(&reference.file_id));
    }

    #[tokio::test]
    async fn test_shared_drive_root_is_tolerated() {
        let store = Arc::new(InMemoryFileStore::with_shared_drive("team-drive"));
        let uploader = ObjectStoreUploader::new(store.clone(), "root");

        uploader.upload("BI-A 1", "a.pdf", vec![1]).await.unwrap();
        let second = uploader.upload("BI-A 1", "b.pdf", vec![2]).await.unwrap();

        assert!(!second.folder_created);
        assert_eq!(store.folders_created(), 1);
    }

    #[tokio::test]
    async fn test_failing_step_is_reported() {
        let store = Arc::new(InMemoryFileStore::failing_at(UploadStep::UploadFile));
        let uploader = ObjectStoreUploader::new(store, "root");

        let err = uploader.upload("BI-A 1", "a.pdf", vec![1]).await.unwrap_err();
        assert_eq!(err.step, UploadStep::UploadFile);
        assert!(err.to_string().contains("upload_file"));
    }
}
