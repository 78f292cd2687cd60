//! In-memory file store for tests and local runs

use super::{FileStore, FolderScope, UploadError, UploadResult, UploadStep};
use async_trait::async_trait;
use std::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct StoredFolder {
    pub id: String,
    pub parent_id: String,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct StoredFile {
    pub id: String,
    pub folder_id: String,
    pub name: String,
    pub mime_type: String,
    pub size: usize,
    pub public: bool,
}

#[derive(Debug, Default)]
struct State {
    folders: Vec<StoredFolder>,
    files: Vec<StoredFile>,
    calls: usize,
}

/// File store that keeps folders and files in memory.
///
/// Can be told to fail at a given step to stand in for an unreachable backend.
#[derive(Debug, Default)]
pub struct InMemoryFileStore {
    state: Mutex<State>,
    shared_drive: Option<String>,
    fail_at: Option<UploadStep>,
}

impl InMemoryFileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Root folder reported as living in a shared drive
    pub fn with_shared_drive(drive_id: impl Into<String>) -> Self {
        Self {
            shared_drive: Some(drive_id.into()),
            ..Self::default()
        }
    }

    /// Every call at `step` fails
    pub fn failing_at(step: UploadStep) -> Self {
        Self {
            fail_at: Some(step),
            ..Self::default()
        }
    }

    pub fn folders_created(&self) -> usize {
        self.lock().folders.len()
    }

    pub fn folders(&self) -> Vec<StoredFolder> {
        self.lock().folders.clone()
    }

    pub fn files_in(&self, folder_id: &str) -> Vec<StoredFile> {
        self.lock()
            .files
            .iter()
            .filter(|f| f.folder_id == folder_id)
            .cloned()
            .collect()
    }

    pub fn is_public(&self, file_id: &str) -> bool {
        self.lock().files.iter().any(|f| f.id == file_id && f.public)
    }

    /// Number of capability calls made so far, failed ones included
    pub fn call_count(&self) -> usize {
        self.lock().calls
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn enter(&self, step: UploadStep) -> UploadResult<std::sync::MutexGuard<'_, State>> {
        let mut state = self.lock();
        state.calls += 1;
        if self.fail_at == Some(step) {
            return Err(UploadError::new(step, "object store unavailable"));
        }
        Ok(state)
    }
}

#[async_trait]
impl FileStore for InMemoryFileStore {
    async fn resolve_root(&self, _root_id: &str) -> UploadResult<FolderScope> {
        self.enter(UploadStep::ResolveRoot)?;
        Ok(match &self.shared_drive {
            Some(drive_id) => FolderScope::SharedDrive {
                drive_id: drive_id.clone(),
            },
            None => FolderScope::MyDrive,
        })
    }

    async fn find_folder(
        &self,
        scope: &FolderScope,
        parent_id: &str,
        name: &str,
    ) -> UploadResult<Option<String>> {
        if let (FolderScope::SharedDrive { drive_id }, Some(expected)) = (scope, &self.shared_drive) {
            if drive_id != expected {
                return Err(UploadError::new(UploadStep::FindFolder, "unknown shared drive"));
            }
        }
        let state = self.enter(UploadStep::FindFolder)?;
        Ok(state
            .folders
            .iter()
            .find(|f| f.parent_id == parent_id && f.name == name)
            .map(|f| f.id.clone()))
    }

    async fn create_folder(&self, parent_id: &str, name: &str) -> UploadResult<String> {
        let mut state = self.enter(UploadStep::CreateFolder)?;
        let id = format!("folder-{}", Uuid::new_v4());
        state.folders.push(StoredFolder {
            id: id.clone(),
            parent_id: parent_id.to_string(),
            name: name.to_string(),
        });
        Ok(id)
    }

    async fn upload_file(
        &self,
        folder_id: &str,
        name: &str,
        mime_type: &str,
        content: Vec<u8>,
    ) -> UploadResult<String> {
        let mut state = self.enter(UploadStep::UploadFile)?;
        let id = format!("file-{}", Uuid::new_v4());
        state.files.push(StoredFile {
            id: id.clone(),
            folder_id: folder_id.to_string(),
            name: name.to_string(),
            mime_type: mime_type.to_string(),
            size: content.len(),
            public: false,
        });
        Ok(id)
    }

    async fn share_publicly(&self, file_id: &str) -> UploadResult<()> {
        let mut state = self.enter(UploadStep::ShareFile)?;
        match state.files.iter_mut().find(|f| f.id == file_id) {
            Some(file) => {
                file.public = true;
                Ok(())
            }
            None => Err(UploadError::new(UploadStep::ShareFile, format!("file {file_id} not found"))),
        }
    }

    fn share_link(&self, file_id: &str) -> String {
        format!("memory://files/{file_id}")
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
