//! Shared application state and collaborator wiring

use crate::pipeline::SubmissionPipeline;
use gutachten_common::{
    config::AppConfig,
    errors::Result,
    records::{NotionRecordStore, RecordKeeper},
    storage::{GoogleDriveStore, ObjectStoreUploader},
};
use gutachten_document::PdfRenderer;
use std::sync::Arc;
use tracing::{info, warn};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub pipeline: Arc<SubmissionPipeline>,
}

impl AppState {
    pub fn new(config: AppConfig, pipeline: SubmissionPipeline) -> Self {
        Self {
            config: Arc::new(config),
            pipeline: Arc::new(pipeline),
        }
    }

    /// Build the pipeline from configuration.
    ///
    /// Collaborators without complete configuration are left out and their
    /// stages are reported as skipped. A collaborator that is configured but
    /// cannot be constructed (unreadable key file, say) fails startup.
    pub fn from_config(config: AppConfig) -> Result<Self> {
        let mut pipeline =
            SubmissionPipeline::new(Arc::new(PdfRenderer::new()), config.stage_timeout());

        let drive = &config.google_drive;
        match drive.root_folder_id.as_deref() {
            Some(root) if drive.is_configured() => {
                let store = GoogleDriveStore::from_config(drive)?;
                info!(root_folder_id = %root, "Google Drive upload enabled");
                pipeline = pipeline.with_uploader(ObjectStoreUploader::new(Arc::new(store), root));
            }
            _ => warn!("Google Drive not configured, uploads will be skipped"),
        }

        if config.notion.is_configured() {
            let store = NotionRecordStore::from_config(&config.notion)?;
            info!("Notion record keeping enabled");
            pipeline = pipeline.with_records(RecordKeeper::new(
                Arc::new(store),
                config.notion.default_priority.clone(),
            ));
        } else {
            warn!("Notion not configured, record keeping will be skipped");
        }

        Ok(Self::new(config, pipeline))
    }

    pub fn notion_enabled(&self) -> bool {
        self.pipeline.has_records()
    }

    pub fn drive_enabled(&self) -> bool {
        self.pipeline.has_uploader()
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("notion", &self.notion_enabled())
            .field("google_drive", &self.drive_enabled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gutachten_common::errors::AppError;

    #[test]
    fn test_unconfigured_collaborators_are_left_out() {
        let state = AppState::from_config(AppConfig::default()).unwrap();
        assert!(!state.notion_enabled());
        assert!(!state.drive_enabled());
    }

    #[test]
    fn test_unreadable_drive_key_fails_startup() {
        let mut config = AppConfig::default();
        config.google_drive.credentials_path = Some("/nonexistent/key.json".into());
        config.google_drive.root_folder_id = Some("root".into());

        let err = AppState::from_config(config).unwrap_err();
        assert!(matches!(err, AppError::Configuration { .. }));
    }
}
