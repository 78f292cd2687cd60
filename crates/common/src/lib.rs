//! Gutachten Common Library
//!
//! Shared code for the Gutachten intake service including:
//! - Submission normalization, validation and the typed record
//! - Object store capability with Google Drive and in-memory backends
//! - Record-keeping capability with Notion and in-memory backends
//! - Error types and handling
//! - Configuration management
//! - Metrics

pub mod config;
pub mod errors;
pub mod metrics;
pub mod records;
pub mod storage;
pub mod submission;

// Re-export commonly used types
pub use config::AppConfig;
pub use errors::{AppError, Result};
pub use records::{RecordKeeper, RecordStore};
pub use storage::{FileStore, ObjectStoreUploader, StorageReference};
pub use submission::{FormFields, FormPayload, SubmissionRecord};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
