//! Submission pipeline
//!
//! One submission runs as a straight line of stages:
//! normalize, validate, render, upload, record keeping.
//!
//! Validation and rendering are fatal and surface as [`AppError`]. Upload and
//! record keeping are best effort: their failures, timeouts or missing
//! configuration end up as a [`StageOutcome`] inside the [`PipelineResult`].

use chrono::{DateTime, Utc};
use gutachten_common::{
    errors::{AppError, Result},
    metrics::{self, Timer},
    records::{ContactRef, OrderRef, RecordKeeper},
    storage::{ObjectStoreUploader, StorageReference},
    submission::{normalize, FormPayload, SubmissionRecord},
};
use gutachten_document::{DocumentRenderer, RenderedDocument};
use serde::Serialize;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

const STAGE_UPLOAD: &str = "upload";
const STAGE_CONTACT: &str = "contact";
const STAGE_ORDER: &str = "order";

/// Outcome of a non-fatal stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StageOutcome<T> {
    Succeeded(T),
    Skipped { reason: String },
    Failed { step: String, error: String },
}

impl<T> StageOutcome<T> {
    pub fn skipped(reason: impl Into<String>) -> Self {
        StageOutcome::Skipped {
            reason: reason.into(),
        }
    }

    pub fn failed(step: impl Display, error: impl Display) -> Self {
        StageOutcome::Failed {
            step: step.to_string(),
            error: error.to_string(),
        }
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            StageOutcome::Succeeded(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_succeeded(&self) -> bool {
        matches!(self, StageOutcome::Succeeded(_))
    }

    pub fn status(&self) -> &'static str {
        match self {
            StageOutcome::Succeeded(_) => "succeeded",
            StageOutcome::Skipped { .. } => "skipped",
            StageOutcome::Failed { .. } => "failed",
        }
    }
}

/// What was rendered; the bytes themselves are released after the upload attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSummary {
    pub file_name: String,
    pub size_bytes: usize,
    pub page_count: usize,
    pub signature_embedded: bool,
}

impl From<&RenderedDocument> for DocumentSummary {
    fn from(doc: &RenderedDocument) -> Self {
        Self {
            file_name: doc.file_name.clone(),
            size_bytes: doc.size(),
            page_count: doc.page_count,
            signature_embedded: doc.signature_embedded,
        }
    }
}

/// Result of a submission whose document was rendered
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineResult {
    pub timestamp: DateTime<Utc>,
    pub order_number: String,
    pub success: bool,
    pub document: DocumentSummary,
    pub upload: StageOutcome<StorageReference>,
    pub contact: StageOutcome<ContactRef>,
    pub order: StageOutcome<OrderRef>,
}

impl PipelineResult {
    /// True when any best-effort stage did not succeed
    pub fn is_degraded(&self) -> bool {
        !(self.upload.is_succeeded() && self.contact.is_succeeded() && self.order.is_succeeded())
    }
}

/// Runs submissions against the configured collaborators
#[derive(Clone)]
pub struct SubmissionPipeline {
    renderer: Arc<dyn DocumentRenderer>,
    uploader: Option<ObjectStoreUploader>,
    records: Option<RecordKeeper>,
    stage_timeout: Duration,
}

impl SubmissionPipeline {
    pub fn new(renderer: Arc<dyn DocumentRenderer>, stage_timeout: Duration) -> Self {
        Self {
            renderer,
            uploader: None,
            records: None,
            stage_timeout,
        }
    }

    pub fn with_uploader(mut self, uploader: ObjectStoreUploader) -> Self {
        self.uploader = Some(uploader);
        self
    }

    pub fn with_records(mut self, records: RecordKeeper) -> Self {
        self.records = Some(records);
        self
    }

    pub fn has_uploader(&self) -> bool {
        self.uploader.is_some()
    }

    pub fn has_records(&self) -> bool {
        self.records.is_some()
    }

    /// Process one raw form submission
    pub async fn submit(&self, payload: FormPayload) -> Result<PipelineResult> {
        let timer = Timer::start("pipeline_duration_seconds");

        let fields = normalize(payload);
        let record = match SubmissionRecord::from_fields(&fields) {
            Ok(record) => record,
            Err(e) => {
                metrics::record_submission("rejected");
                return Err(e);
            }
        };

        let result = self.run(record).await;
        let elapsed = timer.stop();

        match &result {
            Ok(r) => {
                metrics::record_submission("success");
                info!(
                    order_number = %r.order_number,
                    upload = r.upload.status(),
                    contact = r.contact.status(),
                    order = r.order.status(),
                    elapsed_ms = (elapsed * 1000.0) as u64,
                    "Submission completed"
                );
            }
            Err(_) => metrics::record_submission("failed"),
        }
        result
    }

    #[instrument(skip_all, fields(order_number = %record.order_number))]
    async fn run(&self, record: SubmissionRecord) -> Result<PipelineResult> {
        let record = Arc::new(record);

        let document = self.render(record.clone()).await?;
        let summary = DocumentSummary::from(&document);

        let upload = self.upload(&record, document).await;
        metrics::record_stage(STAGE_UPLOAD, upload.status());

        let (contact, order) = self.keep_records(&record, upload.value()).await;
        metrics::record_stage(STAGE_CONTACT, contact.status());
        metrics::record_stage(STAGE_ORDER, order.status());

        Ok(PipelineResult {
            timestamp: Utc::now(),
            order_number: record.order_number.clone(),
            success: true,
            document: summary,
            upload,
            contact,
            order,
        })
    }

    async fn render(&self, record: Arc<SubmissionRecord>) -> Result<RenderedDocument> {
        let timer = Timer::start("render_duration_seconds");
        let renderer = self.renderer.clone();

        let task = tokio::task::spawn_blocking(move || renderer.render(&record));
        let rendered = match tokio::time::timeout(self.stage_timeout, task).await {
            Ok(Ok(rendered)) => rendered,
            Ok(Err(join)) => {
                return Err(AppError::Internal {
                    message: format!("Render task failed: {}", join),
                })
            }
            Err(_) => {
                return Err(AppError::Render {
                    message: format!("Rendering timed out after {:?}", self.stage_timeout),
                })
            }
        };
        timer.stop();

        let document = rendered?;
        info!(
            file_name = %document.file_name,
            pages = document.page_count,
            size = document.size(),
            "Document rendered"
        );
        Ok(document)
    }

    /// Consumes the document so its bytes are released whatever the outcome
    async fn upload(
        &self,
        record: &SubmissionRecord,
        document: RenderedDocument,
    ) -> StageOutcome<StorageReference> {
        let Some(uploader) = &self.uploader else {
            return StageOutcome::skipped("object store not configured");
        };

        let RenderedDocument {
            file_name, bytes, ..
        } = document;

        let outcome = self
            .bounded(uploader.upload(&record.client.plate, &file_name, bytes))
            .await;

        match outcome {
            Some(Ok(reference)) => StageOutcome::Succeeded(reference),
            Some(Err(e)) => {
                warn!(step = %e.step, error = %e.message, "Upload failed, continuing without link");
                StageOutcome::failed(e.step, e.message)
            }
            None => {
                warn!(timeout = ?self.stage_timeout, "Upload timed out, continuing without link");
                StageOutcome::failed("timeout", format!("no response within {:?}", self.stage_timeout))
            }
        }
    }

    async fn keep_records(
        &self,
        record: &SubmissionRecord,
        storage: Option<&StorageReference>,
    ) -> (StageOutcome<ContactRef>, StageOutcome<OrderRef>) {
        let Some(keeper) = &self.records else {
            let reason = "record keeping not configured";
            return (StageOutcome::skipped(reason), StageOutcome::skipped(reason));
        };

        let contact = match self.bounded(keeper.upsert_contact(record)).await {
            Some(Ok(contact)) => StageOutcome::Succeeded(contact),
            Some(Err(e)) => {
                warn!(stage = %e.stage, error = %e.message, "Contact upsert failed");
                StageOutcome::failed(e.stage, e.message)
            }
            None => {
                warn!(timeout = ?self.stage_timeout, "Contact upsert timed out");
                StageOutcome::failed("timeout", format!("no response within {:?}", self.stage_timeout))
            }
        };

        // an order is still created without a contact; the relation is optional
        let order = match self
            .bounded(keeper.create_order(record, contact.value(), storage))
            .await
        {
            Some(Ok(order)) => StageOutcome::Succeeded(order),
            Some(Err(e)) => {
                warn!(stage = %e.stage, error = %e.message, "Order creation failed");
                StageOutcome::failed(e.stage, e.message)
            }
            None => {
                warn!(timeout = ?self.stage_timeout, "Order creation timed out");
                StageOutcome::failed("timeout", format!("no response within {:?}", self.stage_timeout))
            }
        };

        (contact, order)
    }

    /// `None` when the stage timeout elapsed
    async fn bounded<F: Future>(&self, fut: F) -> Option<F::Output> {
        tokio::time::timeout(self.stage_timeout, fut).await.ok()
    }
}
