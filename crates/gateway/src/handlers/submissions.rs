//! Form submission handler

use crate::pipeline::PipelineResult;
use crate::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use gutachten_common::{
    errors::{AppError, Result},
    submission::FormPayload,
};
use serde::Serialize;

pub const SUCCESS_MESSAGE: &str = "Gutachten erfolgreich übermittelt";

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub success: bool,
    pub message: String,
    pub data: PipelineResult,
}

/// POST /api/submit-gutachten
pub async fn submit_gutachten(
    State(state): State<AppState>,
    payload: std::result::Result<Json<FormPayload>, JsonRejection>,
) -> Result<Json<SubmitResponse>> {
    let Json(payload) = payload.map_err(|e| AppError::InvalidPayload {
        message: e.body_text(),
    })?;

    let result = state.pipeline.submit(payload).await?;

    Ok(Json(SubmitResponse {
        success: true,
        message: SUCCESS_MESSAGE.to_string(),
        data: result,
    }))
}
