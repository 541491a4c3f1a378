use axum::{
    extract::{Multipart, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::AppError;
use crate::pipeline::report::{ArtifactRef, StageReport, StoredRef};
use crate::pipeline::state::{BatchState, BatchSummary};
use crate::pipeline::RawInput;
use crate::state::AppState;

/// Batch state after a stage, with that stage's report.
#[derive(Serialize)]
pub struct BatchResponse<T> {
    pub state: BatchState,
    pub summary: BatchSummary,
    pub report: StageReport<T>,
}

impl<T> BatchResponse<T> {
    fn new(state: BatchState, report: StageReport<T>) -> Self {
        Self {
            summary: state.summary(),
            state,
            report,
        }
    }
}

#[derive(Deserialize)]
pub struct RescanRequest {
    pub filenames: Vec<String>,
}

/// POST /api/v1/batches/parse
/// Multipart upload; every part carrying a filename is one resume.
pub async fn handle_parse(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<BatchResponse<ArtifactRef>>, AppError> {
    let mut inputs = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid multipart body: {e}")))?
    {
        let Some(filename) = field.file_name().map(str::to_string) else {
            continue;
        };
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("Failed to read {filename}: {e}")))?;
        inputs.push(RawInput { filename, data });
    }

    if inputs.is_empty() {
        return Err(AppError::Validation("No files uploaded".to_string()));
    }
    info!("Received {} files for parsing", inputs.len());

    let pipeline = state.pipeline.clone();
    let (batch, report) = tokio::task::spawn_blocking(move || pipeline.run_parse(inputs))
        .await
        .map_err(|e| AppError::Internal(e.into()))??;

    Ok(Json(BatchResponse::new(batch, report)))
}

/// POST /api/v1/batches/standardize
pub async fn handle_standardize(
    State(state): State<AppState>,
    Json(mut batch): Json<BatchState>,
) -> Result<Json<BatchResponse<ArtifactRef>>, AppError> {
    let report = state.pipeline.run_standardize(&mut batch).await?;
    Ok(Json(BatchResponse::new(batch, report)))
}

/// POST /api/v1/batches/store
pub async fn handle_store(
    State(state): State<AppState>,
    Json(mut batch): Json<BatchState>,
) -> Result<Json<BatchResponse<StoredRef>>, AppError> {
    let report = state.pipeline.run_store(&mut batch).await?;
    Ok(Json(BatchResponse::new(batch, report)))
}

/// POST /api/v1/batches/rescan
pub async fn handle_rescan(
    State(state): State<AppState>,
    Json(req): Json<RescanRequest>,
) -> Result<Json<BatchState>, AppError> {
    if req.filenames.is_empty() {
        return Err(AppError::Validation("filenames must not be empty".to_string()));
    }
    Ok(Json(state.pipeline.rescan(req.filenames)))
}
