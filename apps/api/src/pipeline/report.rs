use std::path::PathBuf;

use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use super::errors::{ItemError, ItemFailure};
use super::state::Stage;

/// Outcome of one stage run. `succeeded` and `failed` partition the items
/// the stage attempted.
#[derive(Debug, Clone, Serialize)]
pub struct StageReport<T> {
    pub stage: Stage,
    pub attempted: usize,
    pub succeeded: Vec<T>,
    pub failed: Vec<ItemFailure>,
}

impl<T> StageReport<T> {
    pub fn new(stage: Stage) -> Self {
        Self {
            stage,
            attempted: 0,
            succeeded: Vec::new(),
            failed: Vec::new(),
        }
    }

    pub fn record_success(&mut self, item: T) {
        self.attempted += 1;
        self.succeeded.push(item);
    }

    pub fn record_failure(&mut self, err: &ItemError) {
        warn!("{} failed: {err}", self.stage);
        self.attempted += 1;
        self.failed.push(err.to_failure());
    }

    /// e.g. `Parsed 2/3 files`.
    pub fn summary_line(&self) -> String {
        let verb = match self.stage {
            Stage::Parse => "Parsed",
            Stage::Standardize => "Standardized",
            Stage::Store => "Stored",
        };
        format!("{verb} {}/{} files", self.succeeded.len(), self.attempted)
    }
}

/// A staged artifact produced (or found already present) for one item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArtifactRef {
    pub filename: String,
    pub path: PathBuf,
    /// True when an existing artifact was reused instead of doing the work.
    pub cached: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredRef {
    pub filename: String,
    pub document_id: Uuid,
}
