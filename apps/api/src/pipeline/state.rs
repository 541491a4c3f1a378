use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::staging::{file_stem, safe_filename, StagingArea};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Parse,
    Standardize,
    Store,
}

impl Stage {
    /// Status an item must hold to be eligible for this stage.
    pub fn input_status(self) -> ItemStatus {
        match self {
            Stage::Parse => ItemStatus::Uploaded,
            Stage::Standardize => ItemStatus::Parsed,
            Stage::Store => ItemStatus::Standardized,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Parse => "parse",
            Stage::Standardize => "standardize",
            Stage::Store => "store",
        })
    }
}

/// Per-item lifecycle: `Uploaded → Parsed → Standardized → Stored`, with
/// `Failed` reachable from any non-terminal status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ItemStatus {
    Uploaded,
    Parsed,
    Standardized,
    Stored { document_id: Uuid },
    Failed { stage: Stage, reason: String },
}

impl ItemStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ItemStatus::Stored { .. } | ItemStatus::Failed { .. })
    }

    fn rank(&self) -> u8 {
        match self {
            ItemStatus::Uploaded => 0,
            ItemStatus::Parsed => 1,
            ItemStatus::Standardized => 2,
            ItemStatus::Stored { .. } => 3,
            ItemStatus::Failed { .. } => u8::MAX,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            ItemStatus::Uploaded => "uploaded",
            ItemStatus::Parsed => "parsed",
            ItemStatus::Standardized => "standardized",
            ItemStatus::Stored { .. } => "stored",
            ItemStatus::Failed { .. } => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{filename}: cannot move from {from} to {to}")]
pub struct TransitionError {
    pub filename: String,
    pub from: &'static str,
    pub to: &'static str,
}

/// The stem is never read back from a client; it is derived from the
/// sanitized filename on the way in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "IncomingItem")]
pub struct BatchItem {
    pub filename: String,
    /// Filename without extension; names every staged artifact of this item.
    pub stem: String,
    #[serde(flatten)]
    pub status: ItemStatus,
}

#[derive(Deserialize)]
struct IncomingItem {
    filename: String,
    #[serde(flatten)]
    status: ItemStatus,
}

impl From<IncomingItem> for BatchItem {
    fn from(raw: IncomingItem) -> Self {
        let filename = safe_filename(&raw.filename);
        Self {
            stem: file_stem(&filename),
            filename,
            status: raw.status,
        }
    }
}

/// Bookkeeping for one batch, in input order. Owned by the caller and passed
/// to each stage; nothing else holds it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchState {
    pub items: Vec<BatchItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub uploaded: usize,
    pub parsed: usize,
    pub standardized: usize,
    pub stored: usize,
    pub failed: usize,
}

impl BatchState {
    pub fn new(filenames: impl IntoIterator<Item = String>) -> Self {
        let items = filenames
            .into_iter()
            .map(|name| {
                let filename = safe_filename(&name);
                BatchItem {
                    stem: file_stem(&filename),
                    filename,
                    status: ItemStatus::Uploaded,
                }
            })
            .collect();
        Self { items }
    }

    /// Rebuilds a batch from what is on disk: a standardized artifact means
    /// `Standardized`, a parsed artifact means `Parsed`, otherwise `Uploaded`.
    /// Store completion is not recorded in staging, so `Stored` is never derived.
    pub fn from_staging(staging: &StagingArea, filenames: impl IntoIterator<Item = String>) -> Self {
        let mut state = Self::new(filenames);
        for item in &mut state.items {
            if staging.standardized_path(&item.stem).exists() {
                item.status = ItemStatus::Standardized;
            } else if staging.parsed_path(&item.stem).exists() {
                item.status = ItemStatus::Parsed;
            }
        }
        state
    }

    /// Indices of items waiting on `stage`, in input order.
    pub fn eligible(&self, stage: Stage) -> Vec<usize> {
        let wanted = stage.input_status();
        self.items
            .iter()
            .enumerate()
            .filter(|(_, item)| item.status == wanted)
            .map(|(i, _)| i)
            .collect()
    }

    /// Moves an item forward exactly one step, or into `Failed`.
    pub fn transition(&mut self, index: usize, next: ItemStatus) -> Result<(), TransitionError> {
        let item = &mut self.items[index];
        let allowed = !item.status.is_terminal()
            && (matches!(next, ItemStatus::Failed { .. })
                || next.rank() == item.status.rank() + 1);
        if !allowed {
            return Err(TransitionError {
                filename: item.filename.clone(),
                from: item.status.label(),
                to: next.label(),
            });
        }
        item.status = next;
        Ok(())
    }

    /// Filenames that have completed `stage`, including those that went further.
    pub fn completed(&self, stage: Stage) -> Vec<&str> {
        let threshold = stage.input_status().rank() + 1;
        self.items
            .iter()
            .filter(|item| {
                !matches!(item.status, ItemStatus::Failed { .. }) && item.status.rank() >= threshold
            })
            .map(|item| item.filename.as_str())
            .collect()
    }

    pub fn summary(&self) -> BatchSummary {
        let mut summary = BatchSummary {
            total: self.items.len(),
            ..Default::default()
        };
        for item in &self.items {
            match item.status {
                ItemStatus::Uploaded => summary.uploaded += 1,
                ItemStatus::Parsed => summary.parsed += 1,
                ItemStatus::Standardized => summary.standardized += 1,
                ItemStatus::Stored { .. } => summary.stored += 1,
                ItemStatus::Failed { .. } => summary.failed += 1,
            }
        }
        summary
    }
}
