//! Pipeline Orchestrator: drives a batch through parse, standardize and
//! store, one stage at a time.
//!
//! Each stage only touches items the previous stage completed, records
//! per-item failures without stopping, and leaves its output in the staging
//! area so a later run can pick up where this one stopped.

pub mod errors;
pub mod report;
pub mod staging;
pub mod state;

use std::collections::HashMap;

use bytes::Bytes;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::models::resume::{validate_canonical, CanonicalRecord, ParsedRecord};
use crate::parser::{check_supported, ResumeParser};
use crate::standardizer::{StandardizeError, Standardizer};
use crate::store::StoreManager;

use errors::{ItemError, StageError};
use report::{ArtifactRef, StageReport, StoredRef};
use staging::{is_safe_component, StagingArea};
use state::{BatchItem, BatchState, ItemStatus, Stage};

/// One uploaded file as received from the client.
#[derive(Debug, Clone)]
pub struct RawInput {
    pub filename: String,
    pub data: Bytes,
}

pub struct Pipeline {
    parser: ResumeParser,
    standardizer: Standardizer,
    store: StoreManager,
    staging: StagingArea,
    keep_raw_responses: bool,
}

impl Pipeline {
    pub fn new(
        parser: ResumeParser,
        standardizer: Standardizer,
        store: StoreManager,
        staging: StagingArea,
        keep_raw_responses: bool,
    ) -> Self {
        Self {
            parser,
            standardizer,
            store,
            staging,
            keep_raw_responses,
        }
    }

    pub fn staging(&self) -> &StagingArea {
        &self.staging
    }

    pub fn store(&self) -> &StoreManager {
        &self.store
    }

    /// Re-derives a batch from the artifacts already on disk.
    pub fn rescan(&self, filenames: Vec<String>) -> BatchState {
        BatchState::from_staging(&self.staging, filenames)
    }

    /// Stages the uploads and extracts their text. Blocking; callers on an
    /// async runtime should run it on a blocking thread.
    pub fn run_parse(
        &self,
        inputs: Vec<RawInput>,
    ) -> Result<(BatchState, StageReport<ArtifactRef>), StageError> {
        self.prepare_staging()?;

        let mut state = BatchState::new(inputs.iter().map(|i| i.filename.clone()));
        let mut report = StageReport::new(Stage::Parse);
        let mut stems: HashMap<String, String> = HashMap::new();
        let total = inputs.len();
        info!("Parsing {total} files...");

        for (index, input) in inputs.iter().enumerate() {
            let item = state.items[index].clone();
            info!("Parsing {}/{total}: {}", index + 1, item.filename);

            let outcome = match stems.get(&item.stem) {
                Some(first) => Err(ItemError::DuplicateStem {
                    filename: item.filename.clone(),
                    stem: item.stem.clone(),
                    first: first.clone(),
                }),
                None => self.parse_one(&item, input),
            };
            if outcome.is_ok() {
                stems.insert(item.stem.clone(), item.filename.clone());
            }

            match outcome {
                Ok(artifact) => {
                    advance(&mut state, index, ItemStatus::Parsed);
                    if artifact.cached {
                        advance(&mut state, index, ItemStatus::Standardized);
                    }
                    report.record_success(artifact);
                }
                Err(err) => {
                    fail(&mut state, index, Stage::Parse, &err);
                    report.record_failure(&err);
                }
            }
        }

        info!("{}", report.summary_line());
        Ok((state, report))
    }

    fn parse_one(&self, item: &BatchItem, input: &RawInput) -> Result<ArtifactRef, ItemError> {
        let filename = item.filename.as_str();
        check_supported(filename).map_err(|e| ItemError::parse(filename, e))?;
        ensure_safe_paths(item)?;

        let standardized = self.staging.standardized_path(&item.stem);
        if standardized.exists() {
            match self.load_canonical(&standardized) {
                Ok(_) => {
                    info!("{filename} already standardized, skipping parse");
                    return Ok(ArtifactRef {
                        filename: filename.to_string(),
                        path: standardized,
                        cached: true,
                    });
                }
                Err(err) => warn!("Ignoring unusable artifact for {filename}: {err}"),
            }
        }

        let upload = self.staging.upload_path(filename);
        self.staging
            .write_bytes(&upload, &input.data)
            .map_err(|e| ItemError::staging(filename, e))?;

        let parsed = self
            .parser
            .parse(&upload)
            .map_err(|e| ItemError::parse(filename, e))?;

        let path = self.staging.parsed_path(&item.stem);
        self.staging
            .write_json(&path, &parsed)
            .map_err(|e| ItemError::staging(filename, e))?;

        Ok(ArtifactRef {
            filename: filename.to_string(),
            path,
            cached: false,
        })
    }

    /// Converts every `Parsed` item into a canonical record, one model call
    /// at a time.
    pub async fn run_standardize(
        &self,
        state: &mut BatchState,
    ) -> Result<StageReport<ArtifactRef>, StageError> {
        self.standardizer
            .ensure_ready()
            .map_err(|e| StageError::CollaboratorUnavailable {
                collaborator: "LLM",
                cause: e.to_string(),
            })?;
        self.prepare_staging()?;

        let eligible = state.eligible(Stage::Standardize);
        let total = eligible.len();
        let mut report = StageReport::new(Stage::Standardize);
        info!("Standardizing {total} files...");

        for (n, index) in eligible.into_iter().enumerate() {
            let item = state.items[index].clone();
            info!("Standardizing {}/{total}: {}", n + 1, item.filename);

            match self.standardize_one(&item).await {
                Ok(artifact) => {
                    advance(state, index, ItemStatus::Standardized);
                    report.record_success(artifact);
                }
                Err(err) => {
                    fail(state, index, Stage::Standardize, &err);
                    report.record_failure(&err);
                }
            }
        }

        info!("{}", report.summary_line());
        Ok(report)
    }

    async fn standardize_one(&self, item: &BatchItem) -> Result<ArtifactRef, ItemError> {
        let filename = item.filename.as_str();
        ensure_safe_paths(item)?;
        let out_path = self.staging.standardized_path(&item.stem);

        if out_path.exists() {
            match self.load_canonical(&out_path) {
                Ok(_) => {
                    info!("{filename} already standardized, skipping LLM call");
                    return Ok(ArtifactRef {
                        filename: filename.to_string(),
                        path: out_path,
                        cached: true,
                    });
                }
                Err(err) => warn!("Ignoring unusable artifact for {filename}: {err}"),
            }
        }

        let parsed_path = self.staging.parsed_path(&item.stem);
        let parsed: ParsedRecord = self
            .staging
            .read_json(&parsed_path)
            .map_err(|e| ItemError::staging(filename, e))?;

        let raw_path = self.staging.raw_response_path(&item.stem);
        match self.standardizer.standardize(&parsed, &parsed_path).await {
            Ok(out) => {
                if self.keep_raw_responses {
                    if let Err(err) = self.staging.write_text(&raw_path, &out.raw_response) {
                        warn!("Could not save raw response for {filename}: {err}");
                    }
                }
                self.staging
                    .write_json(&out_path, &out.record)
                    .map_err(|e| ItemError::staging(filename, e))?;
                Ok(ArtifactRef {
                    filename: filename.to_string(),
                    path: out_path,
                    cached: false,
                })
            }
            Err(StandardizeError::EmptyContent) => Err(ItemError::EmptyContent {
                filename: filename.to_string(),
            }),
            Err(StandardizeError::LlmCall(e)) => Err(ItemError::LlmCall {
                filename: filename.to_string(),
                cause: e.to_string(),
            }),
            Err(StandardizeError::MalformedResponse {
                cause,
                raw_response,
            }) => {
                debug!("Raw response for {filename}:\n{raw_response}");
                let saved = match self.staging.write_text(&raw_path, &raw_response) {
                    Ok(()) => {
                        error!("Malformed response for {filename} saved to {}", raw_path.display());
                        Some(raw_path)
                    }
                    Err(err) => {
                        error!("Malformed response for {filename} could not be saved: {err}");
                        None
                    }
                };
                Err(ItemError::MalformedResponse {
                    filename: filename.to_string(),
                    cause: cause.to_string(),
                    raw_response_path: saved,
                })
            }
        }
    }

    /// Upserts every `Standardized` item into the document store.
    pub async fn run_store(
        &self,
        state: &mut BatchState,
    ) -> Result<StageReport<StoredRef>, StageError> {
        self.store
            .ping()
            .await
            .map_err(|e| StageError::CollaboratorUnavailable {
                collaborator: "document store",
                cause: e.to_string(),
            })?;

        let eligible = state.eligible(Stage::Store);
        let total = eligible.len();
        let mut report = StageReport::new(Stage::Store);
        info!("Uploading {total} resumes to store...");

        for (n, index) in eligible.into_iter().enumerate() {
            let item = state.items[index].clone();
            info!("Storing {}/{total}: {}", n + 1, item.filename);

            match self.store_one(&item).await {
                Ok(stored) => {
                    advance(
                        state,
                        index,
                        ItemStatus::Stored {
                            document_id: stored.document_id,
                        },
                    );
                    report.record_success(stored);
                }
                Err(err) => {
                    fail(state, index, Stage::Store, &err);
                    report.record_failure(&err);
                }
            }
        }

        info!("{}", report.summary_line());
        Ok(report)
    }

    async fn store_one(&self, item: &BatchItem) -> Result<StoredRef, ItemError> {
        let filename = item.filename.as_str();
        ensure_safe_paths(item)?;
        let record = self
            .load_canonical(&self.staging.standardized_path(&item.stem))
            .map_err(|e| ItemError::Staging {
                filename: filename.to_string(),
                cause: e,
            })?;
        let document_id = self
            .store
            .upsert(&record)
            .await
            .map_err(|e| ItemError::store(filename, e))?;
        Ok(StoredRef {
            filename: filename.to_string(),
            document_id,
        })
    }

    fn load_canonical(&self, path: &std::path::Path) -> Result<CanonicalRecord, String> {
        let value: Value = self.staging.read_json(path).map_err(|e| e.to_string())?;
        validate_canonical(value).map_err(|e| format!("{}: {e}", path.display()))
    }

    fn prepare_staging(&self) -> Result<(), StageError> {
        self.staging
            .prepare()
            .map_err(|source| StageError::Staging {
                path: self.staging.root().to_path_buf(),
                source,
            })
    }
}

/// Filename and stem are joined onto staging directories; neither may escape them.
fn ensure_safe_paths(item: &BatchItem) -> Result<(), ItemError> {
    if is_safe_component(&item.filename) && is_safe_component(&item.stem) {
        Ok(())
    } else {
        Err(ItemError::Staging {
            filename: item.filename.clone(),
            cause: format!("'{}' is not a usable staging name", item.stem),
        })
    }
}

fn advance(state: &mut BatchState, index: usize, next: ItemStatus) {
    if let Err(err) = state.transition(index, next) {
        error!("{err}");
    }
}

fn fail(state: &mut BatchState, index: usize, stage: Stage, err: &ItemError) {
    advance(
        state,
        index,
        ItemStatus::Failed {
            stage,
            reason: err.reason(),
        },
    );
}
