use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::parser::ParseError;
use crate::store::StoreError;

use super::staging::StagingError;

/// Category of a per-item failure, as reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    UnsupportedType,
    Extraction,
    EmptyContent,
    LlmCall,
    MalformedResponse,
    Store,
    Staging,
    DuplicateStem,
}

/// A failure confined to one item. The batch carries on without it.
#[derive(Debug, Error)]
pub enum ItemError {
    #[error("{filename}: unsupported file type '.{extension}'")]
    UnsupportedType { filename: String, extension: String },

    #[error("{filename}: extraction failed: {cause}")]
    Extraction { filename: String, cause: String },

    #[error("{filename}: parsed content is empty")]
    EmptyContent { filename: String },

    #[error("{filename}: LLM call failed: {cause}")]
    LlmCall { filename: String, cause: String },

    #[error("{filename}: malformed LLM response: {cause}")]
    MalformedResponse {
        filename: String,
        cause: String,
        raw_response_path: Option<PathBuf>,
    },

    #[error("{filename}: store error: {cause}")]
    Store { filename: String, cause: String },

    #[error("{filename}: staging error: {cause}")]
    Staging { filename: String, cause: String },

    /// Two files in one batch would share every staged artifact.
    #[error("{filename}: stem '{stem}' already used by {first} in this batch")]
    DuplicateStem {
        filename: String,
        stem: String,
        first: String,
    },
}

impl ItemError {
    pub fn parse(filename: &str, err: ParseError) -> Self {
        match err {
            ParseError::UnsupportedType { extension } => ItemError::UnsupportedType {
                filename: filename.to_string(),
                extension,
            },
            ParseError::Extraction { cause, .. } => ItemError::Extraction {
                filename: filename.to_string(),
                cause,
            },
        }
    }

    pub fn staging(filename: &str, err: StagingError) -> Self {
        ItemError::Staging {
            filename: filename.to_string(),
            cause: err.to_string(),
        }
    }

    pub fn store(filename: &str, err: StoreError) -> Self {
        ItemError::Store {
            filename: filename.to_string(),
            cause: err.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ItemError::UnsupportedType { .. } => ErrorKind::UnsupportedType,
            ItemError::Extraction { .. } => ErrorKind::Extraction,
            ItemError::EmptyContent { .. } => ErrorKind::EmptyContent,
            ItemError::LlmCall { .. } => ErrorKind::LlmCall,
            ItemError::MalformedResponse { .. } => ErrorKind::MalformedResponse,
            ItemError::Store { .. } => ErrorKind::Store,
            ItemError::Staging { .. } => ErrorKind::Staging,
            ItemError::DuplicateStem { .. } => ErrorKind::DuplicateStem,
        }
    }

    pub fn filename(&self) -> &str {
        match self {
            ItemError::UnsupportedType { filename, .. }
            | ItemError::Extraction { filename, .. }
            | ItemError::EmptyContent { filename }
            | ItemError::LlmCall { filename, .. }
            | ItemError::MalformedResponse { filename, .. }
            | ItemError::Store { filename, .. }
            | ItemError::Staging { filename, .. }
            | ItemError::DuplicateStem { filename, .. } => filename,
        }
    }

    /// Human-readable reason without the filename prefix.
    pub fn reason(&self) -> String {
        match self {
            ItemError::UnsupportedType { extension, .. } => {
                format!("unsupported file type '.{extension}' (supported: .pdf, .docx)")
            }
            ItemError::EmptyContent { .. } => "parsed content is empty".to_string(),
            ItemError::DuplicateStem { stem, first, .. } => {
                format!("stem '{stem}' already used by {first} in this batch")
            }
            ItemError::Extraction { cause, .. }
            | ItemError::LlmCall { cause, .. }
            | ItemError::MalformedResponse { cause, .. }
            | ItemError::Store { cause, .. }
            | ItemError::Staging { cause, .. } => cause.clone(),
        }
    }

    pub fn to_failure(&self) -> ItemFailure {
        let diagnostic = match self {
            ItemError::MalformedResponse {
                raw_response_path, ..
            } => raw_response_path.clone(),
            _ => None,
        };
        ItemFailure {
            filename: self.filename().to_string(),
            kind: self.kind(),
            reason: self.reason(),
            diagnostic,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemFailure {
    pub filename: String,
    pub kind: ErrorKind,
    pub reason: String,
    /// Saved raw model output, for malformed responses.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<PathBuf>,
}

/// A failure that stops a stage before any item is attempted.
#[derive(Debug, Error)]
pub enum StageError {
    #[error("{collaborator} is unavailable: {cause}")]
    CollaboratorUnavailable {
        collaborator: &'static str,
        cause: String,
    },

    #[error("staging area {} is not usable: {source}", path.display())]
    Staging {
        path: PathBuf,
        source: std::io::Error,
    },
}
