use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StagingError {
    #[error("io error on {path}: {source}")]
    Io { path: PathBuf, source: io::Error },

    #[error("invalid JSON in {path}: {source}")]
    Json { path: PathBuf, source: serde_json::Error },
}

/// On-disk layout shared by all stages:
///
/// ```text
/// <root>/uploads/<filename>
/// <root>/parsed/<stem>.json
/// <root>/standardized/<stem>.json
/// <root>/standardized/<stem>_raw.md
/// ```
///
/// Every write goes to a temp file in the target directory and is renamed
/// into place, so an artifact that exists is always complete.
#[derive(Debug, Clone)]
pub struct StagingArea {
    root: PathBuf,
}

impl StagingArea {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Creates the stage directories if missing.
    pub fn prepare(&self) -> io::Result<()> {
        for dir in [self.uploads_dir(), self.parsed_dir(), self.standardized_dir()] {
            fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.root.join("uploads")
    }

    pub fn parsed_dir(&self) -> PathBuf {
        self.root.join("parsed")
    }

    pub fn standardized_dir(&self) -> PathBuf {
        self.root.join("standardized")
    }

    pub fn upload_path(&self, filename: &str) -> PathBuf {
        self.uploads_dir().join(filename)
    }

    pub fn parsed_path(&self, stem: &str) -> PathBuf {
        self.parsed_dir().join(format!("{stem}.json"))
    }

    pub fn standardized_path(&self, stem: &str) -> PathBuf {
        self.standardized_dir().join(format!("{stem}.json"))
    }

    pub fn raw_response_path(&self, stem: &str) -> PathBuf {
        self.standardized_dir().join(format!("{stem}_raw.md"))
    }

    pub fn write_bytes(&self, path: &Path, bytes: &[u8]) -> Result<(), StagingError> {
        atomic_write(path, bytes).map_err(|source| StagingError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn write_text(&self, path: &Path, text: &str) -> Result<(), StagingError> {
        self.write_bytes(path, text.as_bytes())
    }

    pub fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> Result<(), StagingError> {
        let bytes = serde_json::to_vec_pretty(value).map_err(|source| StagingError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        self.write_bytes(path, &bytes)
    }

    pub fn read_json<T: DeserializeOwned>(&self, path: &Path) -> Result<T, StagingError> {
        let bytes = fs::read(path).map_err(|source| StagingError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_slice(&bytes).map_err(|source| StagingError::Json {
            path: path.to_path_buf(),
            source,
        })
    }
}

fn atomic_write(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Final path component of an uploaded filename. Browsers on Windows may send
/// backslash-separated paths, so both separators are stripped.
pub fn safe_filename(name: &str) -> String {
    name.rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or_default()
        .trim()
        .to_string()
}

/// Whether `name` can be joined onto a staging directory without leaving it.
pub fn is_safe_component(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\'])
}

pub fn file_stem(filename: &str) -> String {
    Path::new(filename)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}
