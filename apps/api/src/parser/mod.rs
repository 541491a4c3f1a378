//! Parser Adapter: turns a resume file on disk into a [`ParsedRecord`].

pub mod extractor;
pub mod normalize;

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::debug;

use crate::models::resume::ParsedRecord;
use extractor::{ExtractError, TextExtractor};
use normalize::{dedup_links, find_urls, normalize_text};

/// Lower-case extensions, without the dot.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["pdf", "docx"];

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("unsupported file type '.{extension}' (supported: .pdf, .docx)")]
    UnsupportedType { extension: String },

    #[error("failed to extract text from {filename}: {cause}")]
    Extraction { filename: String, cause: String },
}

/// Lower-cased extension of a filename, or an empty string.
pub fn file_extension(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

/// Rejects a filename outside [`SUPPORTED_EXTENSIONS`] without touching the file.
pub fn check_supported(filename: &str) -> Result<(), ParseError> {
    let extension = file_extension(filename);
    if SUPPORTED_EXTENSIONS.contains(&extension.as_str()) {
        Ok(())
    } else {
        Err(ParseError::UnsupportedType { extension })
    }
}

#[derive(Clone)]
pub struct ResumeParser {
    extractor: Arc<dyn TextExtractor>,
}

impl ResumeParser {
    pub fn new(extractor: Arc<dyn TextExtractor>) -> Self {
        Self { extractor }
    }

    /// Extracts and normalizes one file. Reads the file only; never modifies it.
    ///
    /// Links are the extractor's hyperlinks followed by any bare URLs in the
    /// text, de-duplicated. Empty content is returned as-is; the standardizer
    /// is responsible for rejecting it.
    pub fn parse(&self, path: &Path) -> Result<ParsedRecord, ParseError> {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        check_supported(&filename)?;

        let extracted = self.extractor.extract(path).map_err(|e| match e {
            ExtractError::UnsupportedFormat(extension) => ParseError::UnsupportedType { extension },
            other => ParseError::Extraction {
                filename: filename.clone(),
                cause: other.to_string(),
            },
        })?;

        let content = normalize_text(&extracted.text);
        let links = dedup_links(extracted.links.into_iter().chain(find_urls(&content)));
        debug!(
            "Parsed {filename}: {} chars, {} links",
            content.len(),
            links.len()
        );

        Ok(ParsedRecord {
            content,
            links,
            timestamp: Utc::now(),
            original_filename: filename,
        })
    }
}

#[cfg(test)]
pub mod testing {
    use std::collections::HashMap;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::extractor::{ExtractError, ExtractedText, TextExtractor};

    /// Returns canned text per filename; unknown files fail extraction.
    #[derive(Default)]
    pub struct FakeExtractor {
        pub texts: HashMap<String, ExtractedText>,
        pub calls: AtomicUsize,
    }

    impl FakeExtractor {
        pub fn with(mut self, filename: &str, text: &str, links: &[&str]) -> Self {
            self.texts.insert(
                filename.to_string(),
                ExtractedText {
                    text: text.to_string(),
                    links: links.iter().map(|l| l.to_string()).collect(),
                },
            );
            self
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl TextExtractor for FakeExtractor {
        fn extract(&self, path: &Path) -> Result<ExtractedText, ExtractError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            self.texts
                .get(&name)
                .cloned()
                .ok_or_else(|| ExtractError::Failed(format!("corrupt stream in {name}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::FakeExtractor;
    use super::*;

    fn parser(fake: FakeExtractor) -> (ResumeParser, Arc<FakeExtractor>) {
        let fake = Arc::new(fake);
        (ResumeParser::new(fake.clone()), fake)
    }

    #[test]
    fn test_supported_extensions_are_case_insensitive() {
        assert!(check_supported("cv.PDF").is_ok());
        assert!(check_supported("cv.Docx").is_ok());
        assert!(check_supported("cv.doc").is_err());
        assert!(check_supported("README").is_err());
    }

    #[test]
    fn test_unsupported_type_never_reaches_extractor() {
        let (parser, fake) = parser(FakeExtractor::default());
        let err = parser.parse(Path::new("/tmp/notes.txt")).unwrap_err();
        assert!(matches!(err, ParseError::UnsupportedType { ref extension } if extension == "txt"));
        assert_eq!(fake.calls(), 0);
    }

    #[test]
    fn test_extraction_failure_names_the_file() {
        let (parser, _) = parser(FakeExtractor::default());
        let err = parser.parse(Path::new("/tmp/broken.pdf")).unwrap_err();
        match err {
            ParseError::Extraction { filename, cause } => {
                assert_eq!(filename, "broken.pdf");
                assert!(cause.contains("corrupt stream"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_parse_normalizes_and_merges_links() {
        let (parser, _) = parser(FakeExtractor::default().with(
            "jane.pdf",
            "Jane   Doe\n\n\nhttps://github.com/jane\nhttps://linkedin.com/in/jane",
            &["https://linkedin.com/in/jane"],
        ));

        let record = parser.parse(Path::new("/uploads/jane.pdf")).unwrap();
        assert_eq!(record.original_filename, "jane.pdf");
        assert!(record.content.starts_with("Jane Doe\n\nhttps://github.com/jane"));
        assert_eq!(
            record.links,
            vec!["https://linkedin.com/in/jane", "https://github.com/jane"]
        );
    }

    #[test]
    fn test_empty_document_parses_to_empty_content() {
        let (parser, _) = parser(FakeExtractor::default().with("blank.docx", " \n\t", &[]));
        let record = parser.parse(Path::new("blank.docx")).unwrap();
        assert!(record.content.is_empty());
    }
}
