//! Document text extraction. The only place that touches PDF/DOCX internals.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

use docx_rs::{
    DocumentChild, HyperlinkData, Paragraph, ParagraphChild, Run, RunChild, Table,
    TableCellContent, TableChild, TableRowChild,
};
use lopdf::{Document, Object};
use thiserror::Error;
use tracing::{debug, warn};

use super::file_extension;

/// Raw output of an extractor, before normalization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedText {
    pub text: String,
    pub links: Vec<String>,
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("unsupported document format '{0}'")]
    UnsupportedFormat(String),

    #[error("failed to read file: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Failed(String),
}

/// Seam to the text-extraction capability. Swapped for a fake in tests.
pub trait TextExtractor: Send + Sync {
    fn extract(&self, path: &Path) -> Result<ExtractedText, ExtractError>;
}

/// Extracts PDF text with `pdf-extract`, PDF link annotations with `lopdf`
/// and DOCX paragraphs and hyperlinks with `docx-rs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentExtractor;

impl TextExtractor for DocumentExtractor {
    fn extract(&self, path: &Path) -> Result<ExtractedText, ExtractError> {
        let extension = file_extension(&path.to_string_lossy());
        match extension.as_str() {
            "pdf" => {
                let data = std::fs::read(path)?;
                extract_pdf(&data)
            }
            "docx" => {
                let data = std::fs::read(path)?;
                extract_docx(&data)
            }
            _ => Err(ExtractError::UnsupportedFormat(extension)),
        }
    }
}

fn extract_pdf(data: &[u8]) -> Result<ExtractedText, ExtractError> {
    // pdf-extract panics on some malformed fonts; contain it to this file.
    let text = panic::catch_unwind(AssertUnwindSafe(|| pdf_extract::extract_text_from_mem(data)))
        .map_err(|_| ExtractError::Failed("PDF extractor panicked".to_string()))?
        .map_err(|e| ExtractError::Failed(format!("PDF extraction failed: {e}")))?;

    let links = match pdf_links(data) {
        Ok(links) => links,
        Err(e) => {
            warn!("Failed to extract PDF link annotations: {e}");
            Vec::new()
        }
    };
    debug!("Extracted {} chars and {} links from PDF", text.len(), links.len());

    Ok(ExtractedText { text, links })
}

/// Collects `/URI` targets of `/Link` annotations on every page.
pub fn pdf_links(data: &[u8]) -> lopdf::Result<Vec<String>> {
    let doc = Document::load_mem(data)?;
    let mut links = Vec::new();

    for page_id in doc.get_pages().into_values() {
        let page = doc.get_dictionary(page_id)?;
        let Ok(annots) = page.get(b"Annots").and_then(|a| resolve(&doc, a)) else {
            continue;
        };
        let Ok(annots) = annots.as_array() else {
            continue;
        };

        for annot in annots {
            let Ok(annot) = resolve(&doc, annot).and_then(Object::as_dict) else {
                continue;
            };
            let is_link = annot
                .get(b"Subtype")
                .and_then(Object::as_name)
                .map(|name| name == b"Link")
                .unwrap_or(false);
            if !is_link {
                continue;
            }
            let uri = annot
                .get(b"A")
                .and_then(|a| resolve(&doc, a))
                .and_then(Object::as_dict)
                .and_then(|action| action.get(b"URI"))
                .and_then(|u| resolve(&doc, u))
                .and_then(Object::as_str);
            if let Ok(uri) = uri {
                links.push(String::from_utf8_lossy(uri).into_owned());
            }
        }
    }

    Ok(links)
}

fn resolve<'a>(doc: &'a Document, object: &'a Object) -> lopdf::Result<&'a Object> {
    match object {
        Object::Reference(id) => doc.get_object(*id),
        other => Ok(other),
    }
}

fn extract_docx(data: &[u8]) -> Result<ExtractedText, ExtractError> {
    let docx = docx_rs::read_docx(data)
        .map_err(|e| ExtractError::Failed(format!("DOCX extraction failed: {e}")))?;

    // The reader leaves hyperlink paths empty; targets live in the relationships.
    let targets: HashMap<&str, &str> = docx
        .hyperlinks
        .iter()
        .map(|(rid, target, _mode)| (rid.as_str(), target.as_str()))
        .collect();

    let mut walker = DocxWalker {
        targets,
        out: ExtractedText::default(),
    };
    for child in &docx.document.children {
        match child {
            DocumentChild::Paragraph(p) => walker.paragraph(p),
            DocumentChild::Table(t) => walker.table(t),
            _ => {}
        }
    }
    Ok(walker.out)
}

struct DocxWalker<'a> {
    /// Relationship id to external hyperlink target.
    targets: HashMap<&'a str, &'a str>,
    out: ExtractedText,
}

impl DocxWalker<'_> {
    fn paragraph(&mut self, paragraph: &Paragraph) {
        self.paragraph_children(&paragraph.children);
        self.out.text.push('\n');
    }

    fn paragraph_children(&mut self, children: &[ParagraphChild]) {
        for child in children {
            match child {
                ParagraphChild::Run(run) => push_run(run, &mut self.out),
                ParagraphChild::Hyperlink(link) => {
                    if let HyperlinkData::External { rid, path } = &link.link {
                        let target = self
                            .targets
                            .get(rid.as_str())
                            .copied()
                            .unwrap_or(path.as_str());
                        if !target.is_empty() {
                            self.out.links.push(target.to_string());
                        }
                    }
                    self.paragraph_children(&link.children);
                }
                _ => {}
            }
        }
    }

    // Resumes often lay out columns as tables; cells are read row by row.
    #[allow(irrefutable_let_patterns)]
    fn table(&mut self, table: &Table) {
        for row in &table.rows {
            let TableChild::TableRow(row) = row else {
                continue;
            };
            for cell in &row.cells {
                let TableRowChild::TableCell(cell) = cell else {
                    continue;
                };
                for content in &cell.children {
                    match content {
                        TableCellContent::Paragraph(p) => self.paragraph(p),
                        TableCellContent::Table(t) => self.table(t),
                        _ => {}
                    }
                }
            }
        }
    }
}

fn push_run(run: &Run, out: &mut ExtractedText) {
    for child in &run.children {
        match child {
            RunChild::Text(t) => out.text.push_str(&t.text),
            RunChild::Tab(_) => out.text.push('\t'),
            RunChild::Break(_) => out.text.push('\n'),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{dictionary, Stream};
    use std::io::Cursor;

    fn pdf_with_link(uri: &str) -> Vec<u8> {
        let mut doc = Document::with_version("1.4");
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            b"BT /F1 12 Tf 100 700 Td (Jane Doe) Tj ET".to_vec(),
        ));
        let link_id = doc.add_object(dictionary! {
            "Type" => "Annot",
            "Subtype" => "Link",
            "Rect" => vec![100.into(), 690.into(), 200.into(), 710.into()],
            "A" => dictionary! {
                "S" => "URI",
                "URI" => Object::string_literal(uri),
            },
        });
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
            "Contents" => content_id,
            "Annots" => vec![link_id.into()],
        });
        let pages_id = doc.add_object(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        });
        if let Ok(Object::Dictionary(page)) = doc.get_object_mut(page_id) {
            page.set("Parent", pages_id);
        }
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).unwrap();
        buffer
    }

    #[test]
    fn test_pdf_links_reads_uri_annotations() {
        let pdf = pdf_with_link("https://linkedin.com/in/jane");
        assert_eq!(pdf_links(&pdf).unwrap(), vec!["https://linkedin.com/in/jane"]);
    }

    #[test]
    fn test_pdf_links_rejects_non_pdf() {
        assert!(pdf_links(b"not a pdf").is_err());
    }

    #[test]
    fn test_corrupt_pdf_is_extraction_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"%PDF-1.4 garbage").unwrap();

        let err = DocumentExtractor.extract(&path).unwrap_err();
        assert!(matches!(err, ExtractError::Failed(_)));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = DocumentExtractor
            .extract(Path::new("/nonexistent/resume.docx"))
            .unwrap_err();
        assert!(matches!(err, ExtractError::Io(_)));
    }

    #[test]
    fn test_unknown_extension_is_unsupported() {
        let err = DocumentExtractor.extract(Path::new("notes.txt")).unwrap_err();
        assert!(matches!(err, ExtractError::UnsupportedFormat(ref e) if e == "txt"));
    }

    #[test]
    fn test_docx_paragraph_text() {
        let mut buf = Cursor::new(Vec::new());
        docx_rs::Docx::new()
            .add_paragraph(Paragraph::new().add_run(Run::new().add_text("Jane Doe")))
            .add_paragraph(
                Paragraph::new().add_run(Run::new().add_text("Portfolio https://jane.dev")),
            )
            .build()
            .pack(&mut buf)
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jane.docx");
        std::fs::write(&path, buf.into_inner()).unwrap();

        let extracted = DocumentExtractor.extract(&path).unwrap();
        assert!(extracted.text.contains("Jane Doe\n"));
        assert!(extracted.text.contains("Portfolio https://jane.dev"));
    }

    #[test]
    fn test_docx_hyperlink_target_is_collected() {
        let mut buf = Cursor::new(Vec::new());
        docx_rs::Docx::new()
            .add_paragraph(Paragraph::new().add_run(Run::new().add_text("Jane Doe")))
            .add_paragraph(
                Paragraph::new().add_hyperlink(
                    docx_rs::Hyperlink::new(
                        "https://github.com/jane",
                        docx_rs::HyperlinkType::External,
                    )
                    .add_run(Run::new().add_text("GitHub")),
                ),
            )
            .build()
            .pack(&mut buf)
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jane.docx");
        std::fs::write(&path, buf.into_inner()).unwrap();

        let extracted = DocumentExtractor.extract(&path).unwrap();
        assert!(extracted.text.contains("GitHub"));
        assert!(!extracted.text.contains("https://github.com/jane"));
        assert_eq!(extracted.links, vec!["https://github.com/jane".to_string()]);
    }
}
