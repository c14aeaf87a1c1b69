//! Page-level text extraction for source documents.
//!
//! The pipeline only depends on [`DocumentParser`]; [`PdfParser`] is the
//! default implementation backed by `pdf-extract`. A malformed PDF is an
//! error for that one item, never a panic that escapes the parser.

use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

use crate::error::ParseError;
use crate::models::PageText;

/// Turns a file into an ordered sequence of page texts.
///
/// An empty result means "nothing to ingest" and is not an error.
pub trait DocumentParser: Send + Sync {
    fn parse(&self, path: &Path) -> Result<Vec<PageText>, ParseError>;
}

/// PDF parser that extracts text page by page.
///
/// Pages whose text is blank after trimming are dropped; page numbers of
/// the remaining pages are preserved.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfParser;

impl DocumentParser for PdfParser {
    fn parse(&self, path: &Path) -> Result<Vec<PageText>, ParseError> {
        let bytes = std::fs::read(path).map_err(|e| ParseError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let pages = extract_pdf_pages(&bytes)?;
        Ok(non_blank_pages(pages))
    }
}

/// Extract the raw text of every page of an in-memory PDF.
pub fn extract_pdf_pages(bytes: &[u8]) -> Result<Vec<String>, ParseError> {
    // pdf-extract can panic on some malformed font tables.
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        pdf_extract::extract_text_from_mem_by_pages(bytes)
    }));

    match result {
        Ok(Ok(pages)) => Ok(pages),
        Ok(Err(e)) => Err(ParseError::Pdf(e.to_string())),
        Err(payload) => Err(ParseError::Panicked(panic_message(payload.as_ref()))),
    }
}

fn non_blank_pages(pages: Vec<String>) -> Vec<PageText> {
    pages
        .into_iter()
        .enumerate()
        .filter(|(_, text)| !text.trim().is_empty())
        .map(|(i, text)| PageText {
            page: i as u32 + 1,
            text: text.replace('\0', ""),
        })
        .collect()
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
