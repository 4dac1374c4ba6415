//! Plain-text extraction for corpus documents.
//!
//! PDFs go through `pdf-extract`, which concatenates the text of every
//! page in page order. Any other extension is read as UTF-8 text, which
//! keeps the pipeline exercisable with plain-text corpora. Extraction
//! errors are recoverable: the indexer logs a warning and skips the
//! document.

use anyhow::{Context, Result};
use std::path::Path;

/// Extract the text content of one corpus file.
///
/// An `Err` here, or an empty/whitespace-only `Ok`, both mean "skip this
/// document" to the caller — neither aborts an indexing run.
pub fn extract_file(path: &Path) -> Result<String> {
    let is_pdf = path
        .extension()
        .map(|e| e.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false);

    if is_pdf {
        pdf_extract::extract_text(path)
            .with_context(|| format!("PDF extraction failed: {}", path.display()))
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read document: {}", path.display()))
    }
}
