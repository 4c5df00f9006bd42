//! Text extraction from uploaded documents

use std::path::Path;

use pdfchat_core::{Error, Result};

/// Trait for turning a document file into plain text
pub trait TextExtractor: Send + Sync {
    /// Extract the full text of the document at `path`
    fn extract(&self, path: &Path) -> Result<String>;
}

/// PDF text extraction, concatenating every page in order
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfTextExtractor;

impl TextExtractor for PdfTextExtractor {
    fn extract(&self, path: &Path) -> Result<String> {
        if !path.exists() {
            return Err(Error::Extraction(format!("{} does not exist", path.display())));
        }

        // pdf-extract panics on some malformed files instead of returning an error
        let text = std::panic::catch_unwind(|| pdf_extract::extract_text(path))
            .map_err(|_| Error::Extraction(format!("{} could not be parsed", path.display())))?
            .map_err(|e| Error::Extraction(format!("{}: {}", path.display(), e)))?;

        if text.trim().is_empty() {
            return Err(Error::Extraction(format!(
                "{} contains no extractable text",
                path.display()
            )));
        }

        tracing::debug!(path = %path.display(), chars = text.len(), "pdf text extracted");
        Ok(text)
    }
}
