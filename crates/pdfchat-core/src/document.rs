//! Document records stored in the search index

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Fallback identifier when a file name has no usable characters
const FALLBACK_ID: &str = "document";

/// The single record uploaded for an indexed PDF
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: String,
    pub content: String,
    pub filepath: String,
    pub title: String,
    pub url: String,
    #[serde(rename = "contentVector")]
    pub content_vector: Vec<f32>,
}

impl DocumentRecord {
    /// Build the record for a PDF at `path` with its extracted text and embedding
    pub fn for_pdf(path: &Path, content: String, content_vector: Vec<f32>) -> Self {
        let id = document_id(path);
        Self {
            url: format!("/documents/{}", id.to_lowercase()),
            title: id.clone(),
            filepath: path.display().to_string(),
            id,
            content,
            content_vector,
        }
    }
}

/// Derive a search key from a file name.
///
/// Keys may only hold letters, digits, `_`, `-` and `=`.
pub fn document_id(path: &Path) -> String {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let split = file_name.len().saturating_sub(4);
    let stem = if file_name.is_char_boundary(split) && file_name[split..].eq_ignore_ascii_case(".pdf") {
        &file_name[..split]
    } else {
        file_name.as_str()
    };

    let id: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '=') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if id.is_empty() {
        FALLBACK_ID.to_string()
    } else {
        id
    }
}

/// A retrieved passage handed to the grounding prompt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDocument {
    pub title: String,
    pub content: String,
}
