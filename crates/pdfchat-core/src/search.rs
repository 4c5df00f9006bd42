//! Search service trait and types

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{IndexDefinition, Result};

/// One hit returned by a search query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub score: f32,
    pub document: serde_json::Value,
}

impl SearchHit {
    /// String value of a document field, empty when absent
    pub fn field_str(&self, name: &str) -> &str {
        self.document
            .get(name)
            .and_then(|v| v.as_str())
            .unwrap_or("")
    }
}

/// Per-document outcome of an upload request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadOutcome {
    pub key: String,
    pub succeeded: bool,
    pub status_code: u16,
    pub error_message: Option<String>,
}

/// Trait for managed search services
///
/// Covers the index administration and document operations pdfchat performs.
/// Uploads use upsert semantics: a document whose key already exists is replaced.
#[async_trait]
pub trait SearchService: Send + Sync {
    /// Check whether an index with this name exists
    async fn index_exists(&self, name: &str) -> Result<bool>;

    /// Create an index from its definition
    async fn create_index(&self, definition: &IndexDefinition) -> Result<()>;

    /// Delete an index and every document in it
    async fn delete_index(&self, name: &str) -> Result<()>;

    /// List the names of all indexes
    async fn list_indexes(&self) -> Result<Vec<String>>;

    /// Upload (upsert) documents into an index
    async fn upload_documents(
        &self,
        index: &str,
        documents: Vec<serde_json::Value>,
    ) -> Result<Vec<UploadOutcome>>;

    /// Full-text search returning at most `top` hits, best first
    async fn search(&self, index: &str, query: &str, top: usize) -> Result<Vec<SearchHit>>;
}
