//! Building the knowledge base index from a PDF

use std::path::Path;
use std::sync::Arc;

use pdfchat_core::{
    Backends, DocumentRecord, Error, IndexDefinition, Result, SearchService, UploadOutcome,
};

use crate::TextExtractor;

/// Drop any index of the same name and create `definition` in its place.
///
/// Failures while probing or deleting the old index are logged and ignored;
/// only the creation itself must succeed.
pub(crate) async fn recreate_index(
    search: &dyn SearchService,
    definition: &IndexDefinition,
) -> Result<()> {
    let name = definition.name.as_str();
    match search.index_exists(name).await {
        Ok(true) => {
            tracing::info!(index = name, "deleting existing index");
            if let Err(e) = search.delete_index(name).await {
                tracing::warn!(index = name, error = %e, "failed to delete existing index");
            }
        }
        Ok(false) => {}
        Err(e) => tracing::warn!(index = name, error = %e, "failed to check for existing index"),
    }

    search.create_index(definition).await?;
    tracing::info!(index = name, fields = definition.fields.len(), "created index");
    Ok(())
}

/// Turn per-document rejections into an error naming the first one
pub(crate) fn ensure_uploaded(index: &str, outcomes: &[UploadOutcome]) -> Result<()> {
    let failed: Vec<&UploadOutcome> = outcomes.iter().filter(|o| !o.succeeded).collect();
    match failed.first() {
        None => Ok(()),
        Some(first) => Err(Error::Search(format!(
            "{} of {} documents were rejected by index '{}'; '{}' failed with status {}: {}",
            failed.len(),
            outcomes.len(),
            index,
            first.key,
            first.status_code,
            first.error_message.as_deref().unwrap_or("no error message"),
        ))),
    }
}

/// Indexes one PDF as a single searchable document
pub struct PdfIndexer {
    backends: Arc<dyn Backends>,
    extractor: Arc<dyn TextExtractor>,
}

impl PdfIndexer {
    pub fn new(backends: Arc<dyn Backends>, extractor: Arc<dyn TextExtractor>) -> Self {
        Self {
            backends,
            extractor,
        }
    }

    /// Recreate `index_name` and upload the text and embedding of the PDF at `path`
    pub async fn index_pdf_document(&self, index_name: &str, path: &Path) -> Result<DocumentRecord> {
        if index_name.trim().is_empty() {
            return Err(Error::InvalidInput("index name must not be empty".to_string()));
        }

        let search = self.backends.search()?;
        let embeddings = self.backends.embedding_model()?;

        let definition = IndexDefinition::pdf_documents(index_name, embeddings.model_id());
        recreate_index(search.as_ref(), &definition).await?;

        let content = self.extractor.extract(path)?;
        tracing::info!(path = %path.display(), chars = content.chars().count(), "extracted pdf text");

        let vector = embeddings.embed(&content).await?;
        let record = DocumentRecord::for_pdf(path, content, vector);

        let outcomes = search
            .upload_documents(index_name, vec![serde_json::to_value(&record)?])
            .await?;
        ensure_uploaded(index_name, &outcomes)?;

        tracing::info!(index = index_name, id = %record.id, "uploaded document");
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{InMemorySearchService, MemoryBackends, PlainTextExtractor};
    use insta::assert_yaml_snapshot;

    fn write_pdf(dir: &tempfile::TempDir, name: &str, text: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, text).unwrap();
        path
    }

    #[tokio::test]
    async fn test_index_pdf_document_creates_schema_and_uploads_record() {
        let backends = Arc::new(MemoryBackends::new("pdfs", "unused"));
        let indexer = PdfIndexer::new(backends.clone(), Arc::new(PlainTextExtractor));

        let dir = tempfile::tempdir().unwrap();
        let path = write_pdf(&dir, "Essay Guide.PDF", "Write a clear thesis.");

        let record = indexer.index_pdf_document("pdfs", &path).await.unwrap();
        assert_eq!(record.id, "Essay_Guide");
        assert_eq!(record.content_vector.len(), 8);

        let definition = backends.search.definition("pdfs").unwrap();
        assert_eq!(definition.key_field(), Some("id"));

        let stored = backends.search.document("pdfs", "Essay_Guide").unwrap();
        assert_yaml_snapshot!(stored, {
            ".filepath" => "[filepath]",
            ".contentVector" => "[vector]",
        }, @r###"
        content: Write a clear thesis.
        contentVector: "[vector]"
        filepath: "[filepath]"
        id: Essay_Guide
        title: Essay_Guide
        url: /documents/essay_guide
        "###);
    }

    #[tokio::test]
    async fn test_extraction_failure_leaves_empty_index() {
        let backends = Arc::new(MemoryBackends::new("pdfs", "unused"));
        let indexer = PdfIndexer::new(backends.clone(), Arc::new(PlainTextExtractor));

        let dir = tempfile::tempdir().unwrap();
        let path = write_pdf(&dir, "blank.pdf", "   ");

        let err = indexer.index_pdf_document("pdfs", &path).await.unwrap_err();
        assert!(matches!(err, Error::Extraction(_)));
        assert_eq!(backends.search.document_count("pdfs"), Some(0));
    }

    #[tokio::test]
    async fn test_recreate_index_replaces_existing_index() {
        let search = InMemorySearchService::new();
        let definition = IndexDefinition::products("products");
        search.create_index(&definition).await.unwrap();
        search
            .upload_documents("products", vec![serde_json::json!({"id": "1"})])
            .await
            .unwrap();

        recreate_index(&search, &definition).await.unwrap();
        assert_eq!(search.document_count("products"), Some(0));
    }

    #[test]
    fn test_ensure_uploaded_reports_rejection() {
        let outcomes = vec![
            UploadOutcome {
                key: "a".to_string(),
                succeeded: true,
                status_code: 201,
                error_message: None,
            },
            UploadOutcome {
                key: "b".to_string(),
                succeeded: false,
                status_code: 400,
                error_message: Some("vector has the wrong dimensions".to_string()),
            },
        ];
        let err = ensure_uploaded("pdfs", &outcomes).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Search service error: 1 of 2 documents were rejected by index 'pdfs'; 'b' failed with status 400: vector has the wrong dimensions"
        );
        assert!(ensure_uploaded("pdfs", &outcomes[..1]).is_ok());
    }
}
