//! Index removal and listing

use std::sync::Arc;

use pdfchat_core::{Backends, Error, Result};

/// Deletes and lists indexes on the search service
pub struct IndexRemover {
    backends: Arc<dyn Backends>,
}

impl IndexRemover {
    pub fn new(backends: Arc<dyn Backends>) -> Self {
        Self { backends }
    }

    /// Delete the named index
    pub async fn delete(&self, name: &str) -> Result<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidInput("index name must not be empty".to_string()));
        }

        self.backends.search()?.delete_index(name).await?;
        tracing::info!(index = name, "deleted index");
        Ok(())
    }

    /// Names of every index on the service
    pub async fn list(&self) -> Result<Vec<String>> {
        self.backends.search()?.list_indexes().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryBackends;
    use pdfchat_core::{IndexDefinition, SearchService};

    #[tokio::test]
    async fn test_delete_and_list() {
        let backends = Arc::new(MemoryBackends::new("pdfs", "unused"));
        for name in ["pdfs", "products"] {
            backends
                .search
                .create_index(&IndexDefinition::products(name))
                .await
                .unwrap();
        }

        let remover = IndexRemover::new(backends.clone());
        assert_eq!(remover.list().await.unwrap(), vec!["pdfs", "products"]);

        remover.delete("pdfs").await.unwrap();
        assert_eq!(remover.list().await.unwrap(), vec!["products"]);
    }

    #[tokio::test]
    async fn test_delete_requires_a_name() {
        let remover = IndexRemover::new(Arc::new(MemoryBackends::new("pdfs", "unused")));
        let err = remover.delete("  ").await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_delete_missing_index_fails() {
        let remover = IndexRemover::new(Arc::new(MemoryBackends::new("pdfs", "unused")));
        assert!(matches!(remover.delete("pdfs").await, Err(Error::Search(_))));
    }
}
