//! Product catalog loading

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

use pdfchat_core::{Backends, Error, IndexDefinition, Result};

use crate::indexer::{ensure_uploaded, recreate_index};

/// Default location of the sample catalog
pub const DEFAULT_PRODUCTS_CSV: &str = "assets/products.csv";

/// One product row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub price: f64,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub brand: String,
    #[serde(default)]
    pub description: String,
    pub quantity: i32,
}

/// Read every product from a CSV file with a header row
pub fn read_products(path: &Path) -> Result<Vec<Product>> {
    let file = std::fs::File::open(path)
        .map_err(|e| Error::InvalidInput(format!("cannot open {}: {}", path.display(), e)))?;
    parse_products(file, path)
}

fn parse_products<R: std::io::Read>(reader: R, path: &Path) -> Result<Vec<Product>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    reader
        .deserialize()
        .enumerate()
        .map(|(row, result)| {
            result.map_err(|e| {
                Error::Serialization(format!("{} row {}: {}", path.display(), row + 1, e))
            })
        })
        .collect()
}

/// Loads a product CSV into its own search index
pub struct ProductLoader {
    backends: Arc<dyn Backends>,
}

impl ProductLoader {
    pub fn new(backends: Arc<dyn Backends>) -> Self {
        Self { backends }
    }

    /// Recreate `index_name` with the product schema and upload every row.
    ///
    /// Returns the number of products uploaded.
    pub async fn load(&self, index_name: &str, csv_file: &Path) -> Result<usize> {
        if index_name.trim().is_empty() {
            return Err(Error::InvalidInput("index name must not be empty".to_string()));
        }

        let products = read_products(csv_file)?;
        let search = self.backends.search()?;
        recreate_index(search.as_ref(), &IndexDefinition::products(index_name)).await?;

        let documents = products
            .iter()
            .map(serde_json::to_value)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let outcomes = search.upload_documents(index_name, documents).await?;
        ensure_uploaded(index_name, &outcomes)?;

        tracing::info!(index = index_name, count = products.len(), "uploaded products");
        Ok(products.len())
    }
}
