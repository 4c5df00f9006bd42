//! Search index schema types
//!
//! These mirror the index definition JSON of the search service REST API, so a
//! definition built here serializes straight into a create-index request.

use serde::{Deserialize, Serialize};

/// Embedding model whose vectors are 3072 wide; every other model is assumed to emit 1536
pub const LARGE_EMBEDDING_MODEL: &str = "text-embedding-3-large";

/// Vector width produced by an embedding model
pub fn embedding_dimensions(model: &str) -> u32 {
    if model == LARGE_EMBEDDING_MODEL { 3072 } else { 1536 }
}

/// Field data types used by pdfchat indexes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldType {
    #[serde(rename = "Edm.String")]
    String,
    #[serde(rename = "Edm.Double")]
    Double,
    #[serde(rename = "Edm.Int32")]
    Int32,
    #[serde(rename = "Collection(Edm.Single)")]
    SingleCollection,
}

/// One field of an index definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub key: bool,
    #[serde(default)]
    pub searchable: bool,
    #[serde(default)]
    pub filterable: bool,
    #[serde(default)]
    pub sortable: bool,
    #[serde(default)]
    pub facetable: bool,
    #[serde(default = "default_retrievable")]
    pub retrievable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector_search_profile: Option<String>,
}

fn default_retrievable() -> bool {
    true
}

impl SearchField {
    /// Retrievable, non-searchable field
    pub fn simple(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            key: false,
            searchable: false,
            filterable: false,
            sortable: false,
            facetable: false,
            retrievable: true,
            dimensions: None,
            vector_search_profile: None,
        }
    }

    /// Full-text searchable field
    pub fn searchable(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            searchable: true,
            ..Self::simple(name, field_type)
        }
    }

    /// Vector field bound to a vector search profile
    pub fn vector(name: impl Into<String>, dimensions: u32, profile: impl Into<String>) -> Self {
        Self {
            searchable: true,
            dimensions: Some(dimensions),
            vector_search_profile: Some(profile.into()),
            ..Self::simple(name, FieldType::SingleCollection)
        }
    }

    /// Mark this field as the document key
    pub fn as_key(mut self) -> Self {
        self.key = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SemanticField {
    pub field_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrioritizedFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_field: Option<SemanticField>,
    #[serde(default)]
    pub prioritized_content_fields: Vec<SemanticField>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SemanticConfiguration {
    pub name: String,
    pub prioritized_fields: PrioritizedFields,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticSearch {
    pub configurations: Vec<SemanticConfiguration>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VectorMetric {
    Cosine,
    Euclidean,
    DotProduct,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AlgorithmKind {
    Hnsw,
    ExhaustiveKnn,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HnswParameters {
    pub m: u32,
    pub ef_construction: u32,
    pub ef_search: u32,
    pub metric: VectorMetric,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExhaustiveKnnParameters {
    pub metric: VectorMetric,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorAlgorithm {
    pub name: String,
    pub kind: AlgorithmKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hnsw_parameters: Option<HnswParameters>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exhaustive_knn_parameters: Option<ExhaustiveKnnParameters>,
}

impl VectorAlgorithm {
    pub fn hnsw(name: impl Into<String>, parameters: HnswParameters) -> Self {
        Self {
            name: name.into(),
            kind: AlgorithmKind::Hnsw,
            hnsw_parameters: Some(parameters),
            exhaustive_knn_parameters: None,
        }
    }

    pub fn exhaustive_knn(name: impl Into<String>, metric: VectorMetric) -> Self {
        Self {
            name: name.into(),
            kind: AlgorithmKind::ExhaustiveKnn,
            hnsw_parameters: None,
            exhaustive_knn_parameters: Some(ExhaustiveKnnParameters { metric }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorProfile {
    pub name: String,
    pub algorithm: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorSearch {
    pub algorithms: Vec<VectorAlgorithm>,
    pub profiles: Vec<VectorProfile>,
}

/// A complete index definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexDefinition {
    pub name: String,
    pub fields: Vec<SearchField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantic: Option<SemanticSearch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector_search: Option<VectorSearch>,
}

impl IndexDefinition {
    /// Schema of the index holding uploaded PDF documents.
    ///
    /// The vector width follows the embedding model so uploads are accepted.
    pub fn pdf_documents(name: impl Into<String>, embeddings_model: &str) -> Self {
        let dimensions = embedding_dimensions(embeddings_model);

        let fields = vec![
            SearchField::simple("id", FieldType::String).as_key(),
            SearchField::searchable("content", FieldType::String),
            SearchField::simple("filepath", FieldType::String),
            SearchField::searchable("title", FieldType::String),
            SearchField::simple("url", FieldType::String),
            SearchField::vector("contentVector", dimensions, "myHnswProfile"),
        ];

        let semantic = SemanticSearch {
            configurations: vec![SemanticConfiguration {
                name: "default".to_string(),
                prioritized_fields: PrioritizedFields {
                    title_field: Some(SemanticField {
                        field_name: "title".to_string(),
                    }),
                    prioritized_content_fields: vec![SemanticField {
                        field_name: "content".to_string(),
                    }],
                },
            }],
        };

        let vector_search = VectorSearch {
            algorithms: vec![
                VectorAlgorithm::hnsw(
                    "myHnsw",
                    HnswParameters {
                        m: 4,
                        ef_construction: 1000,
                        ef_search: 1000,
                        metric: VectorMetric::Cosine,
                    },
                ),
                VectorAlgorithm::exhaustive_knn("myExhaustiveKnn", VectorMetric::Cosine),
            ],
            profiles: vec![
                VectorProfile {
                    name: "myHnswProfile".to_string(),
                    algorithm: "myHnsw".to_string(),
                },
                VectorProfile {
                    name: "myExhaustiveKnnProfile".to_string(),
                    algorithm: "myExhaustiveKnn".to_string(),
                },
            ],
        };

        Self {
            name: name.into(),
            fields,
            semantic: Some(semantic),
            vector_search: Some(vector_search),
        }
    }

    /// Schema of the product catalog index loaded from CSV
    pub fn products(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: vec![
                SearchField::simple("id", FieldType::String).as_key(),
                SearchField::searchable("name", FieldType::String),
                SearchField::simple("price", FieldType::Double),
                SearchField::searchable("category", FieldType::String),
                SearchField::searchable("brand", FieldType::String),
                SearchField::searchable("description", FieldType::String),
                SearchField::simple("quantity", FieldType::Int32),
            ],
            semantic: None,
            vector_search: None,
        }
    }

    /// Name of the key field, if the definition has one
    pub fn key_field(&self) -> Option<&str> {
        self.fields.iter().find(|f| f.key).map(|f| f.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use insta::assert_yaml_snapshot;

    #[test]
    fn test_embedding_dimensions() {
        assert_eq!(embedding_dimensions("text-embedding-3-large"), 3072);
        assert_eq!(embedding_dimensions("text-embedding-3-small"), 1536);
        assert_eq!(embedding_dimensions("text-embedding-ada-002"), 1536);
    }

    #[test]
    fn test_pdf_definition_vector_field_follows_model() {
        let large = IndexDefinition::pdf_documents("pdfs", "text-embedding-3-large");
        let vector = large.fields.iter().find(|f| f.name == "contentVector").unwrap();
        assert_eq!(vector.dimensions, Some(3072));
        assert_eq!(vector.vector_search_profile.as_deref(), Some("myHnswProfile"));
        assert_eq!(vector.field_type, FieldType::SingleCollection);

        let small = IndexDefinition::pdf_documents("pdfs", "text-embedding-ada-002");
        let vector = small.fields.iter().find(|f| f.name == "contentVector").unwrap();
        assert_eq!(vector.dimensions, Some(1536));
    }

    #[test]
    fn test_pdf_definition_json_shape() {
        let definition = IndexDefinition::pdf_documents("pdfs", "text-embedding-3-large");
        let json = serde_json::to_value(&definition).unwrap();

        assert_eq!(json["name"], "pdfs");
        assert_eq!(json["fields"][0]["type"], "Edm.String");
        assert_eq!(json["fields"][0]["key"], true);
        assert_eq!(json["fields"][5]["type"], "Collection(Edm.Single)");
        assert_eq!(json["fields"][5]["vectorSearchProfile"], "myHnswProfile");
        assert_eq!(
            json["semantic"]["configurations"][0]["prioritizedFields"]["titleField"]["fieldName"],
            "title"
        );
        assert_eq!(json["vectorSearch"]["algorithms"][0]["kind"], "hnsw");
        assert_eq!(json["vectorSearch"]["algorithms"][0]["hnswParameters"]["efConstruction"], 1000);
        assert_eq!(json["vectorSearch"]["algorithms"][1]["kind"], "exhaustiveKnn");
        assert_eq!(json["vectorSearch"]["profiles"][1]["algorithm"], "myExhaustiveKnn");
        assert!(json["fields"][0].get("dimensions").is_none());
    }

    #[test]
    fn test_product_definition_snapshot() {
        let definition = IndexDefinition::products("products");
        let summary: Vec<String> = definition
            .fields
            .iter()
            .map(|f| {
                let mut line = format!("{} {}", f.name, serde_json::to_value(f.field_type).unwrap().as_str().unwrap());
                if f.key {
                    line.push_str(" key");
                }
                if f.searchable {
                    line.push_str(" searchable");
                }
                line
            })
            .collect();

        assert_yaml_snapshot!(summary, @r###"
        - id Edm.String key
        - name Edm.String searchable
        - price Edm.Double
        - category Edm.String searchable
        - brand Edm.String searchable
        - description Edm.String searchable
        - quantity Edm.Int32
        "###);
        assert!(definition.vector_search.is_none());
        assert_eq!(definition.key_field(), Some("id"));
    }
}
