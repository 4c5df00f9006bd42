//! Azure AI Search REST client

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;

use pdfchat_core::{Error, IndexDefinition, Result, SearchHit, SearchService, UploadOutcome};

use crate::config::SearchConfig;

/// Azure AI Search client authenticated with an admin key
pub struct AzureSearchClient {
    config: SearchConfig,
    client: Client,
}

#[derive(Deserialize)]
struct IndexName {
    name: String,
}

#[derive(Deserialize)]
struct IndexList {
    value: Vec<IndexName>,
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    search: &'a str,
    top: usize,
}

#[derive(Deserialize)]
struct ValueList {
    value: Vec<Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IndexingResult {
    key: String,
    status: bool,
    status_code: u16,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Deserialize)]
struct IndexingResponse {
    value: Vec<IndexingResult>,
}

impl AzureSearchClient {
    /// Create a new search client from configuration
    pub fn new(config: SearchConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| Error::Network(e.to_string()))?;

        Ok(Self { config, client })
    }

    /// Build a REST URL under the service endpoint
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}?api-version={}",
            self.config.endpoint,
            path.trim_start_matches('/'),
            self.config.api_version
        )
    }

    fn request(&self, method: Method, url: String) -> RequestBuilder {
        self.client
            .request(method, url)
            .header("api-key", &self.config.api_key)
            .header("Accept", "application/json")
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response> {
        builder.send().await.map_err(|e| Error::Network(e.to_string()))
    }
}

/// Turn a non-success response into a search error carrying the service message
async fn ensure_success(response: Response, action: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    Err(Error::Search(format!(
        "{action} failed with status {status}: {}",
        service_message(&body)
    )))
}

/// Extract `error.message` from an OData error body, or return the body as is
fn service_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}

/// Wrap documents in an upload batch
fn upload_batch(documents: Vec<Value>) -> Result<Value> {
    let actions = documents
        .into_iter()
        .map(|document| match document {
            Value::Object(mut fields) => {
                fields.insert("@search.action".to_string(), Value::from("upload"));
                Ok(Value::Object(fields))
            }
            other => Err(Error::InvalidInput(format!(
                "documents must be JSON objects, got {other}"
            ))),
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(serde_json::json!({ "value": actions }))
}

/// Split search results into scores and plain documents
fn search_hits(results: Vec<Value>) -> Vec<SearchHit> {
    results
        .into_iter()
        .filter_map(|result| match result {
            Value::Object(fields) => {
                let score = fields
                    .get("@search.score")
                    .and_then(Value::as_f64)
                    .unwrap_or(0.0) as f32;
                let document: Map<String, Value> = fields
                    .into_iter()
                    .filter(|(k, _)| !k.starts_with("@search."))
                    .collect();
                Some(SearchHit {
                    score,
                    document: Value::Object(document),
                })
            }
            _ => None,
        })
        .collect()
}

#[async_trait]
impl SearchService for AzureSearchClient {
    async fn index_exists(&self, name: &str) -> Result<bool> {
        let url = self.url(&format!("indexes/{name}"));
        let response = self.send(self.request(Method::GET, url)).await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        ensure_success(response, &format!("Get index '{name}'")).await?;
        Ok(true)
    }

    async fn create_index(&self, definition: &IndexDefinition) -> Result<()> {
        let url = self.url("indexes");
        let response = self
            .send(self.request(Method::POST, url).json(definition))
            .await?;
        ensure_success(response, &format!("Create index '{}'", definition.name)).await?;

        tracing::info!(index = %definition.name, fields = definition.fields.len(), "search index created");
        Ok(())
    }

    async fn delete_index(&self, name: &str) -> Result<()> {
        if name.trim().is_empty() {
            return Err(Error::InvalidInput("index name is empty".to_string()));
        }

        let url = self.url(&format!("indexes/{name}"));
        let response = self.send(self.request(Method::DELETE, url)).await?;
        ensure_success(response, &format!("Delete index '{name}'")).await?;

        tracing::info!(index = %name, "search index deleted");
        Ok(())
    }

    async fn list_indexes(&self) -> Result<Vec<String>> {
        let url = format!("{}&$select=name", self.url("indexes"));
        let response = self.send(self.request(Method::GET, url)).await?;
        let response = ensure_success(response, "List indexes").await?;

        let list: IndexList = response
            .json()
            .await
            .map_err(|e| Error::Serialization(e.to_string()))?;
        Ok(list.value.into_iter().map(|i| i.name).collect())
    }

    async fn upload_documents(
        &self,
        index: &str,
        documents: Vec<Value>,
    ) -> Result<Vec<UploadOutcome>> {
        let count = documents.len();
        let body = upload_batch(documents)?;
        let url = self.url(&format!("indexes/{index}/docs/index"));
        let response = self
            .send(self.request(Method::POST, url).json(&body))
            .await?;
        let response = ensure_success(response, &format!("Upload to index '{index}'")).await?;

        let results: IndexingResponse = response
            .json()
            .await
            .map_err(|e| Error::Serialization(e.to_string()))?;

        tracing::debug!(index = %index, count, "documents uploaded");
        Ok(results
            .value
            .into_iter()
            .map(|r| UploadOutcome {
                key: r.key,
                succeeded: r.status,
                status_code: r.status_code,
                error_message: r.error_message,
            })
            .collect())
    }

    async fn search(&self, index: &str, query: &str, top: usize) -> Result<Vec<SearchHit>> {
        let url = self.url(&format!("indexes/{index}/docs/search"));
        let request = SearchRequest { search: query, top };
        let response = self
            .send(self.request(Method::POST, url).json(&request))
            .await?;
        let response = ensure_success(response, &format!("Search index '{index}'")).await?;

        let results: ValueList = response
            .json()
            .await
            .map_err(|e| Error::Serialization(e.to_string()))?;
        Ok(search_hits(results.value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn client() -> AzureSearchClient {
        AzureSearchClient::new(SearchConfig::new("https://demo.search.windows.net/", "key")).unwrap()
    }

    #[test]
    fn test_url() {
        let client = client();
        assert_eq!(
            client.url("indexes/pdfs/docs/search"),
            "https://demo.search.windows.net/indexes/pdfs/docs/search?api-version=2024-07-01"
        );
        assert_eq!(
            client.url("/indexes"),
            "https://demo.search.windows.net/indexes?api-version=2024-07-01"
        );
    }

    #[test]
    fn test_upload_batch_marks_upload_action() {
        let batch = upload_batch(vec![json!({"id": "a"}), json!({"id": "b"})]).unwrap();
        assert_eq!(batch["value"][0]["@search.action"], "upload");
        assert_eq!(batch["value"][1]["id"], "b");

        assert!(upload_batch(vec![json!("not an object")]).is_err());
    }

    #[test]
    fn test_search_hits_strip_annotations() {
        let hits = search_hits(vec![
            json!({"@search.score": 2.5, "@search.rerankerScore": 1.0, "title": "Guide", "content": "text"}),
            json!("ignored"),
        ]);

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].score, 2.5);
        assert_eq!(hits[0].field_str("title"), "Guide");
        assert!(hits[0].document.get("@search.rerankerScore").is_none());
    }

    #[test]
    fn test_service_message() {
        let body = r#"{"error":{"code":"","message":"No index with the name 'pdfs' was found in the service 'demo'."}}"#;
        assert_eq!(
            service_message(body),
            "No index with the name 'pdfs' was found in the service 'demo'."
        );
        assert_eq!(service_message("plain"), "plain");
    }

    #[tokio::test]
    async fn test_delete_requires_name() {
        let err = client().delete_index("  ").await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }
}
