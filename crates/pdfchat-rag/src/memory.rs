//! In-process stand-ins for the external services
//!
//! These back the test suites of the rag, cli and web crates and let the whole
//! flow run without network access. Search scoring is a simple word-overlap
//! ratio; it only needs to rank documents plausibly.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::{Arc, Mutex, RwLock};

use pdfchat_core::{
    AccessToken, Authenticator, Backends, ChatCompletion, ChatMessage, ChatModel,
    CompletionParameters, EmbeddingModel, Error, IndexDefinition, Result, SearchHit,
    SearchService, UploadOutcome,
};

use crate::TextExtractor;

struct MemoryIndex {
    definition: IndexDefinition,
    documents: BTreeMap<String, Value>,
}

/// Search service keeping every index in memory
#[derive(Default)]
pub struct InMemorySearchService {
    indexes: RwLock<HashMap<String, MemoryIndex>>,
}

impl InMemorySearchService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents in an index, `None` when the index does not exist
    pub fn document_count(&self, index: &str) -> Option<usize> {
        let indexes = self.indexes.read().ok()?;
        indexes.get(index).map(|i| i.documents.len())
    }

    /// A stored document by key
    pub fn document(&self, index: &str, key: &str) -> Option<Value> {
        let indexes = self.indexes.read().ok()?;
        indexes.get(index)?.documents.get(key).cloned()
    }

    /// Definition an index was created with
    pub fn definition(&self, index: &str) -> Option<IndexDefinition> {
        let indexes = self.indexes.read().ok()?;
        indexes.get(index).map(|i| i.definition.clone())
    }

    /// Share of query words found in the content, 0.0 to 1.0
    fn text_similarity(query: &str, content: &str) -> f32 {
        let query_lower = query.to_lowercase();
        let content_lower = content.to_lowercase();

        let query_words: Vec<&str> = query_lower.split_whitespace().collect();
        if query_words.is_empty() {
            return 0.0;
        }

        let matches = query_words
            .iter()
            .filter(|word| content_lower.contains(*word))
            .count();
        matches as f32 / query_words.len() as f32
    }

    fn searchable_text(definition: &IndexDefinition, document: &Value) -> String {
        definition
            .fields
            .iter()
            .filter(|f| f.searchable && f.dimensions.is_none())
            .filter_map(|f| document.get(&f.name).and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn lock_error(e: impl std::fmt::Display) -> Error {
    Error::Other(format!("Lock error: {}", e))
}

fn not_found(name: &str) -> Error {
    Error::Search(format!("404 Not Found: index '{}' was not found", name))
}

#[async_trait]
impl SearchService for InMemorySearchService {
    async fn index_exists(&self, name: &str) -> Result<bool> {
        let indexes = self.indexes.read().map_err(lock_error)?;
        Ok(indexes.contains_key(name))
    }

    async fn create_index(&self, definition: &IndexDefinition) -> Result<()> {
        let mut indexes = self.indexes.write().map_err(lock_error)?;
        if indexes.contains_key(&definition.name) {
            return Err(Error::Search(format!(
                "409 Conflict: index '{}' already exists",
                definition.name
            )));
        }
        indexes.insert(
            definition.name.clone(),
            MemoryIndex {
                definition: definition.clone(),
                documents: BTreeMap::new(),
            },
        );
        Ok(())
    }

    async fn delete_index(&self, name: &str) -> Result<()> {
        if name.trim().is_empty() {
            return Err(Error::InvalidInput("index name must not be empty".to_string()));
        }
        let mut indexes = self.indexes.write().map_err(lock_error)?;
        indexes.remove(name).map(|_| ()).ok_or_else(|| not_found(name))
    }

    async fn list_indexes(&self) -> Result<Vec<String>> {
        let indexes = self.indexes.read().map_err(lock_error)?;
        let mut names: Vec<String> = indexes.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn upload_documents(
        &self,
        index: &str,
        documents: Vec<Value>,
    ) -> Result<Vec<UploadOutcome>> {
        let mut indexes = self.indexes.write().map_err(lock_error)?;
        let target = indexes.get_mut(index).ok_or_else(|| not_found(index))?;
        let key_field = target.definition.key_field().unwrap_or("id").to_string();

        let outcomes = documents
            .into_iter()
            .map(|document| match document.get(&key_field).and_then(Value::as_str) {
                Some(key) if !key.is_empty() => {
                    let key = key.to_string();
                    target.documents.insert(key.clone(), document);
                    UploadOutcome {
                        key,
                        succeeded: true,
                        status_code: 200,
                        error_message: None,
                    }
                }
                _ => UploadOutcome {
                    key: String::new(),
                    succeeded: false,
                    status_code: 400,
                    error_message: Some(format!("document is missing key field '{}'", key_field)),
                },
            })
            .collect();

        Ok(outcomes)
    }

    async fn search(&self, index: &str, query: &str, top: usize) -> Result<Vec<SearchHit>> {
        let indexes = self.indexes.read().map_err(lock_error)?;
        let target = indexes.get(index).ok_or_else(|| not_found(index))?;
        let match_all = query.trim().is_empty() || query.trim() == "*";

        let mut hits: Vec<SearchHit> = target
            .documents
            .values()
            .map(|document| {
                let score = if match_all {
                    1.0
                } else {
                    Self::text_similarity(query, &Self::searchable_text(&target.definition, document))
                };
                SearchHit {
                    score,
                    document: document.clone(),
                }
            })
            .filter(|hit| hit.score > 0.0)
            .collect();

        // stable sort keeps key order among equal scores
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(top);
        Ok(hits)
    }
}

/// Chat model that replies from a script and records every request
pub struct ScriptedChatModel {
    model_id: String,
    reply: std::result::Result<String, String>,
    requests: Mutex<Vec<(Vec<ChatMessage>, CompletionParameters)>>,
}

impl ScriptedChatModel {
    /// Always answer with `reply`
    pub fn replying(reply: impl Into<String>) -> Self {
        Self {
            model_id: "scripted-chat".to_string(),
            reply: Ok(reply.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Fail every request with an inference error
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            model_id: "scripted-chat".to_string(),
            reply: Err(message.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Messages and parameters of every request so far
    pub fn requests(&self) -> Vec<(Vec<ChatMessage>, CompletionParameters)> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ChatModel for ScriptedChatModel {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        parameters: &CompletionParameters,
    ) -> Result<ChatCompletion> {
        self.requests
            .lock()
            .map_err(lock_error)?
            .push((messages.to_vec(), parameters.clone()));

        match &self.reply {
            Ok(content) => Ok(ChatCompletion {
                content: content.clone(),
                model_id: self.model_id.clone(),
                finish_reason: Some("stop".to_string()),
                usage: None,
            }),
            Err(message) => Err(Error::Inference(message.clone())),
        }
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

/// Embedding model returning a fixed-width vector derived from the input length
pub struct FixedEmbeddingModel {
    model_id: String,
    dimensions: usize,
}

impl FixedEmbeddingModel {
    pub fn new(model_id: impl Into<String>, dimensions: usize) -> Self {
        Self {
            model_id: model_id.into(),
            dimensions,
        }
    }
}

#[async_trait]
impl EmbeddingModel for FixedEmbeddingModel {
    async fn embed(&self, input: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0; self.dimensions];
        if let Some(first) = vector.first_mut() {
            *first = input.len() as f32;
        }
        Ok(vector)
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

/// Extractor reading the file as UTF-8 text, for fixtures that are not real PDFs
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn extract(&self, path: &Path) -> Result<String> {
        let text = std::fs::read_to_string(path)?;
        if text.trim().is_empty() {
            return Err(Error::Extraction(format!("{} contains no text", path.display())));
        }
        Ok(text)
    }
}

/// Authenticator that succeeds or fails without contacting anything
pub struct StaticAuthenticator {
    principal: String,
    failure: Option<String>,
}

impl StaticAuthenticator {
    pub fn accepting(principal: impl Into<String>) -> Self {
        Self {
            principal: principal.into(),
            failure: None,
        }
    }

    pub fn rejecting(principal: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            principal: principal.into(),
            failure: Some(reason.into()),
        }
    }
}

#[async_trait]
impl Authenticator for StaticAuthenticator {
    async fn authenticate(&self) -> Result<AccessToken> {
        match &self.failure {
            Some(reason) => Err(Error::Authentication(reason.clone())),
            None => Ok(AccessToken {
                token: "memory-token".to_string(),
                expires_at: Utc::now() + Duration::hours(1),
            }),
        }
    }

    fn principal(&self) -> &str {
        &self.principal
    }
}

/// `Backends` wiring the in-memory services together
///
/// An unset index name reports the same configuration error as the Azure
/// backends, so session behavior can be checked without environment variables.
pub struct MemoryBackends {
    pub search: Arc<InMemorySearchService>,
    pub chat: Arc<ScriptedChatModel>,
    pub evaluator: Arc<ScriptedChatModel>,
    pub embeddings: Arc<FixedEmbeddingModel>,
    pub authenticator: Arc<StaticAuthenticator>,
    pub index_name: Option<String>,
    pub product_index_name: Option<String>,
}

impl MemoryBackends {
    /// Backends with a configured knowledge base index and a fixed chat reply
    pub fn new(index_name: impl Into<String>, reply: impl Into<String>) -> Self {
        Self {
            search: Arc::new(InMemorySearchService::new()),
            chat: Arc::new(ScriptedChatModel::replying(reply)),
            evaluator: Arc::new(ScriptedChatModel::replying("Score: 5\nReason: fully grounded")),
            embeddings: Arc::new(FixedEmbeddingModel::new("text-embedding-3-small", 8)),
            authenticator: Arc::new(StaticAuthenticator::accepting("memory-principal")),
            index_name: Some(index_name.into()),
            product_index_name: Some("products".to_string()),
        }
    }

    /// Same as `new` but with no index name configured
    pub fn without_index(reply: impl Into<String>) -> Self {
        Self {
            index_name: None,
            ..Self::new("unused", reply)
        }
    }

    pub fn with_chat(mut self, chat: ScriptedChatModel) -> Self {
        self.chat = Arc::new(chat);
        self
    }

    pub fn with_evaluator(mut self, evaluator: ScriptedChatModel) -> Self {
        self.evaluator = Arc::new(evaluator);
        self
    }

    pub fn with_authenticator(mut self, authenticator: StaticAuthenticator) -> Self {
        self.authenticator = Arc::new(authenticator);
        self
    }
}

impl Backends for MemoryBackends {
    fn authenticator(&self) -> Result<Arc<dyn Authenticator>> {
        Ok(self.authenticator.clone())
    }

    fn search(&self) -> Result<Arc<dyn SearchService>> {
        Ok(self.search.clone())
    }

    fn chat_model(&self) -> Result<Arc<dyn ChatModel>> {
        Ok(self.chat.clone())
    }

    fn embedding_model(&self) -> Result<Arc<dyn EmbeddingModel>> {
        Ok(self.embeddings.clone())
    }

    fn evaluation_model(&self) -> Result<Arc<dyn ChatModel>> {
        Ok(self.evaluator.clone())
    }

    fn index_name(&self) -> Result<String> {
        self.index_name
            .clone()
            .ok_or_else(|| Error::missing_env("AISEARCH_INDEX_NAME"))
    }

    fn product_index_name(&self) -> Result<String> {
        self.product_index_name
            .clone()
            .ok_or_else(|| Error::missing_env("PRODUCT_INDEX_NAME"))
    }
}
