//! Knowledge base facade used by the terminal and web shells

use serde_json::json;
use std::path::Path;
use std::sync::Arc;

use pdfchat_core::{AccessToken, Backends, DocumentRecord, Error, Result};

use crate::{
    ChatSession, GroundedAnswer, IndexRemover, PdfIndexer, PdfTextExtractor, PromptTemplate,
    QueryResponder, TextExtractor, DEFAULT_SEARCH_TOP,
};

/// Entry point tying login, indexing, removal and grounded chat together
pub struct KnowledgeBase {
    backends: Arc<dyn Backends>,
    extractor: Arc<dyn TextExtractor>,
    prompt: PromptTemplate,
    search_top: usize,
}

impl KnowledgeBase {
    /// Knowledge base with the PDF extractor and the built-in grounding prompt
    pub fn new(backends: Arc<dyn Backends>) -> Result<Self> {
        Ok(Self {
            backends,
            extractor: Arc::new(PdfTextExtractor),
            prompt: PromptTemplate::grounded_chat()?,
            search_top: DEFAULT_SEARCH_TOP,
        })
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn TextExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_prompt(mut self, prompt: PromptTemplate) -> Self {
        self.prompt = prompt;
        self
    }

    pub fn with_search_top(mut self, top: usize) -> Self {
        self.search_top = top.max(1);
        self
    }

    pub fn backends(&self) -> &Arc<dyn Backends> {
        &self.backends
    }

    /// Log in with the configured service principal
    pub async fn authenticate(&self) -> Result<AccessToken> {
        let authenticator = self.backends.authenticator()?;
        let token = authenticator.authenticate().await?;
        tracing::info!(principal = authenticator.principal(), "authenticated");
        Ok(token)
    }

    /// Recreate `index_name` with the contents of one PDF
    pub async fn index(&self, index_name: &str, path: &Path) -> Result<DocumentRecord> {
        PdfIndexer::new(self.backends.clone(), self.extractor.clone())
            .index_pdf_document(index_name, path)
            .await
    }

    pub async fn delete(&self, index_name: &str) -> Result<()> {
        IndexRemover::new(self.backends.clone()).delete(index_name).await
    }

    pub async fn list(&self) -> Result<Vec<String>> {
        IndexRemover::new(self.backends.clone()).list().await
    }

    /// Answer a single question against `index_name`
    pub async fn ask(&self, index_name: &str, question: &str) -> Result<GroundedAnswer> {
        let conversation = ChatSession::new().conversation_with(question);
        self.responder()
            .ask_with_context(index_name, &conversation, &json!({}))
            .await
    }

    pub(crate) fn responder(&self) -> QueryResponder {
        QueryResponder::new(self.backends.clone(), self.prompt.clone(), self.search_top)
    }

    /// Index a PDF into the configured knowledge base and mark the session ready.
    ///
    /// The session stays not ready when the index name is missing or indexing fails.
    pub async fn upload(&self, session: &mut ChatSession, path: &Path) -> Result<DocumentRecord> {
        let index_name = self.backends.index_name()?;

        session.set_ready(true);
        match self.index(&index_name, path).await {
            Ok(record) => Ok(record),
            Err(e) => {
                session.set_ready(false);
                Err(e)
            }
        }
    }

    /// Delete the configured knowledge base; the session is no longer ready afterwards
    pub async fn remove(&self, session: &mut ChatSession) -> Result<()> {
        let index_name = self.backends.index_name()?;
        self.delete(&index_name).await?;
        session.set_ready(false);
        Ok(())
    }

    /// Run one chat turn.
    ///
    /// A blank query is ignored and returns `None`. On success the query and the
    /// reply are appended to the history; on failure the history is untouched.
    pub async fn converse(
        &self,
        session: &mut ChatSession,
        query: &str,
    ) -> Result<Option<GroundedAnswer>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(None);
        }
        if !session.is_ready() {
            return Err(Error::InvalidInput(
                "upload a PDF before asking questions".to_string(),
            ));
        }

        let index_name = self.backends.index_name()?;
        let conversation = session.conversation_with(query);
        let answer = self
            .responder()
            .ask_with_context(&index_name, &conversation, &json!({}))
            .await?;

        session.record_turn(query, &answer.message.content);
        Ok(Some(answer))
    }
}
