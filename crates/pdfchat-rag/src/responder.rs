//! Grounded question answering

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use pdfchat_core::{
    Backends, ChatMessage, Error, Result, SearchHit, SourceDocument, latest_user_message,
};

use crate::PromptTemplate;

/// Number of search hits used as grounding when not configured
pub const DEFAULT_SEARCH_TOP: usize = 5;

/// The assistant reply together with the documents it was grounded on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundedAnswer {
    pub message: ChatMessage,
    pub grounding_data: Vec<SourceDocument>,
}

/// Answers a conversation from the documents in one index
pub struct QueryResponder {
    backends: Arc<dyn Backends>,
    prompt: PromptTemplate,
    top: usize,
}

impl QueryResponder {
    pub fn new(backends: Arc<dyn Backends>, prompt: PromptTemplate, top: usize) -> Self {
        Self {
            backends,
            prompt,
            top,
        }
    }

    /// Search `index_name` with the latest user message and answer the conversation.
    ///
    /// The rendered prompt messages are sent first, followed by `messages` as given.
    pub async fn ask_with_context<C: Serialize + Sync>(
        &self,
        index_name: &str,
        messages: &[ChatMessage],
        context: &C,
    ) -> Result<GroundedAnswer> {
        let query = latest_user_message(messages).ok_or_else(|| {
            Error::InvalidInput("conversation has no user message to search for".to_string())
        })?;

        let search = self.backends.search()?;
        let chat = self.backends.chat_model()?;

        let hits = search.search(index_name, query, self.top).await?;
        let grounding_data: Vec<SourceDocument> = hits.iter().map(source_document).collect();
        tracing::debug!(index = index_name, hits = grounding_data.len(), "retrieved grounding documents");

        let mut request = self.prompt.create_messages(&grounding_data, context)?;
        request.extend_from_slice(messages);

        let completion = chat.complete(&request, &self.prompt.parameters).await?;
        tracing::info!(
            model = %completion.model_id,
            documents = grounding_data.len(),
            finish_reason = completion.finish_reason.as_deref().unwrap_or("unknown"),
            "answered question"
        );

        Ok(GroundedAnswer {
            message: ChatMessage::assistant(completion.content),
            grounding_data,
        })
    }
}

fn source_document(hit: &SearchHit) -> SourceDocument {
    SourceDocument {
        title: hit.field_str("title").to_string(),
        content: hit.field_str("content").to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryBackends, ScriptedChatModel};
    use pdfchat_core::{ChatRole, IndexDefinition, SearchService};
    use serde_json::json;

    async fn backends_with_documents(reply: &str) -> Arc<MemoryBackends> {
        let backends = Arc::new(MemoryBackends::new("pdfs", reply));
        backends
            .search
            .create_index(&IndexDefinition::pdf_documents("pdfs", "text-embedding-3-small"))
            .await
            .unwrap();
        backends
            .search
            .upload_documents(
                "pdfs",
                vec![
                    json!({"id": "essays", "title": "essays", "content": "An essay needs a thesis."}),
                    json!({"id": "recipes", "title": "recipes", "content": "Bake bread slowly."}),
                ],
            )
            .await
            .unwrap();
        backends
    }

    #[tokio::test]
    async fn test_ask_with_context_grounds_on_search_hits() {
        let backends = backends_with_documents("Start with a thesis.").await;
        let responder = QueryResponder::new(
            backends.clone(),
            PromptTemplate::grounded_chat().unwrap(),
            DEFAULT_SEARCH_TOP,
        );

        let conversation = vec![
            ChatMessage::user("hello"),
            ChatMessage::assistant("Hi, ask me about your PDF."),
            ChatMessage::user("what does an essay need"),
        ];
        let answer = responder
            .ask_with_context("pdfs", &conversation, &json!({}))
            .await
            .unwrap();

        assert_eq!(answer.message, ChatMessage::assistant("Start with a thesis."));
        assert_eq!(answer.grounding_data.len(), 1);
        assert_eq!(answer.grounding_data[0].title, "essays");

        let requests = backends.chat.requests();
        let (sent, parameters) = &requests[0];
        assert_eq!(sent[0].role, ChatRole::System);
        assert!(sent[0].content.contains("An essay needs a thesis."));
        assert_eq!(&sent[1..], conversation.as_slice());
        assert_eq!(parameters.get("temperature"), Some(&json!(0.2)));
    }

    #[tokio::test]
    async fn test_ask_without_user_message() {
        let backends = backends_with_documents("unused").await;
        let responder =
            QueryResponder::new(backends, PromptTemplate::grounded_chat().unwrap(), 5);

        let err = responder
            .ask_with_context("pdfs", &[ChatMessage::assistant("hi")], &json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_model_failure_propagates() {
        let backends = MemoryBackends::new("pdfs", "unused")
            .with_chat(ScriptedChatModel::failing("deployment not found"));
        let backends = Arc::new(backends);
        backends
            .search
            .create_index(&IndexDefinition::pdf_documents("pdfs", "text-embedding-3-small"))
            .await
            .unwrap();

        let responder =
            QueryResponder::new(backends, PromptTemplate::grounded_chat().unwrap(), 5);
        let err = responder
            .ask_with_context("pdfs", &[ChatMessage::user("anything")], &json!({}))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Inference error: deployment not found");
    }
}
