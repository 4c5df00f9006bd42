//! Access to the configured external services

use std::sync::Arc;

use crate::{Authenticator, ChatModel, EmbeddingModel, Result, SearchService};

/// Factory for the external services an action needs.
///
/// Each accessor reads its configuration when called, so a missing setting only
/// fails the action that needs it.
pub trait Backends: Send + Sync {
    /// Identity provider login for the configured service principal
    fn authenticator(&self) -> Result<Arc<dyn Authenticator>>;

    /// Search service client
    fn search(&self) -> Result<Arc<dyn SearchService>>;

    /// Chat model answering user questions
    fn chat_model(&self) -> Result<Arc<dyn ChatModel>>;

    /// Embedding model for indexed documents
    fn embedding_model(&self) -> Result<Arc<dyn EmbeddingModel>>;

    /// Chat model used to grade answers
    fn evaluation_model(&self) -> Result<Arc<dyn ChatModel>>;

    /// Name of the PDF knowledge base index
    fn index_name(&self) -> Result<String>;

    /// Name of the product catalog index
    fn product_index_name(&self) -> Result<String>;
}
