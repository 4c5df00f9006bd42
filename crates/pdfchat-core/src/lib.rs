//! Core traits and types for pdfchat
//!
//! This crate defines the types shared across the pdfchat workspace: the error
//! type, conversation and document records, index schemas, and the traits that
//! stand in for the external search, model and identity services.

pub mod backends;
pub mod chat;
pub mod credential;
pub mod document;
pub mod error;
pub mod index;
pub mod llm;
pub mod search;

pub use backends::Backends;
pub use chat::{ChatMessage, ChatRole, latest_user_message};
pub use credential::{AccessToken, Authenticator};
pub use document::{DocumentRecord, SourceDocument, document_id};
pub use error::{Error, Result};
pub use index::{
    FieldType, IndexDefinition, SearchField, VectorMetric, embedding_dimensions,
};
pub use llm::{ChatCompletion, ChatModel, CompletionParameters, EmbeddingModel, TokenUsage};
pub use search::{SearchHit, SearchService, UploadOutcome};
