//! Retrieval-augmented chat over uploaded PDFs
//!
//! This crate holds the application flows: extracting and indexing a PDF,
//! removing and listing indexes, answering questions grounded on search hits,
//! loading the product catalog and evaluating answer groundedness. External
//! services are reached through the `pdfchat_core::Backends` seam.

mod engine;
mod evaluation;
mod extractor;
mod indexer;
mod products;
mod prompt;
mod remover;
mod responder;
mod session;

#[cfg(any(test, feature = "test-support"))]
pub mod memory;


pub use engine::KnowledgeBase;
pub use evaluation::{
    DEFAULT_EVAL_DATA, DEFAULT_EVAL_OUTPUT, EvaluationInput, EvaluationMetrics, EvaluationReport,
    EvaluationRow, EvaluationRunner, GroundednessEvaluator, GroundednessScore, parse_score,
    read_dataset,
};
pub use extractor::{PdfTextExtractor, TextExtractor};
pub use indexer::PdfIndexer;
pub use products::{DEFAULT_PRODUCTS_CSV, Product, ProductLoader, read_products};
pub use prompt::PromptTemplate;
pub use remover::IndexRemover;
pub use responder::{DEFAULT_SEARCH_TOP, GroundedAnswer, QueryResponder};
pub use session::ChatSession;

// Re-export core types for convenience
pub use pdfchat_core::{Backends, ChatMessage, ChatRole, DocumentRecord, Error, Result, SourceDocument};
