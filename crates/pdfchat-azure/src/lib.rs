//! Azure integration for pdfchat
//!
//! Implements the pdfchat service traits against Azure AI Search, Azure OpenAI
//! deployments and Microsoft Entra ID, all configured from the environment.

mod backends;
mod config;
mod identity;
mod inference;
mod search;

#[cfg(test)]
mod tests;

pub use backends::AzureBackends;
pub use config::{
    DEFAULT_AUTHORITY_HOST, DEFAULT_OPENAI_API_VERSION, DEFAULT_SEARCH_API_VERSION, EnvSource,
    InferenceConfig, SearchConfig, ServicePrincipalConfig,
};
pub use identity::{COGNITIVE_SERVICES_SCOPE, MANAGEMENT_SCOPE, ServicePrincipalCredential};
pub use inference::{AzureInferenceClient, InferenceAuth};
pub use search::AzureSearchClient;

// Re-export core types for convenience
pub use pdfchat_core::{Backends, Error, Result};
