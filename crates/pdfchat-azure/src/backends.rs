//! Azure implementation of the service factory

use std::sync::{Arc, Mutex};

use pdfchat_core::{
    Authenticator, Backends, ChatModel, EmbeddingModel, Error, Result, SearchService,
};

use crate::config::{EnvSource, InferenceConfig, SearchConfig, ServicePrincipalConfig};
use crate::identity::ServicePrincipalCredential;
use crate::inference::{AzureInferenceClient, InferenceAuth};
use crate::search::AzureSearchClient;

/// Builds Azure clients from environment configuration on demand.
///
/// The service principal credential is created once and shared, so its token
/// cache survives across actions.
pub struct AzureBackends {
    env: EnvSource,
    credential: Mutex<Option<Arc<ServicePrincipalCredential>>>,
}

impl AzureBackends {
    pub fn new(env: EnvSource) -> Self {
        Self {
            env,
            credential: Mutex::new(None),
        }
    }

    /// Backends reading the process environment
    pub fn from_env() -> Self {
        Self::new(EnvSource::process())
    }

    pub fn env(&self) -> &EnvSource {
        &self.env
    }

    fn credential(&self) -> Result<Arc<ServicePrincipalCredential>> {
        let mut slot = self
            .credential
            .lock()
            .map_err(|e| Error::Other(format!("Lock error: {e}")))?;

        if let Some(credential) = slot.as_ref() {
            return Ok(credential.clone());
        }

        let config = ServicePrincipalConfig::from_env(&self.env)?;
        let credential = Arc::new(ServicePrincipalCredential::new(config)?);
        *slot = Some(credential.clone());
        Ok(credential)
    }

    fn inference(&self, deployment_var: &str) -> Result<Arc<AzureInferenceClient>> {
        let deployment = self.env.require(deployment_var)?;
        let config = InferenceConfig::from_env(&self.env)?;
        let auth = match &config.api_key {
            Some(key) => InferenceAuth::ApiKey(key.clone()),
            None => InferenceAuth::ServicePrincipal(self.credential()?),
        };
        Ok(Arc::new(AzureInferenceClient::new(config, auth, deployment)?))
    }
}

impl Backends for AzureBackends {
    fn authenticator(&self) -> Result<Arc<dyn Authenticator>> {
        Ok(self.credential()?)
    }

    fn search(&self) -> Result<Arc<dyn SearchService>> {
        let config = SearchConfig::from_env(&self.env)?;
        Ok(Arc::new(AzureSearchClient::new(config)?))
    }

    fn chat_model(&self) -> Result<Arc<dyn ChatModel>> {
        Ok(self.inference("CHAT_MODEL")?)
    }

    fn embedding_model(&self) -> Result<Arc<dyn EmbeddingModel>> {
        Ok(self.inference("EMBEDDINGS_MODEL")?)
    }

    fn evaluation_model(&self) -> Result<Arc<dyn ChatModel>> {
        Ok(self.inference("EVALUATION_MODEL")?)
    }

    fn index_name(&self) -> Result<String> {
        self.env.require("AISEARCH_INDEX_NAME")
    }

    fn product_index_name(&self) -> Result<String> {
        self.env.require("PRODUCT_INDEX_NAME")
    }
}
