//! Azure OpenAI chat completion and embedding client

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use pdfchat_core::{
    ChatCompletion, ChatMessage, ChatModel, CompletionParameters, EmbeddingModel, Error, Result,
    TokenUsage,
};

use crate::config::InferenceConfig;
use crate::identity::{COGNITIVE_SERVICES_SCOPE, ServicePrincipalCredential};

/// How inference requests are authorized
#[derive(Clone)]
pub enum InferenceAuth {
    ApiKey(String),
    ServicePrincipal(Arc<ServicePrincipalCredential>),
}

/// Client bound to one model deployment
pub struct AzureInferenceClient {
    config: InferenceConfig,
    auth: InferenceAuth,
    deployment: String,
    client: Client,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    messages: &'a [ChatMessage],
    #[serde(flatten)]
    parameters: &'a CompletionParameters,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: Option<String>,
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<TokenUsage>,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

impl AzureInferenceClient {
    /// Create a new client for `deployment`
    pub fn new(
        config: InferenceConfig,
        auth: InferenceAuth,
        deployment: impl Into<String>,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| Error::Network(e.to_string()))?;

        Ok(Self {
            config,
            auth,
            deployment: deployment.into(),
            client,
        })
    }

    /// URL of an operation on this deployment
    pub fn deployment_url(&self, operation: &str) -> String {
        format!(
            "{}/openai/deployments/{}/{}?api-version={}",
            self.config.endpoint, self.deployment, operation, self.config.api_version
        )
    }

    async fn authorize(&self, builder: RequestBuilder) -> Result<RequestBuilder> {
        Ok(match &self.auth {
            InferenceAuth::ApiKey(key) => builder.header("api-key", key),
            InferenceAuth::ServicePrincipal(credential) => {
                let token = credential.get_token(COGNITIVE_SERVICES_SCOPE).await?;
                builder.bearer_auth(token.token)
            }
        })
    }

    async fn post<B: Serialize + ?Sized>(&self, operation: &str, body: &B) -> Result<String> {
        let builder = self
            .client
            .post(self.deployment_url(operation))
            .header("Accept", "application/json")
            .json(body);
        let response = self
            .authorize(builder)
            .await?
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        if !status.is_success() {
            return Err(Error::Inference(format!(
                "{} request to '{}' failed with status {}: {}",
                operation, self.deployment, status, text
            )));
        }
        Ok(text)
    }
}

/// Convert a raw chat response into the first choice
fn first_choice(response: ChatResponse, deployment: &str) -> Result<ChatCompletion> {
    let ChatResponse {
        model,
        choices,
        usage,
    } = response;

    let choice = choices
        .into_iter()
        .next()
        .ok_or_else(|| Error::Inference(format!("'{deployment}' returned no choices")))?;

    Ok(ChatCompletion {
        content: choice.message.content.unwrap_or_default(),
        model_id: model.unwrap_or_else(|| deployment.to_string()),
        finish_reason: choice.finish_reason,
        usage,
    })
}

#[async_trait]
impl ChatModel for AzureInferenceClient {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        parameters: &CompletionParameters,
    ) -> Result<ChatCompletion> {
        let request = ChatRequest {
            messages,
            parameters,
        };
        let body = self.post("chat/completions", &request).await?;
        let response: ChatResponse = serde_json::from_str(&body)?;
        let completion = first_choice(response, &self.deployment)?;

        tracing::debug!(
            deployment = %self.deployment,
            finish_reason = ?completion.finish_reason,
            total_tokens = completion.usage.as_ref().map(|u| u.total_tokens),
            "chat completion received"
        );
        Ok(completion)
    }

    fn model_id(&self) -> &str {
        &self.deployment
    }
}

#[async_trait]
impl EmbeddingModel for AzureInferenceClient {
    async fn embed(&self, input: &str) -> Result<Vec<f32>> {
        let body = self.post("embeddings", &EmbeddingRequest { input }).await?;
        let response: EmbeddingResponse = serde_json::from_str(&body)?;

        response
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| Error::Inference(format!("'{}' returned no embedding", self.deployment)))
    }

    fn model_id(&self) -> &str {
        &self.deployment
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn client() -> AzureInferenceClient {
        let config = InferenceConfig {
            endpoint: "https://demo.openai.azure.com".to_string(),
            api_key: Some("key".to_string()),
            api_version: "2024-06-01".to_string(),
        };
        AzureInferenceClient::new(config, InferenceAuth::ApiKey("key".to_string()), "gpt-4o-mini")
            .unwrap()
    }

    #[test]
    fn test_deployment_url() {
        assert_eq!(
            client().deployment_url("chat/completions"),
            "https://demo.openai.azure.com/openai/deployments/gpt-4o-mini/chat/completions?api-version=2024-06-01"
        );
    }

    #[test]
    fn test_chat_request_flattens_parameters() {
        let messages = vec![ChatMessage::system("ground"), ChatMessage::user("hi")];
        let mut parameters = CompletionParameters::new();
        parameters.insert("temperature".to_string(), json!(0.7));
        parameters.insert("max_tokens".to_string(), json!(1024));

        let body = serde_json::to_value(ChatRequest {
            messages: &messages,
            parameters: &parameters,
        })
        .unwrap();

        assert_eq!(
            body,
            json!({
                "messages": [
                    {"role": "system", "content": "ground"},
                    {"role": "user", "content": "hi"}
                ],
                "temperature": 0.7,
                "max_tokens": 1024
            })
        );
    }

    #[test]
    fn test_first_choice() {
        let response: ChatResponse = serde_json::from_value(json!({
            "model": "gpt-4o-mini-2024-07-18",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "The essay covers..."}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
        }))
        .unwrap();

        let completion = first_choice(response, "gpt-4o-mini").unwrap();
        assert_eq!(completion.content, "The essay covers...");
        assert_eq!(completion.model_id, "gpt-4o-mini-2024-07-18");
        assert_eq!(completion.finish_reason.as_deref(), Some("stop"));
        assert_eq!(completion.usage.unwrap().total_tokens, 15);
    }

    #[test]
    fn test_first_choice_empty() {
        let response: ChatResponse = serde_json::from_value(json!({"choices": []})).unwrap();
        assert!(matches!(
            first_choice(response, "gpt-4o-mini"),
            Err(Error::Inference(_))
        ));
    }
}
