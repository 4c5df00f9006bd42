//! Microsoft Entra ID service principal credential

use async_trait::async_trait;
use chrono::{Duration as TokenDuration, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;

use pdfchat_core::{AccessToken, Authenticator, Error, Result};

use crate::config::ServicePrincipalConfig;

/// Scope requested when logging in, as the management CLI does
pub const MANAGEMENT_SCOPE: &str = "https://management.azure.com/.default";
/// Scope for Azure OpenAI and AI inference endpoints
pub const COGNITIVE_SERVICES_SCOPE: &str = "https://cognitiveservices.azure.com/.default";

/// Tokens this close to expiry are refreshed before use
const REFRESH_MARGIN_MINUTES: i64 = 5;

/// Client-credentials login for a service principal.
///
/// Tokens are cached per scope until they near expiry.
pub struct ServicePrincipalCredential {
    config: ServicePrincipalConfig,
    client: Client,
    tokens: Mutex<HashMap<String, AccessToken>>,
}

#[derive(Serialize)]
struct TokenRequest<'a> {
    grant_type: &'a str,
    client_id: &'a str,
    client_secret: &'a str,
    scope: &'a str,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: String,
}

impl ServicePrincipalCredential {
    /// Create a new credential from configuration
    pub fn new(config: ServicePrincipalConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| Error::Network(e.to_string()))?;

        Ok(Self {
            config,
            client,
            tokens: Mutex::new(HashMap::new()),
        })
    }

    /// Token endpoint of the configured tenant
    pub fn token_url(&self) -> String {
        format!(
            "{}/{}/oauth2/v2.0/token",
            self.config.authority_host, self.config.tenant_id
        )
    }

    /// Get a token for `scope`, reusing a cached one while it is fresh
    pub async fn get_token(&self, scope: &str) -> Result<AccessToken> {
        let mut tokens = self.tokens.lock().await;

        if let Some(token) = tokens.get(scope) {
            if !token.expires_within(TokenDuration::minutes(REFRESH_MARGIN_MINUTES), Utc::now()) {
                return Ok(token.clone());
            }
        }

        let token = self.request_token(scope).await?;
        tokens.insert(scope.to_string(), token.clone());
        Ok(token)
    }

    async fn request_token(&self, scope: &str) -> Result<AccessToken> {
        let request = TokenRequest {
            grant_type: "client_credentials",
            client_id: &self.config.client_id,
            client_secret: &self.config.client_secret,
            scope,
        };

        let response = self
            .client
            .post(self.token_url())
            .form(&request)
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        if !status.is_success() {
            return Err(Error::Authentication(describe_token_error(status.as_u16(), &body)));
        }

        let token: TokenResponse = serde_json::from_str(&body)?;
        tracing::debug!(client_id = %self.config.client_id, scope, "service principal token issued");

        Ok(AccessToken {
            token: token.access_token,
            expires_at: Utc::now() + TokenDuration::seconds(token.expires_in as i64),
        })
    }
}

/// Readable message for a rejected token request
fn describe_token_error(status: u16, body: &str) -> String {
    match serde_json::from_str::<TokenErrorResponse>(body) {
        Ok(err) if err.error_description.is_empty() => {
            format!("login rejected with status {status}: {}", err.error)
        }
        Ok(err) => format!(
            "login rejected with status {status}: {}: {}",
            err.error,
            err.error_description.lines().next().unwrap_or_default()
        ),
        Err(_) => format!("login rejected with status {status}: {body}"),
    }
}

#[async_trait]
impl Authenticator for ServicePrincipalCredential {
    async fn authenticate(&self) -> Result<AccessToken> {
        let token = self.get_token(MANAGEMENT_SCOPE).await?;
        tracing::info!(client_id = %self.config.client_id, tenant_id = %self.config.tenant_id, "logged in as service principal");
        Ok(token)
    }

    fn principal(&self) -> &str {
        &self.config.client_id
    }
}
