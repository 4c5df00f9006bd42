//! Environment configuration for the Azure services

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use url::Url;

use pdfchat_core::{Error, Result};

pub const DEFAULT_AUTHORITY_HOST: &str = "https://login.microsoftonline.com";
pub const DEFAULT_SEARCH_API_VERSION: &str = "2024-07-01";
pub const DEFAULT_OPENAI_API_VERSION: &str = "2024-06-01";

type LookupFn = dyn Fn(&str) -> Option<String> + Send + Sync;

/// Source of configuration values.
///
/// Reads the process environment (after loading `.env`) in production, or a
/// fixed map in tests.
#[derive(Clone)]
pub struct EnvSource {
    lookup: Arc<LookupFn>,
}

impl EnvSource {
    /// Process environment, with a `.env` file in the working directory honored
    pub fn process() -> Self {
        dotenvy::dotenv().ok();
        Self {
            lookup: Arc::new(|name| std::env::var(name).ok()),
        }
    }

    /// Fixed set of values
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let map: HashMap<String, String> = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            lookup: Arc::new(move |name| map.get(name).cloned()),
        }
    }

    /// Value of a variable; blank values count as unset
    pub fn get(&self, name: &str) -> Option<String> {
        (self.lookup)(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    pub fn get_or(&self, name: &str, default: &str) -> String {
        self.get(name).unwrap_or_else(|| default.to_string())
    }

    /// Value of a required variable
    pub fn require(&self, name: &str) -> Result<String> {
        self.get(name).ok_or_else(|| Error::missing_env(name))
    }

    /// Values of several required variables, reporting every missing one at once
    pub fn require_all(&self, names: &[&str]) -> Result<Vec<String>> {
        let values: Vec<Option<String>> = names.iter().map(|n| self.get(n)).collect();
        let missing: Vec<&str> = names
            .iter()
            .zip(&values)
            .filter(|(_, v)| v.is_none())
            .map(|(n, _)| *n)
            .collect();

        match missing.as_slice() {
            [] => Ok(values.into_iter().flatten().collect()),
            [single] => Err(Error::missing_env(single)),
            many => Err(Error::Configuration(format!(
                "{} environment variables are not set",
                many.join(", ")
            ))),
        }
    }

    /// Parse an optional variable, falling back to `default` when unset
    pub fn parse_or<T: FromStr>(&self, name: &str, default: T) -> Result<T> {
        match self.get(name) {
            Some(raw) => raw.parse().map_err(|_| {
                Error::Configuration(format!("{name} has an invalid value: {raw}"))
            }),
            None => Ok(default),
        }
    }
}

impl std::fmt::Debug for EnvSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvSource").finish_non_exhaustive()
    }
}

/// Validate a service endpoint and strip any trailing slash
fn endpoint(name: &str, raw: String) -> Result<String> {
    let parsed = Url::parse(&raw)
        .map_err(|e| Error::Configuration(format!("{name} is not a valid URL ({raw}): {e}")))?;
    if !matches!(parsed.scheme(), "https" | "http") {
        return Err(Error::Configuration(format!(
            "{name} must be an http(s) URL: {raw}"
        )));
    }
    Ok(raw.trim_end_matches('/').to_string())
}

/// Service principal credentials for Microsoft Entra ID
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServicePrincipalConfig {
    pub client_id: String,
    pub client_secret: String,
    pub tenant_id: String,
    pub authority_host: String,
}

impl ServicePrincipalConfig {
    pub fn from_env(env: &EnvSource) -> Result<Self> {
        let values = env.require_all(&["AZURE_CLIENT_ID", "AZURE_CLIENT_SECRET", "AZURE_TENANT_ID"])?;
        let [client_id, client_secret, tenant_id]: [String; 3] = values
            .try_into()
            .map_err(|_| Error::Configuration("incomplete service principal".to_string()))?;

        let authority_host = endpoint(
            "AZURE_AUTHORITY_HOST",
            env.get_or("AZURE_AUTHORITY_HOST", DEFAULT_AUTHORITY_HOST),
        )?;

        Ok(Self {
            client_id,
            client_secret,
            tenant_id,
            authority_host,
        })
    }
}

/// Azure AI Search connection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    pub endpoint: String,
    pub api_key: String,
    pub api_version: String,
}

impl SearchConfig {
    pub fn from_env(env: &EnvSource) -> Result<Self> {
        let values = env.require_all(&["SEARCH_SERVICE_ENDPOINT", "SEARCH_API_KEY"])?;
        let [raw_endpoint, api_key]: [String; 2] = values
            .try_into()
            .map_err(|_| Error::Configuration("incomplete search configuration".to_string()))?;

        Ok(Self {
            endpoint: endpoint("SEARCH_SERVICE_ENDPOINT", raw_endpoint)?,
            api_key,
            api_version: env.get_or("SEARCH_API_VERSION", DEFAULT_SEARCH_API_VERSION),
        })
    }

    /// Create configuration with explicit values
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            api_version: DEFAULT_SEARCH_API_VERSION.to_string(),
        }
    }
}

/// Azure OpenAI / AI inference connection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceConfig {
    pub endpoint: String,
    /// Key auth; when absent requests carry a service principal bearer token
    pub api_key: Option<String>,
    pub api_version: String,
}

impl InferenceConfig {
    pub fn from_env(env: &EnvSource) -> Result<Self> {
        Ok(Self {
            endpoint: endpoint(
                "AZURE_INFERENCE_ENDPOINT",
                env.require("AZURE_INFERENCE_ENDPOINT")?,
            )?,
            api_key: env.get("AZURE_INFERENCE_API_KEY"),
            api_version: env.get_or("AZURE_OPENAI_API_VERSION", DEFAULT_OPENAI_API_VERSION),
        })
    }
}
