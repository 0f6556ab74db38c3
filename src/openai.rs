//! Client construction for OpenAI-compatible APIs (OpenAI, DeepSeek).

use crate::error::{AgribotError, Result};
use async_openai::{config::OpenAIConfig, Client};
use std::time::Duration;

/// Default timeout for provider requests.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Connection details for one OpenAI-compatible endpoint.
#[derive(Debug, Clone)]
pub struct ProviderEndpoint {
    /// API base URL, e.g. `https://api.openai.com/v1`.
    pub api_base: String,
    /// Name of the environment variable holding the key.
    pub api_key_env: String,
    /// Request timeout.
    pub timeout: Duration,
}

impl ProviderEndpoint {
    pub fn new(api_base: &str, api_key_env: &str, timeout_secs: u64) -> Self {
        Self {
            api_base: api_base.to_string(),
            api_key_env: api_key_env.to_string(),
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    /// Read the API key from the environment. An unset key yields an empty string;
    /// the provider then rejects the request and the caller sees a provider error.
    pub fn api_key(&self) -> String {
        std::env::var(&self.api_key_env).unwrap_or_default()
    }
}

impl Default for ProviderEndpoint {
    fn default() -> Self {
        Self::new("https://api.openai.com/v1", "OPENAI_API_KEY", DEFAULT_TIMEOUT_SECS)
    }
}

/// Create a client for the given endpoint with its configured timeout.
pub fn create_client(endpoint: &ProviderEndpoint) -> Result<Client<OpenAIConfig>> {
    let http_client = reqwest::Client::builder()
        .timeout(endpoint.timeout)
        .build()
        .map_err(|e| AgribotError::Config(format!("Failed to create HTTP client: {}", e)))?;

    let config = OpenAIConfig::new()
        .with_api_base(endpoint.api_base.trim_end_matches('/'))
        .with_api_key(endpoint.api_key());

    Ok(Client::with_config(config).with_http_client(http_client))
}
