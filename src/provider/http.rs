use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, warn};

use super::TextProvider;
use crate::error::ProviderError;
use crate::persona::SamplingConfig;

/// Google Gemini REST backend (non-streaming `generateContent`).
pub struct GeminiProvider {
    client: Client,
    api_key: Option<String>,
}

impl GeminiProvider {
    pub fn new(api_key: Option<String>) -> Self {
        if api_key.is_none() {
            warn!("GEMINI_API_KEY not set, provider will report unavailable");
        }
        Self {
            client: Client::new(),
            api_key,
        }
    }
}

#[async_trait]
impl TextProvider for GeminiProvider {
    async fn generate(
        &self,
        system_prompt: &str,
        user_message: &str,
        sampling: &SamplingConfig,
    ) -> Result<String, ProviderError> {
        let api_key = self.api_key.as_deref().ok_or(ProviderError::Unavailable)?;

        // Gemini takes one combined prompt rather than a system/user split.
        let prompt = format!("{system_prompt}\n\nUser: {user_message}\n\nAssistant:");

        let mut generation_config = serde_json::json!({
            "temperature": sampling.temperature,
            "maxOutputTokens": sampling.max_output_tokens,
        });
        if let Some(top_p) = sampling.top_p {
            generation_config["topP"] = serde_json::json!(top_p);
        }
        if let Some(top_k) = sampling.top_k {
            generation_config["topK"] = serde_json::json!(top_k);
        }

        let body = serde_json::json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
            "generationConfig": generation_config,
        });

        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/{}:generateContent?key={api_key}",
            sampling.model
        );

        let response = self
            .client
            .post(&url)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Http { status, body });
        }

        let parsed: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let text = parsed
            .get("candidates")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("content"))
            .and_then(|c| c.get("parts"))
            .and_then(|p| p.get(0))
            .and_then(|p| p.get("text"))
            .and_then(|t| t.as_str())
            .map(str::trim)
            .unwrap_or_default();

        if text.is_empty() {
            debug!("empty response body from gemini");
            return Err(ProviderError::EmptyResponse);
        }

        Ok(text.to_string())
    }

    fn is_available(&self) -> bool {
        self.api_key.is_some()
    }
}

/// OpenAI chat-completions backend (non-streaming).
pub struct OpenAiProvider {
    client: Client,
    api_key: Option<String>,
}

impl OpenAiProvider {
    pub fn new(api_key: Option<String>) -> Self {
        if api_key.is_none() {
            warn!("OPENAI_API_KEY not set, provider will report unavailable");
        }
        Self {
            client: Client::new(),
            api_key,
        }
    }
}

#[async_trait]
impl TextProvider for OpenAiProvider {
    async fn generate(
        &self,
        system_prompt: &str,
        user_message: &str,
        sampling: &SamplingConfig,
    ) -> Result<String, ProviderError> {
        let api_key = self.api_key.as_deref().ok_or(ProviderError::Unavailable)?;

        let mut body = serde_json::json!({
            "model": sampling.model,
            "messages": [
                { "role": "system", "content": system_prompt },
                { "role": "user", "content": user_message },
            ],
            "temperature": sampling.temperature,
            "max_tokens": sampling.max_output_tokens,
        });
        if let Some(top_p) = sampling.top_p {
            body["top_p"] = serde_json::json!(top_p);
        }

        let response = self
            .client
            .post("https://api.openai.com/v1/chat/completions")
            .header("Authorization", format!("Bearer {api_key}"))
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Http { status, body });
        }

        let parsed: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let text = parsed
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|t| t.as_str())
            .map(str::trim)
            .unwrap_or_default();

        if text.is_empty() {
            return Err(ProviderError::EmptyResponse);
        }

        Ok(text.to_string())
    }

    fn is_available(&self) -> bool {
        self.api_key.is_some()
    }
}
