pub mod http;
pub mod lane;

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::ProviderConfig;
use crate::error::ProviderError;
use crate::persona::SamplingConfig;

/// Uniform contract over whatever concrete text-generation backend is
/// configured: produce text for a system prompt and user turn, or say why not.
#[async_trait]
pub trait TextProvider: Send + Sync {
    async fn generate(
        &self,
        system_prompt: &str,
        user_message: &str,
        sampling: &SamplingConfig,
    ) -> Result<String, ProviderError>;

    /// Whether the backend is configured at all. An unconfigured backend is a
    /// first-class, non-fatal condition: callers degrade to fallback text
    /// rather than failing startup.
    fn is_available(&self) -> bool;
}

/// Create a provider from config. A missing API key still yields a provider;
/// it just reports itself unavailable.
pub fn from_config(config: &ProviderConfig) -> anyhow::Result<Arc<dyn TextProvider>> {
    match config.kind.as_str() {
        "gemini" => Ok(Arc::new(http::GeminiProvider::new(config.api_key.clone()))),
        "openai" => Ok(Arc::new(http::OpenAiProvider::new(config.api_key.clone()))),
        other => anyhow::bail!("unknown provider: {other}"),
    }
}
