use chrono::Utc;
use serde::Serialize;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, warn};

use crate::cache::ResponseCache;
use crate::error::{ProviderError, ValidationError};
use crate::memory::AgentMemory;
use crate::persona::Persona;
use crate::prompt;
use crate::provider::lane::{GenerateRequest, ProviderLane};
use crate::types::ChatMessage;
use crate::validate::validate_response;

/// Regeneration attempts when a response fails validation. Distinct from the
/// lane's transport-level retry; this covers bad content, not bad transport.
pub const VALIDATION_ATTEMPTS: u32 = 2;

/// Everything the resolver needs besides the persona and the message itself.
#[derive(Debug, Clone)]
pub struct PromptContext {
    pub room_name: String,
    pub recent: Vec<ChatMessage>,
    pub memory: AgentMemory,
    pub user_id: String,
}

/// Running counters exposed on the debug surface.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ServiceStats {
    pub total_requests: u64,
    pub cache_hits: u64,
    pub errors: u64,
    pub average_response_time_ms: f64,
    pub estimated_tokens: u64,
}

impl ServiceStats {
    /// Cache hit rate as a whole percentage of all requests.
    pub fn cache_hit_rate(&self) -> u64 {
        if self.total_requests == 0 {
            return 0;
        }
        self.cache_hits * 100 / self.total_requests
    }
}

#[derive(Debug, Error)]
enum ResolveError {
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("response failed validation on every attempt")]
    ValidationExhausted(#[source] ValidationError),
}

/// Turns `(persona, message, context)` into final response text.
///
/// The happy path is cache hit, or generate-then-validate with a bounded
/// number of content retries. Every failure mode ends in one of the persona's
/// fallback lines, so `resolve` itself is infallible: an agent that was
/// selected always says something.
pub struct ResponseResolver {
    lane: ProviderLane,
    cache: Arc<ResponseCache>,
    stats: Mutex<ServiceStats>,
}

impl ResponseResolver {
    pub fn new(lane: ProviderLane, cache: Arc<ResponseCache>) -> Self {
        Self {
            lane,
            cache,
            stats: Mutex::new(ServiceStats::default()),
        }
    }

    pub fn stats(&self) -> ServiceStats {
        self.stats.lock().expect("stats lock poisoned").clone()
    }

    pub async fn resolve(
        &self,
        persona: &Persona,
        user_message: &str,
        context: &PromptContext,
    ) -> String {
        {
            let mut stats = self.stats.lock().expect("stats lock poisoned");
            stats.total_requests += 1;
        }

        let key = ResponseCache::key(&persona.id, user_message);
        if let Some(cached) = self.cache.get(&key) {
            debug!(persona = %persona.id, "cache hit");
            let mut stats = self.stats.lock().expect("stats lock poisoned");
            stats.cache_hits += 1;
            return cached;
        }

        let started = Instant::now();
        match self.generate_validated(persona, user_message, context).await {
            Ok(text) => {
                self.cache.put(&key, &text);
                let mut stats = self.stats.lock().expect("stats lock poisoned");
                let elapsed_ms = started.elapsed().as_millis() as f64;
                let n = stats.total_requests as f64;
                stats.average_response_time_ms =
                    (stats.average_response_time_ms * (n - 1.0) + elapsed_ms) / n;
                stats.estimated_tokens += (text.len() as u64).div_ceil(4);
                text
            }
            Err(e) => {
                warn!(persona = %persona.id, "generation failed, using fallback: {e}");
                let mut stats = self.stats.lock().expect("stats lock poisoned");
                stats.errors += 1;
                persona.fallback_line()
            }
        }
    }

    async fn generate_validated(
        &self,
        persona: &Persona,
        user_message: &str,
        context: &PromptContext,
    ) -> Result<String, ResolveError> {
        let system_prompt = prompt::system_prompt(persona, &context.room_name, &context.recent);
        let memory_block = prompt::memory_context(&context.memory, &context.user_id, Utc::now());
        let user_turn = prompt::user_turn(user_message, &memory_block);

        let request = GenerateRequest {
            system_prompt,
            user_message: user_turn,
            sampling: persona.sampling.clone(),
        };

        let mut last_rejection = ValidationError::Empty;
        for attempt in 1..=VALIDATION_ATTEMPTS {
            let text = self.lane.generate(request.clone()).await?;
            match validate_response(&text) {
                Ok(()) => return Ok(text),
                Err(e) => {
                    debug!(
                        persona = %persona.id,
                        attempt,
                        "rejected candidate response: {e}"
                    );
                    last_rejection = e;
                }
            }
        }
        Err(ResolveError::ValidationExhausted(last_rejection))
    }
}
