use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::PersonaSpec;
use crate::error::ConfigError;

/// Lines used when generation is unavailable or exhausted and the persona has
/// no dedicated fallback list. Every selected agent always says *something*.
pub const GENERIC_FALLBACKS: &[&str] = &[
    "That's an interesting point. What do you think about approaching it differently?",
    "I hear you. Sometimes the best advice is to trust your instincts.",
    "Thanks for sharing that. Every situation is unique, so consider what feels right for you.",
];

/// Sampling parameters passed to the text-generation backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    pub model: String,
    pub temperature: f64,
    pub max_output_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            model: "models/gemini-2.5-flash".into(),
            temperature: 0.8,
            max_output_tokens: 150,
            top_p: Some(0.9),
            top_k: Some(40),
        }
    }
}

/// Behavioral knobs controlling whether and when a persona responds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorConfig {
    /// Base chance of responding to any message, before boosts/penalties.
    pub response_probability: f64,
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Informational only; not used by the selection algorithm.
    pub chattiness_level: u8,
    /// Hard gate: minimum time after responding before eligibility returns.
    pub recent_response_cooldown_ms: u64,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            response_probability: 0.5,
            min_delay_ms: 2000,
            max_delay_ms: 8000,
            chattiness_level: 5,
            recent_response_cooldown_ms: 30_000,
        }
    }
}

/// A configured AI personality: a named, scripted chat participant.
#[derive(Debug, Clone, Serialize)]
pub struct Persona {
    pub id: String,
    pub name: String,
    pub avatar: String,
    pub personality: String,
    pub backstory: String,
    pub response_style: String,
    /// Known-associate persona ids. Informational, not enforced.
    pub relationships: Vec<String>,
    pub sampling: SamplingConfig,
    pub behavior: BehaviorConfig,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fallback_lines: Vec<String>,
    #[serde(skip)]
    pub prompt_template: Option<String>,
}

impl Persona {
    /// Validate a raw spec into a persona. Missing required fields reject the
    /// whole persona rather than filling in a default.
    pub fn from_spec(spec: PersonaSpec) -> Result<Self, ConfigError> {
        let name = spec.name.filter(|n| !n.trim().is_empty()).ok_or_else(|| {
            ConfigError::MissingField {
                id: spec.id.clone().unwrap_or_else(|| "<unnamed>".into()),
                field: "name",
            }
        })?;
        let id = spec.id.unwrap_or_else(|| slugify(&name));

        let personality = spec
            .personality
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingField {
                id: id.clone(),
                field: "personality",
            })?;

        let behavior = spec.behavior.unwrap_or_default();
        if !(0.0..=1.0).contains(&behavior.response_probability) {
            return Err(ConfigError::ProbabilityRange {
                id,
                value: behavior.response_probability,
            });
        }
        if behavior.min_delay_ms > behavior.max_delay_ms {
            return Err(ConfigError::DelayBounds {
                id,
                min: behavior.min_delay_ms,
                max: behavior.max_delay_ms,
            });
        }

        Ok(Self {
            id,
            name,
            avatar: spec.avatar.unwrap_or_else(|| "🤖".into()),
            personality,
            backstory: spec
                .backstory
                .unwrap_or_else(|| "A mysterious AI with an unknown past.".into()),
            response_style: spec
                .response_style
                .unwrap_or_else(|| "Friendly and helpful, adapts to the conversation style.".into()),
            relationships: spec.relationships,
            sampling: spec.sampling.unwrap_or_default(),
            behavior,
            fallback_lines: spec.fallback_lines,
            prompt_template: spec.prompt_template,
        })
    }

    /// Pick a canned line when generation fails. Uses the persona's own list,
    /// or the generic list if it has none.
    pub fn fallback_line(&self) -> String {
        use rand::Rng;
        let line = if self.fallback_lines.is_empty() {
            let idx = rand::thread_rng().gen_range(0..GENERIC_FALLBACKS.len());
            GENERIC_FALLBACKS[idx]
        } else {
            let idx = rand::thread_rng().gen_range(0..self.fallback_lines.len());
            self.fallback_lines[idx].as_str()
        };
        debug!(persona = %self.id, "using fallback line");
        line.to_string()
    }

    /// First message a newly created persona posts into its room.
    pub fn welcome_line(&self) -> String {
        use rand::Rng;
        let intro = |text: &str| text.split('.').next().unwrap_or(text).trim().to_string();
        let templates = [
            format!(
                "Hey everyone! {} here. {}. Looking forward to getting to know you all! {}",
                self.name,
                intro(&self.personality),
                self.avatar
            ),
            format!(
                "What's up! I'm {}. {}. Excited to be part of this group! {}",
                self.name,
                intro(&self.backstory),
                self.avatar
            ),
            format!(
                "Hello! {} joining the conversation. {}. Can't wait to jump in! {}",
                self.name,
                intro(&self.personality),
                self.avatar
            ),
        ];
        let idx = rand::thread_rng().gen_range(0..templates.len());
        templates[idx].clone()
    }
}

/// Derive a stable persona id from a display name: lowercase, with every run
/// of non-alphanumeric characters collapsed to an underscore.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.to_lowercase().chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c);
        } else if !slug.ends_with('_') {
            slug.push('_');
        }
    }
    slug.trim_matches('_').to_string()
}
