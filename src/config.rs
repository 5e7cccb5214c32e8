use serde::Deserialize;
use std::path::PathBuf;
use tracing::info;

use crate::persona::{BehaviorConfig, SamplingConfig};

/// Top-level configuration loaded from TOML.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct BanterConfig {
    pub gateway: GatewayConfig,
    pub provider: ProviderConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub rooms: Vec<RoomConfig>,
    #[serde(default)]
    pub personas: Vec<PersonaSpec>,
}

#[derive(Debug, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind: default_bind(),
        }
    }
}

fn default_port() -> u16 {
    7300
}
fn default_bind() -> String {
    "127.0.0.1".into()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_provider")]
    pub kind: String,
    pub api_key: Option<String>,
    /// Minimum spacing between backend requests on the shared lane.
    #[serde(default = "default_min_request_interval_ms")]
    pub min_request_interval_ms: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: default_provider(),
            api_key: None,
            min_request_interval_ms: default_min_request_interval_ms(),
        }
    }
}

fn default_provider() -> String {
    "gemini".into()
}
fn default_min_request_interval_ms() -> u64 {
    100
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_cache_ttl_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

fn default_cache_ttl_secs() -> u64 {
    300
}
fn default_sweep_interval_secs() -> u64 {
    300
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MemoryConfig {
    /// Directory for per-(room, agent) memory files.
    /// Defaults to `<state dir>/memory`.
    pub path: Option<String>,
}

impl MemoryConfig {
    pub fn resolved_path(&self) -> PathBuf {
        match &self.path {
            Some(path) => PathBuf::from(path),
            None => state_dir().join("memory"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RoomConfig {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Ordered list of member persona ids.
    #[serde(default)]
    pub members: Vec<String>,
}

/// Raw persona definition as written in config or a creation request.
/// Validated into a [`crate::persona::Persona`]; definitions missing required
/// fields are excluded from the room entirely.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PersonaSpec {
    pub id: Option<String>,
    pub name: Option<String>,
    pub avatar: Option<String>,
    pub personality: Option<String>,
    pub backstory: Option<String>,
    pub response_style: Option<String>,
    pub relationships: Vec<String>,
    pub sampling: Option<SamplingConfig>,
    pub behavior: Option<BehaviorConfig>,
    pub fallback_lines: Vec<String>,
    pub prompt_template: Option<String>,
}

/// Load configuration from file or use defaults.
///
/// Search order:
/// 1. `BANTER_CONFIG` env var
/// 2. `~/.banter/config.toml`
/// 3. Zero-config defaults (built-in seed room, no file needed)
pub fn load() -> anyhow::Result<BanterConfig> {
    let path = config_path();

    let mut config = if path.exists() {
        let content = std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
        let config: BanterConfig = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("invalid config at {}: {e}", path.display()))?;
        info!("loaded config from {}", path.display());
        config
    } else {
        info!("no config file found, using zero-config defaults");
        BanterConfig::default()
    };

    if config.rooms.is_empty() {
        seed_defaults(&mut config);
    }
    resolve_api_key(&mut config);
    validate(&config)?;
    Ok(config)
}

fn config_path() -> PathBuf {
    if let Ok(path) = std::env::var("BANTER_CONFIG") {
        return PathBuf::from(path);
    }
    state_dir().join("config.toml")
}

/// Directory holding config, credentials, and memory files. The single
/// source of truth: everything state-dir-relative derives from here.
pub fn state_dir() -> PathBuf {
    if let Ok(path) = std::env::var("BANTER_CONFIG") {
        if let Some(parent) = PathBuf::from(path).parent() {
            return parent.to_path_buf();
        }
    }
    crate::fs_util::home_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(".banter")
}

/// Resolve the provider API key from env or the credential store when the
/// config file doesn't set one. A missing key is not an error here: the
/// provider reports itself unavailable and agents fall back to canned lines.
fn resolve_api_key(config: &mut BanterConfig) {
    if config.provider.api_key.is_none() {
        config.provider.api_key = match config.provider.kind.as_str() {
            "gemini" => std::env::var("GEMINI_API_KEY").ok(),
            "openai" => std::env::var("OPENAI_API_KEY").ok(),
            _ => None,
        }
        .or_else(|| crate::secrets::CredentialStore::open().load(&config.provider.kind));
    }
}

/// Validate the config and return clear error messages.
fn validate(config: &BanterConfig) -> anyhow::Result<()> {
    let valid_providers = ["gemini", "openai"];
    if !valid_providers.contains(&config.provider.kind.as_str()) {
        anyhow::bail!(
            "invalid provider '{}': must be one of {:?}",
            config.provider.kind,
            valid_providers
        );
    }

    if config.provider.min_request_interval_ms == 0 {
        anyhow::bail!("provider.min_request_interval_ms must be > 0");
    }

    for room in &config.rooms {
        if room.id.trim().is_empty() {
            anyhow::bail!("room id cannot be empty");
        }
    }

    Ok(())
}

/// Built-in seed room and personas for zero-config startup.
fn seed_defaults(config: &mut BanterConfig) {
    config.rooms.push(RoomConfig {
        id: "the-commons".into(),
        name: "The Commons".into(),
        description: "A friendly room for open conversation".into(),
        members: vec!["nova".into(), "sage".into(), "spark".into()],
    });

    config.personas.push(PersonaSpec {
        id: Some("nova".into()),
        name: Some("Nova".into()),
        avatar: Some("🌟".into()),
        personality: Some(
            "Upbeat mentor who loves helping people untangle problems. \
             Always finds the encouraging angle."
                .into(),
        ),
        backstory: Some(
            "Spent years moderating online communities before settling here. \
             Has seen every kind of conversation go sideways and back."
                .into(),
        ),
        response_style: Some("Warm, practical, asks follow-up questions".into()),
        relationships: vec!["sage".into(), "spark".into()],
        behavior: Some(BehaviorConfig {
            response_probability: 0.75,
            min_delay_ms: 2000,
            max_delay_ms: 8000,
            chattiness_level: 7,
            recent_response_cooldown_ms: 30_000,
        }),
        fallback_lines: vec![
            "You've got this! Small steps add up faster than you'd think.".into(),
            "Honestly, the fact that you're asking means you're already on the right track.".into(),
            "Let's break it down together. What's the first thing blocking you?".into(),
        ],
        ..Default::default()
    });

    config.personas.push(PersonaSpec {
        id: Some("sage".into()),
        name: Some("Sage".into()),
        avatar: Some("🦉".into()),
        personality: Some(
            "Thoughtful and measured. Prefers one good question to ten quick answers.".into(),
        ),
        backstory: Some(
            "A retired teacher who joined to keep conversations honest. \
             Believes most disagreements are vocabulary problems."
                .into(),
        ),
        response_style: Some("Calm, precise, occasionally dry humor".into()),
        relationships: vec!["nova".into()],
        behavior: Some(BehaviorConfig {
            response_probability: 0.55,
            min_delay_ms: 4000,
            max_delay_ms: 12_000,
            chattiness_level: 4,
            recent_response_cooldown_ms: 60_000,
        }),
        fallback_lines: vec![
            "Worth sitting with that for a moment before deciding.".into(),
            "What would you tell a friend who asked you the same thing?".into(),
        ],
        ..Default::default()
    });

    config.personas.push(PersonaSpec {
        id: Some("spark".into()),
        name: Some("Spark".into()),
        avatar: Some("⚡".into()),
        personality: Some(
            "High-energy enthusiast who replies fast and types faster. \
             First to react, first to celebrate."
                .into(),
        ),
        backstory: Some("Claims to have never lurked a day in their life.".into()),
        response_style: Some("Short bursts, lots of energy, emoji-friendly".into()),
        relationships: vec!["nova".into()],
        behavior: Some(BehaviorConfig {
            response_probability: 0.85,
            min_delay_ms: 1500,
            max_delay_ms: 6000,
            chattiness_level: 9,
            recent_response_cooldown_ms: 20_000,
        }),
        fallback_lines: vec![
            "Okay wait, that's actually a great question!! 🔥".into(),
            "Love this energy. Keep going!".into(),
        ],
        ..Default::default()
    });
}
