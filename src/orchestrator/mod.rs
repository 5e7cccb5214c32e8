pub mod pipeline;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::delivery::{DeliveryQueue, PendingDelivery};
use crate::memory::MemoryStore;
use crate::persona::Persona;
use crate::prompt::CONTEXT_MESSAGES;
use crate::room::{RoomRegistry, RoomSession};
use self::pipeline::{PromptContext, ResponseResolver};

/// At most this many agents respond to a single human message.
pub const MAX_RESPONDERS: usize = 4;

/// Extra delay added per responder position so near-simultaneous computed
/// delays still produce visibly sequential deliveries.
pub const STAGGER_MS: u64 = 1500;

/// Probability bonus when the message names the agent directly.
pub const MENTION_BOOST: f64 = 0.3;

/// Probability reduction for agents that authored one of the last few
/// agent messages, to avoid monopolizing the conversation.
pub const RECENT_RESPONSE_PENALTY: f64 = 0.2;

/// Composed probability never exceeds this, even with the mention boost.
pub const PROBABILITY_CEILING: f64 = 0.95;

/// Agent-authored messages examined for the recent-responder penalty.
const RECENT_RESPONDER_WINDOW: usize = 3;

const URGENT_KEYWORDS: &[&str] = &["help", "urgent", "please", "need", "how", "?"];

/// Injectable uniform-[0,1) randomness, so selection and delay behavior is
/// deterministically testable with a seeded source.
pub trait RandomSource: Send {
    fn next_f64(&mut self) -> f64;
}

/// Production source backed by the thread RNG.
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn next_f64(&mut self) -> f64 {
        rand::thread_rng().r#gen::<f64>()
    }
}

/// Deterministic source for tests.
pub struct SeededRandom(StdRng);

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self(StdRng::seed_from_u64(seed))
    }
}

impl RandomSource for SeededRandom {
    fn next_f64(&mut self) -> f64 {
        self.0.r#gen::<f64>()
    }
}

/// Heuristic 0-1 urgency score: one point per urgent keyword present,
/// saturating at 3.
pub fn message_urgency(message: &str) -> f64 {
    let lower = message.to_lowercase();
    let count = URGENT_KEYWORDS
        .iter()
        .filter(|kw| lower.contains(*kw))
        .count();
    (count as f64 / 3.0).min(1.0)
}

/// Compose the selection probability for one persona: base probability plus
/// the mention boost, minus the recent-responder penalty, clamped into
/// `[0, PROBABILITY_CEILING]`.
pub fn compose_probability(
    persona: &Persona,
    message: &str,
    recent_agent_authors: &[String],
) -> f64 {
    let base = persona.behavior.response_probability;

    let mention_boost = if message
        .to_lowercase()
        .contains(&persona.name.to_lowercase())
    {
        MENTION_BOOST
    } else {
        0.0
    };

    let penalty = if recent_agent_authors.iter().any(|a| a == &persona.id) {
        RECENT_RESPONSE_PENALTY
    } else {
        0.0
    };

    (base + mention_boost - penalty).clamp(0.0, PROBABILITY_CEILING)
}

/// Compute a response delay in milliseconds. Urgency compresses the delay
/// toward the lower bound; the `(0.5 + U[0,1))` factor adds ±50% jitter
/// around the midpoint of the configured range.
pub fn response_delay(persona: &Persona, urgency: f64, rng: &mut dyn RandomSource) -> u64 {
    let behavior = &persona.behavior;
    let variance = (behavior.max_delay_ms - behavior.min_delay_ms) as f64;
    let urgency_multiplier = 1.0 - (urgency * 0.7);
    let random_factor = 0.5 + rng.next_f64();
    let delay = behavior.min_delay_ms as f64 + variance * random_factor * urgency_multiplier;
    delay.round() as u64
}

/// One agent chosen to respond, with its computed and staggered delays.
#[derive(Debug, Clone)]
pub struct ScheduledResponder {
    pub persona: Persona,
    pub delay_ms: u64,
    pub staggered_delay_ms: u64,
}

/// Decide which room members respond to a message, and when.
///
/// Every member is fully decided (cooldown gate, probability draw, delay)
/// before any generation begins. Selected agents are sorted ascending by
/// computed delay, capped at [`MAX_RESPONDERS`], then staggered by
/// [`STAGGER_MS`] per position.
pub fn plan_responses(
    room: &RoomSession,
    message: &str,
    now: DateTime<Utc>,
    rng: &mut dyn RandomSource,
) -> Vec<ScheduledResponder> {
    let urgency = message_urgency(message);
    let recent_authors = room.recent_agent_authors(RECENT_RESPONDER_WINDOW);

    let mut selected = Vec::new();
    for persona in room.personas() {
        // Hard gate, not probabilistic: a cooling-down agent never responds.
        if let Some(last) = room.last_response(&persona.id) {
            let elapsed_ms = now.signed_duration_since(last).num_milliseconds();
            if elapsed_ms < persona.behavior.recent_response_cooldown_ms as i64 {
                debug!(persona = %persona.id, "on cooldown, skipping");
                continue;
            }
        }

        let probability = compose_probability(persona, message, &recent_authors);
        let draw = rng.next_f64();
        let responds = draw < probability;
        debug!(persona = %persona.id, probability, responds, "selection draw");
        if !responds {
            continue;
        }

        let delay_ms = response_delay(persona, urgency, rng);
        selected.push(ScheduledResponder {
            persona: persona.clone(),
            delay_ms,
            staggered_delay_ms: delay_ms,
        });
    }

    // Fastest responder first, bounded simultaneous "typing" agents.
    selected.sort_by_key(|r| r.delay_ms);
    selected.truncate(MAX_RESPONDERS);
    for (i, responder) in selected.iter_mut().enumerate() {
        responder.staggered_delay_ms = responder.delay_ms + i as u64 * STAGGER_MS;
    }
    selected
}

/// Drives the full response pipeline for incoming human messages: selection,
/// memory updates, generation with fallback, and delivery scheduling.
pub struct Orchestrator {
    rooms: Arc<RwLock<RoomRegistry>>,
    memory: Arc<MemoryStore>,
    resolver: ResponseResolver,
    delivery: DeliveryQueue,
    rng: Mutex<Box<dyn RandomSource>>,
}

impl Orchestrator {
    pub fn new(
        rooms: Arc<RwLock<RoomRegistry>>,
        memory: Arc<MemoryStore>,
        resolver: ResponseResolver,
        delivery: DeliveryQueue,
        rng: Box<dyn RandomSource>,
    ) -> Self {
        Self {
            rooms,
            memory,
            resolver,
            delivery,
            rng: Mutex::new(rng),
        }
    }

    pub fn resolver(&self) -> &ResponseResolver {
        &self.resolver
    }

    /// Run one orchestration pass for a human message already appended to the
    /// room's history.
    ///
    /// Each selected agent's pipeline is independent: a failure resolving one
    /// agent's text degrades to a fallback line and never blocks siblings.
    pub async fn handle_human_message(
        &self,
        room_id: &str,
        user_id: &str,
        username: &str,
        message: &str,
    ) {
        let now = Utc::now();

        // Selection and cooldown bookkeeping share the write lock: last
        // responses are set at selection time to the scheduled delivery time,
        // so a fast-follow message — sequential or concurrent — cannot
        // re-select an agent that is already about to respond.
        let (plan, room_name, recent) = {
            let mut rooms = self.rooms.write().await;
            let Some(room) = rooms.get_mut(room_id) else {
                warn!(room = %room_id, "orchestration pass for unknown room");
                return;
            };
            let mut rng = self.rng.lock().await;
            let plan = plan_responses(room, message, now, rng.as_mut());
            drop(rng);
            for responder in &plan {
                let at =
                    now + chrono::Duration::milliseconds(responder.staggered_delay_ms as i64);
                room.set_last_response(&responder.persona.id, at);
            }
            (plan, room.name.clone(), room.recent(CONTEXT_MESSAGES).to_vec())
        };

        if plan.is_empty() {
            debug!(room = %room_id, "no agents selected");
            return;
        }

        info!(
            room = %room_id,
            count = plan.len(),
            responders = %plan
                .iter()
                .map(|r| r.persona.id.as_str())
                .collect::<Vec<_>>()
                .join(", "),
            "agents will respond"
        );

        for responder in &plan {
            self.memory.record_interaction(
                room_id,
                &responder.persona.id,
                user_id,
                username,
                message,
            );

            let context = PromptContext {
                room_name: room_name.clone(),
                recent: recent.clone(),
                memory: self.memory.get(room_id, &responder.persona.id),
                user_id: user_id.to_string(),
            };

            let content = self
                .resolver
                .resolve(&responder.persona, message, &context)
                .await;

            self.delivery.enqueue(PendingDelivery {
                room_id: room_id.to_string(),
                persona_id: responder.persona.id.clone(),
                content,
                delay: Duration::from_millis(responder.staggered_delay_ms),
            });
        }
    }
}
