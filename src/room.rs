use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use tracing::warn;

use crate::config::BanterConfig;
use crate::persona::Persona;
use crate::types::ChatMessage;

/// Room history returned to readers is capped to this many trailing messages.
/// The underlying history itself is never truncated.
pub const HISTORY_PAGE: usize = 50;

/// A chat room: member personas, an append-only message history, and the
/// per-agent response bookkeeping the orchestrator gates on.
///
/// All mutable state lives here rather than in process-wide globals, so rooms
/// are isolated and testable in-place.
pub struct RoomSession {
    pub id: String,
    pub name: String,
    pub description: String,
    /// Member ids in join order. Drives deterministic iteration.
    member_order: Vec<String>,
    personas: HashMap<String, Persona>,
    history: Vec<ChatMessage>,
    last_response: HashMap<String, DateTime<Utc>>,
}

/// Listing view of a room for the HTTP surface.
#[derive(Debug, Clone, Serialize)]
pub struct RoomSummary {
    pub id: String,
    pub name: String,
    pub description: String,
    pub members: Vec<String>,
}

impl RoomSession {
    pub fn new(id: &str, name: &str, description: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            member_order: Vec::new(),
            personas: HashMap::new(),
            history: Vec::new(),
            last_response: HashMap::new(),
        }
    }

    /// Add a persona to the member set. Replaces any member with the same id
    /// without changing its position.
    pub fn add_persona(&mut self, persona: Persona) {
        if !self.personas.contains_key(&persona.id) {
            self.member_order.push(persona.id.clone());
        }
        self.personas.insert(persona.id.clone(), persona);
    }

    /// Remove a persona from the member set, returning it if present.
    pub fn remove_persona(&mut self, persona_id: &str) -> Option<Persona> {
        self.member_order.retain(|id| id != persona_id);
        self.last_response.remove(persona_id);
        self.personas.remove(persona_id)
    }

    pub fn persona(&self, persona_id: &str) -> Option<&Persona> {
        self.personas.get(persona_id)
    }

    pub fn has_persona(&self, persona_id: &str) -> bool {
        self.personas.contains_key(persona_id)
    }

    /// Member personas in join order.
    pub fn personas(&self) -> impl Iterator<Item = &Persona> {
        self.member_order
            .iter()
            .filter_map(|id| self.personas.get(id))
    }

    pub fn member_ids(&self) -> Vec<String> {
        self.member_order.clone()
    }

    pub fn member_count(&self) -> usize {
        self.member_order.len()
    }

    /// Append a message. Once appended, messages are immutable and never
    /// reordered; delivery order is append order.
    pub fn append(&mut self, message: ChatMessage) {
        self.history.push(message);
    }

    /// The most recent `n` messages, oldest first.
    pub fn recent(&self, n: usize) -> &[ChatMessage] {
        let start = self.history.len().saturating_sub(n);
        &self.history[start..]
    }

    /// The trailing page of history exposed to readers.
    pub fn page(&self) -> &[ChatMessage] {
        self.recent(HISTORY_PAGE)
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Ids of the authors of the last `n` agent-authored messages.
    pub fn recent_agent_authors(&self, n: usize) -> Vec<String> {
        let agent_authors: Vec<&str> = self
            .history
            .iter()
            .filter(|m| m.is_agent())
            .map(|m| m.author.as_str())
            .collect();
        let start = agent_authors.len().saturating_sub(n);
        agent_authors[start..].iter().map(|s| s.to_string()).collect()
    }

    pub fn last_response(&self, persona_id: &str) -> Option<DateTime<Utc>> {
        self.last_response.get(persona_id).copied()
    }

    /// Record when a persona is scheduled to respond. Set at selection time
    /// using the scheduled delivery time, so a fast-follow message cannot
    /// re-select an agent that is already about to respond.
    pub fn set_last_response(&mut self, persona_id: &str, at: DateTime<Utc>) {
        self.last_response.insert(persona_id.to_string(), at);
    }

    pub fn summary(&self) -> RoomSummary {
        RoomSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            members: self.member_order.clone(),
        }
    }
}

/// All rooms known to this process.
#[derive(Default)]
pub struct RoomRegistry {
    rooms: HashMap<String, RoomSession>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build rooms from config, validating each member persona. Personas that
    /// fail validation, and members with no definition, are excluded from the
    /// room with a warning.
    pub fn from_config(config: &BanterConfig) -> Self {
        let mut validated: HashMap<String, Persona> = HashMap::new();
        for spec in &config.personas {
            match Persona::from_spec(spec.clone()) {
                Ok(persona) => {
                    validated.insert(persona.id.clone(), persona);
                }
                Err(e) => warn!("excluding persona: {e}"),
            }
        }

        let mut registry = Self::new();
        for room_cfg in &config.rooms {
            let mut room = RoomSession::new(&room_cfg.id, &room_cfg.name, &room_cfg.description);
            for member in &room_cfg.members {
                match validated.get(member) {
                    Some(persona) => room.add_persona(persona.clone()),
                    None => warn!(
                        room = %room_cfg.id,
                        persona = %member,
                        "room member has no valid persona definition, excluding"
                    ),
                }
            }
            room.append(ChatMessage::system(format!("Welcome to {}.", room.name)));
            registry.insert(room);
        }
        registry
    }

    pub fn insert(&mut self, room: RoomSession) {
        self.rooms.insert(room.id.clone(), room);
    }

    pub fn get(&self, room_id: &str) -> Option<&RoomSession> {
        self.rooms.get(room_id)
    }

    pub fn get_mut(&mut self, room_id: &str) -> Option<&mut RoomSession> {
        self.rooms.get_mut(room_id)
    }

    pub fn summaries(&self) -> Vec<RoomSummary> {
        let mut summaries: Vec<RoomSummary> =
            self.rooms.values().map(|r| r.summary()).collect();
        summaries.sort_by(|a, b| a.id.cmp(&b.id));
        summaries
    }

    pub fn count(&self) -> usize {
        self.rooms.len()
    }
}
