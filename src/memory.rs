use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::{debug, warn};

/// Conversation records kept per (room, agent) pair; oldest evicted first.
pub const MAX_CONVERSATIONS: usize = 50;

/// One remembered exchange with a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationRecord {
    pub user_id: String,
    pub message: String,
    #[serde(default)]
    pub context: String,
    pub timestamp: DateTime<Utc>,
}

/// What an agent knows about one user. Updated by merge, never replaced
/// wholesale, so fields learned earlier survive later interactions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UserProfile {
    pub username: Option<String>,
    pub preferences: Vec<String>,
    pub relationship_status: Option<String>,
    pub personality_traits: Vec<String>,
    pub last_message: Option<String>,
    pub last_seen: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relationship {
    pub relationship_type: String,
    pub trust_level: f64,
}

/// Everything one agent remembers about one room.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentMemory {
    pub conversations: Vec<ConversationRecord>,
    pub user_profiles: HashMap<String, UserProfile>,
    pub relationships: HashMap<String, Relationship>,
}

impl AgentMemory {
    /// Conversations with one user, most recent last, capped at `limit`.
    pub fn recent_conversations(&self, user_id: &str, limit: usize) -> Vec<&ConversationRecord> {
        let with_user: Vec<&ConversationRecord> = self
            .conversations
            .iter()
            .filter(|c| c.user_id == user_id)
            .collect();
        let start = with_user.len().saturating_sub(limit);
        with_user[start..].to_vec()
    }

    pub fn interaction_count(&self, user_id: &str) -> usize {
        self.conversations
            .iter()
            .filter(|c| c.user_id == user_id)
            .count()
    }
}

/// JSON-file-backed memory, keyed per (room, agent). Records are lazy-loaded
/// once per process and persisted synchronously after every mutation.
///
/// Persistence failures are logged and swallowed: a failed write must never
/// block message delivery, at the cost of that interaction being forgotten.
pub struct MemoryStore {
    root: PathBuf,
    loaded: Mutex<HashMap<String, AgentMemory>>,
}

impl MemoryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            loaded: Mutex::new(HashMap::new()),
        }
    }

    fn key(room_id: &str, agent_id: &str) -> String {
        format!("{room_id}_{agent_id}")
    }

    fn file_path(&self, room_id: &str, agent_id: &str) -> PathBuf {
        self.root.join(format!("{}.json", Self::key(room_id, agent_id)))
    }

    /// Snapshot of an agent's memory for a room, loading from disk on first
    /// access.
    pub fn get(&self, room_id: &str, agent_id: &str) -> AgentMemory {
        let mut loaded = self.loaded.lock().expect("memory store lock poisoned");
        self.load_entry(&mut loaded, room_id, agent_id).clone()
    }

    /// Record one human interaction: merge the user's profile (updating
    /// `last_seen`), append a conversation record, trim to the most recent
    /// [`MAX_CONVERSATIONS`], and persist.
    pub fn record_interaction(
        &self,
        room_id: &str,
        agent_id: &str,
        user_id: &str,
        username: &str,
        message: &str,
    ) {
        let mut loaded = self.loaded.lock().expect("memory store lock poisoned");
        let memory = self.load_entry(&mut loaded, room_id, agent_id);

        let profile = memory.user_profiles.entry(user_id.to_string()).or_default();
        if !username.is_empty() {
            profile.username = Some(username.to_string());
        }
        profile.last_message = Some(message.to_string());
        profile.last_seen = Some(Utc::now());

        memory.conversations.push(ConversationRecord {
            user_id: user_id.to_string(),
            message: message.to_string(),
            context: room_id.to_string(),
            timestamp: Utc::now(),
        });
        if memory.conversations.len() > MAX_CONVERSATIONS {
            let excess = memory.conversations.len() - MAX_CONVERSATIONS;
            memory.conversations.drain(..excess);
        }

        let snapshot = memory.clone();
        drop(loaded);
        self.persist(room_id, agent_id, &snapshot);
    }

    /// Apply an arbitrary profile update (merge semantics are the caller's
    /// responsibility within the closure), then persist.
    pub fn update_profile(
        &self,
        room_id: &str,
        agent_id: &str,
        user_id: &str,
        update: impl FnOnce(&mut UserProfile),
    ) {
        let mut loaded = self.loaded.lock().expect("memory store lock poisoned");
        let memory = self.load_entry(&mut loaded, room_id, agent_id);
        let profile = memory.user_profiles.entry(user_id.to_string()).or_default();
        update(profile);
        profile.last_seen = Some(Utc::now());
        let snapshot = memory.clone();
        drop(loaded);
        self.persist(room_id, agent_id, &snapshot);
    }

    /// Delete an agent's memory for a room, both in-process and on disk.
    /// Called when the persona itself is deleted.
    pub fn delete(&self, room_id: &str, agent_id: &str) {
        let mut loaded = self.loaded.lock().expect("memory store lock poisoned");
        loaded.remove(&Self::key(room_id, agent_id));
        drop(loaded);

        let path = self.file_path(room_id, agent_id);
        if path.exists() {
            if let Err(e) = std::fs::remove_file(&path) {
                warn!(path = %path.display(), "failed to delete memory file: {e}");
            }
        }
    }

    fn load_entry<'a>(
        &self,
        loaded: &'a mut HashMap<String, AgentMemory>,
        room_id: &str,
        agent_id: &str,
    ) -> &'a mut AgentMemory {
        let key = Self::key(room_id, agent_id);
        if !loaded.contains_key(&key) {
            loaded.insert(key.clone(), self.load_from_disk(room_id, agent_id));
        }
        loaded.get_mut(&key).expect("entry just inserted")
    }

    fn load_from_disk(&self, room_id: &str, agent_id: &str) -> AgentMemory {
        let path = self.file_path(room_id, agent_id);
        match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(memory) => memory,
                Err(e) => {
                    warn!(path = %path.display(), "unreadable memory file, starting fresh: {e}");
                    AgentMemory::default()
                }
            },
            Err(_) => {
                debug!(room = %room_id, agent = %agent_id, "creating new memory");
                AgentMemory::default()
            }
        }
    }

    fn persist(&self, room_id: &str, agent_id: &str, memory: &AgentMemory) {
        if let Err(e) = std::fs::create_dir_all(&self.root) {
            warn!(dir = %self.root.display(), "failed to create memory dir: {e}");
            return;
        }
        let path = self.file_path(room_id, agent_id);
        let json = match serde_json::to_string_pretty(memory) {
            Ok(json) => json,
            Err(e) => {
                warn!(path = %path.display(), "failed to serialize memory: {e}");
                return;
            }
        };
        if let Err(e) = std::fs::write(&path, json) {
            warn!(path = %path.display(), "failed to persist memory: {e}");
        }
    }
}
