use chrono::{DateTime, Utc};

use crate::memory::AgentMemory;
use crate::persona::Persona;
use crate::types::ChatMessage;

/// Room messages embedded into the system prompt for conversational context.
pub const CONTEXT_MESSAGES: usize = 5;

/// Prior conversation summaries embedded into the user-context block.
pub const CONTEXT_CONVERSATIONS: usize = 5;

const DEFAULT_TEMPLATE: &str = "You are {name}, a member of an online chat community.\n\
Personality: {personality}\n\
Backstory: {backstory}\n\
Response style: {responseStyle}";

/// Assemble the system prompt for one generation call: persona fields
/// interpolated into the instructional template, the room's display name,
/// the last few room messages, and hard brevity constraints.
pub fn system_prompt(persona: &Persona, room_name: &str, recent: &[ChatMessage]) -> String {
    let template = persona
        .prompt_template
        .as_deref()
        .unwrap_or(DEFAULT_TEMPLATE);

    let mut prompt = template
        .replace("{name}", &persona.name)
        .replace("{personality}", &persona.personality)
        .replace("{backstory}", &persona.backstory)
        .replace("{responseStyle}", &persona.response_style);

    prompt.push_str(&format!("\n\nYou are chatting in \"{room_name}\"."));

    let conversation = format_recent(recent);
    if !conversation.is_empty() {
        prompt.push_str("\n\nRecent conversation:\n");
        prompt.push_str(&conversation);
    }

    prompt.push_str(
        "\n\nYour response must be very short, like a text message. \
         1-2 sentences max. Never exceed 750 characters; aim for under 400.",
    );
    prompt
}

/// Format the last [`CONTEXT_MESSAGES`] messages as `author: content` lines,
/// oldest first.
pub fn format_recent(messages: &[ChatMessage]) -> String {
    let start = messages.len().saturating_sub(CONTEXT_MESSAGES);
    messages[start..]
        .iter()
        .map(|m| format!("{}: {}", m.author, m.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Build the user turn: the raw message, optionally followed by a delimited
/// context block about the sender. An empty context leaves the message as-is.
pub fn user_turn(message: &str, context: &str) -> String {
    if context.is_empty() {
        return message.to_string();
    }
    format!("{message}\n\nCONTEXT ABOUT THIS USER:\n{context}")
}

/// Render what an agent remembers about a user. Absent fields are omitted,
/// not rendered as empty placeholders. Returns an empty string for unknown
/// users.
pub fn memory_context(memory: &AgentMemory, user_id: &str, now: DateTime<Utc>) -> String {
    let Some(profile) = memory.user_profiles.get(user_id) else {
        return String::new();
    };

    let mut context = String::new();

    if !profile.preferences.is_empty() {
        context.push_str(&format!(
            "User interests: {}\n",
            profile.preferences.join(", ")
        ));
    }
    if let Some(status) = &profile.relationship_status {
        context.push_str(&format!("Relationship status: {status}\n"));
    }
    if !profile.personality_traits.is_empty() {
        context.push_str(&format!(
            "User traits: {}\n",
            profile.personality_traits.join(", ")
        ));
    }

    let recent = memory.recent_conversations(user_id, CONTEXT_CONVERSATIONS);
    if !recent.is_empty() {
        context.push_str("\nRecent conversation history:\n");
        for (i, conv) in recent.iter().enumerate() {
            context.push_str(&format!(
                "{}. {}: {}\n",
                i + 1,
                time_ago(conv.timestamp, now),
                conv.message
            ));
        }
    }

    let interactions = memory.interaction_count(user_id);
    if interactions > 0 {
        context.push_str(&format!(
            "\nInteraction history: {interactions} previous conversations\n"
        ));
    }

    if let Some(relationship) = memory.relationships.get(user_id) {
        context.push_str(&format!(
            "Relationship level: {} (trust: {})\n",
            relationship.relationship_type, relationship.trust_level
        ));
    }

    context.trim().to_string()
}

/// Coarse human-readable recency label: "X day(s) ago", "X hour(s) ago", or
/// "recently" for anything under an hour.
pub fn time_ago(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = now.signed_duration_since(timestamp);
    let hours = elapsed.num_hours();
    let days = elapsed.num_days();

    if days > 0 {
        format!("{days} day{} ago", if days > 1 { "s" } else { "" })
    } else if hours > 0 {
        format!("{hours} hour{} ago", if hours > 1 { "s" } else { "" })
    } else {
        "recently".to_string()
    }
}
